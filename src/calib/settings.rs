// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib/settings.rs - 相机参数
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::path::Path;

use nalgebra::Matrix3;
use serde::Deserialize;
use tracing::{info, warn};

use crate::asset::{AssetLoadError, read_json};

#[derive(Deserialize)]
struct SettingsFile {
  camera_matrix: Option<[[f64; 3]; 3]>,
  #[serde(default)]
  distortion_coefficients: Vec<f64>,
}

/// 相机内参与畸变系数
///
/// 只加载和记录，不参与投影：投影直接在未去畸变的画面上进行。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraSettings {
  pub camera_matrix: Option<Matrix3<f64>>,
  pub distortion: Vec<f64>,
}

impl CameraSettings {
  /// 读取 `{"camera_matrix": [[..], [..], [..]], "distortion_coefficients": [..]}`
  pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
    let file: SettingsFile = read_json(path)?;
    let camera_matrix = file
      .camera_matrix
      .map(|rows| Matrix3::from_fn(|r, c| rows[r][c]));
    info!(
      "加载相机参数: 内参 {}，畸变系数 {} 个",
      if camera_matrix.is_some() { "有" } else { "无" },
      file.distortion_coefficients.len()
    );
    Ok(Self {
      camera_matrix,
      distortion: file.distortion_coefficients,
    })
  }

  pub fn load_or_default(path: &Path) -> Self {
    match Self::load(path) {
      Ok(settings) => settings,
      Err(e) => {
        warn!("相机参数加载失败，使用空参数: {}", e);
        Self::default()
      }
    }
  }

  pub fn is_empty(&self) -> bool {
    self.camera_matrix.is_none() && self.distortion.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use std::io::Write;

  use super::*;

  #[test]
  fn loads_matrix_rows() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
      file,
      r#"{{"camera_matrix": [[800, 0, 320], [0, 810, 240], [0, 0, 1]],
          "distortion_coefficients": [0.1, -0.05, 0, 0, 0]}}"#
    )
    .unwrap();

    let settings = CameraSettings::load(file.path()).unwrap();
    let k = settings.camera_matrix.unwrap();
    assert_eq!(k[(0, 2)], 320.0);
    assert_eq!(k[(1, 1)], 810.0);
    assert_eq!(settings.distortion.len(), 5);
  }

  #[test]
  fn broken_file_degrades_to_empty() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "not json").unwrap();
    assert!(matches!(
      CameraSettings::load(file.path()),
      Err(AssetLoadError::Parse { .. })
    ));
    assert!(CameraSettings::load_or_default(file.path()).is_empty());
  }
}
