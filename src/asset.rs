// 该文件是 Lanchang （篮场） 项目的一部分。
// src/asset.rs - 外部资源加载
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

use std::path::{Path, PathBuf};

use image::{ImageReader, RgbImage};
use thiserror::Error;
use tracing::debug;

/// 外部资源（类别列表、相机参数、球场示意图、字体）加载错误
#[derive(Error, Debug)]
pub enum AssetLoadError {
  #[error("无法读取资源文件 {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("资源文件格式错误 {path}: {source}")]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("无法解码图像 {path}: {source}")]
  Image {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
  #[error("字体文件无效: {0}")]
  Font(PathBuf),
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>, AssetLoadError> {
  debug!("读取资源文件: {}", path.display());
  std::fs::read(path).map_err(|source| AssetLoadError::Io {
    path: path.to_path_buf(),
    source,
  })
}

pub(crate) fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, AssetLoadError> {
  let data = read_bytes(path)?;
  serde_json::from_slice(&data).map_err(|source| AssetLoadError::Parse {
    path: path.to_path_buf(),
    source,
  })
}

/// 读取 RGB 图像，例如球场示意图
pub fn load_rgb_image(path: &Path) -> Result<RgbImage, AssetLoadError> {
  let image = ImageReader::open(path)
    .map_err(|source| AssetLoadError::Io {
      path: path.to_path_buf(),
      source,
    })?
    .decode()
    .map_err(|source| AssetLoadError::Image {
      path: path.to_path_buf(),
      source,
    })?;
  Ok(image.to_rgb8())
}

/// 读取 TTF/OTF 字体
pub fn load_font(path: &Path) -> Result<ab_glyph::FontArc, AssetLoadError> {
  let data = read_bytes(path)?;
  ab_glyph::FontArc::try_from_vec(data).map_err(|_| AssetLoadError::Font(path.to_path_buf()))
}
