// 该文件是 Lanchang （篮场） 项目的一部分。
// src/output/directory_record.rs - 按日期目录记录结果
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
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::VideoFrame,
  model::{ClassNames, DecodeError, DetectResult},
  output::{CourtView, Render, court_view_path},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("类别错误: {0}")]
  DecodeError(#[from] DecodeError),
}

/// 文本记录：每行一个目标
///
/// `名称或编号, 置信度, left, top, width, height[, 球场 x, 球场 y]`
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  fn format(
    &self,
    detections: &DetectResult,
    view: &CourtView,
    names: &ClassNames,
  ) -> Result<String, DecodeError> {
    let mut records = Vec::with_capacity(detections.len());
    for item in detections.iter() {
      let name = match names.name(item.class_id)? {
        Some(name) if self.label_with_name => name.to_string(),
        _ => item.class_id.to_string(),
      };
      let mut record = format!(
        "{}, {:.4}, {}, {}, {}, {}",
        name, item.score, item.bbox.left, item.bbox.top, item.bbox.width, item.bbox.height
      );
      if let Some(position) = view.positions.iter().find(|p| p.bbox == item.bbox) {
        record.push_str(&format!(
          ", {:.1}, {:.1}",
          position.court.x, position.court.y
        ));
      }
      records.push(record);
    }
    Ok(records.join("\n"))
  }

  pub fn record(
    &self,
    detections: &DetectResult,
    view: &CourtView,
    names: &ClassNames,
    path: &Path,
  ) -> Result<(), DirectoryRecordOutputError> {
    let text = self.format(detections, view, names)?;
    std::fs::write(path.with_extension("txt"), text)?;
    Ok(())
  }
}

pub struct DirectoryRecordOutput {
  directory: PathBuf,
  record: Option<Record>,
  names: ClassNames,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| Record {
        label_with_name: v != "id",
      });
    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      record,
      names: ClassNames::default(),
      frame_counter: AtomicU16::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  pub fn with_class_names(mut self, names: ClassNames) -> Self {
    self.names = names;
    self
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<VideoFrame, CourtView> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &VideoFrame, result: &CourtView) -> Result<(), Self::Error> {
    if !self.always && frame.detections.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    frame.image.save(&path)?;
    if let Some(court) = &result.image {
      court.save(court_view_path(&path))?;
    }
    if let Some(record) = &self.record {
      record.record(&frame.detections, result, &self.names, &path)?;
    }
    debug!("记录第 {} 帧: {}", frame.index, path.display());
    Ok(())
  }
}
