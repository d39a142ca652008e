// 该文件是 Lanchang （篮场） 项目的一部分。
// src/model/replay.rs - 回放已记录的模型输出
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

//! 回放模型
//!
//! 读取 JSON Lines 文件：第一行声明输出格式，其后每行是一帧的原始输出。
//!
//! ```text
//! {"format": "Region"}
//! {"frame": 0, "tensors": [{"rows": 1, "cols": 6, "data": [0.5, 0.5, 0.1, 0.1, 1.0, 0.9]}]}
//! ```

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::VideoFrame,
  model::{DecodeError, DetectionSchema, Model, RawOutput, RawTensor},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("第 {line} 行解析失败: {source}")]
  ParseError {
    line: usize,
    #[source]
    source: serde_json::Error,
  },
  #[error("输出格式错误: {0}")]
  DecodeError(#[from] DecodeError),
  #[error("文件为空，缺少格式声明")]
  MissingHeader,
}

#[derive(Deserialize)]
struct ReplayHeader {
  format: String,
}

#[derive(Deserialize)]
struct ReplayRecord {
  frame: u64,
  tensors: Vec<RawTensor>,
}

pub struct ReplayModelBuilder {
  path: String,
}

impl FromUrlWithScheme for ReplayModelBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModelBuilder {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ReplayModelError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(ReplayModelBuilder {
      path: url.path().to_string(),
    })
  }
}

impl ReplayModelBuilder {
  pub fn build(self) -> Result<ReplayModel, ReplayModelError> {
    info!("加载回放文件: {}", self.path);
    let text = std::fs::read_to_string(&self.path)?;
    ReplayModel::parse(&text)
  }
}

/// 按帧索引回放原始输出；没有记录的帧返回空输出
#[derive(Debug)]
pub struct ReplayModel {
  schema: DetectionSchema,
  outputs: HashMap<u64, RawOutput>,
}

impl ReplayModel {
  pub fn new(schema: DetectionSchema, outputs: HashMap<u64, RawOutput>) -> Self {
    Self { schema, outputs }
  }

  pub fn parse(text: &str) -> Result<Self, ReplayModelError> {
    let mut lines = text
      .lines()
      .enumerate()
      .filter(|(_, line)| !line.trim().is_empty());

    let (line, header) = lines.next().ok_or(ReplayModelError::MissingHeader)?;
    let header: ReplayHeader = serde_json::from_str(header).map_err(|source| {
      ReplayModelError::ParseError {
        line: line + 1,
        source,
      }
    })?;
    let schema: DetectionSchema = header.format.parse()?;
    debug!("回放输出格式: {}", schema);

    let mut outputs = HashMap::new();
    for (line, content) in lines {
      let record: ReplayRecord =
        serde_json::from_str(content).map_err(|source| ReplayModelError::ParseError {
          line: line + 1,
          source,
        })?;
      for tensor in &record.tensors {
        tensor.validate()?;
      }
      outputs.insert(
        record.frame,
        RawOutput {
          tensors: record.tensors,
        },
      );
    }

    info!("回放文件包含 {} 帧输出", outputs.len());
    Ok(Self { schema, outputs })
  }
}

impl Model for ReplayModel {
  type Error = ReplayModelError;

  fn schema(&self) -> DetectionSchema {
    self.schema
  }

  fn infer(&self, input: &VideoFrame) -> Result<RawOutput, Self::Error> {
    Ok(self.outputs.get(&input.index).cloned().unwrap_or_default())
  }
}

#[cfg(test)]
mod tests {
  use image::RgbImage;

  use super::*;

  #[test]
  fn replays_outputs_by_frame_index() {
    let text = r#"{"format": "Region"}

{"frame": 2, "tensors": [{"rows": 1, "cols": 6, "data": [0.5, 0.5, 0.1, 0.1, 1.0, 0.9]}]}
"#;
    let model = ReplayModel::parse(text).unwrap();
    assert_eq!(model.schema(), DetectionSchema::Region);

    let frame = VideoFrame::new(RgbImage::new(4, 4), 2, 80);
    assert_eq!(model.infer(&frame).unwrap().tensors.len(), 1);

    let other = VideoFrame::new(RgbImage::new(4, 4), 3, 120);
    assert!(model.infer(&other).unwrap().tensors.is_empty());
  }

  #[test]
  fn unknown_format_is_reported() {
    let err = ReplayModel::parse(r#"{"format": "Softmax"}"#).unwrap_err();
    assert!(matches!(
      err,
      ReplayModelError::DecodeError(DecodeError::UnsupportedSchema(_))
    ));
  }

  #[test]
  fn inconsistent_tensor_is_reported() {
    let text = r#"{"format": "DetectionOutput"}
{"frame": 0, "tensors": [{"rows": 2, "cols": 7, "data": [0.0]}]}"#;
    assert!(matches!(
      ReplayModel::parse(text),
      Err(ReplayModelError::DecodeError(DecodeError::MalformedTensor { .. }))
    ));
  }

  #[test]
  fn oversized_tensor_shape_is_reported() {
    let text = r#"{"format": "Region"}
{"frame": 0, "tensors": [{"rows": 4611686018427387904, "cols": 8, "data": []}]}"#;
    assert!(matches!(
      ReplayModel::parse(text),
      Err(ReplayModelError::DecodeError(
        DecodeError::MalformedTensor { cols: 8, len: 0, .. }
      ))
    ));
  }

  #[test]
  fn url_scheme_is_checked() {
    let url = Url::parse("file:///tmp/out.jsonl").unwrap();
    assert!(ReplayModelBuilder::from_url(&url).is_err());
    let url = Url::parse("replay:///tmp/out.jsonl").unwrap();
    assert_eq!(ReplayModelBuilder::from_url(&url).unwrap().path, "/tmp/out.jsonl");
  }
}
