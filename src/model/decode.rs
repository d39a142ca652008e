// 该文件是 Lanchang （篮场） 项目的一部分。
// src/model/decode.rs - 原始输出张量解码
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

use std::{fmt, str::FromStr};

use thiserror::Error;
use tracing::debug;

use crate::model::{BoundingBox, DetectItem, RawOutput, RawTensor};

/// 默认置信度阈值
pub const CONFIDENCE_THRESHOLD: f32 = 0.5;
/// Region 布局中类别分数的起始列：cx, cy, w, h, objectness 之后
pub const REGION_SCORE_OFFSET: usize = 5;
/// 检测表布局每行的列数
pub const TABLE_ROW_WIDTH: usize = 7;
/// 解码后像素坐标的上限
const PIXEL_LIMIT: i64 = (i32::MAX / 2) as i64;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
  #[error("不支持的输出格式: {0}")]
  UnsupportedSchema(String),
  #[error("张量形状无效: {rows}x{cols}, 实际数据长度 {len}")]
  MalformedTensor { rows: usize, cols: usize, len: usize },
  #[error("{schema} 布局至少需要 {needed} 列, 实际 {cols} 列")]
  TooFewColumns {
    schema: DetectionSchema,
    cols: usize,
    needed: usize,
  },
  #[error("模型输出中没有张量")]
  MissingTensor,
  #[error("无效的类别索引: {0}")]
  InvalidClassIndex(f32),
  #[error("类别索引越界: {class_id}, 共 {count} 个类别")]
  ClassIndexOutOfRange { class_id: usize, count: usize },
}

/// 模型输出布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSchema {
  /// 每行: 中心点、宽高（归一化）、objectness、各类别分数
  Region,
  /// 单个检测表，每行: [label, class, confidence, left, top, right, bottom]
  DetectionTable,
}

impl FromStr for DetectionSchema {
  type Err = DecodeError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "Region" | "region" => Ok(DetectionSchema::Region),
      "DetectionOutput" | "detection-table" => Ok(DetectionSchema::DetectionTable),
      other => Err(DecodeError::UnsupportedSchema(other.to_string())),
    }
  }
}

impl fmt::Display for DetectionSchema {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DetectionSchema::Region => write!(f, "region"),
      DetectionSchema::DetectionTable => write!(f, "detection-table"),
    }
  }
}

/// 将原始输出张量解码为候选检测
#[derive(Debug, Clone)]
pub struct DetectionDecoder {
  schema: DetectionSchema,
  confidence_threshold: f32,
}

impl DetectionDecoder {
  pub fn new(schema: DetectionSchema) -> Self {
    Self {
      schema,
      confidence_threshold: CONFIDENCE_THRESHOLD,
    }
  }

  /// 根据推理后端声明的输出格式名称构建解码器
  pub fn from_declared_format(format: &str) -> Result<Self, DecodeError> {
    Ok(Self::new(format.parse()?))
  }

  pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn schema(&self) -> DetectionSchema {
    self.schema
  }

  pub fn confidence_threshold(&self) -> f32 {
    self.confidence_threshold
  }

  /// 解码一次推理的输出，坐标换算到 `frame_width` x `frame_height` 的帧
  pub fn decode(
    &self,
    output: &RawOutput,
    frame_width: u32,
    frame_height: u32,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    let (w, h) = (frame_width as f32, frame_height as f32);
    let items = match self.schema {
      DetectionSchema::Region => {
        let mut items = Vec::new();
        for tensor in &output.tensors {
          self.decode_region(tensor, w, h, &mut items)?;
        }
        items
      }
      DetectionSchema::DetectionTable => {
        let tensor = output.tensors.first().ok_or(DecodeError::MissingTensor)?;
        self.decode_table(tensor, w, h)?
      }
    };
    debug!("解码得到 {} 个候选目标 ({})", items.len(), self.schema);
    Ok(items)
  }

  fn decode_region(
    &self,
    tensor: &RawTensor,
    w: f32,
    h: f32,
    items: &mut Vec<DetectItem>,
  ) -> Result<(), DecodeError> {
    tensor.validate()?;
    if tensor.rows == 0 {
      return Ok(());
    }
    if tensor.cols <= REGION_SCORE_OFFSET {
      return Err(DecodeError::TooFewColumns {
        schema: DetectionSchema::Region,
        cols: tensor.cols,
        needed: REGION_SCORE_OFFSET + 1,
      });
    }

    for row in tensor.iter_rows() {
      // 取分数最大的类别，并列时取第一个
      let (class_id, score) = row[REGION_SCORE_OFFSET..].iter().enumerate().fold(
        (0usize, f32::MIN),
        |(best_id, best), (id, &score)| {
          if score > best {
            (id, score)
          } else {
            (best_id, best)
          }
        },
      );

      if score <= self.confidence_threshold {
        continue;
      }

      let center_x = to_pixel(row[0], w);
      let center_y = to_pixel(row[1], h);
      let width = to_pixel(row[2], w);
      let height = to_pixel(row[3], h);

      items.push(DetectItem {
        class_id,
        score,
        bbox: pixel_box(
          center_x.saturating_sub(width / 2),
          center_y.saturating_sub(height / 2),
          width,
          height,
        ),
      });
    }
    Ok(())
  }

  fn decode_table(
    &self,
    tensor: &RawTensor,
    w: f32,
    h: f32,
  ) -> Result<Vec<DetectItem>, DecodeError> {
    tensor.validate()?;
    if tensor.rows == 0 {
      return Ok(Vec::new());
    }
    if tensor.cols < TABLE_ROW_WIDTH {
      return Err(DecodeError::TooFewColumns {
        schema: DetectionSchema::DetectionTable,
        cols: tensor.cols,
        needed: TABLE_ROW_WIDTH,
      });
    }

    let mut items = Vec::new();
    for row in tensor.iter_rows() {
      let score = row[2];
      if score <= self.confidence_threshold {
        continue;
      }

      let class_index = row[1];
      if !class_index.is_finite() || class_index < 0.0 {
        return Err(DecodeError::InvalidClassIndex(class_index));
      }

      let left = to_pixel(row[3], w);
      let top = to_pixel(row[4], h);
      let right = to_pixel(row[5], w);
      let bottom = to_pixel(row[6], h);

      items.push(DetectItem {
        class_id: class_index as usize,
        score,
        bbox: pixel_box(
          left,
          top,
          right.saturating_sub(left),
          bottom.saturating_sub(top),
        ),
      });
    }
    Ok(items)
  }
}

/// 归一化坐标换算为像素并截断；`as` 转换对溢出饱和，NaN 为 0
fn to_pixel(value: f32, scale: f32) -> i64 {
  (value * scale) as i64
}

/// 角点限制在 ±`PIXEL_LIMIT` 内，保证 `right()`/`bottom()` 仍可用 i32 表示
fn pixel_box(left: i64, top: i64, width: i64, height: i64) -> BoundingBox {
  let clamp = |v: i64| v.clamp(-PIXEL_LIMIT, PIXEL_LIMIT);
  let (x1, y1) = (clamp(left), clamp(top));
  let (x2, y2) = (clamp(left.saturating_add(width)), clamp(top.saturating_add(height)));
  BoundingBox::new(x1 as i32, y1 as i32, (x2 - x1) as i32, (y2 - y1) as i32)
}
