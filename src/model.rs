// 该文件是 Lanchang （篮场） 项目的一部分。
// src/model.rs - 模型
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

use serde::Deserialize;

use crate::frame::VideoFrame;

/// 外部推理调用
///
/// 前向计算本身不属于本项目，实现者只需返回原始输出张量，
/// 并在构建时声明一次输出布局。
pub trait Model {
  type Error;

  /// 模型声明的输出布局
  fn schema(&self) -> DetectionSchema;
  fn infer(&self, input: &VideoFrame) -> Result<RawOutput, Self::Error>;
}

/// 二维原始输出张量，按行存储
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawTensor {
  pub rows: usize,
  pub cols: usize,
  pub data: Vec<f32>,
}

impl RawTensor {
  pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, DecodeError> {
    let tensor = Self { rows, cols, data };
    tensor.validate()?;
    Ok(tensor)
  }

  pub(crate) fn validate(&self) -> Result<(), DecodeError> {
    if self.rows.checked_mul(self.cols) != Some(self.data.len()) {
      return Err(DecodeError::MalformedTensor {
        rows: self.rows,
        cols: self.cols,
        len: self.data.len(),
      });
    }
    Ok(())
  }

  pub fn row(&self, index: usize) -> &[f32] {
    &self.data[index * self.cols..(index + 1) * self.cols]
  }

  pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
    // cols 为 0 时 chunks_exact 会 panic
    self.data.chunks_exact(self.cols.max(1)).take(self.rows)
  }
}

/// 一次推理的全部原始输出
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawOutput {
  pub tensors: Vec<RawTensor>,
}

/// 像素坐标下的边界框，允许超出图像范围，绘制时再裁剪
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
  pub left: i32,
  pub top: i32,
  pub width: i32,
  pub height: i32,
}

impl BoundingBox {
  pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
    Self {
      left,
      top,
      width,
      height,
    }
  }

  pub fn right(&self) -> i32 {
    self.left.saturating_add(self.width)
  }

  pub fn bottom(&self) -> i32 {
    self.top.saturating_add(self.height)
  }

  pub fn area(&self) -> i64 {
    if self.width <= 0 || self.height <= 0 {
      return 0;
    }
    self.width as i64 * self.height as i64
  }

  /// 两个框的交并比
  pub fn iou(&self, other: &BoundingBox) -> f32 {
    let x1 = self.left.max(other.left) as i64;
    let y1 = self.top.max(other.top) as i64;
    let x2 = self.right().min(other.right()) as i64;
    let y2 = self.bottom().min(other.bottom()) as i64;

    let intersection = (x2 - x1).max(0) * (y2 - y1).max(0);
    let union = self.area() + other.area() - intersection;

    if union > 0 {
      intersection as f32 / union as f32
    } else {
      0.0
    }
  }

  /// 底边中点，近似为目标在地面上的位置
  pub fn foot_point(&self) -> (f32, f32) {
    (
      self.left as f32 + self.width as f32 / 2.0,
      self.bottom() as f32,
    )
  }

  /// 裁剪到 `width` x `height` 的图像内，完全在外部时返回 `None`
  pub fn clip(&self, width: u32, height: u32) -> Option<BoundingBox> {
    let left = self.left.clamp(0, width as i32);
    let top = self.top.clamp(0, height as i32);
    let right = self.right().clamp(0, width as i32);
    let bottom = self.bottom().clamp(0, height as i32);
    if right <= left || bottom <= top {
      return None;
    }
    Some(BoundingBox::new(left, top, right - left, bottom - top))
  }
}

/// 单个检测目标
#[derive(Debug, Clone, PartialEq)]
pub struct DetectItem {
  pub class_id: usize,
  pub score: f32,
  pub bbox: BoundingBox,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectResult {
  pub items: Box<[DetectItem]>,
}

impl DetectResult {
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, DetectItem> {
    self.items.iter()
  }
}

impl From<Vec<DetectItem>> for DetectResult {
  fn from(items: Vec<DetectItem>) -> Self {
    Self {
      items: items.into_boxed_slice(),
    }
  }
}

mod decode;
mod labels;
mod nms;
mod replay;

pub use self::decode::{
  CONFIDENCE_THRESHOLD, DecodeError, DetectionDecoder, DetectionSchema, REGION_SCORE_OFFSET,
  TABLE_ROW_WIDTH,
};
pub use self::labels::ClassNames;
pub use self::nms::{NMS_THRESHOLD, Suppressor};
pub use self::replay::{ReplayModel, ReplayModelBuilder, ReplayModelError};
