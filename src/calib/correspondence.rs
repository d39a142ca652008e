// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib/correspondence.rs - 对应点集合
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

use std::fmt;

use serde::Serialize;

use crate::calib::{CalibrationError, Point};

/// 每个平面至少需要的点数
pub const MIN_IMAGE_POINTS: usize = 4;
/// 每个平面最多采集的点数
pub const MAX_IMAGE_POINTS: usize = 15;

/// 点所在的平面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
  Court,
  Frame,
}

impl fmt::Display for Plane {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Plane::Court => write!(f, "球场"),
      Plane::Frame => write!(f, "画面"),
    }
  }
}

/// 同一物理位置在画面与球场示意图上的坐标
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrespondencePoint {
  #[serde(serialize_with = "serialize_point")]
  pub frame: Point,
  #[serde(serialize_with = "serialize_point")]
  pub court: Point,
}

fn serialize_point<S: serde::Serializer>(p: &Point, serializer: S) -> Result<S::Ok, S::Error> {
  [p.x, p.y].serialize(serializer)
}

/// 经过校验的对应点集合，构建后不可修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrespondenceSet {
  points: Box<[CorrespondencePoint]>,
}

impl CorrespondenceSet {
  /// 按采集顺序配对；任一平面少于 4 个点或两平面点数不同都会失败
  pub fn new(court: &[Point], frame: &[Point]) -> Result<Self, CalibrationError> {
    for (plane, got) in [(Plane::Court, court.len()), (Plane::Frame, frame.len())] {
      if got < MIN_IMAGE_POINTS {
        return Err(CalibrationError::TooFewPoints {
          plane,
          got,
          needed: MIN_IMAGE_POINTS,
        });
      }
    }
    if court.len() != frame.len() {
      return Err(CalibrationError::CountMismatch {
        court: court.len(),
        frame: frame.len(),
      });
    }

    let points = frame
      .iter()
      .zip(court)
      .map(|(&frame, &court)| CorrespondencePoint { frame, court })
      .collect();
    Ok(Self { points })
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn points(&self) -> &[CorrespondencePoint] {
    &self.points
  }

  pub fn frame_points(&self) -> impl Iterator<Item = Point> + '_ {
    self.points.iter().map(|p| p.frame)
  }

  pub fn court_points(&self) -> impl Iterator<Item = Point> + '_ {
    self.points.iter().map(|p| p.court)
  }
}
