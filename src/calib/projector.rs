// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib/projector.rs - 画面到球场示意图的投影
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

use thiserror::Error;
use tracing::{info, warn};

use crate::{
  calib::{
    CorrespondenceSet, CourtCalibrator, Homography, HomographyError, Point, RansacConfig,
    fit_homography_ransac,
  },
  model::{BoundingBox, DetectResult},
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
  #[error("尚未完成标定")]
  Uncalibrated,
  #[error("单应矩阵估计失败: {0}")]
  Homography(#[from] HomographyError),
  #[error("点 ({x}, {y}) 投影到无穷远处")]
  PointAtInfinity { x: f32, y: f32 },
}

/// 检测目标在画面与球场示意图上的位置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourtPosition {
  pub class_id: usize,
  /// 目标在画面中的检测框
  pub bbox: BoundingBox,
  pub frame: Point,
  pub court: Point,
}

/// 持有由对应点估计出的单应矩阵；对应点集合不可变，矩阵只估计一次
#[derive(Debug, Clone)]
pub struct CourtProjector {
  homography: Homography,
  inliers: usize,
}

impl CourtProjector {
  pub fn new(set: &CorrespondenceSet) -> Result<Self, ProjectionError> {
    Self::with_config(set, &RansacConfig::default())
  }

  pub fn with_config(
    set: &CorrespondenceSet,
    config: &RansacConfig,
  ) -> Result<Self, ProjectionError> {
    let src: Vec<[f64; 2]> = set
      .frame_points()
      .map(|p| [p.x as f64, p.y as f64])
      .collect();
    let dst: Vec<[f64; 2]> = set
      .court_points()
      .map(|p| [p.x as f64, p.y as f64])
      .collect();

    let result = fit_homography_ransac(&src, &dst, config)?;
    if result.n_inliers < set.len() {
      warn!(
        "{} 组对应点中有 {} 组被视为误点击",
        set.len(),
        set.len() - result.n_inliers
      );
    }
    info!("单应矩阵估计完成，内点 {}/{}", result.n_inliers, set.len());

    Ok(Self {
      homography: result.homography,
      inliers: result.n_inliers,
    })
  }

  /// 仅在标定成功后可用
  pub fn from_calibrator(calibrator: &CourtCalibrator) -> Result<Self, ProjectionError> {
    let set = calibrator
      .correspondences()
      .ok_or(ProjectionError::Uncalibrated)?;
    Self::new(set)
  }

  pub fn homography(&self) -> &Homography {
    &self.homography
  }

  pub fn inliers(&self) -> usize {
    self.inliers
  }

  pub fn project(&self, p: Point) -> Result<Point, ProjectionError> {
    self
      .homography
      .apply(p)
      .ok_or(ProjectionError::PointAtInfinity { x: p.x, y: p.y })
  }

  /// 投影每个检测框的底边中点；无法投影的目标被跳过
  pub fn project_detections(&self, detections: &DetectResult) -> Vec<CourtPosition> {
    detections
      .iter()
      .filter_map(|item| {
        let (x, y) = item.bbox.foot_point();
        let frame = Point::new(x, y);
        match self.project(frame) {
          Ok(court) => Some(CourtPosition {
            class_id: item.class_id,
            bbox: item.bbox,
            frame,
            court,
          }),
          Err(e) => {
            warn!("跳过目标: {}", e);
            None
          }
        }
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;

  use super::*;
  use crate::calib::UiEvent;
  use crate::model::DetectItem;

  fn square_set() -> CorrespondenceSet {
    let frame = [
      Point::new(100.0, 200.0),
      Point::new(500.0, 180.0),
      Point::new(620.0, 460.0),
      Point::new(40.0, 470.0),
    ];
    let court = [
      Point::new(0.0, 0.0),
      Point::new(280.0, 0.0),
      Point::new(280.0, 150.0),
      Point::new(0.0, 150.0),
    ];
    CorrespondenceSet::new(&court, &frame).unwrap()
  }

  #[test]
  fn exact_correspondences_project_onto_court_points() {
    let set = square_set();
    let projector = CourtProjector::new(&set).unwrap();
    for point in set.points() {
      let court = projector.project(point.frame).unwrap();
      assert_relative_eq!(court.x, point.court.x, epsilon = 1e-3);
      assert_relative_eq!(court.y, point.court.y, epsilon = 1e-3);
    }
    assert_eq!(projector.inliers(), 4);
  }

  #[test]
  fn projection_before_calibration_fails() {
    let calibrator = CourtCalibrator::default();
    assert_eq!(
      CourtProjector::from_calibrator(&calibrator).unwrap_err(),
      ProjectionError::Uncalibrated
    );
  }

  #[test]
  fn calibrated_session_yields_projector() {
    let set = square_set();
    let mut events = Vec::new();
    for p in set.court_points() {
      events.push(UiEvent::Click { x: p.x, y: p.y });
    }
    events.push(UiEvent::Advance);
    for p in set.frame_points() {
      events.push(UiEvent::Click { x: p.x, y: p.y });
    }
    events.push(UiEvent::Advance);

    let mut calibrator = CourtCalibrator::default();
    calibrator
      .run(
        image::RgbImage::new(300, 160),
        image::RgbImage::new(640, 480),
        events,
      )
      .unwrap();
    assert!(CourtProjector::from_calibrator(&calibrator).is_ok());
  }

  #[test]
  fn detections_project_from_foot_point() {
    let projector = CourtProjector::new(&square_set()).unwrap();
    // 底边中点 (100, 200) 即第一个对应点
    let detections: DetectResult = vec![DetectItem {
      class_id: 1,
      score: 0.9,
      bbox: BoundingBox::new(80, 150, 40, 50),
    }]
    .into();
    let positions = projector.project_detections(&detections);
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].class_id, 1);
    assert_relative_eq!(positions[0].court.x, 0.0, epsilon = 1e-3);
    assert_relative_eq!(positions[0].court.y, 0.0, epsilon = 1e-3);
  }
}
