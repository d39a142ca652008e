// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib.rs - 球场标定
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

//! # 球场标定
//!
//! 通过交互式点选建立画面平面与球场示意图平面之间的对应关系，
//! 再由对应点估计单应矩阵，把画面中的位置投影到球场示意图上。
//!
//! 流程：
//! 1. [`CourtCalibrator`] 消费 [`UiEvent`] 事件流，依次采集球场点与画面点；
//! 2. 校验通过后得到不可变的 [`CorrespondenceSet`]；
//! 3. [`CourtProjector`] 用 RANSAC 估计单应矩阵并投影任意画面点。

mod correspondence;
mod homography;
mod projector;
mod session;
mod settings;

pub use self::correspondence::{
  CorrespondencePoint, CorrespondenceSet, MAX_IMAGE_POINTS, MIN_IMAGE_POINTS, Plane,
};
pub use self::homography::{
  Homography, HomographyError, RansacConfig, RansacResult, estimate_homography_dlt,
  fit_homography_ransac, reprojection_error,
};
pub use self::projector::{CourtPosition, CourtProjector, ProjectionError};
pub use self::session::{CalibrationError, CalibrationState, CourtCalibrator, UiEvent};
pub use self::settings::CameraSettings;

/// 二维点，像素坐标
pub type Point = nalgebra::Point2<f32>;
