// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib/session.rs - 交互式标定会话
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

use image::RgbImage;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  asset::{AssetLoadError, read_json},
  calib::{CorrespondenceSet, MAX_IMAGE_POINTS, MIN_IMAGE_POINTS, Plane, Point},
  output::Draw,
};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
  #[error("{plane}点数不足: 需要至少 {needed} 个，实际 {got} 个")]
  TooFewPoints {
    plane: Plane,
    got: usize,
    needed: usize,
  },
  #[error("球场点数 ({court}) 与画面点数 ({frame}) 不一致")]
  CountMismatch { court: usize, frame: usize },
  #[error("标定会话尚未开始")]
  NotStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
  Idle,
  CollectingCourtPoints,
  CollectingFramePoints,
  Calibrated,
  Failed,
}

/// 外部界面送来的输入事件
///
/// JSON 形式：`{"click": {"x": 10, "y": 20}}`、`"advance"`、`"cancel"`。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiEvent {
  Click { x: f32, y: f32 },
  /// 结束当前平面的点选
  Advance,
  /// 关闭窗口，同样结束当前平面
  Cancel,
}

impl UiEvent {
  /// 读取 JSON 数组形式的事件脚本
  pub fn load_script(path: &Path) -> Result<Vec<UiEvent>, AssetLoadError> {
    let events: Vec<UiEvent> = read_json(path)?;
    info!("读取了 {} 个标定事件: {}", events.len(), path.display());
    Ok(events)
  }
}

/// 标定会话状态机
///
/// 先在球场示意图上点选，再在画面上按相同顺序点选对应位置。
/// 会话持有两张工作图像，每次点击都会在对应图像上画出带序号的标记。
pub struct CourtCalibrator {
  state: CalibrationState,
  draw: Draw,
  court_points: Vec<Point>,
  frame_points: Vec<Point>,
  court_canvas: Option<RgbImage>,
  frame_canvas: Option<RgbImage>,
  correspondences: Option<CorrespondenceSet>,
  error: Option<CalibrationError>,
}

impl Default for CourtCalibrator {
  fn default() -> Self {
    Self::new(Draw::default())
  }
}

impl CourtCalibrator {
  pub fn new(draw: Draw) -> Self {
    Self {
      state: CalibrationState::Idle,
      draw,
      court_points: Vec::new(),
      frame_points: Vec::new(),
      court_canvas: None,
      frame_canvas: None,
      correspondences: None,
      error: None,
    }
  }

  pub fn state(&self) -> CalibrationState {
    self.state
  }

  /// 开始采集球场点，会话拷贝两张图像作为工作图像
  pub fn begin(&mut self, court: RgbImage, frame: RgbImage) {
    if self.state != CalibrationState::Idle {
      debug!("标定会话已开始，先重置");
      self.reset();
    }

    let mut court = court;
    self.draw.draw_prompt(
      &mut court,
      &format!("Click {}-{} court points", MIN_IMAGE_POINTS, MAX_IMAGE_POINTS),
    );
    self.court_canvas = Some(court);
    self.frame_canvas = Some(frame);
    self.state = CalibrationState::CollectingCourtPoints;
    info!("开始采集球场点");
  }

  /// 处理一个输入事件，返回处理后的状态
  pub fn handle(&mut self, event: UiEvent) -> CalibrationState {
    match (self.state, event) {
      (CalibrationState::CollectingCourtPoints, UiEvent::Click { x, y }) => {
        let point = Point::new(x, y);
        self.court_points.push(point);
        if let Some(canvas) = self.court_canvas.as_mut() {
          self.draw.mark_point(canvas, point, self.court_points.len());
        }
        debug!("球场点 {}: ({}, {})", self.court_points.len(), x, y);
        if self.court_points.len() >= MAX_IMAGE_POINTS {
          self.finish_court();
        }
      }
      (CalibrationState::CollectingFramePoints, UiEvent::Click { x, y }) => {
        let point = Point::new(x, y);
        self.frame_points.push(point);
        if let Some(canvas) = self.frame_canvas.as_mut() {
          self.draw.mark_point(canvas, point, self.frame_points.len());
        }
        debug!("画面点 {}: ({}, {})", self.frame_points.len(), x, y);
        if self.frame_points.len() >= MAX_IMAGE_POINTS {
          self.finish_frame();
        }
      }
      (CalibrationState::CollectingCourtPoints, UiEvent::Advance | UiEvent::Cancel) => {
        self.finish_court();
      }
      (CalibrationState::CollectingFramePoints, UiEvent::Advance | UiEvent::Cancel) => {
        self.finish_frame();
      }
      (state, event) => {
        debug!("忽略事件 {:?}，当前状态 {:?}", event, state);
      }
    }
    self.state
  }

  /// 用事件流驱动完整会话；事件耗尽等同于关闭窗口
  pub fn run(
    &mut self,
    court: RgbImage,
    frame: RgbImage,
    events: impl IntoIterator<Item = UiEvent>,
  ) -> Result<&CorrespondenceSet, CalibrationError> {
    self.begin(court, frame);
    for event in events {
      if matches!(
        self.handle(event),
        CalibrationState::Calibrated | CalibrationState::Failed
      ) {
        break;
      }
    }

    if self.state == CalibrationState::CollectingCourtPoints {
      self.finish_court();
    }
    if self.state == CalibrationState::CollectingFramePoints {
      self.finish_frame();
    }

    match (&self.correspondences, &self.error) {
      (Some(set), _) => Ok(set),
      (None, Some(e)) => Err(e.clone()),
      (None, None) => Err(CalibrationError::NotStarted),
    }
  }

  /// 标定成功后的对应点集合
  pub fn correspondences(&self) -> Option<&CorrespondenceSet> {
    self.correspondences.as_ref()
  }

  /// 标定失败的原因
  pub fn error(&self) -> Option<&CalibrationError> {
    self.error.as_ref()
  }

  pub fn court_points(&self) -> &[Point] {
    &self.court_points
  }

  pub fn frame_points(&self) -> &[Point] {
    &self.frame_points
  }

  pub fn court_canvas(&self) -> Option<&RgbImage> {
    self.court_canvas.as_ref()
  }

  pub fn frame_canvas(&self) -> Option<&RgbImage> {
    self.frame_canvas.as_ref()
  }

  /// 回到 Idle，丢弃已采集的点
  pub fn reset(&mut self) {
    self.state = CalibrationState::Idle;
    self.court_points.clear();
    self.frame_points.clear();
    self.court_canvas = None;
    self.frame_canvas = None;
    self.correspondences = None;
    self.error = None;
  }

  fn finish_court(&mut self) {
    info!("采集到 {} 个球场点，开始采集画面点", self.court_points.len());
    if let Some(canvas) = self.frame_canvas.as_mut() {
      self.draw.draw_prompt(
        canvas,
        &format!("Click {}-{} frame points", MIN_IMAGE_POINTS, MAX_IMAGE_POINTS),
      );
    }
    self.state = CalibrationState::CollectingFramePoints;
  }

  fn finish_frame(&mut self) {
    info!("采集到 {} 个画面点", self.frame_points.len());
    match CorrespondenceSet::new(&self.court_points, &self.frame_points) {
      Ok(set) => {
        info!("标定完成，共 {} 组对应点", set.len());
        self.correspondences = Some(set);
        self.state = CalibrationState::Calibrated;
      }
      Err(e) => {
        warn!("标定失败: {}", e);
        self.error = Some(e);
        self.state = CalibrationState::Failed;
      }
    }
  }
}
