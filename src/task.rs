// 该文件是 Lanchang （篮场） 项目的一部分。
// src/task.rs - 流水线任务
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

//! # 流水线任务
//!
//! 采集、检测、显示三个阶段各占一个线程，阶段之间通过有界帧通道连接。
//! 每个阶段在处理完一帧后检查一次取消标记；收到流结束标记或被取消时，
//! 向下游推送流结束标记后退出。

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use image::RgbImage;
use tracing::{debug, error, info, warn};

use crate::{
  calib::CourtProjector,
  channel::{ChannelError, DEFAULT_CHANNEL_CAPACITY, FrameReceiver, FrameSender, frame_channel},
  frame::{Frame, VideoFrame},
  model::{ClassNames, DetectionDecoder, Model, Suppressor},
  output::{CourtView, Draw, Render},
  team::{DummyTeamClassifier, TeamClassifier},
};

/// 收到中断信号后强制退出前的等待时间
pub const FORCE_EXIT_TIMEOUT: Duration = Duration::from_secs(30);

pub trait Task<I, M, O>: Sized {
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error>;
}

/// 协作式取消标记，克隆后共享同一个状态
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.cancelled.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancelled.load(Ordering::SeqCst)
  }

  /// Ctrl-C 时设置取消标记，超时仍未退出则强制结束进程
  pub fn install_ctrlc_handler(&self) -> Result<(), ctrlc::Error> {
    let token = self.clone();
    ctrlc::set_handler(move || {
      info!("收到中断信号，准备退出...");
      token.cancel();
      thread::spawn(|| {
        thread::sleep(FORCE_EXIT_TIMEOUT);
        warn!("强制退出程序");
        std::process::exit(1);
      });
    })
  }
}

/// 流水线中的一个处理阶段
pub trait Stage {
  fn name(&self) -> &str;

  /// 处理一帧；返回 `None` 表示该帧不再向下游传递
  fn process(&mut self, frame: VideoFrame) -> Option<VideoFrame>;

  /// 收到流结束标记时调用
  fn end_of_stream(&mut self) {}
}

/// 阶段主循环，返回处理的帧数
///
/// 上游断开视为流结束；下游断开时返回错误。无论哪种情况都会尝试向下游推送流结束标记。
pub fn run_stage<S: Stage>(
  stage: &mut S,
  upstream: FrameReceiver,
  mut downstream: Option<FrameSender>,
  token: &CancellationToken,
) -> Result<usize, ChannelError> {
  let mut processed = 0;
  let result = loop {
    match upstream.pop() {
      Ok(Frame::Payload(frame)) => {
        processed += 1;
        if let Some(frame) = stage.process(frame)
          && let Some(tx) = downstream.as_mut()
          && let Err(e) = tx.push(frame.into())
        {
          break Err(e);
        }
      }
      Ok(Frame::EndOfStream) => {
        debug!("{} 阶段收到流结束标记", stage.name());
        break Ok(processed);
      }
      Err(ChannelError::Disconnected) => {
        warn!("{} 阶段的上游已断开", stage.name());
        break Ok(processed);
      }
      Err(e) => break Err(e),
    }

    if token.is_cancelled() {
      warn!("{} 阶段收到取消信号，退出", stage.name());
      break Ok(processed);
    }
  };

  stage.end_of_stream();
  if let Some(tx) = downstream.as_mut()
    && let Err(e) = tx.finish()
  {
    debug!("{} 阶段无法推送流结束标记: {}", stage.name(), e);
  }
  info!("{} 阶段结束，共处理 {} 帧", stage.name(), processed);
  result
}

/// 采集阶段：把输入帧推入通道，结束时推送流结束标记
pub fn capture<I, E>(
  input: I,
  mut downstream: FrameSender,
  token: &CancellationToken,
  frame_number: Option<usize>,
) -> Result<usize, ChannelError>
where
  I: Iterator<Item = Result<VideoFrame, E>>,
  E: Display,
{
  let mut captured = 0;
  let mut result = Ok(());
  for frame in input {
    match frame {
      Ok(frame) => {
        if let Err(e) = downstream.push(frame.into()) {
          result = Err(e);
          break;
        }
        captured += 1;
      }
      Err(e) => warn!("跳过无法读取的帧: {}", e),
    }

    if frame_number.map(|n| captured >= n).unwrap_or(false) {
      info!("达到指定帧数 {}, 停止采集", captured);
      break;
    }
    if token.is_cancelled() {
      warn!("采集阶段收到取消信号，退出");
      break;
    }
  }

  if let Err(e) = downstream.finish() {
    debug!("采集阶段无法推送流结束标记: {}", e);
  }
  info!("采集阶段结束，共采集 {} 帧", captured);
  result.map(|_| captured)
}

/// 检测阶段：推理、解码、非极大值抑制，并在帧上画出检测框
pub struct DetectStage<M> {
  model: M,
  decoder: DetectionDecoder,
  suppressor: Suppressor,
  names: ClassNames,
  draw: Draw,
}

impl<M: Model> DetectStage<M> {
  pub fn new(
    model: M,
    decoder: DetectionDecoder,
    suppressor: Suppressor,
    names: ClassNames,
    draw: Draw,
  ) -> Self {
    Self {
      model,
      decoder,
      suppressor,
      names,
      draw,
    }
  }
}

impl<M> Stage for DetectStage<M>
where
  M: Model,
  M::Error: Display,
{
  fn name(&self) -> &str {
    "检测"
  }

  fn process(&mut self, mut frame: VideoFrame) -> Option<VideoFrame> {
    let now = Instant::now();
    let raw = match self.model.infer(&frame) {
      Ok(raw) => raw,
      Err(e) => {
        warn!("第 {} 帧推理失败，丢弃: {}", frame.index, e);
        return None;
      }
    };
    let infer_elapsed = now.elapsed();

    let candidates = match self.decoder.decode(&raw, frame.width(), frame.height()) {
      Ok(candidates) => candidates,
      Err(e) => {
        warn!("第 {} 帧输出解码失败，丢弃: {}", frame.index, e);
        return None;
      }
    };
    let found = candidates.len();
    frame.detections = self.suppressor.suppress(candidates).into();

    if let Err(e) = self
      .draw
      .draw_detections(&mut frame.image, &frame.detections, &self.names)
    {
      warn!("第 {} 帧绘制失败，丢弃: {}", frame.index, e);
      return None;
    }

    info!(
      "第 {} 帧: 推理耗时 {:.2?}, 总耗时 {:.2?}, 候选 {} 个, 保留 {} 个",
      frame.index,
      infer_elapsed,
      now.elapsed(),
      found,
      frame.detections.len()
    );
    Some(frame)
  }
}

/// 显示阶段：把检测结果投影到球场示意图上并交给输出
pub struct DisplayStage<O> {
  output: O,
  projector: Option<CourtProjector>,
  court: Option<RgbImage>,
  draw: Draw,
  team: Box<dyn TeamClassifier + Send>,
}

impl<O> DisplayStage<O> {
  pub fn new(output: O) -> Self {
    Self {
      output,
      projector: None,
      court: None,
      draw: Draw::default(),
      team: Box::new(DummyTeamClassifier::default()),
    }
  }

  pub fn with_court(mut self, projector: CourtProjector, court: RgbImage) -> Self {
    self.projector = Some(projector);
    self.court = Some(court);
    self
  }

  pub fn with_team_classifier(mut self, team: Box<dyn TeamClassifier + Send>) -> Self {
    self.team = team;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  fn court_view(&self, frame: &VideoFrame) -> CourtView {
    let (Some(projector), Some(court)) = (&self.projector, &self.court) else {
      return CourtView::default();
    };

    let positions = projector.project_detections(&frame.detections);
    let mut image = court.clone();
    for position in &positions {
      let color = self.team.classify(&frame.image, &position.bbox);
      self.draw.draw_court_position(&mut image, position, color);
    }
    CourtView {
      image: Some(image),
      positions,
    }
  }
}

impl<O> Stage for DisplayStage<O>
where
  O: Render<VideoFrame, CourtView>,
  O::Error: Display,
{
  fn name(&self) -> &str {
    "显示"
  }

  fn process(&mut self, frame: VideoFrame) -> Option<VideoFrame> {
    let view = self.court_view(&frame);
    if let Err(e) = self.output.render_result(&frame, &view) {
      warn!("第 {} 帧输出失败: {}", frame.index, e);
    }
    None
  }
}

/// 三阶段流水线任务
pub struct PipelineTask {
  capacity: usize,
  frame_number: Option<usize>,
  token: CancellationToken,
  decoder: DetectionDecoder,
  suppressor: Suppressor,
  names: ClassNames,
  draw: Draw,
  projector: Option<CourtProjector>,
  court: Option<RgbImage>,
  team: Box<dyn TeamClassifier + Send>,
}

impl PipelineTask {
  pub fn new(decoder: DetectionDecoder) -> Self {
    Self {
      capacity: DEFAULT_CHANNEL_CAPACITY,
      frame_number: None,
      token: CancellationToken::new(),
      decoder,
      suppressor: Suppressor::default(),
      names: ClassNames::default(),
      draw: Draw::default(),
      projector: None,
      court: None,
      team: Box::new(DummyTeamClassifier::default()),
    }
  }

  pub fn with_capacity(mut self, capacity: usize) -> Self {
    self.capacity = capacity;
    self
  }

  pub fn with_frame_number(mut self, frame_number: Option<usize>) -> Self {
    self.frame_number = frame_number;
    self
  }

  pub fn with_token(mut self, token: CancellationToken) -> Self {
    self.token = token;
    self
  }

  pub fn with_suppressor(mut self, suppressor: Suppressor) -> Self {
    self.suppressor = suppressor;
    self
  }

  pub fn with_class_names(mut self, names: ClassNames) -> Self {
    self.names = names;
    self
  }

  pub fn with_draw(mut self, draw: Draw) -> Self {
    self.draw = draw;
    self
  }

  pub fn with_court(mut self, projector: CourtProjector, court: RgbImage) -> Self {
    self.projector = Some(projector);
    self.court = Some(court);
    self
  }

  pub fn with_team_classifier(mut self, team: Box<dyn TeamClassifier + Send>) -> Self {
    self.team = team;
    self
  }

  pub fn token(&self) -> &CancellationToken {
    &self.token
  }
}

impl<I, E, M, O> Task<I, M, O> for PipelineTask
where
  I: Iterator<Item = Result<VideoFrame, E>> + Send,
  E: Display,
  M: Model + Send,
  M::Error: Display,
  O: Render<VideoFrame, CourtView> + Send,
  O::Error: Display,
{
  type Error = anyhow::Error;

  fn run_task(self, input: I, model: M, output: O) -> Result<(), Self::Error> {
    info!("开始任务，通道容量 {}", self.capacity);
    let token = &self.token;

    let mut detect = DetectStage::new(
      model,
      self.decoder,
      self.suppressor,
      self.names,
      self.draw.clone(),
    );
    let mut display = DisplayStage::new(output)
      .with_draw(self.draw)
      .with_team_classifier(self.team);
    if let (Some(projector), Some(court)) = (self.projector, self.court) {
      display = display.with_court(projector, court);
    }

    let (capture_tx, detect_rx) = frame_channel(self.capacity);
    let (detect_tx, display_rx) = frame_channel(self.capacity);

    let results = thread::scope(|s| {
      let frame_number = self.frame_number;
      let capture_handle = s.spawn(move || capture(input, capture_tx, token, frame_number));
      let detect_handle =
        s.spawn(move || run_stage(&mut detect, detect_rx, Some(detect_tx), token));
      let display_handle = s.spawn(move || run_stage(&mut display, display_rx, None, token));
      [
        ("采集", capture_handle.join()),
        ("检测", detect_handle.join()),
        ("显示", display_handle.join()),
      ]
    });

    for (name, result) in results {
      match result {
        Ok(Ok(count)) => debug!("{} 阶段处理了 {} 帧", name, count),
        Ok(Err(e)) if token.is_cancelled() => debug!("{} 阶段在取消后退出: {}", name, e),
        Ok(Err(e)) => return Err(anyhow!("{} 阶段通道错误: {}", name, e)),
        Err(_) => {
          error!("{} 阶段线程崩溃", name);
          return Err(anyhow!("{} 阶段线程崩溃", name));
        }
      }
    }

    info!("任务完成，退出");
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use std::sync::mpsc;

  use super::*;

  struct Forward;

  impl Stage for Forward {
    fn name(&self) -> &str {
      "forward"
    }

    fn process(&mut self, frame: VideoFrame) -> Option<VideoFrame> {
      Some(frame)
    }
  }

  fn frames(n: u64) -> impl Iterator<Item = Result<VideoFrame, String>> {
    (0..n).map(|i| Ok(VideoFrame::new(RgbImage::new(2, 2), i, i * 40)))
  }

  #[test]
  fn capture_stops_at_frame_number() {
    let (tx, rx) = frame_channel(16);
    let token = CancellationToken::new();
    assert_eq!(capture(frames(10), tx, &token, Some(3)), Ok(3));

    let mut seen = 0;
    while let Ok(Frame::Payload(_)) = rx.pop() {
      seen += 1;
    }
    assert_eq!(seen, 3);
  }

  #[test]
  fn capture_skips_unreadable_frames() {
    let (tx, rx) = frame_channel(16);
    let input = vec![
      Ok(VideoFrame::new(RgbImage::new(2, 2), 0, 0)),
      Err("坏帧".to_string()),
      Ok(VideoFrame::new(RgbImage::new(2, 2), 2, 80)),
    ];
    assert_eq!(
      capture(input.into_iter(), tx, &CancellationToken::new(), None),
      Ok(2)
    );
    assert!(matches!(rx.pop(), Ok(Frame::Payload(f)) if f.index == 0));
    assert!(matches!(rx.pop(), Ok(Frame::Payload(f)) if f.index == 2));
    assert!(matches!(rx.pop(), Ok(Frame::EndOfStream)));
  }

  #[test]
  fn cancelled_stage_forwards_end_of_stream() {
    let (mut tx, rx) = frame_channel(4);
    let (down_tx, down_rx) = frame_channel(4);
    let token = CancellationToken::new();
    token.cancel();

    tx.push(VideoFrame::new(RgbImage::new(2, 2), 0, 0).into())
      .unwrap();
    tx.push(VideoFrame::new(RgbImage::new(2, 2), 1, 40).into())
      .unwrap();

    // 处理完第一帧后检查取消标记
    assert_eq!(run_stage(&mut Forward, rx, Some(down_tx), &token), Ok(1));
    assert!(matches!(down_rx.pop(), Ok(Frame::Payload(f)) if f.index == 0));
    assert!(matches!(down_rx.pop(), Ok(Frame::EndOfStream)));
  }

  #[test]
  fn vanished_upstream_ends_stage() {
    let (tx, rx) = frame_channel(1);
    let (down_tx, down_rx) = frame_channel(1);
    drop(tx);
    assert_eq!(
      run_stage(&mut Forward, rx, Some(down_tx), &CancellationToken::new()),
      Ok(0)
    );
    assert!(matches!(down_rx.pop(), Ok(Frame::EndOfStream)));
  }

  struct Collect {
    output: mpsc::Sender<u64>,
  }

  impl Render<VideoFrame, CourtView> for Collect {
    type Error = String;

    fn render_result(&self, frame: &VideoFrame, _result: &CourtView) -> Result<(), Self::Error> {
      self.output.send(frame.index).map_err(|e| e.to_string())
    }
  }

  #[test]
  fn display_stage_consumes_frames() {
    let (output, rx) = mpsc::channel();
    let mut stage = DisplayStage::new(Collect { output });
    assert!(
      stage
        .process(VideoFrame::new(RgbImage::new(2, 2), 5, 200))
        .is_none()
    );
    assert_eq!(rx.recv(), Ok(5));
  }
}
