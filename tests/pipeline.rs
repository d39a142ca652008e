// 该文件是 Lanchang （篮场） 项目的一部分。
// tests/pipeline.rs - 流水线集成测试
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

use std::sync::{Arc, Mutex};
use std::thread;

use image::RgbImage;

use lanchang::{
  calib::{CorrespondenceSet, CourtProjector, Point},
  channel::{FrameSender, frame_channel},
  frame::{Frame, VideoFrame},
  model::{
    ClassNames, DetectionDecoder, DetectionSchema, Model, RawOutput, RawTensor, ReplayModel,
    Suppressor,
  },
  output::{CourtView, Render},
  task::{CancellationToken, PipelineTask, Stage, Task, run_stage},
};

#[derive(Debug, Clone, PartialEq)]
enum Seen {
  Frame(u64),
  End,
}

struct Recorder {
  name: &'static str,
  seen: Arc<Mutex<Vec<Seen>>>,
}

impl Stage for Recorder {
  fn name(&self) -> &str {
    self.name
  }

  fn process(&mut self, frame: VideoFrame) -> Option<VideoFrame> {
    self.seen.lock().unwrap().push(Seen::Frame(frame.index));
    Some(frame)
  }

  fn end_of_stream(&mut self) {
    self.seen.lock().unwrap().push(Seen::End);
  }
}

fn frame(index: u64) -> VideoFrame {
  VideoFrame::new(RgbImage::new(4, 4), index, index * 40)
}

fn feed(mut tx: FrameSender, frames: Vec<Frame>) {
  for frame in frames {
    tx.push(frame).unwrap();
  }
}

#[test]
fn end_of_stream_propagates_through_three_stages() {
  let token = CancellationToken::new();
  let logs: Vec<Arc<Mutex<Vec<Seen>>>> = (0..3).map(|_| Arc::default()).collect();

  let (source, rx1) = frame_channel(1);
  let (tx1, rx2) = frame_channel(1);
  let (tx2, rx3) = frame_channel(1);
  let (tx3, sink) = frame_channel(1);

  let mut stages: Vec<Recorder> = ["first", "second", "third"]
    .into_iter()
    .zip(&logs)
    .map(|(name, seen)| Recorder {
      name,
      seen: Arc::clone(seen),
    })
    .collect();
  let mut third = stages.pop().unwrap();
  let mut second = stages.pop().unwrap();
  let mut first = stages.pop().unwrap();

  let tail: Vec<Frame> = thread::scope(|s| {
    s.spawn(|| feed(source, vec![frame(1).into(), frame(2).into(), Frame::EndOfStream]));
    let a = s.spawn(|| run_stage(&mut first, rx1, Some(tx1), &token));
    let b = s.spawn(|| run_stage(&mut second, rx2, Some(tx2), &token));
    let c = s.spawn(|| run_stage(&mut third, rx3, Some(tx3), &token));

    let mut tail = Vec::new();
    loop {
      let frame = sink.pop().unwrap();
      let end = frame.is_end_of_stream();
      tail.push(frame);
      if end {
        break;
      }
    }

    assert_eq!(a.join().unwrap(), Ok(2));
    assert_eq!(b.join().unwrap(), Ok(2));
    assert_eq!(c.join().unwrap(), Ok(2));
    tail
  });

  for log in &logs {
    assert_eq!(
      *log.lock().unwrap(),
      vec![Seen::Frame(1), Seen::Frame(2), Seen::End]
    );
  }
  assert_eq!(tail.len(), 3);
  assert!(tail[2].is_end_of_stream());
}

#[derive(Clone, Default)]
struct Collect {
  frames: Arc<Mutex<Vec<(u64, usize, usize)>>>,
}

impl Render<VideoFrame, CourtView> for Collect {
  type Error = std::convert::Infallible;

  fn render_result(&self, frame: &VideoFrame, result: &CourtView) -> Result<(), Self::Error> {
    self
      .frames
      .lock()
      .unwrap()
      .push((frame.index, frame.detections.len(), result.positions.len()));
    Ok(())
  }
}

#[test]
fn replayed_detections_reach_the_court_view() {
  // 第 0 帧两个重叠框，第 1 帧一个低置信度框，第 2 帧没有记录
  let replay = r#"{"format": "Region"}
{"frame": 0, "tensors": [{"rows": 2, "cols": 7, "data": [0.5, 0.5, 0.2, 0.2, 1.0, 0.1, 0.9, 0.51, 0.5, 0.2, 0.2, 1.0, 0.1, 0.8]}]}
{"frame": 1, "tensors": [{"rows": 1, "cols": 7, "data": [0.3, 0.3, 0.1, 0.1, 1.0, 0.2, 0.4]}]}
"#;
  let model = ReplayModel::parse(replay).unwrap();
  let decoder = DetectionDecoder::new(DetectionSchema::Region);

  let frame_points = [
    Point::new(0.0, 0.0),
    Point::new(300.0, 0.0),
    Point::new(300.0, 300.0),
    Point::new(0.0, 300.0),
  ];
  let court_points = [
    Point::new(0.0, 0.0),
    Point::new(100.0, 0.0),
    Point::new(100.0, 50.0),
    Point::new(0.0, 50.0),
  ];
  let set = CorrespondenceSet::new(&court_points, &frame_points).unwrap();
  let projector = CourtProjector::new(&set).unwrap();

  let output = Collect::default();
  let frames = (0..3).map(|i| Ok::<_, String>(VideoFrame::new(RgbImage::new(300, 300), i, i * 40)));

  PipelineTask::new(decoder)
    .with_capacity(1)
    .with_suppressor(Suppressor::default())
    .with_court(projector, RgbImage::new(100, 50))
    .run_task(frames, model, output.clone())
    .unwrap();

  let rendered = output.frames.lock().unwrap().clone();
  assert_eq!(rendered, vec![(0, 1, 1), (1, 0, 0), (2, 0, 0)]);
}

/// 按帧索引给出不同输出的模型：1 推理失败，2 张量列数不足，3 类别越界
struct Faulty;

impl Model for Faulty {
  type Error = String;

  fn schema(&self) -> DetectionSchema {
    DetectionSchema::Region
  }

  fn infer(&self, input: &VideoFrame) -> Result<RawOutput, Self::Error> {
    let tensor = match input.index {
      1 => return Err("设备忙".to_string()),
      2 => RawTensor::new(1, 3, vec![0.5, 0.5, 0.2]),
      3 => RawTensor::new(
        1,
        11,
        vec![0.5, 0.5, 0.2, 0.2, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.9],
      ),
      _ => RawTensor::new(1, 7, vec![0.5, 0.5, 0.2, 0.2, 1.0, 0.9, 0.1]),
    };
    Ok(RawOutput {
      tensors: vec![tensor.map_err(|e| e.to_string())?],
    })
  }
}

#[test]
fn failed_frames_are_dropped_and_pipeline_continues() {
  let output = Collect::default();
  let frames =
    (0..5).map(|i| Ok::<_, String>(VideoFrame::new(RgbImage::new(300, 300), i, i * 40)));
  let names = ClassNames::new(vec!["player".to_string(), "ball".to_string()]);

  let result = PipelineTask::new(DetectionDecoder::new(DetectionSchema::Region))
    .with_capacity(1)
    .with_class_names(names)
    .run_task(frames, Faulty, output.clone());
  assert!(result.is_ok());

  let rendered = output.frames.lock().unwrap().clone();
  assert_eq!(rendered, vec![(0, 1, 0), (4, 1, 0)]);
}
