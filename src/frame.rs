// 该文件是 Lanchang （篮场） 项目的一部分。
// src/frame.rs - 帧定义
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

use image::RgbImage;

use crate::model::DetectResult;

/// 视频帧数据
#[derive(Debug, Clone)]
pub struct VideoFrame {
  /// RGB 图像数据
  pub image: RgbImage,
  /// 帧索引
  pub index: u64,
  /// 时间戳（毫秒）
  pub timestamp_ms: u64,
  /// 检测阶段写入的检测结果，检测前为空
  pub detections: DetectResult,
}

impl VideoFrame {
  pub fn new(image: RgbImage, index: u64, timestamp_ms: u64) -> Self {
    Self {
      image,
      index,
      timestamp_ms,
      detections: DetectResult::default(),
    }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// 流水线中传递的帧：普通数据或流结束标记
#[derive(Debug, Clone)]
pub enum Frame {
  Payload(VideoFrame),
  EndOfStream,
}

impl Frame {
  pub fn is_end_of_stream(&self) -> bool {
    matches!(self, Frame::EndOfStream)
  }

  pub fn into_payload(self) -> Option<VideoFrame> {
    match self {
      Frame::Payload(frame) => Some(frame),
      Frame::EndOfStream => None,
    }
  }
}

impl From<VideoFrame> for Frame {
  fn from(frame: VideoFrame) -> Self {
    Frame::Payload(frame)
  }
}
