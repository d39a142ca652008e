// 该文件是 Lanchang （篮场） 项目的一部分。
// src/channel.rs - 有界帧通道
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

//! # 帧通道
//!
//! 流水线各阶段之间的有界阻塞队列：
//! - `push` 在队列满时阻塞，为慢速消费者提供背压；
//! - `pop` 在队列空时阻塞，按先进先出顺序返回帧；
//! - [`Frame::EndOfStream`] 推送后，生产者不能再推送任何帧。

use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use thiserror::Error;
use tracing::debug;

use crate::frame::Frame;

/// 默认通道容量
pub const DEFAULT_CHANNEL_CAPACITY: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChannelError {
  #[error("通道对端已关闭")]
  Disconnected,
  #[error("流结束标记已发送，不能继续推送")]
  AlreadyEnded,
}

/// 创建容量为 `capacity` 的帧通道，容量至少为 1
pub fn frame_channel(capacity: usize) -> (FrameSender, FrameReceiver) {
  let (tx, rx) = sync_channel(capacity.max(1));
  (
    FrameSender {
      inner: tx,
      ended: false,
    },
    FrameReceiver { inner: rx },
  )
}

/// 通道的生产端
#[derive(Debug)]
pub struct FrameSender {
  inner: SyncSender<Frame>,
  ended: bool,
}

impl FrameSender {
  /// 推送一帧，队列满时阻塞
  pub fn push(&mut self, frame: Frame) -> Result<(), ChannelError> {
    if self.ended {
      return Err(ChannelError::AlreadyEnded);
    }
    let is_end = frame.is_end_of_stream();
    self
      .inner
      .send(frame)
      .map_err(|_| ChannelError::Disconnected)?;
    if is_end {
      debug!("已推送流结束标记");
      self.ended = true;
    }
    Ok(())
  }

  /// 推送流结束标记；已经结束时什么也不做
  pub fn finish(&mut self) -> Result<(), ChannelError> {
    if self.ended {
      return Ok(());
    }
    self.push(Frame::EndOfStream)
  }

  pub fn is_ended(&self) -> bool {
    self.ended
  }
}

/// 通道的消费端
#[derive(Debug)]
pub struct FrameReceiver {
  inner: Receiver<Frame>,
}

impl FrameReceiver {
  /// 取出最早推送的帧，队列空时阻塞
  pub fn pop(&self) -> Result<Frame, ChannelError> {
    self.inner.recv().map_err(|_| ChannelError::Disconnected)
  }
}
