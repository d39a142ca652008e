// 该文件是 Lanchang （篮场） 项目的一部分。
// src/args.rs - 项目参数配置
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

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use lanchang::{channel::DEFAULT_CHANNEL_CAPACITY, team::TeamClassifierKind};

/// Lanchang 项目参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出回放文件
  /// - replay:///path/to/outputs.jsonl
  #[arg(long, value_name = "MODEL")]
  pub model: Url,

  /// 输入来源
  /// - 单张图像: image:///path/to/frame.png
  /// - 图像序列: frames:///path/to/dir?fps=25
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,

  /// 输出路径
  /// - 图像文件: image:///path/to/out.png
  /// - 日期目录: folder:///path/to/dir?record=name&always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,

  /// 球场示意图
  #[arg(long, value_name = "FILE")]
  pub court: Option<PathBuf>,

  /// 标定事件脚本（JSON 数组），与 --court 一起使用
  #[arg(long, value_name = "FILE")]
  pub calibration: Option<PathBuf>,

  /// 类别名称列表，每行一个
  #[arg(long, value_name = "FILE")]
  pub classes: Option<PathBuf>,

  /// 相机参数（JSON）
  #[arg(long, value_name = "FILE")]
  pub settings: Option<PathBuf>,

  /// 标签字体（TTF/OTF），不提供时不绘制文字
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.4, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 帧通道容量
  #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY, value_name = "COUNT")]
  pub capacity: usize,

  /// 最大处理帧数，0 表示无限制
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,

  /// 球队分类器
  #[arg(long, value_enum, default_value_t = TeamClassifierKind::Dummy)]
  pub team_classifier: TeamClassifierKind,
}
