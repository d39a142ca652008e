// 该文件是 Lanchang （篮场） 项目的一部分。
// src/bin/calibrate.rs - 球场标定工具
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

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use lanchang::{
  FromUrl,
  asset::load_rgb_image,
  calib::{CourtCalibrator, CourtProjector, UiEvent},
  input::InputWrapper,
  output::Draw,
};

/// 用事件脚本完成一次球场标定，导出对应点和标记后的图像
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 球场示意图
  #[arg(long, value_name = "FILE")]
  pub court: PathBuf,
  /// 画面来源，使用第一帧
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 标定事件脚本（JSON 数组）
  #[arg(long, value_name = "FILE")]
  pub events: PathBuf,
  /// 导出目录
  #[arg(long, value_name = "DIR")]
  pub output: PathBuf,
  /// 标记序号字体
  #[arg(long, value_name = "FILE")]
  pub font: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("球场示意图: {}", args.court.display());
  info!("画面来源: {}", args.input);
  info!("事件脚本: {}", args.events.display());

  let court = load_rgb_image(&args.court).context("无法加载球场示意图")?;
  let frame = InputWrapper::from_url(&args.input)?
    .next()
    .ok_or_else(|| anyhow!("没有输入帧"))??;
  let events = UiEvent::load_script(&args.events)?;

  let mut calibrator = CourtCalibrator::new(Draw::with_font_file(args.font.as_deref()));
  let result = calibrator.run(court, frame.image, events).cloned();

  std::fs::create_dir_all(&args.output)?;
  if let Some(canvas) = calibrator.court_canvas() {
    canvas.save(args.output.join("court-points.png"))?;
  }
  if let Some(canvas) = calibrator.frame_canvas() {
    canvas.save(args.output.join("frame-points.png"))?;
  }

  let set = result.context("球场标定失败")?;
  let path = args.output.join("correspondences.json");
  std::fs::write(&path, serde_json::to_string_pretty(&set)?)?;
  info!("导出 {} 组对应点到 {}", set.len(), path.display());

  let projector = CourtProjector::new(&set)?;
  for (index, point) in set.points().iter().enumerate() {
    let projected = projector.project(point.frame)?;
    let error = (projected - point.court).norm();
    if error > 3.0 {
      warn!("第 {} 组对应点重投影误差 {:.2} 像素", index + 1, error);
    } else {
      info!("第 {} 组对应点重投影误差 {:.2} 像素", index + 1, error);
    }
  }

  Ok(())
}
