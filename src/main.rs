// 该文件是 Lanchang （篮场） 项目的一部分。
// src/main.rs - 篮球比赛检测流水线
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

mod args;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{info, warn};

use lanchang::{
  FromUrl,
  asset::load_rgb_image,
  calib::{CameraSettings, CourtCalibrator, CourtProjector, UiEvent},
  input::{InputError, InputWrapper},
  model::{ClassNames, DetectionDecoder, Model, ReplayModelBuilder, Suppressor},
  output::{Draw, OutputWrapper},
  task::{CancellationToken, PipelineTask, Task},
  team::create_team_classifier,
};

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = args::Args::parse();

  info!("模型输出: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("置信度阈值: {}", args.confidence);
  info!("NMS 阈值: {}", args.nms_threshold);

  let names = args
    .classes
    .as_deref()
    .map(ClassNames::load_or_empty)
    .unwrap_or_default();
  let settings = args
    .settings
    .as_deref()
    .map(CameraSettings::load_or_default)
    .unwrap_or_default();
  if !settings.is_empty() {
    info!("相机参数已加载，不参与投影");
  }
  let draw = Draw::with_font_file(args.font.as_deref());

  let model = ReplayModelBuilder::from_url(&args.model)?.build()?;
  let decoder = DetectionDecoder::new(model.schema()).with_confidence_threshold(args.confidence);
  let suppressor = Suppressor::new(args.confidence, args.nms_threshold);

  let mut input = InputWrapper::from_url(&args.input)?;
  let first = input.next().ok_or_else(|| anyhow!("没有输入帧"))??;
  let output = OutputWrapper::from_url(&args.output)?.with_class_names(names.clone());
  let team = create_team_classifier(args.team_classifier)?;

  let token = CancellationToken::new();
  token.install_ctrlc_handler()?;

  let mut task = PipelineTask::new(decoder)
    .with_capacity(args.capacity)
    .with_frame_number((args.frame_number > 0).then_some(args.frame_number))
    .with_token(token)
    .with_suppressor(suppressor)
    .with_class_names(names)
    .with_draw(draw.clone())
    .with_team_classifier(team);

  match (&args.court, &args.calibration) {
    (Some(court_path), Some(events_path)) => {
      let court = load_rgb_image(court_path).context("无法加载球场示意图")?;
      let events = UiEvent::load_script(events_path)?;

      info!("使用第一帧进行标定");
      let mut calibrator = CourtCalibrator::new(draw);
      calibrator
        .run(court.clone(), first.image.clone(), events)
        .context("球场标定失败")?;
      let projector = CourtProjector::from_calibrator(&calibrator)?;
      task = task.with_court(projector, court);
    }
    (Some(_), None) => warn!("未提供标定事件脚本，跳过球场投影"),
    (None, Some(_)) => warn!("未提供球场示意图，忽略标定事件脚本"),
    (None, None) => {}
  }

  let frames = std::iter::once(Ok::<_, InputError>(first)).chain(input);
  task.run_task(frames, model, output)
}
