// 该文件是 Lanchang （篮场） 项目的一部分。
// src/team.rs - 球队颜色分类
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

use clap::ValueEnum;
use image::{Rgb, RgbImage};
use thiserror::Error;
use tracing::info;

use crate::model::BoundingBox;

/// 未分类目标在球场示意图上的颜色
pub const DEFAULT_TEAM_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TeamClassifierError {
  #[error("球队分类器尚未实现: {0:?}")]
  Unimplemented(TeamClassifierKind),
}

/// 根据画面中的目标区域判断其所属球队，返回在球场示意图上使用的颜色
pub trait TeamClassifier {
  fn classify(&self, image: &RgbImage, bbox: &BoundingBox) -> Rgb<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TeamClassifierKind {
  /// 所有目标使用同一种颜色
  Dummy,
  /// 按球衣颜色分类
  TeamClassifier,
}

pub fn create_team_classifier(
  kind: TeamClassifierKind,
) -> Result<Box<dyn TeamClassifier + Send>, TeamClassifierError> {
  info!("球队分类器: {:?}", kind);
  match kind {
    TeamClassifierKind::Dummy => Ok(Box::new(DummyTeamClassifier::default())),
    TeamClassifierKind::TeamClassifier => Err(TeamClassifierError::Unimplemented(kind)),
  }
}

#[derive(Debug, Clone)]
pub struct DummyTeamClassifier {
  color: Rgb<u8>,
}

impl Default for DummyTeamClassifier {
  fn default() -> Self {
    Self {
      color: DEFAULT_TEAM_COLOR,
    }
  }
}

impl DummyTeamClassifier {
  pub fn with_color(color: Rgb<u8>) -> Self {
    Self { color }
  }
}

impl TeamClassifier for DummyTeamClassifier {
  fn classify(&self, _image: &RgbImage, _bbox: &BoundingBox) -> Rgb<u8> {
    self.color
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dummy_classifier_uses_fixed_color() {
    let classifier = create_team_classifier(TeamClassifierKind::Dummy).unwrap();
    let image = RgbImage::new(8, 8);
    assert_eq!(
      classifier.classify(&image, &BoundingBox::new(0, 0, 4, 4)),
      DEFAULT_TEAM_COLOR
    );
  }

  #[test]
  fn real_classifier_is_not_available() {
    assert_eq!(
      create_team_classifier(TeamClassifierKind::TeamClassifier).err(),
      Some(TeamClassifierError::Unimplemented(
        TeamClassifierKind::TeamClassifier
      ))
    );
  }
}
