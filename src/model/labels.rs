// 该文件是 Lanchang （篮场） 项目的一部分。
// src/model/labels.rs - 类别名称列表
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

use tracing::{info, warn};

use crate::{
  asset::{AssetLoadError, read_bytes},
  model::DecodeError,
};

/// 类别名称，第 i 行对应类别 i
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames {
  names: Vec<String>,
}

impl ClassNames {
  pub fn new(names: Vec<String>) -> Self {
    Self { names }
  }

  /// 从文本文件加载，每行一个类别名称
  pub fn load(path: &Path) -> Result<Self, AssetLoadError> {
    let data = read_bytes(path)?;
    let names: Vec<String> = String::from_utf8_lossy(&data)
      .lines()
      .map(|line| line.trim_end_matches('\r').to_string())
      .collect();
    info!("加载了 {} 个类别名称: {}", names.len(), path.display());
    Ok(Self { names })
  }

  /// 加载失败时退化为空列表，标签只显示置信度
  pub fn load_or_empty(path: &Path) -> Self {
    match Self::load(path) {
      Ok(names) => names,
      Err(e) => {
        warn!("类别名称加载失败，将不显示类别名称: {}", e);
        Self::default()
      }
    }
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  /// 类别名称；列表为空时返回 `None`，下标越界时报错
  pub fn name(&self, class_id: usize) -> Result<Option<&str>, DecodeError> {
    if self.names.is_empty() {
      return Ok(None);
    }
    self
      .names
      .get(class_id)
      .map(|name| Some(name.as_str()))
      .ok_or(DecodeError::ClassIndexOutOfRange {
        class_id,
        count: self.names.len(),
      })
  }

  /// 形如 `ball:0.87` 的标签；没有类别名称时只有置信度
  pub fn label(&self, class_id: usize, score: f32) -> Result<String, DecodeError> {
    Ok(match self.name(class_id)? {
      Some(name) => format!("{}:{:.2}", name, score),
      None => format!("{:.2}", score),
    })
  }
}
