// 该文件是 Lanchang （篮场） 项目的一部分。
// src/input/image_sequence.rs - 图像序列输入
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

use std::path::{Path, PathBuf};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::VideoFrame};

/// 默认帧率
pub const DEFAULT_FPS: f64 = 25.0;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Error, Debug)]
pub enum ImageSequenceError {
  #[error("URI 方案不匹配")]
  SchemaMismatch,
  #[error("帧率参数无效: {0}")]
  InvalidFps(String),
  #[error("无法读取目录 {path}: {source}")]
  ReadDir {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },
  #[error("目录中没有图像: {0}")]
  Empty(PathBuf),
  #[error("无法读取帧 {path}: {source}")]
  Frame {
    path: PathBuf,
    #[source]
    source: image::ImageError,
  },
}

/// 按文件名顺序读取目录中的图像，每个文件一帧
///
/// `frames:///path/to/dir?fps=25`
pub struct ImageSequenceInput {
  files: std::vec::IntoIter<PathBuf>,
  fps: f64,
  index: u64,
}

impl FromUrlWithScheme for ImageSequenceInput {
  const SCHEME: &'static str = "frames";
}

impl FromUrl for ImageSequenceInput {
  type Error = ImageSequenceError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(ImageSequenceError::SchemaMismatch);
    }

    let fps = match url.query_pairs().find(|(k, _)| k == "fps") {
      Some((_, v)) => v
        .parse::<f64>()
        .ok()
        .filter(|fps| *fps > 0.0 && fps.is_finite())
        .ok_or_else(|| ImageSequenceError::InvalidFps(v.to_string()))?,
      None => DEFAULT_FPS,
    };

    Self::open(Path::new(url.path()), fps)
  }
}

impl ImageSequenceInput {
  pub fn open(directory: &Path, fps: f64) -> Result<Self, ImageSequenceError> {
    let read_dir_error = |source| ImageSequenceError::ReadDir {
      path: directory.to_path_buf(),
      source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(directory).map_err(read_dir_error)? {
      let path = entry.map_err(read_dir_error)?.path();
      let is_image = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
      if is_image {
        files.push(path);
      }
    }
    if files.is_empty() {
      return Err(ImageSequenceError::Empty(directory.to_path_buf()));
    }
    files.sort();
    info!("图像序列 {}: {} 帧, {} fps", directory.display(), files.len(), fps);

    Ok(Self {
      files: files.into_iter(),
      fps,
      index: 0,
    })
  }

  pub fn fps(&self) -> f64 {
    self.fps
  }
}

impl Iterator for ImageSequenceInput {
  type Item = Result<VideoFrame, ImageSequenceError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    let index = self.index;
    self.index += 1;
    let timestamp_ms = (index as f64 * 1000.0 / self.fps) as u64;

    debug!("读取第 {} 帧: {}", index, path.display());
    let image = ImageReader::open(&path)
      .map_err(image::ImageError::IoError)
      .and_then(|reader| reader.decode());
    Some(match image {
      Ok(image) => Ok(VideoFrame::new(image.to_rgb8(), index, timestamp_ms)),
      Err(source) => Err(ImageSequenceError::Frame { path, source }),
    })
  }
}
