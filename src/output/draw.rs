// 该文件是 Lanchang （篮场） 项目的一部分。
// src/output/draw.rs - 检测结果与标定标记的绘制
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
  draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_hollow_rect_mut,
  draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use tracing::warn;

use crate::{
  asset::load_font,
  calib::{CourtPosition, Point},
  model::{ClassNames, DecodeError, DetectResult},
};

const LABEL_FONT_SIZE: f32 = 16.0;
const PALETTE_SIZE: usize = 80;
const MARKER_RADIUS: i32 = 5;
const COURT_MARKER_RADIUS: i32 = 3;
const MARKER_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const MARKER_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const PROMPT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// 绘图工具
///
/// 字体由使用者提供；没有字体时只画框和标记，不画文字。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_scale: PxScale,
  colors: Vec<Rgb<u8>>,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(None)
  }
}

impl Draw {
  pub fn new(font: Option<FontArc>) -> Self {
    let colors = (0..PALETTE_SIZE)
      .map(|i| hsv_to_rgb((i as f32 / PALETTE_SIZE as f32) * 360.0, 0.8, 0.9))
      .collect();

    Self {
      font,
      font_scale: PxScale::from(LABEL_FONT_SIZE),
      colors,
    }
  }

  /// 从 TTF 文件加载字体，失败时退化为无文字绘制
  pub fn with_font_file(path: Option<&Path>) -> Self {
    let font = path.and_then(|path| match load_font(path) {
      Ok(font) => Some(font),
      Err(e) => {
        warn!("字体加载失败，将不绘制文字: {}", e);
        None
      }
    });
    Self::new(font)
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  pub fn class_color(&self, class_id: usize) -> Rgb<u8> {
    self.colors[class_id % self.colors.len()]
  }

  /// 画出全部检测框与 `名称:置信度` 标签，框超出画面的部分被裁剪
  pub fn draw_detections(
    &self,
    image: &mut RgbImage,
    result: &DetectResult,
    names: &ClassNames,
  ) -> Result<(), DecodeError> {
    let (width, height) = image.dimensions();
    for item in result.iter() {
      let label = names.label(item.class_id, item.score)?;
      let Some(bbox) = item.bbox.clip(width, height) else {
        continue;
      };
      let color = self.class_color(item.class_id);

      let rect = Rect::at(bbox.left, bbox.top).of_size(bbox.width as u32, bbox.height as u32);
      draw_hollow_rect_mut(image, rect, color);
      if bbox.width > 2 && bbox.height > 2 {
        let inner = Rect::at(bbox.left + 1, bbox.top + 1)
          .of_size(bbox.width as u32 - 2, bbox.height as u32 - 2);
        draw_hollow_rect_mut(image, inner, color);
      }

      if let Some(font) = &self.font {
        let (text_w, text_h) = text_size(self.font_scale, font, &label);
        // 标签在框上方，靠近画面顶部时压到框内
        let label_y = (bbox.top - text_h as i32).max(0);
        let label_w = text_w.min(width.saturating_sub(bbox.left as u32));
        if label_w > 0 && text_h > 0 {
          let background = Rect::at(bbox.left, label_y).of_size(label_w, text_h);
          draw_filled_rect_mut(image, background, color);
          draw_text_mut(
            image,
            LABEL_TEXT_COLOR,
            bbox.left,
            label_y,
            self.font_scale,
            font,
            &label,
          );
        }
      }
    }
    Ok(())
  }

  /// 标定点标记：绿色圆点和黑色序号
  pub fn mark_point(&self, image: &mut RgbImage, point: Point, number: usize) {
    let center = (point.x as i32, point.y as i32);
    draw_filled_circle_mut(image, center, MARKER_RADIUS, MARKER_COLOR);
    draw_hollow_circle_mut(image, center, MARKER_RADIUS, MARKER_TEXT_COLOR);

    if let Some(font) = &self.font {
      draw_text_mut(
        image,
        MARKER_TEXT_COLOR,
        center.0 + MARKER_RADIUS + 2,
        center.1 - MARKER_RADIUS,
        self.font_scale,
        font,
        &number.to_string(),
      );
    }
  }

  /// 左上角提示文字
  pub fn draw_prompt(&self, image: &mut RgbImage, text: &str) {
    if let Some(font) = &self.font {
      draw_text_mut(image, PROMPT_COLOR, 8, 8, self.font_scale, font, text);
    }
  }

  /// 在球场示意图上画出投影位置
  pub fn draw_court_position(
    &self,
    image: &mut RgbImage,
    position: &CourtPosition,
    color: Rgb<u8>,
  ) {
    let center = (position.court.x as i32, position.court.y as i32);
    draw_filled_circle_mut(image, center, COURT_MARKER_RADIUS, color);
  }
}

/// HSV 转 RGB
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb<u8> {
  let c = v * s;
  let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
  let m = v - c;

  let (r, g, b) = match h {
    h if h < 60.0 => (c, x, 0.0),
    h if h < 120.0 => (x, c, 0.0),
    h if h < 180.0 => (0.0, c, x),
    h if h < 240.0 => (0.0, x, c),
    h if h < 300.0 => (x, 0.0, c),
    _ => (c, 0.0, x),
  };

  Rgb([
    ((r + m) * 255.0) as u8,
    ((g + m) * 255.0) as u8,
    ((b + m) * 255.0) as u8,
  ])
}
