// 该文件是 Lanchang （篮场） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::{BoundingBox, CONFIDENCE_THRESHOLD, DetectItem};

/// 默认 NMS IoU 阈值
pub const NMS_THRESHOLD: f32 = 0.4;

/// 贪心 IoU 非极大值抑制，不区分类别
#[derive(Debug, Clone, Copy)]
pub struct Suppressor {
  score_threshold: f32,
  iou_threshold: f32,
}

impl Default for Suppressor {
  fn default() -> Self {
    Self::new(CONFIDENCE_THRESHOLD, NMS_THRESHOLD)
  }
}

impl Suppressor {
  pub fn new(score_threshold: f32, iou_threshold: f32) -> Self {
    Self {
      score_threshold,
      iou_threshold,
    }
  }

  pub fn iou_threshold(&self) -> f32 {
    self.iou_threshold
  }

  /// 返回保留下来的框的下标，按置信度降序排列
  ///
  /// 置信度相同时保留先出现的框。
  pub fn suppress_indices(&self, boxes: &[BoundingBox], scores: &[f32]) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), scores.len());

    let mut order: Vec<usize> = (0..boxes.len().min(scores.len()))
      .filter(|&i| scores[i] > self.score_threshold)
      .collect();
    // sort_by 是稳定排序
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut kept: Vec<usize> = Vec::with_capacity(order.len());
    for index in order {
      let overlapped = kept
        .iter()
        .any(|&k| boxes[k].iou(&boxes[index]) > self.iou_threshold);
      if !overlapped {
        kept.push(index);
      }
    }
    kept
  }

  /// 对候选检测做抑制，返回保留的检测
  pub fn suppress(&self, candidates: Vec<DetectItem>) -> Vec<DetectItem> {
    let boxes: Vec<BoundingBox> = candidates.iter().map(|d| d.bbox).collect();
    let scores: Vec<f32> = candidates.iter().map(|d| d.score).collect();
    let kept = self.suppress_indices(&boxes, &scores);
    debug!("NMS: {} 个候选保留 {} 个", candidates.len(), kept.len());

    let mut slots: Vec<Option<DetectItem>> = candidates.into_iter().map(Some).collect();
    kept
      .into_iter()
      .filter_map(|index| slots[index].take())
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use rand::{Rng, SeedableRng};

  use super::*;

  fn item(class_id: usize, score: f32, left: i32, top: i32, size: i32) -> DetectItem {
    DetectItem {
      class_id,
      score,
      bbox: BoundingBox::new(left, top, size, size),
    }
  }

  fn random_candidates(seed: u64, n: usize) -> Vec<DetectItem> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    (0..n)
      .map(|_| {
        item(
          rng.gen_range(0..3),
          rng.gen_range(0.0..1.0),
          rng.gen_range(0..200),
          rng.gen_range(0..200),
          rng.gen_range(10..80),
        )
      })
      .collect()
  }

  #[test]
  fn overlapping_boxes_keep_the_most_confident() {
    let suppressor = Suppressor::default();
    let kept = suppressor.suppress(vec![
      item(0, 0.6, 0, 0, 100),
      item(0, 0.9, 5, 5, 100),
      item(1, 0.8, 300, 300, 50),
    ]);

    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].score, 0.9);
    assert_eq!(kept[1].score, 0.8);
  }

  #[test]
  fn suppression_ignores_class() {
    let suppressor = Suppressor::default();
    let kept = suppressor.suppress(vec![item(0, 0.9, 0, 0, 100), item(1, 0.8, 0, 0, 100)]);
    assert_eq!(kept, vec![item(0, 0.9, 0, 0, 100)]);
  }

  #[test]
  fn low_scores_are_filtered_first() {
    let suppressor = Suppressor::default();
    let kept = suppressor.suppress(vec![item(0, 0.5, 0, 0, 10), item(0, 0.2, 50, 50, 10)]);
    assert!(kept.is_empty());
  }

  #[test]
  fn equal_scores_keep_first_seen() {
    let suppressor = Suppressor::default();
    let boxes = [
      BoundingBox::new(0, 0, 50, 50),
      BoundingBox::new(2, 2, 50, 50),
      BoundingBox::new(4, 4, 50, 50),
    ];
    let scores = [0.7, 0.7, 0.7];
    assert_eq!(suppressor.suppress_indices(&boxes, &scores), vec![0]);

    let reversed = [boxes[2], boxes[1], boxes[0]];
    assert_eq!(suppressor.suppress_indices(&reversed, &scores), vec![0]);
  }

  #[test]
  fn overlap_exactly_at_threshold_is_kept() {
    // IoU = 40 / 100 = 0.4
    let suppressor = Suppressor::new(0.0, 0.4);
    let a = BoundingBox::new(0, 0, 10, 7);
    let b = BoundingBox::new(0, 3, 10, 7);
    assert!((a.iou(&b) - 0.4).abs() < 1e-6);
    assert_eq!(suppressor.suppress_indices(&[a, b], &[0.9, 0.8]), vec![0, 1]);
  }

  #[test]
  fn retained_pairs_stay_below_threshold() {
    let suppressor = Suppressor::default();
    for seed in 0..8 {
      let kept = suppressor.suppress(random_candidates(seed, 60));
      for (i, a) in kept.iter().enumerate() {
        for b in &kept[i + 1..] {
          assert!(a.bbox.iou(&b.bbox) <= NMS_THRESHOLD);
        }
      }
    }
  }

  #[test]
  fn suppression_is_idempotent() {
    let suppressor = Suppressor::default();
    for seed in 0..8 {
      let once = suppressor.suppress(random_candidates(seed, 60));
      let twice = suppressor.suppress(once.clone());
      assert_eq!(once, twice);
    }
  }
}
