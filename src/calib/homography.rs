// 该文件是 Lanchang （篮场） 项目的一部分。
// src/calib/homography.rs - 单应矩阵估计
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

//! 单应矩阵估计：Hartley 归一化的 DLT，以及外层的 RANSAC。

use nalgebra::{DMatrix, Matrix3, SymmetricEigen, Vector3};
use rand::{SeedableRng, rngs::StdRng, seq::index::sample};
use thiserror::Error;
use tracing::debug;

use crate::calib::Point;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
  #[error("点数不足: 需要 {needed}, 实际 {got}")]
  TooFewPoints { needed: usize, got: usize },
  #[error("源点与目标点数量不同: {src} / {dst}")]
  LengthMismatch { src: usize, dst: usize },
  #[error("数值计算失败: {0}")]
  NumericalFailure(&'static str),
  #[error("内点不足: 需要 {needed}, 找到 {found}")]
  InsufficientInliers { needed: usize, found: usize },
}

/// 3x3 射影变换，满足 dst ~ H * src
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
  pub h: Matrix3<f64>,
}

impl Homography {
  pub fn new(h: Matrix3<f64>) -> Self {
    Self { h }
  }

  /// 投影一个点；落到无穷远处时返回 `None`
  pub fn apply(&self, p: Point) -> Option<Point> {
    let [x, y] = project(&self.h, p.x as f64, p.y as f64)?;
    Some(Point::new(x as f32, y as f32))
  }

  pub fn inverse(&self) -> Option<Self> {
    self.h.try_inverse().map(Self::new)
  }
}

fn project(h: &Matrix3<f64>, x: f64, y: f64) -> Option<[f64; 2]> {
  let p = h * Vector3::new(x, y, 1.0);
  if p[2].abs() < 1e-12 {
    return None;
  }
  Some([p[0] / p[2], p[1] / p[2]])
}

/// 重投影误差 ||H(src) - dst||，无法投影时为无穷大
pub fn reprojection_error(h: &Matrix3<f64>, src: &[f64; 2], dst: &[f64; 2]) -> f64 {
  match project(h, src[0], src[1]) {
    Some(p) => ((p[0] - dst[0]).powi(2) + (p[1] - dst[1]).powi(2)).sqrt(),
    None => f64::INFINITY,
  }
}

/// 平移到质心并缩放，使到原点的平均距离为 sqrt(2)
fn normalize_points(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
  let n = pts.len() as f64;
  let cx = pts.iter().map(|p| p[0]).sum::<f64>() / n;
  let cy = pts.iter().map(|p| p[1]).sum::<f64>() / n;

  let mean_dist = pts
    .iter()
    .map(|p| ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt())
    .sum::<f64>()
    / n;

  let s = if mean_dist > 1e-15 {
    std::f64::consts::SQRT_2 / mean_dist
  } else {
    1.0
  };

  let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
  let normalized = pts
    .iter()
    .map(|p| [s * (p[0] - cx), s * (p[1] - cy)])
    .collect();

  (t, normalized)
}

/// 由至少 4 组对应点用 DLT 估计 H，使 dst ≈ H(src)
pub fn estimate_homography_dlt(
  src: &[[f64; 2]],
  dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
  if src.len() != dst.len() {
    return Err(HomographyError::LengthMismatch {
      src: src.len(),
      dst: dst.len(),
    });
  }
  let n = src.len();
  if n < 4 {
    return Err(HomographyError::TooFewPoints { needed: 4, got: n });
  }

  let (t_src, src_n) = normalize_points(src);
  let (t_dst, dst_n) = normalize_points(dst);

  let mut a = DMatrix::<f64>::zeros(2 * n, 9);
  for i in 0..n {
    let (sx, sy) = (src_n[i][0], src_n[i][1]);
    let (dx, dy) = (dst_n[i][0], dst_n[i][1]);

    // [  0   0   0 | -sx -sy -1 |  dy*sx  dy*sy  dy ]
    a[(2 * i, 3)] = -sx;
    a[(2 * i, 4)] = -sy;
    a[(2 * i, 5)] = -1.0;
    a[(2 * i, 6)] = dy * sx;
    a[(2 * i, 7)] = dy * sy;
    a[(2 * i, 8)] = dy;

    // [ sx  sy   1 |   0   0  0 | -dx*sx -dx*sy -dx ]
    a[(2 * i + 1, 0)] = sx;
    a[(2 * i + 1, 1)] = sy;
    a[(2 * i + 1, 2)] = 1.0;
    a[(2 * i + 1, 6)] = -dx * sx;
    a[(2 * i + 1, 7)] = -dx * sy;
    a[(2 * i + 1, 8)] = -dx;
  }

  // A^T A 最小特征值对应的特征向量即为解，n = 4 时也是 9x9
  let ata = a.transpose() * &a;
  let eig = SymmetricEigen::new(ata);
  let min_idx = eig
    .eigenvalues
    .iter()
    .enumerate()
    .min_by(|(_, a), (_, b)| a.abs().total_cmp(&b.abs()))
    .map(|(i, _)| i)
    .ok_or(HomographyError::NumericalFailure("特征分解为空"))?;
  let v = eig.eigenvectors.column(min_idx);
  let h_norm = Matrix3::new(v[0], v[1], v[2], v[3], v[4], v[5], v[6], v[7], v[8]);

  let t_dst_inv = t_dst
    .try_inverse()
    .ok_or(HomographyError::NumericalFailure("归一化矩阵不可逆"))?;
  let h = t_dst_inv * h_norm * t_src;

  let scale = h[(2, 2)];
  if !h.iter().all(|v| v.is_finite()) {
    return Err(HomographyError::NumericalFailure("结果包含非有限值"));
  }
  if scale.abs() < 1e-15 {
    Ok(h)
  } else {
    Ok(h / scale)
  }
}

/// RANSAC 参数
#[derive(Debug, Clone)]
pub struct RansacConfig {
  /// 最大迭代次数
  pub max_iters: usize,
  /// 内点阈值（重投影误差，像素）
  pub inlier_threshold: f64,
  /// 有效模型至少需要的内点数
  pub min_inliers: usize,
  /// 随机种子
  pub seed: u64,
}

impl Default for RansacConfig {
  fn default() -> Self {
    Self {
      max_iters: 2000,
      inlier_threshold: 3.0,
      min_inliers: 4,
      seed: 0,
    }
  }
}

#[derive(Debug, Clone)]
pub struct RansacResult {
  pub homography: Homography,
  pub inlier_mask: Vec<bool>,
  pub n_inliers: usize,
}

/// RANSAC 拟合：随机取 4 组点求解，保留内点最多的模型，最后用全部内点重新拟合
pub fn fit_homography_ransac(
  src: &[[f64; 2]],
  dst: &[[f64; 2]],
  config: &RansacConfig,
) -> Result<RansacResult, HomographyError> {
  if src.len() != dst.len() {
    return Err(HomographyError::LengthMismatch {
      src: src.len(),
      dst: dst.len(),
    });
  }
  let n = src.len();
  if n < 4 {
    return Err(HomographyError::TooFewPoints { needed: 4, got: n });
  }

  let mut rng = StdRng::seed_from_u64(config.seed);
  let mut best_inliers = 0usize;
  let mut best_mask = vec![false; n];
  let mut best_h: Option<Matrix3<f64>> = None;

  for _ in 0..config.max_iters {
    let indices = sample(&mut rng, n, 4);
    let s4: Vec<[f64; 2]> = indices.iter().map(|i| src[i]).collect();
    let d4: Vec<[f64; 2]> = indices.iter().map(|i| dst[i]).collect();

    let Ok(h) = estimate_homography_dlt(&s4, &d4) else {
      continue;
    };

    let mask: Vec<bool> = src
      .iter()
      .zip(dst)
      .map(|(s, d)| reprojection_error(&h, s, d) < config.inlier_threshold)
      .collect();
    let count = mask.iter().filter(|&&m| m).count();

    if count > best_inliers {
      best_inliers = count;
      best_mask = mask;
      best_h = Some(h);

      // 超过 90% 为内点时提前结束
      if count * 10 > n * 9 {
        break;
      }
    }
  }

  let best_h = match best_h {
    Some(h) if best_inliers >= config.min_inliers => h,
    _ => {
      return Err(HomographyError::InsufficientInliers {
        needed: config.min_inliers,
        found: best_inliers,
      });
    }
  };

  let inlier_src: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
  let inlier_dst: Vec<[f64; 2]> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();
  let h = estimate_homography_dlt(&inlier_src, &inlier_dst).unwrap_or(best_h);

  let inlier_mask: Vec<bool> = src
    .iter()
    .zip(dst)
    .map(|(s, d)| reprojection_error(&h, s, d) < config.inlier_threshold)
    .collect();
  let n_inliers = inlier_mask.iter().filter(|&&m| m).count();
  debug!("RANSAC: {} 组对应点中 {} 个内点", n, n_inliers);

  Ok(RansacResult {
    homography: Homography::new(h),
    inlier_mask,
    n_inliers,
  })
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use rand::Rng;

  use super::*;

  fn make_test_homography() -> Matrix3<f64> {
    Matrix3::new(
      0.9, 0.12, 35.0, //
      -0.04, 1.3, 20.0, //
      0.0004, 0.0011, 1.0,
    )
  }

  fn apply(h: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    project(h, p[0], p[1]).unwrap()
  }

  #[test]
  fn dlt_exact_four_points() {
    let h_true = make_test_homography();
    let src = [[0.0, 0.0], [400.0, 0.0], [400.0, 300.0], [0.0, 300.0]];
    let dst: Vec<[f64; 2]> = src.iter().map(|&s| apply(&h_true, s)).collect();

    let h = estimate_homography_dlt(&src, &dst).unwrap();
    for (s, d) in src.iter().zip(&dst) {
      assert!(reprojection_error(&h, s, d) < 1e-6);
    }
  }

  #[test]
  fn dlt_overdetermined_grid() {
    let h_true = make_test_homography();
    let src: Vec<[f64; 2]> = (0..16)
      .map(|i| [(i % 4) as f64 * 90.0, (i / 4) as f64 * 70.0])
      .collect();
    let dst: Vec<[f64; 2]> = src.iter().map(|&s| apply(&h_true, s)).collect();

    let h = estimate_homography_dlt(&src, &dst).unwrap();
    let probe = apply(&h, [123.0, 45.0]);
    let expected = apply(&h_true, [123.0, 45.0]);
    assert_relative_eq!(probe[0], expected[0], epsilon = 1e-6);
    assert_relative_eq!(probe[1], expected[1], epsilon = 1e-6);
  }

  #[test]
  fn ransac_rejects_outliers() {
    let h_true = make_test_homography();
    let mut rng = StdRng::seed_from_u64(7);

    let mut src = Vec::new();
    let mut dst = Vec::new();
    for i in 0..12 {
      let s = [(i % 4) as f64 * 100.0, (i / 4) as f64 * 100.0];
      let d = apply(&h_true, s);
      src.push(s);
      dst.push([d[0] + rng.gen_range(-0.3..0.3), d[1] + rng.gen_range(-0.3..0.3)]);
    }
    // 3 个错误点击
    for _ in 0..3 {
      src.push([rng.gen_range(0.0..300.0), rng.gen_range(0.0..200.0)]);
      dst.push([rng.gen_range(0.0..1280.0), rng.gen_range(0.0..720.0)]);
    }

    let result = fit_homography_ransac(&src, &dst, &RansacConfig::default()).unwrap();
    assert!(result.n_inliers >= 12, "only {} inliers", result.n_inliers);
    for i in 0..12 {
      assert!(result.inlier_mask[i]);
      assert!(reprojection_error(&result.homography.h, &src[i], &dst[i]) < 3.0);
    }
  }

  #[test]
  fn too_few_points_fail() {
    let pts = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]];
    assert_eq!(
      estimate_homography_dlt(&pts, &pts),
      Err(HomographyError::TooFewPoints { needed: 4, got: 3 })
    );
    assert!(fit_homography_ransac(&pts, &pts, &RansacConfig::default()).is_err());
  }

  #[test]
  fn inverse_round_trips_points() {
    let h = Homography::new(make_test_homography());
    let inv = h.inverse().unwrap();
    let p = Point::new(50.0, 75.0);
    let back = inv.apply(h.apply(p).unwrap()).unwrap();
    assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
    assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
  }
}
