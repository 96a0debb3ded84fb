/*
 * @Date         : 2026-03-15
 * @Description  : 特征提取与 Frechet 距离
 */

use super::EvalError;
use crate::tensor::Tensor;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// 把图像批次[N, C, H, W]映射为特征[N, D]
pub trait FeatureExtractor {
    fn extract(&self, images: &Tensor) -> Result<Tensor, EvalError>;
}

/// 内置的轻量特征：每个通道在`grid x grid`网格上的平均值，外加每个通道的标准差
#[derive(Debug, Clone, Copy)]
pub struct PooledStatsExtractor {
    grid: usize,
}

impl PooledStatsExtractor {
    pub fn new(grid: usize) -> Self {
        Self { grid: grid.max(1) }
    }
}

impl Default for PooledStatsExtractor {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FeatureExtractor for PooledStatsExtractor {
    fn extract(&self, images: &Tensor) -> Result<Tensor, EvalError> {
        let &[n, c, h, w] = images.shape() else {
            return Err(crate::errors::TensorError::IncompatibleShape.into());
        };
        let grid = self.grid.min(h).min(w);
        let dim = c * (grid * grid + 1);
        let data = images.data();
        let mut features = Vec::with_capacity(n * dim);
        for i in 0..n {
            for ch in 0..c {
                for gy in 0..grid {
                    for gx in 0..grid {
                        let (y0, y1) = (gy * h / grid, (gy + 1) * h / grid);
                        let (x0, x1) = (gx * w / grid, (gx + 1) * w / grid);
                        let mut sum = 0.0;
                        for y in y0..y1 {
                            for x in x0..x1 {
                                sum += data[[i, ch, y, x]];
                            }
                        }
                        features.push(sum / ((y1 - y0) * (x1 - x0)) as f32);
                    }
                }
                let count = (h * w) as f32;
                let mean = (0..h)
                    .flat_map(|y| (0..w).map(move |x| (y, x)))
                    .map(|(y, x)| data[[i, ch, y, x]])
                    .sum::<f32>()
                    / count;
                let var = (0..h)
                    .flat_map(|y| (0..w).map(move |x| (y, x)))
                    .map(|(y, x)| (data[[i, ch, y, x]] - mean).powi(2))
                    .sum::<f32>()
                    / count;
                features.push(var.sqrt());
            }
        }
        Ok(Tensor::new(&features, &[n, dim]))
    }
}

/// 特征的均值与协方差
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub mean: Array1<f64>,
    pub cov: Array2<f64>,
}

impl FeatureStats {
    /// 由特征矩阵[N, D]估计，协方差为无偏估计（除以 N-1）
    pub fn from_features(features: &Tensor) -> Result<Self, EvalError> {
        let &[n, d] = features.shape() else {
            return Err(crate::errors::TensorError::IncompatibleShape.into());
        };
        if n < 2 {
            return Err(EvalError::NotEnoughSamples { need: 2, got: n });
        }
        let x = Array2::from_shape_fn((n, d), |(i, j)| f64::from(features.data()[[i, j]]));
        let mean = x.sum_axis(ndarray::Axis(0)) / n as f64;
        let centered = &x - &mean;
        let cov = centered.t().dot(&centered) / (n - 1) as f64;
        Ok(Self { mean, cov })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }
}

/// |μ1−μ2|² + tr(Σ1) + tr(Σ2) − 2·tr((Σ1^½ Σ2 Σ1^½)^½)
pub fn frechet_distance(a: &FeatureStats, b: &FeatureStats) -> Result<f64, EvalError> {
    if a.dim() != b.dim() {
        return Err(EvalError::DimensionMismatch(a.dim(), b.dim()));
    }
    let diff = &a.mean - &b.mean;
    let sqrt_a = sqrt_psd(&a.cov);
    let inner = sqrt_a.dot(&b.cov).dot(&sqrt_a);
    let inner = (&inner + &inner.t()) * 0.5;
    let (eigenvalues, _) = symmetric_eigen(&inner);
    let trace_sqrt: f64 = eigenvalues.iter().map(|&l| l.max(0.0).sqrt()).sum();
    let distance = diff.dot(&diff) + a.cov.diag().sum() + b.cov.diag().sum() - 2.0 * trace_sqrt;
    // 舍入误差可能让结果略小于0
    Ok(distance.max(0.0))
}

/// 对称半正定矩阵的平方根
pub(crate) fn sqrt_psd(m: &Array2<f64>) -> Array2<f64> {
    let (values, vectors) = symmetric_eigen(m);
    let roots = values.mapv(|l| l.max(0.0).sqrt());
    let scaled = &vectors * &roots;
    scaled.dot(&vectors.t())
}

/// 循环 Jacobi 法求对称矩阵的特征值与特征向量（按列存放）
pub(crate) fn symmetric_eigen(m: &Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    const MAX_SWEEPS: usize = 100;
    let n = m.nrows();
    let mut a = m.clone();
    let mut v = Array2::<f64>::eye(n);
    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| (p + 1..n).map(move |q| (p, q)))
            .map(|(p, q)| a[[p, q]].powi(2))
            .sum();
        if off < 1e-22 {
            break;
        }
        for p in 0..n {
            for q in p + 1..n {
                let apq = a[[p, q]];
                if apq.abs() < 1e-300 {
                    continue;
                }
                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let t = if theta == 0.0 { 1.0 } else { t };
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;
                for k in 0..n {
                    let (akp, akq) = (a[[k, p]], a[[k, q]]);
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[[p, k]], a[[q, k]]);
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let (vkp, vkq) = (v[[k, p]], v[[k, q]]);
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }
    (a.diag().to_owned(), v)
}
