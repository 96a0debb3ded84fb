use super::{EvalError, FeatureStats};
use crate::checkpoint::write_atomic;
use crate::gan::{ImageShape, sample_latents};
use crate::tensor::Tensor;
use crate::utils::{RngStream, derive_rng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CachedStats {
    num_images: usize,
    image_shape: ImageShape,
    stats: FeatureStats,
}

/// 真实图像的特征统计：首次使用时计算，同时缓存在内存与磁盘
pub struct FidCache {
    path: PathBuf,
    cached: Option<CachedStats>,
}

impl FidCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            cached: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 取参考统计。内存或磁盘中有相同(图像数, 图像形状)的缓存时直接返回，否则调用`compute`
    pub fn reference<F>(
        &mut self,
        num_images: usize,
        image_shape: ImageShape,
        compute: F,
    ) -> Result<&FeatureStats, EvalError>
    where
        F: FnOnce() -> Result<FeatureStats, EvalError>,
    {
        let matches = |c: &CachedStats| c.num_images == num_images && c.image_shape == image_shape;
        let cached = match self.cached.take() {
            Some(cached) if matches(&cached) => cached,
            _ => match self.read_disk().filter(|c| matches(c)) {
                Some(cached) => {
                    debug!(path = %self.path.display(), "从磁盘读取 FID 参考统计");
                    cached
                }
                None => {
                    let cached = CachedStats {
                        num_images,
                        image_shape,
                        stats: compute()?,
                    };
                    if let Err(e) = self.write_disk(&cached) {
                        warn!(error = %e, path = %self.path.display(), "FID 参考统计写入磁盘失败");
                    }
                    cached
                }
            },
        };
        Ok(&self.cached.insert(cached).stats)
    }

    /// 丢弃内存与磁盘中的缓存
    pub fn invalidate(&mut self) -> Result<(), EvalError> {
        self.cached = None;
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn read_disk(&self) -> Option<CachedStats> {
        let bytes = fs::read(&self.path).ok()?;
        bincode::deserialize(&bytes).ok()
    }

    fn write_disk(&self, cached: &CachedStats) -> Result<(), EvalError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, &bincode::serialize(cached)?)?;
        Ok(())
    }
}

/// 固定噪声批次：同一种子下每次评估都用同一批噪声，便于对比训练进展
pub struct FixedLatentCache {
    seed: u64,
    latents: Option<Tensor>,
}

impl FixedLatentCache {
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            latents: None,
        }
    }

    /// 首次调用时生成，之后（形状不变的前提下）一直返回同一批
    pub fn get(&mut self, count: usize, latent_dim: usize) -> &Tensor {
        let latents = match self.latents.take() {
            Some(latents) if latents.shape() == [count, latent_dim] => latents,
            _ => {
                let mut rng = derive_rng(self.seed, RngStream::FixedLatent, 0, 0, 0);
                sample_latents(count, latent_dim, &mut rng)
            }
        };
        self.latents.insert(latents)
    }

    pub fn invalidate(&mut self) {
        self.latents = None;
    }
}
