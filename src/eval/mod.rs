/*
 * @Date         : 2026-03-15
 * @Description  : 评估：FID、样例网格、潜变量插值动画、跨检查点的进度图
 *
 * 评估只在 rank 0 上进行，失败以`EvalError`返回，由训练循环记录后继续训练。
 * 输出目录为`{results_dir}/{name}`。
 */

mod cache;
mod error;
mod features;
mod render;

pub use cache::{FidCache, FixedLatentCache};
pub use error::EvalError;
pub use features::{FeatureExtractor, FeatureStats, PooledStatsExtractor, frechet_distance};
pub use render::{save_augmentation_preview, save_gif, save_grid, slerp};

use crate::data::BatchSource;
use crate::gan::{Generator, sample_latents};
use crate::tensor::Tensor;
use crate::train::RunConfig;
use crate::utils::{RngStream, derive_rng};
use rand::rngs::StdRng;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

const FID_SCORES_FILE: &str = "fid_scores.txt";
const FID_CACHE_FILE: &str = "fid_reference.bin";
const PROGRESS_DIR: &str = "progress";

/// 用哪个生成器出图：在线参数或 EMA 影子参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateKind {
    Default,
    Ema,
}

impl GenerateKind {
    pub const ALL: [Self; 2] = [Self::Default, Self::Ema];

    fn pick<'a>(self, live: &'a Generator, ema: &'a Generator) -> &'a Generator {
        match self {
            Self::Default => live,
            Self::Ema => ema,
        }
    }
}

impl fmt::Display for GenerateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Ema => write!(f, "ema"),
        }
    }
}

impl FromStr for GenerateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "ema" => Ok(Self::Ema),
            other => Err(format!("未知的生成类型`{other}`（可选：default、ema）")),
        }
    }
}

/// 某一步的 FID
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FidScore {
    pub step: u64,
    pub value: f64,
}

pub struct Evaluator {
    dir: PathBuf,
    num_image_tiles: usize,
    fid_num_images: usize,
    batch_size: usize,
    seed: u64,
    extractor: Box<dyn FeatureExtractor>,
    fid_cache: FidCache,
    fixed_latents: FixedLatentCache,
}

impl Evaluator {
    pub fn new(config: &RunConfig, extractor: Box<dyn FeatureExtractor>) -> Self {
        let dir = config.results_dir.join(&config.name);
        Self {
            fid_cache: FidCache::new(dir.join(FID_CACHE_FILE)),
            dir,
            num_image_tiles: config.num_image_tiles,
            fid_num_images: config.calculate_fid_num_images,
            batch_size: config.batch_size,
            seed: config.seed,
            extractor,
            fixed_latents: FixedLatentCache::new(config.seed),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 丢弃真实图像的参考统计，下次计算 FID 时重新提取
    pub fn clear_fid_cache(&mut self) -> Result<(), EvalError> {
        self.fid_cache.invalidate()
    }

    /// 删除本次运行的全部结果（样例图、FID 缓存与分数、指标），并丢弃内存中的缓存
    pub fn clear(&mut self) -> Result<(), EvalError> {
        self.fid_cache.invalidate()?;
        self.fixed_latents.invalidate();
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
            info!(dir = %self.dir.display(), "已清空旧结果");
        }
        Ok(())
    }

    pub fn fixed_latents(&mut self) -> &mut FixedLatentCache {
        &mut self.fixed_latents
    }

    /// 用固定噪声与一批新噪声，分别经在线生成器与 EMA 生成器渲染样例网格。
    /// 写出`{index}.png`、`{index}-ema.png`、`{index}-fixed.png`、`{index}-fixed-ema.png`
    pub fn evaluate(
        &mut self,
        live: &Generator,
        ema: &Generator,
        index: u64,
    ) -> Result<Vec<PathBuf>, EvalError> {
        let count = self.num_image_tiles * self.num_image_tiles;
        let latent_dim = live.latent_dim();
        let mut rng = derive_rng(self.seed, RngStream::Eval, 0, index, 0);
        let fresh = sample_latents(count, latent_dim, &mut rng);
        let fixed = self.fixed_latents.get(count, latent_dim).clone();

        let mut written = Vec::new();
        for (latents, suffix) in [(&fresh, ""), (&fixed, "-fixed")] {
            for (generator, kind) in [(live, ""), (ema, "-ema")] {
                let path = self.dir.join(format!("{index}{suffix}{kind}.png"));
                save_grid(&generator.generate(latents)?, self.num_image_tiles, &path)?;
                written.push(path);
            }
        }
        info!(index, dir = %self.dir.display(), "样例图已保存");
        Ok(written)
    }

    /// 以 EMA 生成器计算 FID，并把`step,value`追加到`fid_scores.txt`
    pub fn calculate_fid(
        &mut self,
        ema: &Generator,
        source: &mut dyn BatchSource,
        step: u64,
    ) -> Result<FidScore, EvalError> {
        let num_images = self.fid_num_images;
        let batch_size = self.batch_size;
        let image_shape = source.image_shape();
        let seed = self.seed;
        let extractor = self.extractor.as_ref();

        let reference = self
            .fid_cache
            .reference(num_images, image_shape, || {
                let mut rng = derive_rng(seed, RngStream::Eval, 0, 0, 1);
                let features = collect_features(extractor, num_images, batch_size, |n| {
                    Ok(source.next_batch(n, &mut rng)?)
                })?;
                FeatureStats::from_features(&features)
            })?
            .clone();

        let mut rng = derive_rng(seed, RngStream::Eval, 0, step, 2);
        let latent_dim = ema.latent_dim();
        let features = collect_features(extractor, num_images, batch_size, |n| {
            Ok(ema.generate(&sample_latents(n, latent_dim, &mut rng))?)
        })?;
        let generated = FeatureStats::from_features(&features)?;
        let value = frechet_distance(&reference, &generated)?;

        fs::create_dir_all(&self.dir)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(FID_SCORES_FILE))?;
        writeln!(file, "{step},{value}")?;
        info!(step, fid = value, "FID 已计算");
        Ok(FidScore { step, value })
    }

    /// 从检查点渲染样例：按`kinds`写出`{name}-default.png`、`{name}-ema.png`
    pub fn generate(
        &mut self,
        live: &Generator,
        ema: &Generator,
        name: &str,
        kinds: &[GenerateKind],
    ) -> Result<Vec<PathBuf>, EvalError> {
        let count = self.num_image_tiles * self.num_image_tiles;
        let mut rng = derive_rng(self.seed, RngStream::Eval, 0, 0, 3);
        let latents = sample_latents(count, live.latent_dim(), &mut rng);
        let mut written = Vec::new();
        for &kind in kinds {
            let path = self.dir.join(format!("{name}-{kind}.png"));
            let images = kind.pick(live, ema).generate(&latents)?;
            save_grid(&images, self.num_image_tiles, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// 第`index`个检查点的进度图：固定噪声的一行样例，写到`progress/{index}.png`
    /// 与`progress/{index}-ema.png`。序号左侧补零到`width`位，便于按文件名排序浏览
    pub fn progress(
        &mut self,
        live: &Generator,
        ema: &Generator,
        index: u64,
        width: usize,
        kinds: &[GenerateKind],
    ) -> Result<Vec<PathBuf>, EvalError> {
        let count = self.num_image_tiles;
        let latents = self.fixed_latents.get(count, live.latent_dim()).clone();
        let mut written = Vec::new();
        for &kind in kinds {
            let suffix = match kind {
                GenerateKind::Default => "",
                GenerateKind::Ema => "-ema",
            };
            let path = self
                .dir
                .join(PROGRESS_DIR)
                .join(format!("{index:0width$}{suffix}.png"));
            let images = kind.pick(live, ema).generate(&latents)?;
            save_grid(&images, count, &path)?;
            written.push(path);
        }
        Ok(written)
    }

    /// 在两批随机潜变量之间做球面插值，用 EMA 生成器渲染成`{name}.gif`；
    /// `save_frames`为真时另存每一帧到`{name}/{i}.png`
    pub fn interpolate(
        &mut self,
        ema: &Generator,
        name: &str,
        num_steps: usize,
        save_frames: bool,
    ) -> Result<PathBuf, EvalError> {
        let count = self.num_image_tiles * self.num_image_tiles;
        let latent_dim = ema.latent_dim();
        let mut rng = derive_rng(self.seed, RngStream::Eval, 0, 0, 4);
        let low = sample_latents(count, latent_dim, &mut rng);
        let high = sample_latents(count, latent_dim, &mut rng);
        let steps = num_steps.max(2);

        let mut frames = Vec::with_capacity(steps);
        for i in 0..steps {
            let t = i as f32 / (steps - 1) as f32;
            let images = ema.generate(&slerp(t, &low, &high))?;
            let grid = images.make_grid(self.num_image_tiles, 2)?;
            if save_frames {
                let path = self.dir.join(name).join(format!("{i}.png"));
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                grid.to_image()?.save(&path)?;
            }
            frames.push(grid);
        }
        let path = self.dir.join(format!("{name}.gif"));
        save_gif(&frames, &path)?;
        info!(path = %path.display(), frames = steps, "插值动画已保存");
        Ok(path)
    }

    /// 以数据源的一批图像预览增强效果，写出`{name}.png`
    pub fn augmentation_preview(
        &self,
        source: &mut dyn BatchSource,
        transforms: &[crate::augment::Transform],
        batch_size: usize,
        name: &str,
    ) -> Result<PathBuf, EvalError> {
        let mut rng: StdRng = derive_rng(self.seed, RngStream::Augment, 0, 0, 0);
        let images = source.next_batch(batch_size, &mut rng)?;
        let path = self.dir.join(format!("{name}.png"));
        save_augmentation_preview(&images, transforms, self.num_image_tiles, &mut rng, &path)?;
        Ok(path)
    }
}

/// 分批取图像并提取特征，凑满`total`张后拼成[total, D]
fn collect_features<F>(
    extractor: &dyn FeatureExtractor,
    total: usize,
    batch_size: usize,
    mut next: F,
) -> Result<Tensor, EvalError>
where
    F: FnMut(usize) -> Result<Tensor, EvalError>,
{
    let mut chunks = Vec::new();
    let mut remaining = total;
    while remaining > 0 {
        let n = remaining.min(batch_size.max(1));
        chunks.push(extractor.extract(&next(n)?)?);
        remaining -= n;
    }
    if chunks.is_empty() {
        return Err(EvalError::NotEnoughSamples { need: 2, got: 0 });
    }
    Ok(Tensor::concat(&chunks.iter().collect::<Vec<_>>(), 0))
}

#[cfg(test)]
mod tests;
