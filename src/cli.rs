/*
 * @Date         : 2026-03-17
 * @Description  : 命令行：train / generate / interpolate / show-progress / aug-test 五个子命令
 *
 * 所有子命令共享一组运行参数，先以`--config`给出的 JSON（或默认值）为底，再用命令行上
 * 显式给出的参数覆盖，最终得到一份`RunConfig`。
 */

use crate::augment::parse_transforms;
use crate::checkpoint::{CheckpointError, CheckpointManager, CheckpointRef, LoadMode};
use crate::data::{ColorMode, ImageFolder};
use crate::distributed::WorkerGroup;
use crate::eval::{Evaluator, GenerateKind, PooledStatsExtractor};
use crate::loss::LossKind;
use crate::nn::OptimizerKind;
use crate::train::metrics::FanoutSink;
use crate::train::{
    ConfigError, JsonlSink, MetricsSink, RunConfig, StepScheduler, TracingSink, TrainError,
    train_workers,
};
use clap::{Args, Parser, Subcommand};
use indicatif::ProgressBar;
use std::path::PathBuf;
use tracing::{info, warn};

const METRICS_FILE: &str = "metrics.jsonl";

/// 轻量级 GAN：训练、生成、插值与增强预览
#[derive(Debug, Parser)]
#[command(name = "lightweight-gan", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 训练（默认从最新检查点继续）
    Train(TrainArgs),
    /// 从检查点渲染样例网格（在线与 EMA 生成器各一张）
    Generate(GenerateArgs),
    /// 在两批潜变量之间插值，输出 GIF
    Interpolate(InterpolateArgs),
    /// 用同一批固定噪声渲染每个检查点的样例，观察训练进展
    ShowProgress(GenerateArgs),
    /// 预览数据增强效果
    AugTest(AugTestArgs),
}

/// 各子命令共用的运行参数
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// 作为底稿的 JSON 配置文件
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// 运行名，决定检查点与结果的子目录
    #[arg(long)]
    pub name: Option<String>,
    /// 训练图像所在目录
    #[arg(long)]
    pub data: Option<PathBuf>,
    #[arg(long)]
    pub results_dir: Option<PathBuf>,
    #[arg(long)]
    pub models_dir: Option<PathBuf>,
    #[arg(long)]
    pub image_size: Option<usize>,
    /// rgb、rgba 或 greyscale
    #[arg(long)]
    pub color_mode: Option<ColorMode>,
    #[arg(long)]
    pub latent_dim: Option<usize>,
    #[arg(long)]
    pub hidden_dim: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// 加载指定序号的检查点（默认最新）
    #[arg(long)]
    pub load_from: Option<u64>,
    /// 宽松加载：跳过名称或形状不一致的参数
    #[arg(long)]
    pub relaxed: bool,
    /// 样例网格每行的图像数
    #[arg(long)]
    pub num_image_tiles: Option<usize>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct TrainArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// 清空同名运行的旧检查点和结果，从头训练
    #[arg(long)]
    pub new: bool,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub gradient_accumulate_every: Option<usize>,
    #[arg(long)]
    pub num_train_steps: Option<u64>,
    #[arg(long)]
    pub learning_rate: Option<f32>,
    /// 判别器学习率相对生成器的倍数
    #[arg(long)]
    pub ttur_mult: Option<f32>,
    /// adam、adabelief 或 sgd
    #[arg(long)]
    pub optimizer: Option<OptimizerKind>,
    /// hinge 或 dual_contrastive
    #[arg(long)]
    pub loss: Option<LossKind>,
    /// 逗号分隔的增强名，如`cutout,translation`
    #[arg(long, value_delimiter = ',')]
    pub aug_types: Option<Vec<String>>,
    #[arg(long)]
    pub aug_prob: Option<f32>,
    /// 生成器子步中不对假图做增强
    #[arg(long)]
    pub no_augment_generator: bool,
    /// 读取数据集时做随机缩放裁剪的概率
    #[arg(long)]
    pub dataset_aug_prob: Option<f32>,
    #[arg(long)]
    pub ema_decay: Option<f32>,
    #[arg(long)]
    pub ema_warmup_steps: Option<u64>,
    /// 开启混合精度（f16 量化 + 动态损失缩放）
    #[arg(long)]
    pub amp: bool,
    #[arg(long)]
    pub save_every: Option<u64>,
    #[arg(long)]
    pub evaluate_every: Option<u64>,
    #[arg(long)]
    pub calculate_fid_every: Option<u64>,
    #[arg(long)]
    pub calculate_fid_num_images: Option<usize>,
    #[arg(long)]
    pub clear_fid_cache: bool,
    /// 只保留最近的若干个检查点
    #[arg(long)]
    pub keep_last: Option<usize>,
    #[arg(long)]
    pub log_every: Option<u64>,
    /// worker 数，大于1时每个 worker 一个线程
    #[arg(long)]
    pub world_size: Option<usize>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub run: RunArgs,
    /// 逗号分隔的生成类型：default、ema（默认两者都出）
    #[arg(long, value_delimiter = ',')]
    pub types: Option<Vec<GenerateKind>>,
}

impl GenerateArgs {
    fn kinds(&self) -> Vec<GenerateKind> {
        self.types
            .clone()
            .unwrap_or_else(|| GenerateKind::ALL.to_vec())
    }
}

#[derive(Debug, Clone, Default, Args)]
pub struct InterpolateArgs {
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(long)]
    pub num_steps: Option<usize>,
    /// 另存每一帧 PNG
    #[arg(long)]
    pub save_frames: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AugTestArgs {
    #[command(flatten)]
    pub run: RunArgs,
    #[arg(long, value_delimiter = ',')]
    pub aug_types: Option<Vec<String>>,
    #[arg(long)]
    pub batch_size: Option<usize>,
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

impl RunArgs {
    /// 以配置文件（或默认值）为底，叠加命令行参数
    pub fn to_config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_json_file(path)?,
            None => RunConfig::default(),
        };
        set(&mut config.name, self.name.clone());
        set(&mut config.data, self.data.clone());
        set(&mut config.results_dir, self.results_dir.clone());
        set(&mut config.models_dir, self.models_dir.clone());
        set(&mut config.image_size, self.image_size);
        set(&mut config.color_mode, self.color_mode);
        set(&mut config.latent_dim, self.latent_dim);
        set(&mut config.hidden_dim, self.hidden_dim);
        set(&mut config.seed, self.seed);
        set(&mut config.num_image_tiles, self.num_image_tiles);
        if self.load_from.is_some() {
            config.load_from = self.load_from;
        }
        if self.relaxed {
            config.load_mode = LoadMode::Relaxed;
        }
        Ok(config)
    }
}

impl TrainArgs {
    pub fn to_config(&self) -> Result<RunConfig, ConfigError> {
        let mut config = self.run.to_config()?;
        config.new |= self.new;
        set(&mut config.batch_size, self.batch_size);
        set(&mut config.gradient_accumulate_every, self.gradient_accumulate_every);
        set(&mut config.num_train_steps, self.num_train_steps);
        set(&mut config.learning_rate, self.learning_rate);
        set(&mut config.ttur_mult, self.ttur_mult);
        set(&mut config.optimizer, self.optimizer);
        set(&mut config.loss, self.loss);
        set(&mut config.aug_types, self.aug_types.clone());
        set(&mut config.aug_prob, self.aug_prob);
        if self.no_augment_generator {
            config.augment_generator = false;
        }
        set(&mut config.dataset_aug_prob, self.dataset_aug_prob);
        set(&mut config.ema_decay, self.ema_decay);
        set(&mut config.ema_warmup_steps, self.ema_warmup_steps);
        config.amp |= self.amp;
        set(&mut config.save_every, self.save_every);
        set(&mut config.evaluate_every, self.evaluate_every);
        if self.calculate_fid_every.is_some() {
            config.calculate_fid_every = self.calculate_fid_every;
        }
        set(&mut config.calculate_fid_num_images, self.calculate_fid_num_images);
        config.clear_fid_cache |= self.clear_fid_cache;
        if self.keep_last.is_some() {
            config.keep_last = self.keep_last;
        }
        set(&mut config.log_every, self.log_every);
        set(&mut config.world_size, self.world_size);
        config.validate()?;
        Ok(config)
    }
}

/// 已有检查点时以其旁边保存的网络拓扑为准，数据源与网络才能对得上
fn adopt_stored_topology(config: &mut RunConfig) -> Result<(), TrainError> {
    let checkpoints = CheckpointManager::new(&config.models_dir, &config.name, config.keep_last);
    if let Some(stored) = checkpoints.load_config().map_err(TrainError::Restore)? {
        config.adopt_topology(&stored);
    }
    Ok(())
}

/// rank 0 同时输出到日志和`{results_dir}/{name}/metrics.jsonl`，其余 rank 只写日志
fn metrics_for(config: &RunConfig, rank: usize) -> Box<dyn MetricsSink> {
    if rank != 0 {
        return Box::new(TracingSink);
    }
    let path = config.results_dir.join(&config.name).join(METRICS_FILE);
    match JsonlSink::open(&path) {
        Ok(jsonl) => {
            let sinks: Vec<Box<dyn MetricsSink + Send>> = vec![Box::new(TracingSink), Box::new(jsonl)];
            Box::new(FanoutSink::new(sinks))
        }
        Err(e) => {
            warn!(error = %e, path = %path.display(), "无法打开指标文件，只输出到日志");
            Box::new(TracingSink)
        }
    }
}

/// 从检查点构建调度器（单进程，不训练）
fn restore_scheduler(config: &mut RunConfig) -> Result<StepScheduler, TrainError> {
    adopt_stored_topology(config)?;
    config.validate()?;
    let checkpoints = CheckpointManager::new(&config.models_dir, &config.name, config.keep_last);
    let (index, state) = checkpoints
        .load(config.load_from.into())
        .map_err(TrainError::Restore)?;
    let mut scheduler = StepScheduler::new(config, WorkerGroup::local())?;
    scheduler
        .load_state(&state, config.load_mode)
        .map_err(TrainError::Restore)?;
    config.seed = scheduler.seed();
    info!(index, step = state.step, "已加载检查点");
    Ok(scheduler)
}

fn evaluator(config: &RunConfig) -> Evaluator {
    Evaluator::new(config, Box::new(PooledStatsExtractor::default()))
}

/// 依次加载每个检查点，用第一个检查点的种子生成固定噪声，渲染进度图
fn show_progress(
    config: &mut RunConfig,
    kinds: &[GenerateKind],
) -> Result<Vec<PathBuf>, TrainError> {
    adopt_stored_topology(config)?;
    config.validate()?;
    let checkpoints = CheckpointManager::new(&config.models_dir, &config.name, config.keep_last);
    let indices = checkpoints.indices().map_err(TrainError::Restore)?;
    let (Some(&first), Some(&last)) = (indices.first(), indices.last()) else {
        return Err(TrainError::Restore(CheckpointError::NoCheckpoint(
            checkpoints.dir().to_path_buf(),
        )));
    };
    let width = last.to_string().len();

    let load_mode = config.load_mode;
    let mut scheduler = StepScheduler::new(config, WorkerGroup::local())?;
    let restore = |scheduler: &mut StepScheduler, index: u64| -> Result<(), TrainError> {
        let (_, state) = checkpoints
            .load(CheckpointRef::Index(index))
            .map_err(TrainError::Restore)?;
        scheduler
            .load_state(&state, load_mode)
            .map_err(TrainError::Restore)?;
        Ok(())
    };
    restore(&mut scheduler, first)?;
    config.seed = scheduler.seed();
    let mut evaluator = evaluator(config);

    let progress = ProgressBar::new(indices.len() as u64).with_message("生成进度图");
    let mut written = Vec::new();
    for index in indices {
        restore(&mut scheduler, index)?;
        written.extend(evaluator.progress(
            scheduler.generator(),
            scheduler.ema().generator(),
            index,
            width,
            kinds,
        )?);
        progress.inc(1);
    }
    progress.finish();
    Ok(written)
}

/// 执行一条子命令
pub fn run(cli: Cli) -> Result<(), TrainError> {
    match cli.command {
        Command::Train(args) => {
            let mut config = args.to_config()?;
            if !config.new {
                adopt_stored_topology(&mut config)?;
            }
            let summaries = train_workers(
                &config,
                |_| {
                    ImageFolder::open(
                        &config.data,
                        config.image_size,
                        config.color_mode,
                        config.dataset_aug_prob,
                    )
                },
                |rank| metrics_for(&config, rank),
            )?;
            if let Some(summary) = summaries.first() {
                info!(
                    step = summary.step,
                    checkpoint = ?summary.checkpoint,
                    fid_evaluations = summary.fid_scores.len(),
                    "训练完成"
                );
            }
        }
        Command::Generate(args) => {
            let mut config = args.run.to_config()?;
            let scheduler = restore_scheduler(&mut config)?;
            let name = format!("generated-{}", scheduler.step_count());
            let written = evaluator(&config).generate(
                scheduler.generator(),
                scheduler.ema().generator(),
                &name,
                &args.kinds(),
            )?;
            info!(files = ?written, "样例已生成");
        }
        Command::ShowProgress(args) => {
            let mut config = args.run.to_config()?;
            let written = show_progress(&mut config, &args.kinds())?;
            info!(images = written.len(), "进度图已生成");
        }
        Command::Interpolate(args) => {
            let mut config = args.run.to_config()?;
            set(&mut config.interpolation_num_steps, args.num_steps);
            config.save_frames |= args.save_frames;
            let scheduler = restore_scheduler(&mut config)?;
            let name = format!("interpolation-{}", scheduler.step_count());
            evaluator(&config).interpolate(
                scheduler.ema().generator(),
                &name,
                config.interpolation_num_steps,
                config.save_frames,
            )?;
        }
        Command::AugTest(args) => {
            let mut config = args.run.to_config()?;
            set(&mut config.aug_types, args.aug_types);
            set(&mut config.batch_size, args.batch_size);
            config.validate()?;
            let transforms = parse_transforms(&config.aug_types).map_err(ConfigError::from)?;
            let mut folder =
                ImageFolder::open(&config.data, config.image_size, config.color_mode, 0.0)?;
            let path = evaluator(&config).augmentation_preview(
                &mut folder,
                &transforms,
                config.batch_size,
                "aug_test",
            )?;
            info!(path = %path.display(), "增强预览已保存");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
