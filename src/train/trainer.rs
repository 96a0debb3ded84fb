/*
 * @Date         : 2026-03-16
 * @Description  : 训练循环：恢复、逐步训练（含重试）、定期保存/评估/记录、结束时保存
 *
 * 每个 worker 各自运行一个 Trainer；只有 rank 0 写检查点、记录指标和评估。
 */

use super::metrics::{MetricsSink, TracingSink, record_or_warn};
use super::{RunConfig, StepOutcome, StepScheduler, TrainError, retry_step};
use crate::checkpoint::{CheckpointError, CheckpointManager};
use crate::data::{BatchSource, DataError};
use crate::distributed::{ThreadGroup, WorkerGroup};
use crate::eval::{Evaluator, FidScore, PooledStatsExtractor};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{error, info};

const PROGRESS_TEMPLATE: &str = "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta})";

/// 训练结束时的汇总
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub step: u64,
    /// 最后写出的检查点（非 rank 0 或保存失败时为 None）
    pub checkpoint: Option<PathBuf>,
    pub fid_scores: Vec<FidScore>,
}

pub struct Trainer {
    config: RunConfig,
    scheduler: StepScheduler,
    checkpoints: CheckpointManager,
    evaluator: Option<Evaluator>,
    metrics: Box<dyn MetricsSink>,
    fid_scores: Vec<FidScore>,
}

impl Trainer {
    /// 构建调度器；除非`config.new`，否则从检查点恢复（没有检查点时从头开始）。
    /// `config.new`时 rank 0 清空同名运行的检查点与结果目录，因此写入结果目录的
    /// 指标输出端须在此之后再用`with_metrics`挂上
    pub fn new(mut config: RunConfig, group: WorkerGroup) -> Result<Self, TrainError> {
        config.validate()?;
        let checkpoints = CheckpointManager::new(&config.models_dir, &config.name, config.keep_last);
        let is_main = group.is_main();

        if config.new {
            if is_main {
                checkpoints.clear()?;
            }
        } else if let Some(stored) = checkpoints.load_config().map_err(TrainError::Restore)? {
            config.adopt_topology(&stored);
        }

        let mut scheduler = StepScheduler::new(&config, group)?;
        if !config.new {
            match checkpoints.load(config.load_from.into()) {
                Ok((index, state)) => {
                    let report = scheduler
                        .load_state(&state, config.load_mode)
                        .map_err(TrainError::Restore)?;
                    scheduler.broadcast_parameters()?;
                    // 评估用的固定噪声等随机流与调度器使用同一个种子
                    config.seed = scheduler.seed();
                    info!(
                        index,
                        step = state.step,
                        exact = report.is_exact(),
                        "从检查点恢复训练"
                    );
                }
                Err(CheckpointError::NoCheckpoint(_)) if config.load_from.is_none() => {
                    info!("没有可恢复的检查点，从头开始训练");
                }
                Err(e) => return Err(TrainError::Restore(e)),
            }
        }

        let mut evaluator = is_main
            .then(|| Evaluator::new(&config, Box::new(PooledStatsExtractor::default())));
        if let Some(evaluator) = evaluator.as_mut() {
            if config.new {
                evaluator.clear()?;
            } else if config.clear_fid_cache {
                evaluator.clear_fid_cache()?;
            }
            checkpoints.save_config(&config)?;
        }

        Ok(Self {
            config,
            scheduler,
            checkpoints,
            evaluator,
            metrics: Box::new(TracingSink),
            fid_scores: Vec::new(),
        })
    }

    /// 替换指标输出端（默认只写日志）
    pub fn with_metrics(mut self, metrics: Box<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// rank 0 显示从当前步数到`num_train_steps`的进度条，其余 rank 不显示
    fn progress_bar(&self) -> ProgressBar {
        if !self.scheduler.group().is_main() {
            return ProgressBar::hidden();
        }
        let style = ProgressStyle::default_bar()
            .template(PROGRESS_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");
        ProgressBar::new(self.config.num_train_steps)
            .with_style(style)
            .with_position(self.scheduler.step_count())
            .with_message(format!("{}<{}>", self.config.name, self.config.data.display()))
    }

    /// 训练到`num_train_steps`后保存并返回
    pub fn train(&mut self, source: &mut dyn BatchSource) -> Result<TrainSummary, TrainError> {
        let expected = self.scheduler.image_shape();
        if source.image_shape() != expected {
            return Err(DataError::ShapeMismatch {
                expected: expected.to_vec(),
                got: source.image_shape().to_vec(),
            }
            .into());
        }
        info!(
            rank = self.scheduler.group().rank(),
            world_size = self.scheduler.group().world_size(),
            from = self.scheduler.step_count(),
            to = self.config.num_train_steps,
            "开始训练"
        );

        let progress = self.progress_bar();
        let max_attempts = self.config.max_attempts;
        while self.scheduler.step_count() < self.config.num_train_steps {
            let step = self.scheduler.step_count();
            let scheduler = &mut self.scheduler;
            let outcome = retry_step(step, max_attempts, |attempt| {
                scheduler.step(&mut *source, attempt)
            })?;
            progress.set_position(self.scheduler.step_count());
            if self.scheduler.group().is_main() {
                self.after_step(&outcome, source);
            }
        }
        progress.finish();

        let checkpoint = if self.scheduler.group().is_main() {
            self.save()
        } else {
            None
        };
        self.scheduler.group().barrier()?;
        if let Err(e) = self.metrics.flush() {
            error!(error = %e, "指标刷新失败");
        }
        Ok(TrainSummary {
            step: self.scheduler.step_count(),
            checkpoint,
            fid_scores: self.fid_scores.clone(),
        })
    }

    fn after_step(&mut self, outcome: &StepOutcome, source: &mut dyn BatchSource) {
        let step = outcome.step;
        if step % self.config.log_every == 0 {
            info!(
                step,
                g_loss = outcome.generator_loss,
                d_loss = outcome.discriminator_loss,
                g_scale = outcome.generator_scale,
                d_scale = outcome.discriminator_scale,
                fid = ?self.fid_scores.last().map(|s| s.value),
                "训练进度"
            );
            for (name, value) in [
                ("g_loss", outcome.generator_loss),
                ("d_loss", outcome.discriminator_loss),
                ("g_scale", outcome.generator_scale),
                ("d_scale", outcome.discriminator_scale),
            ] {
                record_or_warn(self.metrics.as_mut(), step, name, f64::from(value));
            }
        }

        if step % self.config.save_every == 0 {
            self.save();
        }

        let Some(evaluator) = self.evaluator.as_mut() else {
            return;
        };
        let live = self.scheduler.generator();
        let ema = self.scheduler.ema().generator();
        if self.config.evaluate_every > 0 && step % self.config.evaluate_every == 0 {
            if let Err(e) = evaluator.evaluate(live, ema, step / self.config.evaluate_every) {
                error!(step, error = %e, "样例图生成失败，继续训练");
            }
        }
        if let Some(every) = self.config.calculate_fid_every {
            if step % every == 0 {
                match evaluator.calculate_fid(ema, source, step) {
                    Ok(score) => {
                        record_or_warn(self.metrics.as_mut(), step, "fid", score.value);
                        self.fid_scores.push(score);
                    }
                    Err(e) => error!(step, error = %e, "FID 计算失败，继续训练"),
                }
            }
        }
    }

    /// 以`step / save_every`为序号保存；失败只记录，不影响训练
    fn save(&mut self) -> Option<PathBuf> {
        let state = self.scheduler.state();
        let index = state.step / self.config.save_every;
        match self.checkpoints.save(&state, index) {
            Ok(path) => Some(path),
            Err(e) => {
                error!(step = state.step, index, error = %e, "检查点保存失败，沿用上一个检查点");
                record_or_warn(self.metrics.as_mut(), state.step, "checkpoint_save_failed", 1.0);
                None
            }
        }
    }

    pub const fn scheduler(&self) -> &StepScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut StepScheduler {
        &mut self.scheduler
    }

    pub const fn checkpoints(&self) -> &CheckpointManager {
        &self.checkpoints
    }

    pub fn evaluator_mut(&mut self) -> Option<&mut Evaluator> {
        self.evaluator.as_mut()
    }

    pub const fn config(&self) -> &RunConfig {
        &self.config
    }
}

/// 按`config.world_size`启动训练：单 worker 在当前线程运行，多 worker 时每个 rank 一个线程。
/// `make_source`与`make_metrics`以 rank 为参数，为每个 worker 构造各自的数据源和指标输出端
pub fn train_workers<S, F, M>(
    config: &RunConfig,
    make_source: F,
    make_metrics: M,
) -> Result<Vec<TrainSummary>, TrainError>
where
    S: BatchSource,
    F: Fn(usize) -> Result<S, DataError> + Sync,
    M: Fn(usize) -> Box<dyn MetricsSink> + Sync,
{
    let run = |group: WorkerGroup| -> Result<TrainSummary, TrainError> {
        let rank = group.rank();
        let mut source = make_source(rank)?;
        Trainer::new(config.clone(), group)?
            .with_metrics(make_metrics(rank))
            .train(&mut source)
    };
    if config.world_size == 1 {
        return Ok(vec![run(WorkerGroup::local())?]);
    }
    ThreadGroup::launch(config.world_size, |group| {
        run(WorkerGroup::new(Box::new(group)))
    })?
    .into_iter()
    .collect()
}
