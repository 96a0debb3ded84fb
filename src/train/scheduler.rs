/*
 * @Date         : 2026-03-13
 * @Description  : 单步调度器：一次训练步 = 判别器子步 + 生成器子步 + EMA 更新
 *
 * 一步是原子的：任一子步失败，参数、优化器状态与损失缩放器都回滚到步前快照，步数不变。
 */

use super::{
    GradScaler, NumericalInstability, RunConfig, StepError, Substep, TrainingState,
};
use crate::augment::AugmentPipeline;
use crate::checkpoint::{CheckpointError, LoadMode, LoadReport, apply_parameters};
use crate::data::{BatchSource, DataError};
use crate::distributed::WorkerGroup;
use crate::gan::{
    DISCRIMINATOR_PREFIX, Discriminator, EMA_PREFIX, EmaShadow, GENERATOR_PREFIX, Generator,
    ImageShape, sample_latents,
};
use crate::loss::AdversarialLoss;
use crate::nn::optimizer::build_optimizer;
use crate::nn::{Graph, GraphError, Module, Optimizer, OptimizerState, Var};
use crate::tensor::Tensor;
use crate::utils::{RngStream, derive_rng};
use rand::rngs::StdRng;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 调度器所处的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    RunningDiscriminatorSubstep,
    RunningGeneratorSubstep,
}

/// 一步所需的全部 micro-batch。三个列表长度都是累积次数 K
#[derive(Debug, Clone)]
pub struct StepInputs {
    /// 真图，每个形状[B, C, H, W]
    pub real: Vec<Tensor>,
    /// 判别器子步生成假图用的噪声，每个形状[B, latent_dim]
    pub discriminator_latents: Vec<Tensor>,
    /// 生成器子步的噪声
    pub generator_latents: Vec<Tensor>,
}

/// 一次成功训练步的结果。损失为各 worker 的均值
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    /// 自增之后的步数
    pub step: u64,
    pub discriminator_loss: f32,
    pub generator_loss: f32,
    /// 因梯度溢出而跳过了优化器更新
    pub discriminator_skipped: bool,
    pub generator_skipped: bool,
    pub discriminator_scale: f32,
    pub generator_scale: f32,
}

/// 子步的结果：(平均损失, 是否跳过更新)
struct SubstepOutcome {
    loss: f32,
    skipped: bool,
}

struct Snapshot {
    parameters: BTreeMap<String, Tensor>,
    generator_optimizer: OptimizerState,
    discriminator_optimizer: OptimizerState,
    generator_scaler: GradScaler,
    discriminator_scaler: GradScaler,
}

pub struct StepScheduler {
    graph: Graph,
    generator: Generator,
    discriminator: Discriminator,
    ema: EmaShadow,
    generator_optimizer: Box<dyn Optimizer>,
    discriminator_optimizer: Box<dyn Optimizer>,
    generator_scaler: GradScaler,
    discriminator_scaler: GradScaler,
    loss: Box<dyn AdversarialLoss>,
    pipeline: AugmentPipeline,
    augment_generator: bool,
    group: WorkerGroup,
    batch_size: usize,
    accumulate: usize,
    seed: u64,
    step: u64,
    phase: Phase,
}

fn gather_grads(params: &[Var]) -> Result<Vec<f32>, GraphError> {
    let mut buffer = Vec::new();
    for param in params {
        match param.grad()? {
            Some(grad) => buffer.extend_from_slice(grad.as_slice()),
            None => buffer.extend(std::iter::repeat(0.0).take(param.value()?.size())),
        }
    }
    Ok(buffer)
}

fn scatter_grads(params: &[Var], buffer: &[f32]) -> Result<(), GraphError> {
    let mut offset = 0;
    for param in params {
        let shape = param.shape()?;
        let len = shape.iter().product::<usize>();
        param.set_grad(Some(&Tensor::new(&buffer[offset..offset + len], &shape)))?;
        offset += len;
    }
    Ok(())
}

fn gather_values(params: &[Var]) -> Result<Vec<f32>, GraphError> {
    let mut buffer = Vec::new();
    for param in params {
        buffer.extend_from_slice(param.value()?.as_slice());
    }
    Ok(buffer)
}

fn scatter_values(params: &[Var], buffer: &[f32]) -> Result<(), GraphError> {
    let mut offset = 0;
    for param in params {
        let shape = param.shape()?;
        let len = shape.iter().product::<usize>();
        param.set_value(&Tensor::new(&buffer[offset..offset + len], &shape))?;
        offset += len;
    }
    Ok(())
}

impl StepScheduler {
    /// 构建网络、优化器与损失缩放器，并把 rank 0 的参数广播给所有 worker
    pub fn new(config: &RunConfig, group: WorkerGroup) -> Result<Self, StepError> {
        let image_shape = config.image_shape();
        let graph = Graph::new_with_seed(config.seed);
        let generator = Generator::new(
            &graph,
            GENERATOR_PREFIX,
            config.latent_dim,
            config.hidden_dim,
            image_shape,
        )?;
        let discriminator =
            Discriminator::new(&graph, DISCRIMINATOR_PREFIX, config.hidden_dim, image_shape)?;
        let ema_generator = Generator::new(
            &graph,
            EMA_PREFIX,
            config.latent_dim,
            config.hidden_dim,
            image_shape,
        )?;
        let ema = EmaShadow::new(ema_generator, config.ema_decay, config.ema_warmup_steps);
        // 影子从在线生成器的拷贝开始
        ema.update(&generator, 0)?;

        let generator_optimizer = build_optimizer(
            config.optimizer,
            &generator.parameters(),
            config.learning_rate,
            config.adam_betas,
        )?;
        let discriminator_optimizer = build_optimizer(
            config.optimizer,
            &discriminator.parameters(),
            config.discriminator_learning_rate(),
            config.adam_betas,
        )?;
        let scaler = || {
            if config.amp {
                GradScaler::new(config.amp_init_scale, config.amp_growth_interval)
            } else {
                GradScaler::disabled()
            }
        };
        let pipeline = AugmentPipeline::from_names(&config.aug_types, config.aug_prob)
            .map_err(|e| GraphError::InvalidOperation(e.to_string()))?;

        let scheduler = Self {
            graph,
            generator,
            discriminator,
            ema,
            generator_optimizer,
            discriminator_optimizer,
            generator_scaler: scaler(),
            discriminator_scaler: scaler(),
            loss: config.loss.build(),
            pipeline,
            augment_generator: config.augment_generator,
            group,
            batch_size: config.batch_size,
            accumulate: config.gradient_accumulate_every,
            seed: config.seed,
            step: 0,
            phase: Phase::Idle,
        };
        scheduler.broadcast_parameters()?;
        Ok(scheduler)
    }

    /// 把 rank 0 的全部参数（含 EMA 影子）复制到其余 worker
    pub fn broadcast_parameters(&self) -> Result<(), StepError> {
        if self.group.world_size() == 1 {
            return Ok(());
        }
        let params = self.graph.parameters_with_prefix("");
        let mut buffer = gather_values(&params)?;
        self.group.broadcast(&mut buffer, 0)?;
        scatter_values(&params, &buffer)?;
        debug!(rank = self.group.rank(), count = params.len(), "参数已从 rank 0 同步");
        Ok(())
    }

    /// 从数据源抽取 K 个真图批次与噪声后执行一步。
    /// 随机数由(种子, rank, 步数, 尝试次数)决定，重试时换一个`attempt`即重新抽样
    pub fn step(
        &mut self,
        source: &mut dyn BatchSource,
        attempt: u32,
    ) -> Result<StepOutcome, StepError> {
        let rank = self.group.rank();
        let mut data_rng = derive_rng(self.seed, RngStream::Data, rank, self.step, attempt);
        let mut latent_rng = derive_rng(self.seed, RngStream::Latent, rank, self.step, attempt);
        let latent_dim = self.generator.latent_dim();

        let real = (0..self.accumulate)
            .map(|_| source.next_batch(self.batch_size, &mut data_rng))
            .collect::<Result<Vec<_>, _>>()?;
        let mut draw = || {
            (0..self.accumulate)
                .map(|_| sample_latents(self.batch_size, latent_dim, &mut latent_rng))
                .collect::<Vec<_>>()
        };
        let discriminator_latents = draw();
        let generator_latents = draw();
        self.step_with(
            &StepInputs {
                real,
                discriminator_latents,
                generator_latents,
            },
            attempt,
        )
    }

    /// 用显式给出的 micro-batch 执行一步
    pub fn step_with(
        &mut self,
        inputs: &StepInputs,
        attempt: u32,
    ) -> Result<StepOutcome, StepError> {
        self.check_inputs(inputs)?;
        let snapshot = self.snapshot();
        let step_before = self.step;
        let result = self.run_step(inputs, attempt);
        self.graph.zero_grad();
        self.graph.clear_tape();
        self.phase = Phase::Idle;
        if result.is_err() {
            self.step = step_before;
            self.restore(snapshot)?;
        }
        result
    }

    fn check_inputs(&self, inputs: &StepInputs) -> Result<(), DataError> {
        let [c, h, w] = self.image_shape();
        let k = inputs.real.len();
        if k == 0 || inputs.discriminator_latents.len() != k || inputs.generator_latents.len() != k
        {
            return Err(DataError::ShapeMismatch {
                expected: vec![k, k, k],
                got: vec![
                    inputs.real.len(),
                    inputs.discriminator_latents.len(),
                    inputs.generator_latents.len(),
                ],
            });
        }
        for batch in &inputs.real {
            let shape = batch.shape();
            if shape.len() != 4 || shape[0] == 0 || shape[1..] != [c, h, w] {
                return Err(DataError::ShapeMismatch {
                    expected: vec![self.batch_size, c, h, w],
                    got: shape.to_vec(),
                });
            }
        }
        let latent_dim = self.generator.latent_dim();
        for latents in inputs
            .discriminator_latents
            .iter()
            .chain(&inputs.generator_latents)
        {
            let shape = latents.shape();
            if shape.len() != 2 || shape[1] != latent_dim {
                return Err(DataError::ShapeMismatch {
                    expected: vec![self.batch_size, latent_dim],
                    got: shape.to_vec(),
                });
            }
        }
        Ok(())
    }

    fn run_step(&mut self, inputs: &StepInputs, attempt: u32) -> Result<StepOutcome, StepError> {
        let mut rng = derive_rng(
            self.seed,
            RngStream::Augment,
            self.group.rank(),
            self.step,
            attempt,
        );

        self.phase = Phase::RunningDiscriminatorSubstep;
        let discriminator = self.discriminator_substep(inputs, attempt, &mut rng)?;

        self.phase = Phase::RunningGeneratorSubstep;
        let generator = self.generator_substep(inputs, attempt, &mut rng)?;

        self.step += 1;
        self.ema.update(&self.generator, self.step)?;
        Ok(StepOutcome {
            step: self.step,
            discriminator_loss: discriminator.loss,
            generator_loss: generator.loss,
            discriminator_skipped: discriminator.skipped,
            generator_skipped: generator.skipped,
            discriminator_scale: self.discriminator_scaler.scale(),
            generator_scale: self.generator_scaler.scale(),
        })
    }

    fn discriminator_substep(
        &mut self,
        inputs: &StepInputs,
        attempt: u32,
        rng: &mut StdRng,
    ) -> Result<SubstepOutcome, StepError> {
        self.graph.zero_grad();
        let k = inputs.real.len() as f32;
        let scale = self.discriminator_scaler.scale();
        let mut total = 0.0;
        let mut unstable = None;
        for (i, (real, latents)) in inputs
            .real
            .iter()
            .zip(&inputs.discriminator_latents)
            .enumerate()
        {
            let real = self.pipeline.apply(&self.graph.input(real)?, rng)?;
            let fake = self
                .generator
                .forward(&self.graph.input(latents)?)?
                .detach()?;
            let fake = self.pipeline.apply(&fake, rng)?;
            let real_score = self.discriminator.forward(&real)?;
            let fake_score = self.discriminator.forward(&fake)?;
            let loss = self.loss.discriminator_loss(&real_score, &fake_score)?;
            let value = loss.item()?;
            if !value.is_finite() {
                unstable = Some(format!("第{i}个 micro-batch 的损失为{value}"));
                self.graph.clear_tape();
                break;
            }
            loss.scale(scale / k)?.backward()?;
            total += value / k;
            self.graph.clear_tape();
        }
        let params = self.discriminator.parameters();
        self.reduce_and_step(&params, total, unstable, Substep::Discriminator, attempt)
    }

    fn generator_substep(
        &mut self,
        inputs: &StepInputs,
        attempt: u32,
        rng: &mut StdRng,
    ) -> Result<SubstepOutcome, StepError> {
        self.graph.zero_grad();
        let k = inputs.generator_latents.len() as f32;
        let scale = self.generator_scaler.scale();
        let mut total = 0.0;
        let mut unstable = None;
        for (i, (latents, real)) in inputs
            .generator_latents
            .iter()
            .zip(&inputs.real)
            .enumerate()
        {
            let fake = self.generator.forward(&self.graph.input(latents)?)?;
            let fake = if self.augment_generator {
                self.pipeline.apply(&fake, rng)?
            } else {
                fake
            };
            let fake_score = self.discriminator.forward(&fake)?;
            let real_score = if self.loss.needs_real_for_generator() {
                let real = self.pipeline.apply(&self.graph.input(real)?, rng)?;
                Some(self.discriminator.forward(&real)?)
            } else {
                None
            };
            let loss = self.loss.generator_loss(&fake_score, real_score.as_ref())?;
            let value = loss.item()?;
            if !value.is_finite() {
                unstable = Some(format!("第{i}个 micro-batch 的损失为{value}"));
                self.graph.clear_tape();
                break;
            }
            loss.scale(scale / k)?.backward()?;
            total += value / k;
            self.graph.clear_tape();
        }
        let params = self.generator.parameters();
        self.reduce_and_step(&params, total, unstable, Substep::Generator, attempt)
    }

    /// 梯度连同损失与 NaN 标志一起做 all-reduce，各 worker 据同一结果决定中止、跳过或更新
    fn reduce_and_step(
        &mut self,
        params: &[Var],
        loss: f32,
        unstable: Option<String>,
        substep: Substep,
        attempt: u32,
    ) -> Result<SubstepOutcome, StepError> {
        let (scaler, optimizer) = match substep {
            Substep::Discriminator => (
                &mut self.discriminator_scaler,
                &mut self.discriminator_optimizer,
            ),
            Substep::Generator => (&mut self.generator_scaler, &mut self.generator_optimizer),
        };
        let mut buffer = gather_grads(params)?;
        scaler.quantize(&mut buffer);
        let flag = if unstable.is_some() { 1.0 } else { 0.0 };
        buffer.extend([loss, flag]);
        self.group.all_reduce_mean(&mut buffer)?;
        let (flag, loss) = (buffer[buffer.len() - 1], buffer[buffer.len() - 2]);
        buffer.truncate(buffer.len() - 2);

        if flag > 0.0 {
            let detail = unstable.unwrap_or_else(|| "其他 worker 检测到非有限损失".to_string());
            return Err(NumericalInstability {
                step: self.step,
                attempt,
                substep,
                detail,
            }
            .into());
        }

        let finite = scaler.unscale_and_check(&mut buffer);
        if !finite {
            if scaler.is_enabled() {
                scaler.update(false);
                warn!(
                    step = self.step,
                    %substep,
                    scale = scaler.scale(),
                    "梯度溢出，跳过本次更新并降低损失缩放"
                );
                return Ok(SubstepOutcome {
                    loss,
                    skipped: true,
                });
            }
            return Err(NumericalInstability {
                step: self.step,
                attempt,
                substep,
                detail: "梯度中出现非有限值".to_string(),
            }
            .into());
        }
        scatter_grads(params, &buffer)?;
        optimizer.step()?;
        scaler.update(true);
        Ok(SubstepOutcome {
            loss,
            skipped: false,
        })
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            parameters: self.graph.named_values(""),
            generator_optimizer: self.generator_optimizer.state(),
            discriminator_optimizer: self.discriminator_optimizer.state(),
            generator_scaler: self.generator_scaler.clone(),
            discriminator_scaler: self.discriminator_scaler.clone(),
        }
    }

    fn restore(&mut self, snapshot: Snapshot) -> Result<(), GraphError> {
        for (name, value) in &snapshot.parameters {
            self.graph.get_parameter(name)?.set_value(value)?;
        }
        self.generator_optimizer
            .load_state(&snapshot.generator_optimizer)?;
        self.discriminator_optimizer
            .load_state(&snapshot.discriminator_optimizer)?;
        self.generator_scaler = snapshot.generator_scaler;
        self.discriminator_scaler = snapshot.discriminator_scaler;
        Ok(())
    }

    /// 导出完整训练状态（用于保存检查点）
    pub fn state(&self) -> TrainingState {
        TrainingState {
            step: self.step,
            generator: self.graph.named_values(&format!("{GENERATOR_PREFIX}.")),
            discriminator: self.graph.named_values(&format!("{DISCRIMINATOR_PREFIX}.")),
            ema: self.graph.named_values(&format!("{EMA_PREFIX}.")),
            generator_optimizer: self.generator_optimizer.state(),
            discriminator_optimizer: self.discriminator_optimizer.state(),
            generator_scaler: self.generator_scaler.clone(),
            discriminator_scaler: self.discriminator_scaler.clone(),
            seed: self.seed,
        }
    }

    /// 把训练状态应用到当前网络。Strict 模式下任何不一致都会报错，且不改变当前状态
    pub fn load_state(
        &mut self,
        state: &TrainingState,
        mode: LoadMode,
    ) -> Result<LoadReport, CheckpointError> {
        let snapshot = self.snapshot();
        match self.apply_state(state, mode) {
            Ok(report) => Ok(report),
            Err(e) => {
                self.restore(snapshot)?;
                Err(e)
            }
        }
    }

    fn apply_state(
        &mut self,
        state: &TrainingState,
        mode: LoadMode,
    ) -> Result<LoadReport, CheckpointError> {
        let mut report = apply_parameters(&self.graph, &state.parameters(), mode)?;
        for (optimizer, saved) in [
            (&mut self.generator_optimizer, &state.generator_optimizer),
            (&mut self.discriminator_optimizer, &state.discriminator_optimizer),
        ] {
            if let Err(e) = optimizer.load_state(saved) {
                match mode {
                    LoadMode::Strict => return Err(e.into()),
                    LoadMode::Relaxed => {
                        warn!(error = %e, "无法恢复优化器状态，从零开始");
                        optimizer.reset();
                        report.optimizers_reset = true;
                    }
                }
            }
        }
        self.generator_scaler = state.generator_scaler.clone();
        self.discriminator_scaler = state.discriminator_scaler.clone();
        if state.seed != self.seed {
            warn!(saved = state.seed, current = self.seed, "检查点的随机种子与配置不同，沿用检查点的");
            self.seed = state.seed;
        }
        self.step = state.step;
        Ok(report)
    }

    pub const fn step_count(&self) -> u64 {
        self.step
    }

    pub const fn phase(&self) -> Phase {
        self.phase
    }

    pub fn image_shape(&self) -> ImageShape {
        self.generator.image_shape()
    }

    pub const fn seed(&self) -> u64 {
        self.seed
    }

    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub const fn discriminator(&self) -> &Discriminator {
        &self.discriminator
    }

    pub const fn ema(&self) -> &EmaShadow {
        &self.ema
    }

    pub const fn group(&self) -> &WorkerGroup {
        &self.group
    }

    pub const fn generator_scaler(&self) -> &GradScaler {
        &self.generator_scaler
    }

    pub const fn discriminator_scaler(&self) -> &GradScaler {
        &self.discriminator_scaler
    }

    pub const fn pipeline(&self) -> &AugmentPipeline {
        &self.pipeline
    }
}
