/*
 * @Date         : 2026-03-11
 * @Description  : 训练编排：运行配置、单步调度、重试、混合精度、训练循环与指标输出
 */

mod config;
mod error;
pub mod metrics;
mod precision;
mod retry;
mod scheduler;
mod state;
mod trainer;

pub use config::{ConfigError, RunConfig};
pub use error::{NumericalInstability, StepError, Substep, TrainError};
pub use metrics::{JsonlSink, MetricsSink, TracingSink};
pub use precision::GradScaler;
pub use retry::retry_step;
pub use scheduler::{Phase, StepInputs, StepOutcome, StepScheduler};
pub use state::TrainingState;
pub use trainer::{TrainSummary, Trainer, train_workers};

#[cfg(test)]
mod tests;
