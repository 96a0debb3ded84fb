/*
 * @Date         : 2026-03-11
 * @Description  : 训练相关的错误类型
 *
 * 单步内的数值不稳定（NaN/Inf）是可重试的`NumericalInstability`；
 * 同一逻辑步连续失败达到上限后升级为致命的`TrainError::FatalInstability`。
 */

use super::ConfigError;
use crate::checkpoint::CheckpointError;
use crate::data::DataError;
use crate::distributed::CollectiveError;
use crate::eval::EvalError;
use crate::nn::GraphError;
use std::fmt;
use thiserror::Error;

/// 出现问题的子步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Substep {
    Discriminator,
    Generator,
}

impl fmt::Display for Substep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discriminator => write!(f, "判别器"),
            Self::Generator => write!(f, "生成器"),
        }
    }
}

/// 单步内检测到非有限的损失或梯度
#[derive(Debug, Clone, PartialEq, Error)]
#[error("第{step}步（第{attempt}次尝试）{substep}子步数值不稳定：{detail}")]
pub struct NumericalInstability {
    pub step: u64,
    pub attempt: u32,
    pub substep: Substep,
    pub detail: String,
}

/// 单个训练步的错误。除`Unstable`外均不可重试
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Unstable(#[from] NumericalInstability),
    #[error("数据错误：{0}")]
    Data(#[from] DataError),
    #[error("计算图错误：{0}")]
    Graph(#[from] GraphError),
    #[error("通信错误：{0}")]
    Collective(#[from] CollectiveError),
}

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("第{step}步连续{attempts}次数值不稳定，放弃训练（最后一次：{last}）")]
    FatalInstability {
        step: u64,
        attempts: u32,
        last: NumericalInstability,
    },
    #[error("无法从检查点恢复：{0}")]
    Restore(#[source] CheckpointError),
    #[error("检查点错误：{0}")]
    Checkpoint(#[from] CheckpointError),
    #[error(transparent)]
    Step(StepError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("数据错误：{0}")]
    Data(#[from] DataError),
    #[error("计算图错误：{0}")]
    Graph(#[from] GraphError),
    #[error("通信错误：{0}")]
    Collective(#[from] CollectiveError),
    #[error("评估错误：{0}")]
    Eval(#[from] EvalError),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StepError> for TrainError {
    fn from(error: StepError) -> Self {
        match error {
            StepError::Data(e) => Self::Data(e),
            StepError::Graph(e) => Self::Graph(e),
            StepError::Collective(e) => Self::Collective(e),
            e @ StepError::Unstable(_) => Self::Step(e),
        }
    }
}

impl TrainError {
    /// 进程退出码：2 数值不稳定放弃，3 检查点恢复失败，其余为1
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::FatalInstability { .. } => 2,
            Self::Restore(_) => 3,
            _ => 1,
        }
    }
}
