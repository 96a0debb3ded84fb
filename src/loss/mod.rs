/*
 * @Date         : 2026-03-08
 * @Description  : 对抗损失：把(真图分数, 假图分数)规约为(D损失, G损失)
 *
 * 分数张量形状均为[N, 1]，输出为形状[1]的标量 Var。损失函数本身是纯函数，
 * NaN/Inf 的检测由调用方负责。
 */

mod dual_contrastive;
mod hinge;

pub use dual_contrastive::DualContrastiveLoss;
pub use hinge::HingeLoss;

use crate::nn::{GraphError, Var};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 可插拔的对抗损失
pub trait AdversarialLoss {
    fn name(&self) -> &'static str;

    fn discriminator_loss(&self, real: &Var, fake: &Var) -> Result<Var, GraphError>;

    /// `real`仅当`needs_real_for_generator()`为真时才会被用到
    fn generator_loss(&self, fake: &Var, real: Option<&Var>) -> Result<Var, GraphError>;

    /// G损失是否需要真图分数（需要时调度器会在G子步额外跑一次D(real)）
    fn needs_real_for_generator(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Hinge,
    DualContrastive,
}

impl LossKind {
    pub fn build(self) -> Box<dyn AdversarialLoss> {
        match self {
            Self::Hinge => Box::new(HingeLoss),
            Self::DualContrastive => Box::new(DualContrastiveLoss),
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hinge => write!(f, "hinge"),
            Self::DualContrastive => write!(f, "dual_contrastive"),
        }
    }
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hinge" => Ok(Self::Hinge),
            "dual_contrastive" => Ok(Self::DualContrastive),
            other => Err(format!("未知的损失`{other}`（可选：hinge、dual_contrastive）")),
        }
    }
}

#[cfg(test)]
mod tests;
