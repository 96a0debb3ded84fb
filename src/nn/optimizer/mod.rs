/*
 * @Author       : 老董
 * @Date         : 2025-07-24 16:00:00
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-05
 * @Description  : 优化器模块，实现常见的梯度优化算法
 */

mod ada_belief;
mod adam;
mod base;
mod sgd;

pub use ada_belief::AdaBelief;
pub use adam::Adam;
pub use base::{Optimizer, OptimizerKind, OptimizerState};
pub use sgd::SGD;

use crate::nn::{GraphError, Var};

/// 按种类构造优化器。`betas`对 SGD 无意义
pub fn build_optimizer(
    kind: OptimizerKind,
    params: &[Var],
    lr: f32,
    betas: (f32, f32),
) -> Result<Box<dyn Optimizer>, GraphError> {
    Ok(match kind {
        OptimizerKind::Adam => Box::new(Adam::new(params, lr, betas.0, betas.1)?),
        OptimizerKind::AdaBelief => Box::new(AdaBelief::new(params, lr, betas.0, betas.1)?),
        OptimizerKind::Sgd => Box::new(SGD::new(params, lr)?),
    })
}
