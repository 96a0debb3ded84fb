/*
 * @Author       : 老董
 * @Date         : 2025-07-24 16:15:00
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-05
 * @Description  : SGD优化器实现
 */

use super::base::{Optimizer, OptimizerKind, OptimizerState, check_kind, param_names};
use crate::nn::{GraphError, Var};

/// 随机梯度下降：θ = θ - α * ∇θ
pub struct SGD {
    params: Vec<Var>,
    lr: f32,
    t: u64,
}

impl SGD {
    pub fn new(params: &[Var], lr: f32) -> Result<Self, GraphError> {
        param_names(params)?;
        Ok(Self {
            params: params.to_vec(),
            lr,
            t: 0,
        })
    }
}

impl Optimizer for SGD {
    fn params(&self) -> &[Var] {
        &self.params
    }

    fn step(&mut self) -> Result<(), GraphError> {
        self.t += 1;
        for param in &self.params {
            if let Some(grad) = param.grad()? {
                let new_value = param.value()? - self.lr * &grad;
                param.set_value(&new_value)?;
            }
        }
        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.lr
    }

    fn set_learning_rate(&mut self, lr: f32) {
        self.lr = lr;
    }

    fn reset(&mut self) {
        self.t = 0;
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Sgd
    }

    fn state(&self) -> OptimizerState {
        OptimizerState {
            t: self.t,
            ..OptimizerState::empty(OptimizerKind::Sgd)
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<(), GraphError> {
        check_kind(OptimizerKind::Sgd, state)?;
        self.t = state.t;
        Ok(())
    }
}
