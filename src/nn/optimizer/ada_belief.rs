/*
 * @Date         : 2026-03-05
 * @Description  : AdaBelief优化器实现
 */

use super::base::{
    Optimizer, OptimizerKind, OptimizerState, check_kind, param_names, restore_moments,
};
use crate::nn::{GraphError, Var};
use crate::tensor::Tensor;
use std::collections::BTreeMap;

/// AdaBelief：与 Adam 相同的一阶矩，但二阶项跟踪梯度偏离其均值的程度
/// - m = β1 * m + (1 - β1) * g
/// - s = β2 * s + (1 - β2) * (g - m)² + ε
/// - θ = θ - α * m_hat / (√s_hat + ε)
pub struct AdaBelief {
    params: Vec<Var>,
    names: Vec<String>,
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    m: BTreeMap<String, Tensor>,
    s: BTreeMap<String, Tensor>,
    t: u64,
}

impl AdaBelief {
    pub fn new(params: &[Var], lr: f32, beta1: f32, beta2: f32) -> Result<Self, GraphError> {
        Ok(Self {
            names: param_names(params)?,
            params: params.to_vec(),
            lr,
            beta1,
            beta2,
            epsilon: 1e-16,
            m: BTreeMap::new(),
            s: BTreeMap::new(),
            t: 0,
        })
    }
}

impl Optimizer for AdaBelief {
    fn params(&self) -> &[Var] {
        &self.params
    }

    fn step(&mut self) -> Result<(), GraphError> {
        self.t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.t as i32);

        for (param, name) in self.params.iter().zip(&self.names) {
            let Some(grad) = param.grad()? else {
                continue;
            };

            let m = self
                .m
                .entry(name.clone())
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *m *= self.beta1;
            *m += &(&grad * (1.0 - self.beta1));

            let diff = &grad - &*m;
            let s = self
                .s
                .entry(name.clone())
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *s *= self.beta2;
            *s += &(&(&diff * &diff) * (1.0 - self.beta2) + self.epsilon);

            let m_hat = &*m / bias_correction1;
            let s_hat = &*s / bias_correction2;
            let update = &m_hat / &(&s_hat.sqrt() + self.epsilon);
            let new_value = param.value()? - self.lr * &update;
            param.set_value(&new_value)?;
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
        self.m.clear();
        self.s.clear();
        self.t = 0;
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::AdaBelief
    }

    fn state(&self) -> OptimizerState {
        OptimizerState {
            kind: OptimizerKind::AdaBelief,
            t: self.t,
            first_moment: self.m.clone(),
            second_moment: self.s.clone(),
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<(), GraphError> {
        check_kind(OptimizerKind::AdaBelief, state)?;
        let m = restore_moments(&self.params, &self.names, &state.first_moment)?;
        let s = restore_moments(&self.params, &self.names, &state.second_moment)?;
        self.m = m;
        self.s = s;
        self.t = state.t;
        Ok(())
    }
}
