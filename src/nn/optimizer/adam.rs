/*
 * @Author       : 老董
 * @Date         : 2025-07-24 16:30:00
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-05
 * @Description  : Adam优化器实现
 */

use super::base::{
    Optimizer, OptimizerKind, OptimizerState, check_kind, param_names, restore_moments,
};
use crate::nn::{GraphError, Var};
use crate::tensor::Tensor;
use std::collections::BTreeMap;

/// Adam: Adaptive Moment Estimation
/// - m = β1 * m + (1 - β1) * g
/// - v = β2 * v + (1 - β2) * g²
/// - θ = θ - α * m_hat / (√v_hat + ε)
pub struct Adam {
    params: Vec<Var>,
    names: Vec<String>,
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    /// 一阶矩估计
    m: BTreeMap<String, Tensor>,
    /// 二阶矩估计
    v: BTreeMap<String, Tensor>,
    /// 时间步
    t: u64,
}

impl Adam {
    pub fn new(params: &[Var], lr: f32, beta1: f32, beta2: f32) -> Result<Self, GraphError> {
        Ok(Self {
            names: param_names(params)?,
            params: params.to_vec(),
            lr,
            beta1,
            beta2,
            epsilon: 1e-8,
            m: BTreeMap::new(),
            v: BTreeMap::new(),
            t: 0,
        })
    }
}

impl Optimizer for Adam {
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

            // 原地更新一阶矩估计: m = β1 * m + (1 - β1) * g
            let m = self
                .m
                .entry(name.clone())
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *m *= self.beta1;
            *m += &(&grad * (1.0 - self.beta1));

            // 原地更新二阶矩估计: v = β2 * v + (1 - β2) * g²
            let v = self
                .v
                .entry(name.clone())
                .or_insert_with(|| Tensor::zeros(grad.shape()));
            *v *= self.beta2;
            *v += &(&(&grad * &grad) * (1.0 - self.beta2));

            let m_hat = &*m / bias_correction1;
            let v_hat = &*v / bias_correction2;
            let update = &m_hat / &(&v_hat.sqrt() + self.epsilon);
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
        self.v.clear();
        self.t = 0;
    }

    fn kind(&self) -> OptimizerKind {
        OptimizerKind::Adam
    }

    fn state(&self) -> OptimizerState {
        OptimizerState {
            kind: OptimizerKind::Adam,
            t: self.t,
            first_moment: self.m.clone(),
            second_moment: self.v.clone(),
        }
    }

    fn load_state(&mut self, state: &OptimizerState) -> Result<(), GraphError> {
        check_kind(OptimizerKind::Adam, state)?;
        let m = restore_moments(&self.params, &self.names, &state.first_moment)?;
        let v = restore_moments(&self.params, &self.names, &state.second_moment)?;
        self.m = m;
        self.v = v;
        self.t = state.t;
        Ok(())
    }
}
