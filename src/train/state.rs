use super::GradScaler;
use crate::nn::OptimizerState;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 训练状态：检查点保存与恢复的全部内容
///
/// 参数表的键是完整的参数名（如`generator.fc1.weights`）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingState {
    /// 已成功完成的训练步数，只增不减
    pub step: u64,
    pub generator: BTreeMap<String, Tensor>,
    pub discriminator: BTreeMap<String, Tensor>,
    pub ema: BTreeMap<String, Tensor>,
    pub generator_optimizer: OptimizerState,
    pub discriminator_optimizer: OptimizerState,
    pub generator_scaler: GradScaler,
    pub discriminator_scaler: GradScaler,
    pub seed: u64,
}

impl TrainingState {
    /// 三个网络的参数合并为一张表
    pub fn parameters(&self) -> BTreeMap<String, Tensor> {
        self.generator
            .iter()
            .chain(&self.discriminator)
            .chain(&self.ema)
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}
