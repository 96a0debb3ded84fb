/*
 * @Author       : 老董
 * @Date         : 2025-07-24 16:00:00
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-05
 * @Description  : 优化器基础trait和可序列化的优化器状态
 */

use crate::nn::{GraphError, Var};
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 优化器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    #[default]
    Adam,
    AdaBelief,
    Sgd,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Adam => "adam",
            Self::AdaBelief => "adabelief",
            Self::Sgd => "sgd",
        };
        write!(f, "{name}")
    }
}

impl FromStr for OptimizerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "adabelief" => Ok(Self::AdaBelief),
            "sgd" => Ok(Self::Sgd),
            other => Err(format!("未知的优化器`{other}`（可选：adam、adabelief、sgd）")),
        }
    }
}

/// 优化器内部状态的快照，按参数名索引，可随检查点一起序列化
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerState {
    pub kind: OptimizerKind,
    /// 已执行的更新步数（偏差修正用）
    pub t: u64,
    /// 一阶矩
    pub first_moment: BTreeMap<String, Tensor>,
    /// 二阶矩（AdaBelief 中为“信念”方差）
    pub second_moment: BTreeMap<String, Tensor>,
}

impl OptimizerState {
    pub fn empty(kind: OptimizerKind) -> Self {
        Self {
            kind,
            t: 0,
            first_moment: BTreeMap::new(),
            second_moment: BTreeMap::new(),
        }
    }

    /// 状态中出现、但不在`names`里的参数名
    pub fn unknown_names<'a>(&'a self, names: &[String]) -> Vec<&'a str> {
        self.first_moment
            .keys()
            .chain(self.second_moment.keys())
            .filter(|k| !names.contains(k))
            .map(String::as_str)
            .collect()
    }
}

/// 优化器核心 trait
///
/// # 使用示例
/// ```ignore
/// let mut optimizer = Adam::new(&model.parameters(), 2e-4, 0.5, 0.9)?;
/// optimizer.zero_grad()?;
/// loss.backward()?;
/// optimizer.step()?;
/// ```
pub trait Optimizer {
    /// 绑定的参数
    fn params(&self) -> &[Var];

    /// 清零所有绑定参数的梯度
    fn zero_grad(&mut self) -> Result<(), GraphError> {
        for param in self.params() {
            param.set_grad(None)?;
        }
        Ok(())
    }

    /// 更新参数（使用已计算的梯度；没有梯度的参数跳过）
    fn step(&mut self) -> Result<(), GraphError>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, lr: f32);

    /// 重置累积状态（如 Adam 的动量）
    fn reset(&mut self);

    fn kind(&self) -> OptimizerKind;

    /// 导出内部状态
    fn state(&self) -> OptimizerState;

    /// 恢复内部状态。种类不符时报错；状态中多余的参数名被忽略，缺失的参数从零开始
    fn load_state(&mut self, state: &OptimizerState) -> Result<(), GraphError>;
}

/// 取出每个参数的名字（优化器状态按名字索引）
pub(super) fn param_names(params: &[Var]) -> Result<Vec<String>, GraphError> {
    params
        .iter()
        .map(|p| {
            p.name()?
                .ok_or_else(|| GraphError::InvalidOperation(format!("{p:?}不是命名参数，无法被优化")))
        })
        .collect()
}

/// 按名字从`saved`中挑出属于`names`的矩估计，并校验形状
pub(super) fn restore_moments(
    params: &[Var],
    names: &[String],
    saved: &BTreeMap<String, Tensor>,
) -> Result<BTreeMap<String, Tensor>, GraphError> {
    let mut restored = BTreeMap::new();
    for (param, name) in params.iter().zip(names) {
        if let Some(moment) = saved.get(name) {
            let shape = param.shape()?;
            if moment.shape() != shape.as_slice() {
                return Err(GraphError::ShapeMismatch {
                    expected: shape,
                    got: moment.shape().to_vec(),
                    message: format!("参数`{name}`的优化器状态"),
                });
            }
            restored.insert(name.clone(), moment.clone());
        }
    }
    Ok(restored)
}

pub(super) fn check_kind(expected: OptimizerKind, state: &OptimizerState) -> Result<(), GraphError> {
    if state.kind == expected {
        Ok(())
    } else {
        Err(GraphError::InvalidOperation(format!(
            "优化器种类不符：当前为{expected}，状态来自{}",
            state.kind
        )))
    }
}
