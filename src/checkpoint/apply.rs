use super::CheckpointError;
use crate::nn::Graph;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// 把检查点应用到当前网络的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// 参数名与形状必须完全一致，否则报错且不做任何修改
    #[default]
    Strict,
    /// 只应用名字与形状都匹配的参数，其余跳过并记录
    Relaxed,
}

/// 一次加载的结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub applied: Vec<String>,
    /// 当前网络有、检查点中没有
    pub missing: Vec<String>,
    /// 检查点中有、当前网络没有
    pub unexpected: Vec<String>,
    /// 两边都有但形状不同
    pub mismatched: Vec<String>,
    /// 优化器状态无法恢复而被重置（仅 Relaxed）
    pub optimizers_reset: bool,
}

impl LoadReport {
    pub fn is_exact(&self) -> bool {
        self.missing.is_empty()
            && self.unexpected.is_empty()
            && self.mismatched.is_empty()
            && !self.optimizers_reset
    }

    pub(crate) fn into_mismatch_error(self) -> CheckpointError {
        CheckpointError::TopologyMismatch {
            missing: self.missing,
            unexpected: self.unexpected,
            mismatched: self.mismatched,
        }
    }
}

/// 把`saved`中的参数写入`graph`。先比对再写入：Strict 模式下出现任何差异都直接返回错误
pub fn apply_parameters(
    graph: &Graph,
    saved: &BTreeMap<String, Tensor>,
    mode: LoadMode,
) -> Result<LoadReport, CheckpointError> {
    let live = graph.named_values("");
    let mut report = LoadReport::default();
    for (name, value) in &live {
        match saved.get(name) {
            None => report.missing.push(name.clone()),
            Some(stored) if stored.shape() != value.shape() => report.mismatched.push(name.clone()),
            Some(_) => report.applied.push(name.clone()),
        }
    }
    report.unexpected = saved
        .keys()
        .filter(|name| !live.contains_key(*name))
        .cloned()
        .collect();

    if mode == LoadMode::Strict && !report.is_exact() {
        return Err(report.into_mismatch_error());
    }
    for name in &report.applied {
        graph.get_parameter(name)?.set_value(&saved[name])?;
    }
    if !report.is_exact() {
        warn!(
            missing = ?report.missing,
            unexpected = ?report.unexpected,
            mismatched = ?report.mismatched,
            "宽松模式加载：部分参数被跳过"
        );
    }
    Ok(report)
}
