/*
 * @Author       : 老董
 * @Date         : 2026-01-09
 * @Description  : Module trait 定义
 */

use super::{GraphError, Var};
use crate::tensor::Tensor;
use std::collections::BTreeMap;

/// 模块 trait
///
/// # 设计原则
/// - `forward()` **不是** trait 方法（签名各异）
/// - `new()` **不是** trait 方法（参数各异）
/// - `parameters()` 返回 `Vec<Var>`（签名一致，放入 trait）
/// - 由于 Var 携带图引用，`forward()` 不需要 `&Graph` 参数
pub trait Module {
    /// 获取所有可训练参数
    fn parameters(&self) -> Vec<Var>;

    /// 获取参数数量
    fn num_params(&self) -> usize {
        self.parameters().len()
    }

    /// 参数名 -> 当前值
    fn state_dict(&self) -> Result<BTreeMap<String, Tensor>, GraphError> {
        let mut state = BTreeMap::new();
        for param in self.parameters() {
            let name = param.name()?.ok_or_else(|| {
                GraphError::InvalidOperation(format!("{param:?}不是命名参数"))
            })?;
            state.insert(name, param.value()?);
        }
        Ok(state)
    }
}
