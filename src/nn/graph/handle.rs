/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : Graph 句柄（用户级 API）
 */

use super::error::GraphError;
use super::inner::GraphInner;
use crate::nn::var::{Init, Var};
use crate::tensor::Tensor;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Graph - 计算图句柄
///
/// # 设计原则
/// - 是 `Rc<RefCell<GraphInner>>` 的薄封装
/// - Clone 语义：多个 Graph 引用同一个 GraphInner
/// - 创建的 Var 自动持有图引用
#[derive(Clone)]
pub struct Graph {
    inner: Rc<RefCell<GraphInner>>,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    // ==================== 创建 ====================

    /// 创建新图
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(GraphInner::new())),
        }
    }

    /// 创建带种子的图（参数初始化可复现）
    pub fn new_with_seed(seed: u64) -> Self {
        Self {
            inner: Rc::new(RefCell::new(GraphInner::new_with_seed(seed))),
        }
    }

    /// 从现有 Rc 创建句柄
    pub(crate) const fn from_rc(inner: Rc<RefCell<GraphInner>>) -> Self {
        Self { inner }
    }

    /// 获取内部 GraphInner 的不可变引用
    pub fn inner(&self) -> std::cell::Ref<'_, GraphInner> {
        self.inner.borrow()
    }

    /// 获取内部 GraphInner 的可变引用
    pub fn inner_mut(&self) -> std::cell::RefMut<'_, GraphInner> {
        self.inner.borrow_mut()
    }

    /// 检查两个句柄是否指向同一张图
    pub fn same_graph(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ==================== 创建变量 ====================

    /// 创建输入节点（不参与训练，梯度不会继续向上传）
    pub fn input(&self, data: &Tensor) -> Result<Var, GraphError> {
        let id = self.inner.borrow_mut().new_input_node(data.clone());
        Ok(Var::new(id, Rc::clone(&self.inner)))
    }

    /// 创建常量（与`input`相同，只是语义上的区分）
    pub fn constant(&self, data: &Tensor) -> Result<Var, GraphError> {
        self.input(data)
    }

    /// 以给定初值创建参数节点，`name`在图中必须唯一
    pub fn parameter(&self, name: &str, value: &Tensor) -> Result<Var, GraphError> {
        let id = self
            .inner
            .borrow_mut()
            .new_parameter_node(name, value.clone())?;
        Ok(Var::new(id, Rc::clone(&self.inner)))
    }

    /// 按初始化策略创建参数节点（使用图自带的 RNG）
    pub fn parameter_init(&self, name: &str, shape: &[usize], init: Init) -> Result<Var, GraphError> {
        let value = init.generate_with_rng(shape, &mut self.inner.borrow_mut().rng);
        self.parameter(name, &value)
    }

    /// 按名字取参数
    pub fn get_parameter(&self, name: &str) -> Result<Var, GraphError> {
        let id = self
            .inner
            .borrow()
            .parameter_id(name)
            .ok_or_else(|| GraphError::ParameterNotFound(name.to_string()))?;
        Ok(Var::new(id, Rc::clone(&self.inner)))
    }

    /// 图中所有参数名（有序）
    pub fn parameter_names(&self) -> Vec<String> {
        self.inner
            .borrow()
            .parameters()
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// 名字以`prefix`开头的所有参数（按名字排序）
    pub fn parameters_with_prefix(&self, prefix: &str) -> Vec<Var> {
        self.inner
            .borrow()
            .parameters()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(_, id)| Var::new(id, Rc::clone(&self.inner)))
            .collect()
    }

    /// 名字以`prefix`开头的参数的当前值：参数名 -> 张量
    pub fn named_values(&self, prefix: &str) -> BTreeMap<String, Tensor> {
        let g = self.inner.borrow();
        g.parameters()
            .filter(|(name, _)| name.starts_with(prefix))
            .filter_map(|(name, id)| {
                g.get_node_value(id)
                    .ok()
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect()
    }

    // ==================== 训练控制 ====================

    /// 清零所有节点的梯度
    pub fn zero_grad(&self) {
        self.inner.borrow_mut().clear_grad();
    }

    /// 释放本轮前向/反向产生的计算带，只保留参数
    pub fn clear_tape(&self) {
        self.inner.borrow_mut().clear_tape();
    }

    pub fn num_nodes(&self) -> usize {
        self.inner.borrow().num_nodes()
    }
}
