/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : GraphInner 节点的增删查改
 */

use super::super::error::GraphError;
use super::{GraphInner, Node, NodeKind, Op};
use crate::nn::NodeId;
use crate::tensor::Tensor;

impl GraphInner {
    // ========== 节点访问 ==========

    pub(in crate::nn) fn get_node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.nodes.get(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(in crate::nn) fn get_node_mut(&mut self, id: NodeId) -> Result<&mut Node, GraphError> {
        self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))
    }

    pub(in crate::nn) fn node_kind(&self, id: NodeId) -> Result<&NodeKind, GraphError> {
        Ok(&self.get_node(id)?.kind)
    }

    pub fn get_node_value(&self, id: NodeId) -> Result<&Tensor, GraphError> {
        Ok(&self.get_node(id)?.value)
    }

    pub fn get_node_name(&self, id: NodeId) -> Result<Option<&str>, GraphError> {
        Ok(self.get_node(id)?.name.as_deref())
    }

    /// 设置节点的值，形状必须与原值一致
    pub fn set_node_value(&mut self, id: NodeId, value: &Tensor) -> Result<(), GraphError> {
        let node = self.get_node_mut(id)?;
        if node.value.shape() != value.shape() {
            return Err(GraphError::ShapeMismatch {
                expected: node.value.shape().to_vec(),
                got: value.shape().to_vec(),
                message: format!("设置节点{id:?}的值"),
            });
        }
        node.value = value.clone();
        Ok(())
    }

    pub fn get_node_grad(&self, id: NodeId) -> Result<Option<Tensor>, GraphError> {
        Ok(self.get_node(id)?.grad.clone())
    }

    /// 直接覆盖节点的梯度（梯度规约、反缩放等场景需要）
    pub fn set_node_grad(&mut self, id: NodeId, grad: Option<&Tensor>) -> Result<(), GraphError> {
        let node = self.get_node_mut(id)?;
        if let Some(grad) = grad {
            if grad.shape() != node.value.shape() {
                return Err(GraphError::ShapeMismatch {
                    expected: node.value.shape().to_vec(),
                    got: grad.shape().to_vec(),
                    message: format!("设置节点{id:?}的梯度"),
                });
            }
        }
        node.grad = grad.cloned();
        Ok(())
    }

    // ========== 节点创建 ==========

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(in crate::nn) fn new_input_node(&mut self, value: Tensor) -> NodeId {
        let id = self.next_node_id();
        self.nodes.insert(
            id,
            Node {
                kind: NodeKind::Input,
                name: None,
                value,
                grad: None,
            },
        );
        id
    }

    pub(in crate::nn) fn new_parameter_node(
        &mut self,
        name: &str,
        value: Tensor,
    ) -> Result<NodeId, GraphError> {
        if self.parameters.contains_key(name) {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
        let id = self.next_node_id();
        self.nodes.insert(
            id,
            Node {
                kind: NodeKind::Parameter,
                name: Some(name.to_string()),
                value,
                grad: None,
            },
        );
        self.parameters.insert(name.to_string(), id);
        Ok(id)
    }

    /// 创建算子节点并立即求值
    pub(in crate::nn) fn new_op_node(
        &mut self,
        op: Op,
        parents: &[NodeId],
    ) -> Result<NodeId, GraphError> {
        let value = {
            let inputs = parents
                .iter()
                .map(|&p| self.get_node_value(p))
                .collect::<Result<Vec<_>, _>>()?;
            op.forward(&inputs)?
        };
        let id = self.next_node_id();
        self.nodes.insert(
            id,
            Node {
                kind: NodeKind::Op {
                    op,
                    parents: parents.to_vec(),
                },
                name: None,
                value,
                grad: None,
            },
        );
        Ok(id)
    }

    // ========== 参数 ==========

    pub fn parameter_id(&self, name: &str) -> Option<NodeId> {
        self.parameters.get(name).copied()
    }

    /// 按名字排序的（参数名, 节点）列表
    pub fn parameters(&self) -> impl Iterator<Item = (&str, NodeId)> {
        self.parameters.iter().map(|(name, &id)| (name.as_str(), id))
    }

    // ========== 训练控制 ==========

    /// 清空所有节点的梯度
    pub fn clear_grad(&mut self) {
        for node in self.nodes.values_mut() {
            node.grad = None;
        }
    }

    /// 释放计算带：删除所有非参数节点。之后再访问这些节点会得到`NodeNotFound`
    pub fn clear_tape(&mut self) {
        self.nodes
            .retain(|_, node| matches!(node.kind, NodeKind::Parameter));
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}
