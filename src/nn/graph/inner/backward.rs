/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : GraphInner VJP 反向传播
 */

use super::super::error::GraphError;
use super::{GraphInner, NodeKind};
use crate::nn::NodeId;
use crate::tensor::Tensor;
use std::collections::{BTreeSet, HashMap};

impl GraphInner {
    /// 从标量损失出发反向传播，返回损失值。
    ///
    /// 叶子节点（参数、输入）的梯度在多次调用之间**累加**，
    /// 因此梯度累积只需对每个 micro-batch 各调用一次，最后统一`clear_grad`。
    pub fn backward(&mut self, loss: NodeId) -> Result<f32, GraphError> {
        let loss_value = self.get_node_value(loss)?;
        let loss_scalar = loss_value.number().ok_or_else(|| {
            GraphError::InvalidOperation(format!(
                "反向传播要求损失为标量，但得到 {:?}",
                loss_value.shape()
            ))
        })?;

        let mut pending: HashMap<NodeId, Tensor> = HashMap::new();
        pending.insert(loss, Tensor::ones(loss_value.shape()));

        // 节点 ID 单调递增，逆序遍历即逆拓扑序
        for id in self.ancestors(loss)?.into_iter().rev() {
            let Some(grad) = pending.remove(&id) else {
                continue;
            };
            let parent_grads = {
                let node = self.get_node(id)?;
                match &node.kind {
                    NodeKind::Op { op, parents } => {
                        let inputs = parents
                            .iter()
                            .map(|&p| self.get_node_value(p))
                            .collect::<Result<Vec<_>, _>>()?;
                        let grads = op.backward(&inputs, &node.value, &grad);
                        Some(parents.iter().copied().zip(grads).collect::<Vec<_>>())
                    }
                    NodeKind::Input | NodeKind::Parameter => None,
                }
            };
            match parent_grads {
                Some(parent_grads) => {
                    for (parent, parent_grad) in parent_grads {
                        match pending.get_mut(&parent) {
                            Some(acc) => *acc += &parent_grad,
                            None => {
                                pending.insert(parent, parent_grad);
                            }
                        }
                    }
                }
                None => {
                    let node = self.get_node_mut(id)?;
                    node.grad = Some(match node.grad.take() {
                        Some(acc) => &acc + &grad,
                        None => grad,
                    });
                }
            }
        }
        Ok(loss_scalar)
    }

    /// `id`及其所有祖先节点
    fn ancestors(&self, id: NodeId) -> Result<BTreeSet<NodeId>, GraphError> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let NodeKind::Op { parents, .. } = self.node_kind(current)? {
                stack.extend(parents.iter().copied());
            }
        }
        Ok(visited)
    }
}
