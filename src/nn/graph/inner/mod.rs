/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : GraphInner：计算图的底层存储
 *
 * 约定：
 * - 参数节点（Parameter）常驻图中，以唯一的名字索引，梯度在多次 backward 之间累加，直到 zero_grad；
 * - 其余节点（输入、算子）构成“计算带”（tape），由 clear_tape 整体释放。
 */

mod backward;
mod core;
mod op;

pub(in crate::nn) use op::Op;

use super::NodeId;
use crate::tensor::Tensor;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::BTreeMap;

pub(in crate::nn) enum NodeKind {
    /// 输入/常量/截断梯度后的节点，不会把梯度继续向上传
    Input,
    /// 可训练参数
    Parameter,
    Op { op: Op, parents: Vec<NodeId> },
}

pub(in crate::nn) struct Node {
    kind: NodeKind,
    name: Option<String>,
    value: Tensor,
    grad: Option<Tensor>,
}

/// 计算图的内部存储（通常经由 [`Graph`](super::Graph) 句柄访问）
pub struct GraphInner {
    nodes: BTreeMap<NodeId, Node>,
    next_id: u64,
    /// 参数名 -> 节点，按名字有序，便于稳定地序列化与展平梯度
    parameters: BTreeMap<String, NodeId>,
    pub(in crate::nn) rng: StdRng,
}

impl Default for GraphInner {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphInner {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    pub fn new_with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_id: 0,
            parameters: BTreeMap::new(),
            rng,
        }
    }
}
