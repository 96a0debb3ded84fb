/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : 计算图：Graph 句柄 + GraphInner 存储 + 反向传播
 */

mod error;
mod handle;
mod inner;

pub use error::GraphError;
pub use handle::Graph;
pub use inner::GraphInner;
pub(in crate::nn) use inner::{NodeKind, Op};

/// 节点 ID（在同一张图内单调递增，因此天然满足拓扑序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(in crate::nn) u64);
