/*
 * @Author       : 老董
 * @Date         : 2024-01-31 20:23:53
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-05
 * @Description  : 负责神经网络（neural network）的构建：即时求值的计算图、层、优化器
 */

mod graph;
pub mod layer;
mod module;
pub mod optimizer;
mod var;

pub use graph::{Graph, GraphError, GraphInner, NodeId};
pub use layer::Linear;
pub use module::Module;
pub use optimizer::{AdaBelief, Adam, Optimizer, OptimizerKind, OptimizerState, SGD};
pub use var::{Init, Var};

#[cfg(test)]
mod tests;
