/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : 计算节点的算子：前向求值 + VJP（向量-雅可比积）
 */

use std::rc::Rc;

use super::super::error::GraphError;
use crate::tensor::{Tensor, broadcast_shape};

/// 计算节点的算子
///
/// 所有算子都在建图时立即求值（eager），反向时按`backward`把上游梯度分发给各个父节点。
/// 二元逐元素算子支持广播，反向时梯度会经`sum_to_shape`规约回操作数原本的形状。
#[derive(Debug, Clone)]
pub(in crate::nn) enum Op {
    Add,
    Sub,
    Mul,
    Div,
    MatMul,
    Neg,
    Scale(f32),
    AddScalar(f32),
    Relu,
    LeakyRelu(f32),
    Tanh,
    Sigmoid,
    Exp,
    /// 全部元素求和，输出形状为[1]
    Sum,
    /// 全部元素求均值，输出形状为[1]
    Mean,
    MeanAxesKeepdim(Vec<usize>),
    Reshape(Vec<usize>),
    BroadcastTo(Vec<usize>),
    Concat(usize),
    LogSumExpLast,
    /// 按扁平索引表重排（None处补零），几何类增强都由它实现
    GatherFlat {
        index: Rc<[Option<usize>]>,
        shape: Vec<usize>,
    },
}

fn shape_mismatch(a: &Tensor, b: &Tensor, message: &str) -> GraphError {
    GraphError::ShapeMismatch {
        expected: a.shape().to_vec(),
        got: b.shape().to_vec(),
        message: message.to_string(),
    }
}

impl Op {
    /// 父节点个数，None表示不定（如Concat）
    pub(in crate::nn) const fn arity(&self) -> Option<usize> {
        match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::MatMul => Some(2),
            Self::Concat(_) => None,
            _ => Some(1),
        }
    }

    /// 前向求值。形状非法时返回错误而不是panic
    pub(in crate::nn) fn forward(&self, inputs: &[&Tensor]) -> Result<Tensor, GraphError> {
        if let Some(n) = self.arity() {
            if inputs.len() != n {
                return Err(GraphError::InvalidOperation(format!(
                    "算子{self:?}需要{n}个输入，实际得到{}个",
                    inputs.len()
                )));
            }
        } else if inputs.is_empty() {
            return Err(GraphError::InvalidOperation(format!("算子{self:?}至少需要1个输入")));
        }
        let x = inputs[0];
        let value = match self {
            Self::Add | Self::Sub | Self::Mul | Self::Div => {
                let y = inputs[1];
                if broadcast_shape(x.shape(), y.shape()).is_none() {
                    return Err(shape_mismatch(x, y, "逐元素运算的两个操作数无法广播"));
                }
                match self {
                    Self::Add => x + y,
                    Self::Sub => x - y,
                    Self::Mul => x * y,
                    _ => x / y,
                }
            }
            Self::MatMul => {
                let y = inputs[1];
                if x.dimension() != 2 || y.dimension() != 2 || x.shape()[1] != y.shape()[0] {
                    return Err(shape_mismatch(x, y, "矩阵乘法要求[n, k] x [k, m]"));
                }
                x.matmul(y)
            }
            Self::Neg => -x,
            Self::Scale(s) => x * *s,
            Self::AddScalar(s) => x + *s,
            Self::Relu => x.map(|v| if v < 0.0 { 0.0 } else { v }),
            Self::LeakyRelu(slope) => {
                let slope = *slope;
                x.map(|v| if v > 0.0 { v } else { v * slope })
            }
            Self::Tanh => x.map(f32::tanh),
            Self::Sigmoid => x.map(|v| 1.0 / (1.0 + (-v).exp())),
            Self::Exp => x.map(f32::exp),
            Self::Sum => Tensor::scalar(x.sum_all()),
            Self::Mean => Tensor::scalar(x.mean_all()),
            Self::MeanAxesKeepdim(axes) => {
                if let Some(&axis) = axes.iter().find(|&&a| a >= x.dimension()) {
                    return Err(GraphError::InvalidOperation(format!(
                        "维度{axis}超出张量的阶数{}",
                        x.dimension()
                    )));
                }
                x.mean_axes_keepdim(axes)
            }
            Self::Reshape(shape) => {
                if shape.iter().product::<usize>() != x.size() {
                    return Err(GraphError::ShapeMismatch {
                        expected: shape.clone(),
                        got: x.shape().to_vec(),
                        message: "reshape前后元素个数不一致".to_string(),
                    });
                }
                x.reshape(shape)
            }
            Self::BroadcastTo(shape) => {
                if broadcast_shape(x.shape(), shape).as_deref() != Some(shape.as_slice()) {
                    return Err(GraphError::ShapeMismatch {
                        expected: shape.clone(),
                        got: x.shape().to_vec(),
                        message: "无法广播到目标形状".to_string(),
                    });
                }
                x.broadcast_to(shape)
            }
            Self::Concat(axis) => {
                let first = inputs[0];
                for other in &inputs[1..] {
                    let compatible = other.dimension() == first.dimension()
                        && *axis < first.dimension()
                        && (0..first.dimension())
                            .all(|d| d == *axis || other.shape()[d] == first.shape()[d]);
                    if !compatible {
                        return Err(shape_mismatch(first, other, "拼接的张量除拼接维外形状须一致"));
                    }
                }
                Tensor::concat(inputs, *axis)
            }
            Self::LogSumExpLast => {
                if x.dimension() == 0 {
                    return Err(GraphError::InvalidOperation("log-sum-exp需要至少1维".to_string()));
                }
                x.log_sum_exp_last()
            }
            Self::GatherFlat { index, shape } => {
                if index.iter().flatten().any(|&i| i >= x.size())
                    || index.len() != shape.iter().product::<usize>()
                {
                    return Err(GraphError::InvalidOperation("索引表与张量大小不符".to_string()));
                }
                x.gather_flat(index, shape)
            }
        };
        Ok(value)
    }

    /// 给定上游梯度`grad`（形状同`output`），返回每个输入对应的梯度
    pub(in crate::nn) fn backward(
        &self,
        inputs: &[&Tensor],
        output: &Tensor,
        grad: &Tensor,
    ) -> Vec<Tensor> {
        let x = inputs[0];
        match self {
            Self::Add => vec![
                grad.sum_to_shape(x.shape()),
                grad.sum_to_shape(inputs[1].shape()),
            ],
            Self::Sub => vec![
                grad.sum_to_shape(x.shape()),
                (-grad).sum_to_shape(inputs[1].shape()),
            ],
            Self::Mul => {
                let y = inputs[1];
                vec![
                    (grad * y).sum_to_shape(x.shape()),
                    (grad * x).sum_to_shape(y.shape()),
                ]
            }
            Self::Div => {
                let y = inputs[1];
                let grad_y = -(grad * x) / (y * y);
                vec![
                    (grad / y).sum_to_shape(x.shape()),
                    grad_y.sum_to_shape(y.shape()),
                ]
            }
            Self::MatMul => {
                let y = inputs[1];
                vec![grad.matmul(&y.transpose()), x.transpose().matmul(grad)]
            }
            Self::Neg => vec![-grad],
            Self::Scale(s) => vec![grad * *s],
            Self::AddScalar(_) => vec![grad.clone()],
            Self::Relu => vec![grad * &x.map(|v| if v > 0.0 { 1.0 } else { 0.0 })],
            Self::LeakyRelu(slope) => {
                let slope = *slope;
                vec![grad * &x.map(|v| if v > 0.0 { 1.0 } else { slope })]
            }
            Self::Tanh => vec![grad * &output.map(|y| 1.0 - y * y)],
            Self::Sigmoid => vec![grad * &output.map(|y| y * (1.0 - y))],
            Self::Exp => vec![grad * output],
            Self::Sum => vec![Tensor::full(grad.sum_all(), x.shape())],
            Self::Mean => vec![Tensor::full(
                grad.sum_all() / x.size().max(1) as f32,
                x.shape(),
            )],
            Self::MeanAxesKeepdim(axes) => {
                let count: usize = axes.iter().map(|&a| x.shape()[a]).product();
                vec![grad.broadcast_to(x.shape()) / count.max(1) as f32]
            }
            Self::Reshape(_) => vec![grad.reshape(x.shape())],
            Self::BroadcastTo(_) => vec![grad.sum_to_shape(x.shape())],
            Self::Concat(axis) => {
                let mut start = 0;
                inputs
                    .iter()
                    .map(|input| {
                        let len = input.shape()[*axis];
                        let piece = grad.narrow(*axis, start, len);
                        start += len;
                        piece
                    })
                    .collect()
            }
            // d lse / dx = softmax(x)
            Self::LogSumExpLast => vec![&x.softmax_last() * grad],
            Self::GatherFlat { index, .. } => vec![grad.scatter_add_flat(index, x.shape())],
        }
    }
}
