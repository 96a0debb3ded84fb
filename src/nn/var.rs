/*
 * @Author       : 老董
 * @Date         : 2026-01-08
 * @Description  : Smart Var - 智能变量句柄，支持算子重载和链式调用
 */

use super::graph::{GraphInner, NodeKind, Op};
use super::{Graph, GraphError, NodeId};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

// ==================== Init 枚举 ====================

/// 参数初始化策略
#[derive(Debug, Clone)]
pub enum Init {
    /// 常数初始化
    Constant(f32),
    /// 全零
    Zeros,
    /// 全一
    Ones,
    /// 正态分布
    Normal { mean: f32, std: f32 },
    /// Kaiming/He 初始化（适用于 `ReLU` 系列）
    Kaiming,
    /// Xavier/Glorot 初始化（适用于 Sigmoid/Tanh）
    Xavier,
}

impl Init {
    /// 生成初始化后的 Tensor（使用指定的 RNG）
    pub fn generate_with_rng(&self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            Self::Constant(v) => Tensor::full(*v, shape),
            Self::Zeros => Tensor::zeros(shape),
            Self::Ones => Tensor::ones(shape),
            Self::Normal { mean, std } => Tensor::normal_with_rng(*mean, *std, shape, rng),
            Self::Kaiming => {
                let fan_in = shape[0];
                let std = (2.0 / fan_in as f32).sqrt();
                Tensor::normal_with_rng(0.0, std, shape, rng)
            }
            Self::Xavier => {
                let (fan_in, fan_out) = (shape[0], shape.get(1).copied().unwrap_or(1));
                let std = (2.0 / (fan_in + fan_out) as f32).sqrt();
                Tensor::normal_with_rng(0.0, std, shape, rng)
            }
        }
    }
}

// ==================== Var 结构 ====================

/// 智能变量句柄 - 携带图引用，支持算子重载和链式调用
///
/// # 设计原则
/// - 持有 `Rc<RefCell<GraphInner>>` 引用，实现算子重载
/// - 所有运算在创建时立即求值（eager），`backward()`沿记录下的计算带反传
/// - Clone 语义（非 Copy），但开销极低（Rc clone）
///
/// # 使用示例
/// ```ignore
/// let graph = Graph::new();
/// let x = graph.input(&images)?;
/// let h = x.matmul(&w)?.leaky_relu(0.2)?;
/// let loss = (&h - &target).mean()?;
/// loss.backward()?;
/// ```
#[derive(Clone)]
pub struct Var {
    /// 节点 ID
    id: NodeId,
    /// 图引用（用户不可见）
    graph: Rc<RefCell<GraphInner>>,
}

impl std::fmt::Debug for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Var").field("id", &self.id).finish()
    }
}

impl Var {
    /// 创建新的 Var（内部使用）
    pub(crate) const fn new(id: NodeId, graph: Rc<RefCell<GraphInner>>) -> Self {
        Self { id, graph }
    }

    /// 获取节点 ID
    pub const fn node_id(&self) -> NodeId {
        self.id
    }

    /// 检查两个 Var 是否来自同一个 Graph
    pub fn same_graph(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.graph, &other.graph)
    }

    /// 获取 Var 所属的 Graph handle
    pub fn get_graph(&self) -> Graph {
        Graph::from_rc(Rc::clone(&self.graph))
    }

    fn ensure_same_graph(&self, other: &Self, what: &str) -> Result<(), GraphError> {
        if self.same_graph(other) {
            Ok(())
        } else {
            Err(GraphError::InvalidOperation(format!(
                "不能对来自不同 Graph 的 Var 进行{what}"
            )))
        }
    }

    fn push_op(&self, op: Op, parents: &[NodeId]) -> Result<Self, GraphError> {
        let id = self.graph.borrow_mut().new_op_node(op, parents)?;
        Ok(Self::new(id, Rc::clone(&self.graph)))
    }

    fn unary(&self, op: Op) -> Result<Self, GraphError> {
        self.push_op(op, &[self.id])
    }

    fn binary(&self, other: &Self, op: Op, what: &str) -> Result<Self, GraphError> {
        self.ensure_same_graph(other, what)?;
        self.push_op(op, &[self.id, other.id])
    }

    // ==================== 值访问和设置 ====================

    /// 获取节点的值（克隆的 Tensor）
    pub fn value(&self) -> Result<Tensor, GraphError> {
        Ok(self.graph.borrow().get_node_value(self.id)?.clone())
    }

    /// 设置节点的值（形状须保持不变）
    pub fn set_value(&self, value: &Tensor) -> Result<(), GraphError> {
        self.graph.borrow_mut().set_node_value(self.id, value)
    }

    pub fn shape(&self) -> Result<Vec<usize>, GraphError> {
        Ok(self.graph.borrow().get_node_value(self.id)?.shape().to_vec())
    }

    /// 获取标量值
    pub fn item(&self) -> Result<f32, GraphError> {
        self.value()?
            .number()
            .ok_or_else(|| GraphError::InvalidOperation("Tensor 不是标量".to_string()))
    }

    /// 获取节点的梯度
    pub fn grad(&self) -> Result<Option<Tensor>, GraphError> {
        self.graph.borrow().get_node_grad(self.id)
    }

    /// 覆盖节点的梯度
    pub fn set_grad(&self, grad: Option<&Tensor>) -> Result<(), GraphError> {
        self.graph.borrow_mut().set_node_grad(self.id, grad)
    }

    /// 参数名（非参数节点为 None）
    pub fn name(&self) -> Result<Option<String>, GraphError> {
        Ok(self
            .graph
            .borrow()
            .get_node_name(self.id)?
            .map(str::to_string))
    }

    pub fn is_parameter(&self) -> Result<bool, GraphError> {
        Ok(matches!(
            self.graph.borrow().node_kind(self.id)?,
            NodeKind::Parameter
        ))
    }

    // ==================== 执行 ====================

    /// 反向传播，返回 loss 的标量值
    pub fn backward(&self) -> Result<f32, GraphError> {
        self.graph.borrow_mut().backward(self.id)
    }

    // ==================== 梯度流控制 ====================

    /// 截断梯度流：返回一个值相同、但不再与上游相连的新 Var
    pub fn detach(&self) -> Result<Self, GraphError> {
        let value = self.value()?;
        let id = self.graph.borrow_mut().new_input_node(value);
        Ok(Self::new(id, Rc::clone(&self.graph)))
    }

    // ==================== 运算 ====================

    pub fn try_add(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(other, Op::Add, "加法")
    }

    pub fn try_sub(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(other, Op::Sub, "减法")
    }

    /// 逐元素乘法（支持广播）
    pub fn try_mul(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(other, Op::Mul, "乘法")
    }

    /// 逐元素除法（支持广播）
    pub fn try_div(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(other, Op::Div, "除法")
    }

    /// 矩阵乘法：[n, k] x [k, m] -> [n, m]
    pub fn matmul(&self, other: &Self) -> Result<Self, GraphError> {
        self.binary(other, Op::MatMul, "矩阵乘法")
    }

    pub fn try_neg(&self) -> Result<Self, GraphError> {
        self.unary(Op::Neg)
    }

    /// 乘以纯数
    pub fn scale(&self, factor: f32) -> Result<Self, GraphError> {
        self.unary(Op::Scale(factor))
    }

    /// 加上纯数
    pub fn add_scalar(&self, value: f32) -> Result<Self, GraphError> {
        self.unary(Op::AddScalar(value))
    }

    pub fn relu(&self) -> Result<Self, GraphError> {
        self.unary(Op::Relu)
    }

    pub fn leaky_relu(&self, negative_slope: f32) -> Result<Self, GraphError> {
        self.unary(Op::LeakyRelu(negative_slope))
    }

    pub fn tanh(&self) -> Result<Self, GraphError> {
        self.unary(Op::Tanh)
    }

    pub fn sigmoid(&self) -> Result<Self, GraphError> {
        self.unary(Op::Sigmoid)
    }

    pub fn exp(&self) -> Result<Self, GraphError> {
        self.unary(Op::Exp)
    }

    /// 全部元素求和，结果形状为[1]
    pub fn sum(&self) -> Result<Self, GraphError> {
        self.unary(Op::Sum)
    }

    /// 全部元素求均值，结果形状为[1]
    pub fn mean(&self) -> Result<Self, GraphError> {
        self.unary(Op::Mean)
    }

    /// 沿指定维度求均值并保留这些维度
    pub fn mean_axes_keepdim(&self, axes: &[usize]) -> Result<Self, GraphError> {
        self.unary(Op::MeanAxesKeepdim(axes.to_vec()))
    }

    pub fn reshape(&self, shape: &[usize]) -> Result<Self, GraphError> {
        self.unary(Op::Reshape(shape.to_vec()))
    }

    pub fn broadcast_to(&self, shape: &[usize]) -> Result<Self, GraphError> {
        self.unary(Op::BroadcastTo(shape.to_vec()))
    }

    /// 沿最后一维做 log-sum-exp（保留该维）
    pub fn log_sum_exp_last(&self) -> Result<Self, GraphError> {
        self.unary(Op::LogSumExpLast)
    }

    /// 按扁平索引表重排元素（None处补零），输出形状为`shape`
    pub fn gather_flat(&self, index: Rc<[Option<usize>]>, shape: &[usize]) -> Result<Self, GraphError> {
        self.unary(Op::GatherFlat {
            index,
            shape: shape.to_vec(),
        })
    }

    /// 沿`axis`拼接多个 Var（须来自同一个 Graph）
    pub fn concat(vars: &[&Self], axis: usize) -> Result<Self, GraphError> {
        let first = vars
            .first()
            .ok_or_else(|| GraphError::InvalidOperation("拼接列表为空".to_string()))?;
        for var in &vars[1..] {
            first.ensure_same_graph(var, "拼接")?;
        }
        let ids = vars.iter().map(|v| v.id).collect::<Vec<_>>();
        first.push_op(Op::Concat(axis), &ids)
    }
}

// ==================== 算子重载 ====================

macro_rules! impl_var_binary_op {
    ($trait:ident, $method:ident, $try_method:ident, $msg:literal) => {
        impl $trait for &Var {
            type Output = Var;

            fn $method(self, other: &Var) -> Var {
                self.$try_method(other).expect($msg)
            }
        }
        impl $trait for Var {
            type Output = Var;

            fn $method(self, other: Var) -> Var {
                (&self).$method(&other)
            }
        }
        impl $trait<Var> for &Var {
            type Output = Var;

            fn $method(self, other: Var) -> Var {
                self.$method(&other)
            }
        }
        impl $trait<&Var> for Var {
            type Output = Var;

            fn $method(self, other: &Var) -> Var {
                (&self).$method(other)
            }
        }
    };
}

impl_var_binary_op!(Add, add, try_add, "Var 加法失败");
impl_var_binary_op!(Sub, sub, try_sub, "Var 减法失败");
impl_var_binary_op!(Mul, mul, try_mul, "Var 乘法失败");
impl_var_binary_op!(Div, div, try_div, "Var 除法失败");

impl Neg for &Var {
    type Output = Var;

    fn neg(self) -> Var {
        self.try_neg().expect("Var 取反失败")
    }
}

impl Neg for Var {
    type Output = Self;

    fn neg(self) -> Self {
        -&self
    }
}
