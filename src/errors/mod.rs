use thiserror::Error;
mod ops;
pub use self::ops::*;

/// 张量层面的错误。张量运算本身沿用“误用即panic”的约定，这些错误主要用作panic信息；
/// 图（`nn`）层面的操作则会把它们包装成`GraphError`返回。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TensorError {
    #[error("数据长度须等于形状中各维的乘积{expected}，实际为{got}")]
    DataLengthMismatch { expected: usize, got: usize },
    // 张量二元运算
    #[error(
        "形状不一致，故无法{operator}：第一个张量的形状为{tensor1_shape:?}，第二个张量的形状为{tensor2_shape:?}"
    )]
    OperatorError {
        operator: Operator,
        tensor1_shape: Vec<usize>,
        tensor2_shape: Vec<usize>,
    },

    #[error("张量列表为空")]
    EmptyList,
    #[error("张量形状不兼容")]
    IncompatibleShape,
    #[error("维度{axis}超出范围：张量只有{rank}个维度")]
    AxisOutOfRange { axis: usize, rank: usize },
    #[error("图像张量的通道数只可能是1、3或4，实际为{0}")]
    InvalidChannels(usize),

    #[error("张量：未知错误")]
    UnKnown,
}
