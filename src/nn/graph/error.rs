/*
 * @Author       : 老董
 * @Date         : 2026-01-27
 * @Description  : Graph 模块的错误类型
 */

use super::NodeId;
use thiserror::Error;

/// Graph 操作错误类型
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("节点{0:?}不存在（可能已随计算带被清除）")]
    NodeNotFound(NodeId),
    #[error("参数`{0}`不存在")]
    ParameterNotFound(String),
    #[error("非法操作：{0}")]
    InvalidOperation(String),
    #[error("形状不匹配：预期{expected:?}，实际{got:?}（{message}）")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },
    #[error("计算错误：{0}")]
    ComputationError(String),
    #[error("参数名`{0}`重复")]
    DuplicateName(String),
}
