//! 数据加载错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 数据加载相关错误
#[derive(Debug, Error)]
pub enum DataError {
    /// 目录或文件未找到
    #[error("文件未找到: {0}")]
    FileNotFound(PathBuf),

    /// IO 错误
    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 图像解码失败
    #[error("无法解码图像 {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// 数据集为空
    #[error("数据集为空: {0}")]
    Empty(String),

    /// 形状不匹配
    #[error("形状不匹配: 期望 {expected:?}, 实际 {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// 解码出的图像宽或高为零
    #[error("图像尺寸为零: {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    /// 批大小非法
    #[error("批大小必须大于 0")]
    ZeroBatchSize,
}
