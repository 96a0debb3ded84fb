use crate::nn::GraphError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    /// `Latest`请求时目录下一个检查点也没有
    #[error("{0}下没有任何检查点")]
    NoCheckpoint(PathBuf),
    /// 指定序号的检查点文件不存在
    #[error("检查点不存在: {0}")]
    NotFound(PathBuf),
    #[error("检查点{path}已损坏：{reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("检查点编码失败: {0}")]
    Encode(#[from] bincode::Error),
    #[error("检查点 IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("运行配置读写失败: {0}")]
    Config(#[from] serde_json::Error),
    /// 严格模式下，检查点与当前网络的参数名或形状不一致
    #[error(
        "检查点与当前网络不匹配：缺失{missing:?}，多余{unexpected:?}，形状不符{mismatched:?}"
    )]
    TopologyMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
        mismatched: Vec<String>,
    },
    #[error("无法恢复参数或优化器状态：{0}")]
    Graph(#[from] GraphError),
}
