use crate::data::DataError;
use crate::errors::TensorError;
use crate::nn::GraphError;
use thiserror::Error;

/// 评估（FID、样例图、插值动画）相关错误，训练循环只记录不中止
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("评估 IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("图像编码失败: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Tensor(#[from] TensorError),
    #[error("计算图错误：{0}")]
    Graph(#[from] GraphError),
    #[error("数据错误：{0}")]
    Data(#[from] DataError),
    #[error("FID 缓存读写失败: {0}")]
    Cache(#[from] bincode::Error),
    #[error("统计特征至少需要{need}个样本，实际只有{got}个")]
    NotEnoughSamples { need: usize, got: usize },
    #[error("特征维度不一致：{0} 与 {1}")]
    DimensionMismatch(usize, usize),
}
