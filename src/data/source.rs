/*
 * @Author       : 老董
 * @Date         : 2025-01-21
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-10
 * @Description  : 批次来源：调度器通过它拿到形状为[N, C, H, W]的图像批次
 */

use super::DataError;
use crate::gan::ImageShape;
use crate::tensor::Tensor;
use rand::Rng;
use rand::rngs::StdRng;

/// 图像批次的来源
///
/// 采样使用调用方传入的 RNG：同一 (seed, rank, step, attempt) 总能得到同一批数据，
/// 重试时换一个 attempt 即可重新抽样。
pub trait BatchSource {
    /// 抽取`batch_size`张图像，形状[batch_size, C, H, W]
    fn next_batch(&mut self, batch_size: usize, rng: &mut StdRng) -> Result<Tensor, DataError>;

    /// 样本数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 单张图像的形状[C, H, W]
    fn image_shape(&self) -> ImageShape;
}

/// TensorImages - 内存中的图像数据集
///
/// # 示例
/// ```ignore
/// let images = TensorImages::new(Tensor::uniform_with_rng(0.0, 1.0, &[64, 3, 8, 8], &mut rng))?;
/// let batch = images.next_batch(16, &mut rng)?;
/// ```
#[derive(Clone)]
pub struct TensorImages {
    images: Tensor,
}

impl TensorImages {
    /// `images`形状须为[N, C, H, W]且N > 0
    pub fn new(images: Tensor) -> Result<Self, DataError> {
        if images.dimension() != 4 {
            return Err(DataError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: images.shape().to_vec(),
            });
        }
        if images.shape()[0] == 0 {
            return Err(DataError::Empty("TensorImages".to_string()));
        }
        Ok(Self { images })
    }

    pub fn images(&self) -> &Tensor {
        &self.images
    }

    /// 取第`index`张图像，形状[1, C, H, W]
    pub fn get(&self, index: usize) -> Tensor {
        self.images.narrow(0, index, 1)
    }
}

impl BatchSource for TensorImages {
    fn next_batch(&mut self, batch_size: usize, rng: &mut StdRng) -> Result<Tensor, DataError> {
        if batch_size == 0 {
            return Err(DataError::ZeroBatchSize);
        }
        let picked = (0..batch_size)
            .map(|_| self.get(rng.gen_range(0..self.len())))
            .collect::<Vec<_>>();
        Ok(Tensor::concat(&picked.iter().collect::<Vec<_>>(), 0))
    }

    fn len(&self) -> usize {
        self.images.shape()[0]
    }

    fn image_shape(&self) -> ImageShape {
        let shape = self.images.shape();
        [shape[1], shape[2], shape[3]]
    }
}
