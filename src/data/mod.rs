//! 数据加载模块
//!
//! 为训练循环提供图像批次。批次形状为`[N, C, H, W]`，数值归一化到`[0, 1]`。
//!
//! # 主要组件
//!
//! - [`BatchSource`]: 批次来源接口，调度器只依赖它
//! - [`TensorImages`]: 内存中的图像张量
//! - [`ImageFolder`]: 递归读取目录下的`jpg/jpeg/png`图像
//! - [`ColorMode`]: 颜色模式（决定通道数）
//! - [`DataError`]: 数据加载错误类型
//!
//! # 使用示例
//!
//! ```ignore
//! use lightweight_gan::data::{BatchSource, ColorMode, ImageFolder};
//!
//! let mut folder = ImageFolder::open("./data", 32, ColorMode::Rgb, 0.0)?;
//! let batch = folder.next_batch(10, &mut rng)?;
//! assert_eq!(batch.shape(), &[10, 3, 32, 32]);
//! ```

pub mod error;
mod image_folder;
mod source;


pub use error::DataError;
pub use image_folder::ImageFolder;
pub use source::{BatchSource, TensorImages};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 颜色模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Rgb,
    Rgba,
    Greyscale,
}

impl ColorMode {
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgb => 3,
            Self::Rgba => 4,
            Self::Greyscale => 1,
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rgb => "rgb",
            Self::Rgba => "rgba",
            Self::Greyscale => "greyscale",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "rgb" => Ok(Self::Rgb),
            "rgba" | "transparent" => Ok(Self::Rgba),
            "greyscale" | "grayscale" => Ok(Self::Greyscale),
            other => Err(format!("未知的颜色模式`{other}`（可选：rgb、rgba、greyscale）")),
        }
    }
}
