//! # Lightweight GAN
//!
//! 用纯rust训练轻量级的生成对抗网络（GAN）。核心是训练编排：
//! 生成器/判别器交替更新、可微数据增强、梯度累积、混合精度（动态损失缩放）、
//! EMA影子生成器、多worker的梯度all-reduce、原子化的检查点与周期性的FID评估，
//! 并且在出现NaN时回滚整步、重试，不会污染已保存的状态。
//!

pub mod augment;
pub mod checkpoint;
pub mod cli;
pub mod data;
pub mod distributed;
pub mod errors;
pub mod eval;
pub mod gan;
pub mod loss;
pub mod nn;
pub mod tensor;
pub mod train;
pub mod utils;
