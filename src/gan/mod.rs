/*
 * @Date         : 2026-03-06
 * @Description  : 对抗网络对：生成器（噪声 -> 图像）、判别器（图像 -> 分数）以及生成器的EMA影子
 *
 * 两个网络不共享任何权重，参数名分别以`generator.`、`discriminator.`、`ema.`开头，
 * 检查点与优化器状态都按这些名字存取。
 */

mod discriminator;
mod ema;
mod generator;

pub use discriminator::Discriminator;
pub use ema::{EmaShadow, ema_update};
pub use generator::{Generator, sample_latents};

pub const GENERATOR_PREFIX: &str = "generator";
pub const DISCRIMINATOR_PREFIX: &str = "discriminator";
pub const EMA_PREFIX: &str = "ema";

/// 图像形状 [C, H, W]
pub type ImageShape = [usize; 3];

#[cfg(test)]
mod tests;
