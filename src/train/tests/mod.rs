mod config;
mod retry;
mod scheduler;

use crate::data::ColorMode;
use crate::nn::OptimizerKind;
use crate::train::RunConfig;

/// 足够小、几秒内能跑完的配置
pub(super) fn tiny_config() -> RunConfig {
    RunConfig {
        image_size: 4,
        color_mode: ColorMode::Greyscale,
        latent_dim: 3,
        hidden_dim: 5,
        batch_size: 2,
        gradient_accumulate_every: 2,
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.1,
        aug_types: Vec::new(),
        ema_warmup_steps: 0,
        ..RunConfig::default()
    }
}
