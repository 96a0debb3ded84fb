/*
 * @Date         : 2026-03-11
 * @Description  : 训练运行配置：命令行、检查点旁的`config.json`与调度器共用同一份结构
 */

use crate::augment::{AugmentError, parse_transforms};
use crate::checkpoint::LoadMode;
use crate::data::ColorMode;
use crate::gan::ImageShape;
use crate::loss::LossKind;
use crate::nn::OptimizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置项`{field}`非法：{reason}")]
    Invalid { field: &'static str, reason: String },
    #[error(transparent)]
    Augment(#[from] AugmentError),
    #[error("读写配置文件失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("配置文件格式错误: {0}")]
    Json(#[from] serde_json::Error),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// 一次训练运行的全部配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub name: String,
    pub data: PathBuf,
    pub results_dir: PathBuf,
    pub models_dir: PathBuf,
    /// 为真时清空同名运行的旧检查点和结果，从头训练
    pub new: bool,
    /// 恢复训练时加载的检查点序号，None 表示最新
    pub load_from: Option<u64>,
    pub load_mode: LoadMode,

    // ---- 网络拓扑 ----
    pub image_size: usize,
    pub color_mode: ColorMode,
    pub latent_dim: usize,
    pub hidden_dim: usize,

    // ---- 优化 ----
    pub batch_size: usize,
    pub gradient_accumulate_every: usize,
    pub num_train_steps: u64,
    pub learning_rate: f32,
    /// 判别器学习率 = learning_rate * ttur_mult
    pub ttur_mult: f32,
    pub optimizer: OptimizerKind,
    pub adam_betas: (f32, f32),
    pub loss: LossKind,
    /// 单个逻辑步内因数值不稳定而重试的最大次数
    pub max_attempts: u32,

    // ---- 数据增强 ----
    pub aug_types: Vec<String>,
    pub aug_prob: f32,
    /// G子步是否也对生成图做增强
    pub augment_generator: bool,
    pub dataset_aug_prob: f32,

    // ---- EMA ----
    pub ema_decay: f32,
    pub ema_warmup_steps: u64,

    // ---- 混合精度 ----
    pub amp: bool,
    pub amp_init_scale: f32,
    pub amp_growth_interval: u32,

    // ---- 保存、评估、日志 ----
    pub save_every: u64,
    pub evaluate_every: u64,
    pub calculate_fid_every: Option<u64>,
    pub calculate_fid_num_images: usize,
    pub clear_fid_cache: bool,
    pub num_image_tiles: usize,
    pub keep_last: Option<usize>,
    pub log_every: u64,
    pub interpolation_num_steps: usize,
    pub save_frames: bool,

    pub seed: u64,
    pub world_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            data: PathBuf::from("./data"),
            results_dir: PathBuf::from("./results"),
            models_dir: PathBuf::from("./models"),
            new: false,
            load_from: None,
            load_mode: LoadMode::Strict,
            image_size: 32,
            color_mode: ColorMode::Rgb,
            latent_dim: 128,
            hidden_dim: 256,
            batch_size: 10,
            gradient_accumulate_every: 4,
            num_train_steps: 150_000,
            learning_rate: 2e-4,
            ttur_mult: 1.0,
            optimizer: OptimizerKind::Adam,
            adam_betas: (0.5, 0.9),
            loss: LossKind::Hinge,
            max_attempts: 3,
            aug_types: vec!["cutout".to_string(), "translation".to_string()],
            aug_prob: 0.0,
            augment_generator: true,
            dataset_aug_prob: 0.0,
            ema_decay: 0.995,
            ema_warmup_steps: 2000,
            amp: false,
            amp_init_scale: 65536.0,
            amp_growth_interval: 2000,
            save_every: 1000,
            evaluate_every: 1000,
            calculate_fid_every: None,
            calculate_fid_num_images: 12800,
            clear_fid_cache: false,
            num_image_tiles: 8,
            keep_last: None,
            log_every: 50,
            interpolation_num_steps: 100,
            save_frames: false,
            seed: 42,
            world_size: 1,
        }
    }
}

impl RunConfig {
    /// 单张图像的形状[C, H, W]
    pub fn image_shape(&self) -> ImageShape {
        [self.color_mode.channels(), self.image_size, self.image_size]
    }

    pub fn discriminator_learning_rate(&self) -> f32 {
        self.learning_rate * self.ttur_mult
    }

    /// 检查各项取值，返回第一个不合法的配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "不能为空"));
        }
        for (field, value) in [
            ("image_size", self.image_size),
            ("latent_dim", self.latent_dim),
            ("hidden_dim", self.hidden_dim),
            ("batch_size", self.batch_size),
            ("gradient_accumulate_every", self.gradient_accumulate_every),
            ("num_image_tiles", self.num_image_tiles),
            ("world_size", self.world_size),
        ] {
            if value == 0 {
                return Err(invalid(field, "必须大于0"));
            }
        }
        for (field, value) in [
            ("save_every", self.save_every),
            ("log_every", self.log_every),
        ] {
            if value == 0 {
                return Err(invalid(field, "必须大于0"));
            }
        }
        if self.calculate_fid_every == Some(0) {
            return Err(invalid("calculate_fid_every", "必须大于0"));
        }
        if self.calculate_fid_every.is_some() && self.calculate_fid_num_images == 0 {
            return Err(invalid("calculate_fid_num_images", "计算FID时必须大于0"));
        }
        if self.keep_last == Some(0) {
            return Err(invalid("keep_last", "至少保留1个检查点"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "必须大于0"));
        }
        for (field, value) in [
            ("learning_rate", self.learning_rate),
            ("ttur_mult", self.ttur_mult),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, format!("必须是正数，实际为{value}")));
            }
        }
        if !(self.ema_decay > 0.0 && self.ema_decay < 1.0) {
            return Err(invalid(
                "ema_decay",
                format!("必须在(0, 1)之间，实际为{}", self.ema_decay),
            ));
        }
        for (field, value) in [
            ("aug_prob", self.aug_prob),
            ("dataset_aug_prob", self.dataset_aug_prob),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("必须在[0, 1]之间，实际为{value}")));
            }
        }
        let (beta1, beta2) = self.adam_betas;
        if !((0.0..1.0).contains(&beta1) && (0.0..1.0).contains(&beta2)) {
            return Err(invalid("adam_betas", format!("必须在[0, 1)之间，实际为{:?}", self.adam_betas)));
        }
        if self.amp && !(self.amp_init_scale.is_finite() && self.amp_init_scale >= 1.0) {
            return Err(invalid("amp_init_scale", "必须不小于1"));
        }
        if self.amp && self.amp_growth_interval == 0 {
            return Err(invalid("amp_growth_interval", "必须大于0"));
        }
        parse_transforms(&self.aug_types)?;
        Ok(())
    }

    /// 恢复训练时网络拓扑以检查点旁保存的配置为准
    pub fn adopt_topology(&mut self, stored: &Self) {
        if self.image_shape() != stored.image_shape()
            || self.latent_dim != stored.latent_dim
            || self.hidden_dim != stored.hidden_dim
        {
            warn!(
                image_size = stored.image_size,
                color_mode = %stored.color_mode,
                latent_dim = stored.latent_dim,
                hidden_dim = stored.hidden_dim,
                "命令行给出的网络拓扑与已保存的不同，沿用已保存的配置"
            );
        }
        self.image_size = stored.image_size;
        self.color_mode = stored.color_mode;
        self.latent_dim = stored.latent_dim;
        self.hidden_dim = stored.hidden_dim;
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
