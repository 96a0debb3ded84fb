/*
 * @Date         : 2026-03-07
 * @Description  : 可微分数据增强（DiffAugment）
 *
 * 每个变换作用于[N, C, H, W]的Var，保持形状不变，且全程可微（梯度可经由被增强的假图传回生成器）。
 * 变换按给定顺序从左到右组合，每次调用从传入的RNG中抽取自己的随机数。
 */

mod color;
mod geometric;

pub use color::{Brightness, Contrast, Saturation};
pub use geometric::{Cutout, OffsetH, OffsetV, Translation};

use crate::nn::{GraphError, Var};
use crate::tensor::Tensor;
use enum_dispatch::enum_dispatch;
use rand::Rng;
use rand::rngs::StdRng;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AugmentError {
    #[error("未知的数据增强类型`{0}`（可选：color、brightness、saturation、contrast、translation、offset、offset_h、offset_v、cutout）")]
    UnknownTransform(String),
}

#[enum_dispatch]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Brightness,
    Saturation,
    Contrast,
    Translation,
    OffsetH,
    OffsetV,
    Cutout,
}

/// 所有增强变换的统一接口
#[enum_dispatch(Transform)]
pub trait TraitForTransform {
    fn name(&self) -> &'static str;
    /// 对整批图像施加变换，随机数取自`rng`
    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError>;
}

/// 把增强类型名解析为变换序列，`color`与`offset`会展开为各自的组成部分
pub fn parse_transforms<S: AsRef<str>>(names: &[S]) -> Result<Vec<Transform>, AugmentError> {
    let mut transforms = Vec::new();
    for name in names {
        match name.as_ref().trim() {
            "color" => transforms.extend([
                Transform::from(Brightness),
                Transform::from(Saturation),
                Transform::from(Contrast),
            ]),
            "brightness" => transforms.push(Brightness.into()),
            "saturation" => transforms.push(Saturation.into()),
            "contrast" => transforms.push(Contrast.into()),
            "translation" => transforms.push(Translation::default().into()),
            "offset" => transforms.extend([
                Transform::from(OffsetH::default()),
                Transform::from(OffsetV::default()),
            ]),
            "offset_h" => transforms.push(OffsetH::default().into()),
            "offset_v" => transforms.push(OffsetV::default().into()),
            "cutout" => transforms.push(Cutout::default().into()),
            other => return Err(AugmentError::UnknownTransform(other.to_string())),
        }
    }
    Ok(transforms)
}

/// 按顺序无条件地施加全部变换。空序列直接返回输入本身
pub fn augment(images: &Var, transforms: &[Transform], rng: &mut StdRng) -> Result<Var, GraphError> {
    transforms
        .iter()
        .try_fold(images.clone(), |x, transform| transform.apply(&x, rng))
}

/// 带施加概率的增强流水线：每次调用以`prob`的概率施加整个序列，否则原样返回
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentPipeline {
    transforms: Vec<Transform>,
    prob: f32,
}

impl AugmentPipeline {
    pub fn new(transforms: Vec<Transform>, prob: f32) -> Self {
        Self {
            transforms,
            prob: prob.clamp(0.0, 1.0),
        }
    }

    pub fn from_names<S: AsRef<str>>(names: &[S], prob: f32) -> Result<Self, AugmentError> {
        Ok(Self::new(parse_transforms(names)?, prob))
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        if self.transforms.is_empty() {
            return Ok(images.clone());
        }
        if rng.gen_range(0.0..1.0) >= self.prob {
            return Ok(images.clone());
        }
        augment(images, &self.transforms, rng)
    }
}

/// 图像批次的形状(N, C, H, W)，非4维时报错
fn image_dims(images: &Var) -> Result<(usize, usize, usize, usize), GraphError> {
    match images.shape()?.as_slice() {
        &[n, c, h, w] => Ok((n, c, h, w)),
        other => Err(GraphError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            got: other.to_vec(),
            message: "数据增强的输入须为[N, C, H, W]".to_string(),
        }),
    }
}

/// 每个样本一个[0, 1)均匀随机数，形状[N, 1, 1, 1]，可直接广播到整批图像
fn per_sample_uniform(n: usize, rng: &mut StdRng) -> Tensor {
    Tensor::uniform_with_rng(0.0, 1.0, &[n, 1, 1, 1], rng)
}

#[cfg(test)]
mod tests;
