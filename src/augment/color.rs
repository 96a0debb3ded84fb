use super::{TraitForTransform, image_dims, per_sample_uniform};
use crate::nn::{GraphError, Var};
use rand::rngs::StdRng;

/// 亮度：`x + (u − 0.5)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Brightness;

/// 饱和度：`(x − mean_c(x))·2u + mean_c(x)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Saturation;

/// 对比度：`(x − mean_chw(x))·(u + 0.5) + mean_chw(x)`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Contrast;

impl TraitForTransform for Brightness {
    fn name(&self) -> &'static str {
        "brightness"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, ..) = image_dims(images)?;
        let shift = images.get_graph().constant(&(per_sample_uniform(n, rng) - 0.5))?;
        images.try_add(&shift)
    }
}

impl TraitForTransform for Saturation {
    fn name(&self) -> &'static str {
        "saturation"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, ..) = image_dims(images)?;
        let factor = images.get_graph().constant(&(per_sample_uniform(n, rng) * 2.0))?;
        let mean = images.mean_axes_keepdim(&[1])?;
        images.try_sub(&mean)?.try_mul(&factor)?.try_add(&mean)
    }
}

impl TraitForTransform for Contrast {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, ..) = image_dims(images)?;
        let factor = images.get_graph().constant(&(per_sample_uniform(n, rng) + 0.5))?;
        let mean = images.mean_axes_keepdim(&[1, 2, 3])?;
        images.try_sub(&mean)?.try_mul(&factor)?.try_add(&mean)
    }
}
