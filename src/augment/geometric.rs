/*
 * @Date         : 2026-03-07
 * @Description  : 几何类增强：平移（补零）、循环偏移、挖洞
 *
 * 这三类变换都只是“按索引重排像素，部分位置置零”，统一构造扁平索引表后交给`gather_flat`，
 * 反向时梯度按同一张表散射回去。
 */

use super::{TraitForTransform, image_dims};
use crate::nn::{GraphError, Var};
use rand::Rng;
use rand::rngs::StdRng;
use std::rc::Rc;

/// 平移：两个方向各做整数平移，移出的部分丢弃，空出的部分补零
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Translation {
    pub ratio: f32,
}

impl Default for Translation {
    fn default() -> Self {
        Self { ratio: 0.125 }
    }
}

/// 水平循环偏移（沿宽度roll）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetH {
    pub ratio: f32,
}

impl Default for OffsetH {
    fn default() -> Self {
        Self { ratio: 1.0 }
    }
}

/// 垂直循环偏移（沿高度roll）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetV {
    pub ratio: f32,
}

impl Default for OffsetV {
    fn default() -> Self {
        Self { ratio: 1.0 }
    }
}

/// 挖洞：在随机中心处把`H·ratio × W·ratio`的矩形置零
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutout {
    pub ratio: f32,
}

impl Default for Cutout {
    fn default() -> Self {
        Self { ratio: 0.5 }
    }
}

/// 按逐像素映射构造索引表：`source(n, y, x)`给出输出像素(y, x)取自输入的哪个(y', x')，None则补零
fn remap(
    images: &Var,
    mut source: impl FnMut(usize, usize, usize) -> Option<(usize, usize)>,
) -> Result<Var, GraphError> {
    let (n, c, h, w) = image_dims(images)?;
    let mut index = Vec::with_capacity(n * c * h * w);
    for s in 0..n {
        for ch in 0..c {
            let base = (s * c + ch) * h * w;
            for y in 0..h {
                for x in 0..w {
                    index.push(source(s, y, x).map(|(sy, sx)| base + sy * w + sx));
                }
            }
        }
    }
    let index: Rc<[Option<usize>]> = index.into();
    images.gather_flat(index, &[n, c, h, w])
}

/// 在[-max, max]内均匀取整数
fn signed_shift(max: i64, rng: &mut StdRng) -> i64 {
    rng.gen_range(-max..=max)
}

impl TraitForTransform for Translation {
    fn name(&self) -> &'static str {
        "translation"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, _, h, w) = image_dims(images)?;
        let max_y = (h as f32 * self.ratio + 0.5) as i64;
        let max_x = (w as f32 * self.ratio + 0.5) as i64;
        let shifts = (0..n)
            .map(|_| (signed_shift(max_y, rng), signed_shift(max_x, rng)))
            .collect::<Vec<_>>();
        remap(images, |s, y, x| {
            let (dy, dx) = shifts[s];
            let sy = y as i64 + dy;
            let sx = x as i64 + dx;
            ((0..h as i64).contains(&sy) && (0..w as i64).contains(&sx))
                .then_some((sy as usize, sx as usize))
        })
    }
}

/// 偏移量取`randint(0, max)·2 − max`，再按长度取模
fn roll_shift(len: usize, ratio: f32, rng: &mut StdRng) -> usize {
    let max = (len as f32 * ratio) as i64;
    let value = rng.gen_range(0..=max) * 2 - max;
    value.rem_euclid(len.max(1) as i64) as usize
}

impl TraitForTransform for OffsetH {
    fn name(&self) -> &'static str {
        "offset_h"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, _, _, w) = image_dims(images)?;
        let shifts = (0..n)
            .map(|_| roll_shift(w, self.ratio, rng))
            .collect::<Vec<_>>();
        remap(images, |s, y, x| Some((y, (x + shifts[s]) % w)))
    }
}

impl TraitForTransform for OffsetV {
    fn name(&self) -> &'static str {
        "offset_v"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, _, h, _) = image_dims(images)?;
        let shifts = (0..n)
            .map(|_| roll_shift(h, self.ratio, rng))
            .collect::<Vec<_>>();
        remap(images, |s, y, x| Some(((y + shifts[s]) % h, x)))
    }
}

impl TraitForTransform for Cutout {
    fn name(&self) -> &'static str {
        "cutout"
    }

    fn apply(&self, images: &Var, rng: &mut StdRng) -> Result<Var, GraphError> {
        let (n, _, h, w) = image_dims(images)?;
        let cut_h = (h as f32 * self.ratio + 0.5) as usize;
        let cut_w = (w as f32 * self.ratio + 0.5) as usize;
        // 中心点可以落在[0, len + (1 − cut % 2))内，矩形超出图像的部分被裁掉
        let boxes = (0..n)
            .map(|_| {
                let cy = rng.gen_range(0..h + (1 - cut_h % 2)) as i64;
                let cx = rng.gen_range(0..w + (1 - cut_w % 2)) as i64;
                let top = cy - (cut_h / 2) as i64;
                let left = cx - (cut_w / 2) as i64;
                (top, top + cut_h as i64, left, left + cut_w as i64)
            })
            .collect::<Vec<_>>();
        remap(images, |s, y, x| {
            let (top, bottom, left, right) = boxes[s];
            let inside = (top..bottom).contains(&(y as i64)) && (left..right).contains(&(x as i64));
            (!inside).then_some((y, x))
        })
    }
}
