/*
 * @Date         : 2026-03-15
 * @Description  : 把图像批次写成 PNG 网格、GIF 动画
 */

use super::EvalError;
use crate::augment::{Transform, augment};
use crate::nn::Graph;
use crate::tensor::Tensor;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, Frame};
use rand::rngs::StdRng;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

const GRID_PADDING: usize = 2;
const FRAME_DELAY_MS: u32 = 50;

/// 把[N, C, H, W]的批次拼成每行`nrow`张的网格并保存
pub fn save_grid(images: &Tensor, nrow: usize, path: &Path) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    images.make_grid(nrow, GRID_PADDING)?.to_image()?.save(path)?;
    Ok(())
}

/// 球面线性插值，逐行作用于[N, D]的两批潜变量
pub fn slerp(t: f32, low: &Tensor, high: &Tensor) -> Tensor {
    let d = low.shape()[1];
    let mut out = Vec::with_capacity(low.size());
    for (a, b) in low.as_slice().chunks(d).zip(high.as_slice().chunks(d)) {
        let norm = |v: &[f32]| v.iter().map(|x| x * x).sum::<f32>().sqrt().max(f32::EPSILON);
        let (na, nb) = (norm(a), norm(b));
        let cos = a
            .iter()
            .zip(b)
            .map(|(x, y)| (x / na) * (y / nb))
            .sum::<f32>()
            .clamp(-1.0, 1.0);
        let omega = cos.acos();
        let so = omega.sin();
        if so.abs() < 1e-6 {
            // 两者几乎共线，退化为线性插值
            out.extend(a.iter().zip(b).map(|(x, y)| (1.0 - t) * x + t * y));
        } else {
            let (wa, wb) = (((1.0 - t) * omega).sin() / so, (t * omega).sin() / so);
            out.extend(a.iter().zip(b).map(|(x, y)| wa * x + wb * y));
        }
    }
    Tensor::new(&out, low.shape())
}

/// 把若干张[C, H, W]的网格图写成循环播放的 GIF
pub fn save_gif(frames: &[Tensor], path: &Path) -> Result<(), EvalError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut encoder = GifEncoder::new(BufWriter::new(File::create(path)?));
    encoder.set_repeat(Repeat::Infinite)?;
    let delay = Delay::from_numer_denom_ms(FRAME_DELAY_MS, 1);
    for frame in frames {
        let rgba = frame.to_image()?.to_rgba8();
        encoder.encode_frame(Frame::from_parts(rgba, 0, 0, delay))?;
    }
    Ok(())
}

/// 对一批真图施加增强，原图在前、增强结果在后拼入同一张网格
pub fn save_augmentation_preview(
    images: &Tensor,
    transforms: &[Transform],
    nrow: usize,
    rng: &mut StdRng,
    path: &Path,
) -> Result<(), EvalError> {
    let graph = Graph::new();
    let augmented = augment(&graph.input(images)?, transforms, rng)?.value()?;
    let n = images.shape()[0];
    let both = Tensor::concat(&[images, &augmented], 0);
    save_grid(&both, nrow.min(n).max(1), path)
}
