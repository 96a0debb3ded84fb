use super::Tensor;
use crate::errors::TensorError;
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

impl Tensor {
    /// 将形状为[C, H, W]、值域[0, 1]的张量转为`DynamicImage`（超出值域的像素会被截断）。
    /// C为1、3、4时分别对应灰度、RGB、RGBA。
    pub fn to_image(&self) -> Result<DynamicImage, TensorError> {
        if self.dimension() != 3 {
            return Err(TensorError::IncompatibleShape);
        }
        let (channels, height, width) = (self.shape()[0], self.shape()[1], self.shape()[2]);
        let view = self.data();
        let pixel = |c: usize, y: u32, x: u32| -> u8 {
            let v = view[[c, y as usize, x as usize]];
            (v.clamp(0.0, 1.0) * 255.0).round() as u8
        };
        let (w, h) = (width as u32, height as u32);
        match channels {
            1 => Ok(DynamicImage::ImageLuma8(GrayImage::from_fn(w, h, |x, y| {
                image::Luma([pixel(0, y, x)])
            }))),
            3 => Ok(DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
                image::Rgb([pixel(0, y, x), pixel(1, y, x), pixel(2, y, x)])
            }))),
            4 => Ok(DynamicImage::ImageRgba8(RgbaImage::from_fn(w, h, |x, y| {
                image::Rgba([
                    pixel(0, y, x),
                    pixel(1, y, x),
                    pixel(2, y, x),
                    pixel(3, y, x),
                ])
            }))),
            c => Err(TensorError::InvalidChannels(c)),
        }
    }

    /// 将图像转为形状为[C, H, W]、值域[0, 1]的张量，`channels`决定转换的颜色模式
    pub fn from_image(image: &DynamicImage, channels: usize) -> Result<Self, TensorError> {
        let (width, height) = (image.width() as usize, image.height() as usize);
        let raw: Vec<u8> = match channels {
            1 => image.to_luma8().into_raw(),
            3 => image.to_rgb8().into_raw(),
            4 => image.to_rgba8().into_raw(),
            c => return Err(TensorError::InvalidChannels(c)),
        };
        // 原始数据是HWC交错排列，这里转为CHW
        let mut data = vec![0.0; raw.len()];
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let src = (y * width + x) * channels + c;
                    let dst = c * height * width + y * width + x;
                    data[dst] = f32::from(raw[src]) / 255.0;
                }
            }
        }
        Ok(Self::new(&data, &[channels, height, width]))
    }

    /// 把形状为[N, C, H, W]的批次拼成一张网格图[C, H', W']，每行`nrow`张，图与图之间留`padding`像素空隙。
    pub fn make_grid(&self, nrow: usize, padding: usize) -> Result<Self, TensorError> {
        if self.dimension() != 4 || self.shape()[0] == 0 {
            return Err(TensorError::IncompatibleShape);
        }
        let (n, c, h, w) = (
            self.shape()[0],
            self.shape()[1],
            self.shape()[2],
            self.shape()[3],
        );
        let ncol = nrow.max(1).min(n);
        let nrows = n.div_ceil(ncol);
        let grid_h = nrows * (h + padding) + padding;
        let grid_w = ncol * (w + padding) + padding;
        let mut grid = Self::zeros(&[c, grid_h, grid_w]);
        let src = self.data();
        let dst = grid.data_mut();
        for i in 0..n {
            let top = (i / ncol) * (h + padding) + padding;
            let left = (i % ncol) * (w + padding) + padding;
            for ch in 0..c {
                for y in 0..h {
                    for x in 0..w {
                        dst[[ch, top + y, left + x]] = src[[i, ch, y, x]];
                    }
                }
            }
        }
        Ok(grid)
    }
}
