/*
 * @Date         : 2026-03-10
 * @Description  : 图像目录数据集：递归发现 jpg/jpeg/png 文件，按需解码、转换颜色模式、缩放裁剪
 */

use super::{BatchSource, ColorMode, DataError};
use crate::gan::ImageShape;
use crate::tensor::Tensor;
use image::DynamicImage;
use image::imageops::FilterType;
use rand::Rng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

pub struct ImageFolder {
    root: PathBuf,
    paths: Vec<PathBuf>,
    image_size: usize,
    color_mode: ColorMode,
    /// 以此概率做随机缩放裁剪，否则缩放到短边后居中裁剪
    aug_prob: f32,
}

fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), DataError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e.to_lowercase().as_str()))
        {
            out.push(path);
        }
    }
    Ok(())
}

impl ImageFolder {
    pub fn open(
        root: impl AsRef<Path>,
        image_size: usize,
        color_mode: ColorMode,
        aug_prob: f32,
    ) -> Result<Self, DataError> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(DataError::FileNotFound(root));
        }
        let mut paths = Vec::new();
        collect_images(&root, &mut paths)?;
        if paths.is_empty() {
            return Err(DataError::Empty(format!(
                "{}下没有 jpg/jpeg/png 图像",
                root.display()
            )));
        }
        // 排序保证同一种子下的抽样与文件系统遍历顺序无关
        paths.sort();
        debug!(count = paths.len(), root = %root.display(), "发现训练图像");
        Ok(Self {
            root,
            paths,
            image_size,
            color_mode,
            aug_prob,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// 读入第`index`张图像并变换为[C, image_size, image_size]
    pub fn load(&self, index: usize, rng: &mut StdRng) -> Result<Tensor, DataError> {
        let path = &self.paths[index];
        let image = image::open(path).map_err(|source| DataError::Decode {
            path: path.clone(),
            source,
        })?;
        let image = self.resize(image, rng)?;
        Tensor::from_image(&image, self.color_mode.channels()).map_err(|_| {
            DataError::ShapeMismatch {
                expected: self.image_shape().to_vec(),
                got: vec![image.height() as usize, image.width() as usize],
            }
        })
    }

    pub(crate) fn resize(
        &self,
        image: DynamicImage,
        rng: &mut StdRng,
    ) -> Result<DynamicImage, DataError> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(DataError::EmptyImage { width, height });
        }
        let size = self.image_size as u32;
        let resized = if self.aug_prob > 0.0 && rng.gen_range(0.0..1.0) < self.aug_prob {
            // 随机缩放裁剪：在短边上取面积占比[0.5, 1]的正方形
            let short = width.min(height);
            let scale: f32 = rng.gen_range(0.5..=1.0);
            let side = ((short as f32 * scale.sqrt()) as u32).clamp(1, short);
            let x = rng.gen_range(0..=width - side);
            let y = rng.gen_range(0..=height - side);
            image
                .crop_imm(x, y, side, side)
                .resize_exact(size, size, FilterType::Triangle)
        } else {
            image.resize_to_fill(size, size, FilterType::Triangle)
        };
        Ok(resized)
    }
}

impl BatchSource for ImageFolder {
    fn next_batch(&mut self, batch_size: usize, rng: &mut StdRng) -> Result<Tensor, DataError> {
        if batch_size == 0 {
            return Err(DataError::ZeroBatchSize);
        }
        let [c, h, w] = self.image_shape();
        let images = (0..batch_size)
            .map(|_| {
                let index = rng.gen_range(0..self.paths.len());
                Ok(self.load(index, rng)?.reshape(&[1, c, h, w]))
            })
            .collect::<Result<Vec<_>, DataError>>()?;
        Ok(Tensor::concat(&images.iter().collect::<Vec<_>>(), 0))
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn image_shape(&self) -> ImageShape {
        [self.color_mode.channels(), self.image_size, self.image_size]
    }
}
