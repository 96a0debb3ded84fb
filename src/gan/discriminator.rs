use super::ImageShape;
use crate::nn::{Graph, GraphError, Linear, Module, Var};

/// 判别器：[N, C, H, W] -> 展平 -> Linear -> LeakyReLU(0.2) -> Linear -> [N, 1]
pub struct Discriminator {
    fc1: Linear,
    fc2: Linear,
    image_shape: ImageShape,
}

impl Discriminator {
    pub fn new(
        graph: &Graph,
        prefix: &str,
        hidden_dim: usize,
        image_shape: ImageShape,
    ) -> Result<Self, GraphError> {
        let in_features = image_shape.iter().product();
        Ok(Self {
            fc1: Linear::new(graph, in_features, hidden_dim, true, &format!("{prefix}.fc1"))?,
            fc2: Linear::new(graph, hidden_dim, 1, true, &format!("{prefix}.fc2"))?,
            image_shape,
        })
    }

    /// 返回每张图像的分数，形状[N, 1]
    pub fn forward(&self, images: &Var) -> Result<Var, GraphError> {
        let shape = images.shape()?;
        if shape.len() != 4 || shape[1..] != self.image_shape {
            return Err(GraphError::ShapeMismatch {
                expected: self.image_shape.to_vec(),
                got: shape,
                message: "判别器输入须为[N, C, H, W]".to_string(),
            });
        }
        let flat = images.reshape(&[shape[0], self.image_shape.iter().product()])?;
        let hidden = self.fc1.forward(&flat)?.leaky_relu(0.2)?;
        self.fc2.forward(&hidden)
    }

    pub const fn image_shape(&self) -> ImageShape {
        self.image_shape
    }
}

impl Module for Discriminator {
    fn parameters(&self) -> Vec<Var> {
        [self.fc1.parameters(), self.fc2.parameters()].concat()
    }
}
