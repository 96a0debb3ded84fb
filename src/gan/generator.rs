use super::ImageShape;
use crate::nn::{Graph, GraphError, Linear, Module, Var};
use crate::tensor::Tensor;
use rand::rngs::StdRng;

/// 生成器：latent -> Linear -> LeakyReLU(0.2) -> Linear -> Sigmoid -> [N, C, H, W]
///
/// 输出经 Sigmoid 落在(0, 1)，与数据批次的归一化范围一致。
pub struct Generator {
    fc1: Linear,
    fc2: Linear,
    latent_dim: usize,
    image_shape: ImageShape,
}

impl Generator {
    /// `prefix`为参数名前缀（如`generator`、`ema`）
    pub fn new(
        graph: &Graph,
        prefix: &str,
        latent_dim: usize,
        hidden_dim: usize,
        image_shape: ImageShape,
    ) -> Result<Self, GraphError> {
        let out_features = image_shape.iter().product();
        Ok(Self {
            fc1: Linear::new(graph, latent_dim, hidden_dim, true, &format!("{prefix}.fc1"))?,
            fc2: Linear::new(graph, hidden_dim, out_features, true, &format!("{prefix}.fc2"))?,
            latent_dim,
            image_shape,
        })
    }

    /// `latents`形状为[N, latent_dim]
    pub fn forward(&self, latents: &Var) -> Result<Var, GraphError> {
        let batch = latents.shape()?[0];
        let [c, h, w] = self.image_shape;
        let hidden = self.fc1.forward(latents)?.leaky_relu(0.2)?;
        self.fc2.forward(&hidden)?.sigmoid()?.reshape(&[batch, c, h, w])
    }

    /// 不求梯度地生成一批图像。会清空计算带，只能在两次训练步之间调用
    pub fn generate(&self, latents: &Tensor) -> Result<Tensor, GraphError> {
        let graph = self.fc1.weights().get_graph();
        let images = self.forward(&graph.input(latents)?)?.value();
        graph.clear_tape();
        images
    }

    pub const fn latent_dim(&self) -> usize {
        self.latent_dim
    }

    pub const fn image_shape(&self) -> ImageShape {
        self.image_shape
    }
}

impl Module for Generator {
    fn parameters(&self) -> Vec<Var> {
        [self.fc1.parameters(), self.fc2.parameters()].concat()
    }
}

/// 采样标准正态的潜变量[n, latent_dim]
pub fn sample_latents(n: usize, latent_dim: usize, rng: &mut StdRng) -> Tensor {
    Tensor::normal_with_rng(0.0, 1.0, &[n, latent_dim], rng)
}
