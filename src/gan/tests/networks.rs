use crate::gan::{Discriminator, Generator, sample_latents};
use crate::nn::{Graph, GraphError, Module};
use crate::utils::{RngStream, derive_rng};

#[test]
fn test_generator_output_shape_and_range() -> Result<(), GraphError> {
    let graph = Graph::new_with_seed(42);
    let g = Generator::new(&graph, "generator", 8, 16, [3, 4, 4])?;
    let mut rng = derive_rng(42, RngStream::Latent, 0, 0, 0);
    let z = graph.input(&sample_latents(5, 8, &mut rng))?;
    let images = g.forward(&z)?.value()?;
    assert_eq!(images.shape(), &[5, 3, 4, 4]);
    assert!(images.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    Ok(())
}

#[test]
fn test_discriminator_scores_each_image() -> Result<(), GraphError> {
    let graph = Graph::new_with_seed(42);
    let g = Generator::new(&graph, "generator", 8, 16, [1, 4, 4])?;
    let d = Discriminator::new(&graph, "discriminator", 16, [1, 4, 4])?;
    let mut rng = derive_rng(1, RngStream::Latent, 0, 0, 0);
    let z = graph.input(&sample_latents(3, 8, &mut rng))?;
    let scores = d.forward(&g.forward(&z)?)?;
    assert_eq!(scores.shape()?, vec![3, 1]);

    // 判别器的损失只应把梯度传给双方各自的参数
    scores.mean()?.backward()?;
    assert!(d.parameters().iter().all(|p| p.grad().unwrap().is_some()));
    assert!(g.parameters().iter().all(|p| p.grad().unwrap().is_some()));
    Ok(())
}

#[test]
fn test_discriminator_rejects_wrong_image_shape() -> Result<(), GraphError> {
    let graph = Graph::new_with_seed(42);
    let d = Discriminator::new(&graph, "discriminator", 4, [3, 4, 4])?;
    let x = graph.input(&crate::tensor::Tensor::zeros(&[2, 1, 4, 4]))?;
    assert!(matches!(d.forward(&x), Err(GraphError::ShapeMismatch { .. })));
    Ok(())
}

#[test]
fn test_prefixes_keep_networks_apart() -> Result<(), GraphError> {
    let graph = Graph::new_with_seed(0);
    Generator::new(&graph, "generator", 2, 3, [1, 2, 2])?;
    Generator::new(&graph, "ema", 2, 3, [1, 2, 2])?;
    Discriminator::new(&graph, "discriminator", 3, [1, 2, 2])?;
    assert_eq!(graph.parameters_with_prefix("generator.").len(), 4);
    assert_eq!(graph.parameters_with_prefix("ema.").len(), 4);
    assert_eq!(graph.parameters_with_prefix("discriminator.").len(), 4);
    Ok(())
}

#[test]
fn test_generate_leaves_only_parameters() -> Result<(), GraphError> {
    let graph = Graph::new_with_seed(7);
    let g = Generator::new(&graph, "generator", 4, 8, [1, 2, 2])?;
    let mut rng = derive_rng(7, RngStream::Eval, 0, 0, 0);
    let images = g.generate(&sample_latents(6, 4, &mut rng))?;
    assert_eq!(images.shape(), &[6, 1, 2, 2]);
    assert_eq!(graph.num_nodes(), g.num_params());
    Ok(())
}
