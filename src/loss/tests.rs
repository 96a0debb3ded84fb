use super::*;
use crate::nn::Graph;
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

fn scores(graph: &Graph, values: &[f32]) -> Var {
    graph
        .input(&Tensor::new(values, &[values.len(), 1]))
        .unwrap()
}

#[test]
fn test_hinge_values() {
    let graph = Graph::new();
    let real = scores(&graph, &[2.0, 0.5]);
    let fake = scores(&graph, &[-2.0, 0.0]);
    let loss = HingeLoss;
    // mean(relu(1-real)) = (0 + 0.5)/2, mean(relu(1+fake)) = (0 + 1)/2
    let d = loss.discriminator_loss(&real, &fake).unwrap().item().unwrap();
    assert_abs_diff_eq!(d, 0.75, epsilon = 1e-6);
    let g = loss.generator_loss(&fake, None).unwrap().item().unwrap();
    assert_abs_diff_eq!(g, 1.0, epsilon = 1e-6);
    assert!(!loss.needs_real_for_generator());
}

#[test]
fn test_dual_contrastive_values() {
    let graph = Graph::new();
    let real = scores(&graph, &[1.0]);
    let fake = scores(&graph, &[-1.0]);
    let loss = DualContrastiveLoss;
    // half(1, -1) = ln(e^1 + e^-1) - 1；half(1, -1) 再次出现于(-fake, -real)
    let expected = 2.0 * ((1f32.exp() + (-1f32).exp()).ln() - 1.0);
    let d = loss.discriminator_loss(&real, &fake).unwrap().item().unwrap();
    assert_abs_diff_eq!(d, expected, epsilon = 1e-5);

    let g = loss.generator_loss(&fake, Some(&real)).unwrap().item().unwrap();
    let expected_g = 2.0 * ((1f32.exp() + (-1f32).exp()).ln() + 1.0);
    assert_abs_diff_eq!(g, expected_g, epsilon = 1e-5);
    assert!(loss.needs_real_for_generator());
    assert!(loss.generator_loss(&fake, None).is_err());
}

#[test]
fn test_d_loss_decreases_as_real_scores_rise() {
    // 单调性：真图分数上升、假图分数下降时，D损失不增
    for kind in [LossKind::Hinge, LossKind::DualContrastive] {
        let loss = kind.build();
        let graph = Graph::new();
        let fake = scores(&graph, &[0.2, -0.3, 0.1]);
        let low = loss
            .discriminator_loss(&scores(&graph, &[0.1, 0.0, -0.2]), &fake)
            .unwrap()
            .item()
            .unwrap();
        let high = loss
            .discriminator_loss(&scores(&graph, &[0.9, 0.6, 0.4]), &fake)
            .unwrap()
            .item()
            .unwrap();
        assert!(high < low, "{kind}");
    }
}

#[test]
fn test_losses_are_scalar_and_differentiable() {
    for kind in [LossKind::Hinge, LossKind::DualContrastive] {
        let loss = kind.build();
        let graph = Graph::new();
        let real = graph.parameter("real", &Tensor::new(&[0.3, -0.2], &[2, 1])).unwrap();
        let fake = graph.parameter("fake", &Tensor::new(&[0.1, 0.4, -0.5], &[3, 1])).unwrap();
        let d = loss.discriminator_loss(&real, &fake).unwrap();
        assert_eq!(d.shape().unwrap(), vec![1]);
        d.backward().unwrap();
        assert!(real.grad().unwrap().is_some());
        assert!(fake.grad().unwrap().is_some());
    }
}

#[test]
fn test_kind_parse_and_display() {
    assert_eq!("dual_contrastive".parse::<LossKind>(), Ok(LossKind::DualContrastive));
    assert_eq!(LossKind::Hinge.to_string(), "hinge");
    assert!("wgan".parse::<LossKind>().is_err());
}
