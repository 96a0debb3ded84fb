/*
 * @Author       : 老董
 * @Date         : 2026-03-05
 * @Description  : 优化器：更新规则与状态导出/恢复
 */

use crate::assert_err;
use crate::nn::optimizer::build_optimizer;
use crate::nn::{AdaBelief, Adam, Graph, GraphError, Optimizer, OptimizerKind, SGD};
use crate::tensor::Tensor;
use approx::assert_abs_diff_eq;

#[test]
fn test_sgd_step() -> Result<(), GraphError> {
    let graph = Graph::new();
    let w = graph.parameter("w", &Tensor::new(&[1.0, 2.0], &[2]))?;
    let mut sgd = SGD::new(&[w.clone()], 0.1)?;
    (&w * &w).sum()?.backward()?;
    sgd.step()?;
    // w - 0.1 * 2w
    let value = w.value()?;
    assert_abs_diff_eq!(value.as_slice()[0], 0.8, epsilon = 1e-6);
    assert_abs_diff_eq!(value.as_slice()[1], 1.6, epsilon = 1e-6);

    sgd.zero_grad()?;
    assert_eq!(w.grad()?, None);
    Ok(())
}

#[test]
fn test_adam_first_step_moves_by_lr() -> Result<(), GraphError> {
    // 首步偏差修正后 m_hat / sqrt(v_hat) = sign(g)
    let graph = Graph::new();
    let w = graph.parameter("w", &Tensor::new(&[1.0, -1.0], &[2]))?;
    let mut adam = Adam::new(&[w.clone()], 0.01, 0.5, 0.9)?;
    (&w * &w).sum()?.backward()?;
    adam.step()?;
    let value = w.value()?;
    assert_abs_diff_eq!(value.as_slice()[0], 0.99, epsilon = 1e-5);
    assert_abs_diff_eq!(value.as_slice()[1], -0.99, epsilon = 1e-5);
    Ok(())
}

#[test]
fn test_parameters_without_grad_are_untouched() -> Result<(), GraphError> {
    let graph = Graph::new();
    let w = graph.parameter("w", &Tensor::ones(&[2]))?;
    let mut adam = AdaBelief::new(&[w.clone()], 0.01, 0.5, 0.9)?;
    adam.step()?;
    assert_eq!(w.value()?, Tensor::ones(&[2]));
    Ok(())
}

#[test]
fn test_state_round_trip_continues_identically() -> Result<(), GraphError> {
    let run = |restore: bool| -> Result<Tensor, GraphError> {
        let graph = Graph::new();
        let w = graph.parameter("w", &Tensor::new(&[0.5, -0.3, 0.8], &[3]))?;
        let mut opt = build_optimizer(OptimizerKind::Adam, &[w.clone()], 0.05, (0.5, 0.9))?;
        for step in 0..4 {
            if restore && step == 2 {
                // 模拟从检查点恢复：新建优化器并载入状态
                let state = opt.state();
                opt = build_optimizer(OptimizerKind::Adam, &[w.clone()], 0.05, (0.5, 0.9))?;
                opt.load_state(&state)?;
            }
            opt.zero_grad()?;
            (&w * &w).sum()?.backward()?;
            opt.step()?;
            graph.clear_tape();
        }
        w.value()
    };
    assert_eq!(run(false)?, run(true)?);
    Ok(())
}

#[test]
fn test_load_state_rejects_other_kind() -> Result<(), GraphError> {
    let graph = Graph::new();
    let w = graph.parameter("w", &Tensor::ones(&[2]))?;
    let adam = Adam::new(&[w.clone()], 0.01, 0.5, 0.9)?;
    let mut sgd = SGD::new(&[w], 0.01)?;
    assert_err!(sgd.load_state(&adam.state()), GraphError::InvalidOperation(_));
    Ok(())
}

#[test]
fn test_optimizer_needs_named_parameters() -> Result<(), GraphError> {
    let graph = Graph::new();
    let x = graph.input(&Tensor::ones(&[2]))?;
    assert_err!(SGD::new(&[x], 0.1), GraphError::InvalidOperation(_));
    Ok(())
}

#[test]
fn test_kind_parse() {
    assert_eq!("adabelief".parse::<OptimizerKind>(), Ok(OptimizerKind::AdaBelief));
    assert_eq!("Adam".parse::<OptimizerKind>(), Ok(OptimizerKind::Adam));
    assert!("rmsprop".parse::<OptimizerKind>().is_err());
}
