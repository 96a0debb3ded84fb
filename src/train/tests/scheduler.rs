use super::tiny_config;
use crate::assert_err;
use crate::checkpoint::{CheckpointError, LoadMode};
use crate::distributed::WorkerGroup;
use crate::gan::sample_latents;
use crate::nn::OptimizerKind;
use crate::tensor::Tensor;
use crate::train::{Phase, RunConfig, StepError, StepInputs, StepScheduler, Substep};
use crate::utils::{RngStream, derive_rng};
use approx::assert_abs_diff_eq;

fn scheduler(config: &RunConfig) -> StepScheduler {
    StepScheduler::new(config, WorkerGroup::local()).unwrap()
}

/// K 个 micro-batch，每个 B 张 [1, 4, 4] 图像
fn inputs(k: usize, b: usize, seed: u64) -> StepInputs {
    let mut rng = derive_rng(seed, RngStream::Data, 0, 0, 0);
    let real = (0..k)
        .map(|_| Tensor::uniform_with_rng(0.0, 1.0, &[b, 1, 4, 4], &mut rng))
        .collect();
    let mut draw = || (0..k).map(|_| sample_latents(b, 3, &mut rng)).collect();
    let discriminator_latents = draw();
    let generator_latents = draw();
    StepInputs {
        real,
        discriminator_latents,
        generator_latents,
    }
}

fn merged(inputs: &StepInputs) -> StepInputs {
    let cat = |list: &[Tensor]| vec![Tensor::concat(&list.iter().collect::<Vec<_>>(), 0)];
    StepInputs {
        real: cat(&inputs.real),
        discriminator_latents: cat(&inputs.discriminator_latents),
        generator_latents: cat(&inputs.generator_latents),
    }
}

fn assert_states_close(a: &StepScheduler, b: &StepScheduler) {
    let (a, b) = (a.state(), b.state());
    for (name, value) in a.parameters() {
        let other = &b.parameters()[&name];
        for (x, y) in value.as_slice().iter().zip(other.as_slice()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_accumulated_micro_batches_match_single_batch() {
    let config = tiny_config();
    let mut accumulated = scheduler(&config);
    let mut single = scheduler(&config);
    assert_eq!(accumulated.state(), single.state());

    let split = inputs(4, 2, 11);
    let a = accumulated.step_with(&split, 0).unwrap();
    let b = single.step_with(&merged(&split), 0).unwrap();

    assert_eq!((a.step, b.step), (1, 1));
    assert_abs_diff_eq!(a.discriminator_loss, b.discriminator_loss, epsilon = 1e-5);
    assert_abs_diff_eq!(a.generator_loss, b.generator_loss, epsilon = 1e-5);
    assert_states_close(&accumulated, &single);
}

#[test]
fn test_nan_in_discriminator_substep_leaves_state_untouched() {
    let mut scheduler = scheduler(&tiny_config());
    scheduler.step_with(&inputs(2, 2, 1), 0).unwrap();
    let before = scheduler.state();

    let mut poisoned = inputs(2, 2, 2);
    poisoned.real[1] = Tensor::full(f32::NAN, &[2, 1, 4, 4]);
    let result = scheduler.step_with(&poisoned, 0);
    assert_err!(result, StepError::Unstable(e) if e.substep == Substep::Discriminator && e.step == 1);
    assert_eq!(scheduler.step_count(), 1);
    assert_eq!(scheduler.phase(), Phase::Idle);
    assert_eq!(scheduler.state(), before);
}

#[test]
fn test_nan_in_generator_substep_rolls_back_discriminator_update() {
    let mut scheduler = scheduler(&tiny_config());
    let before = scheduler.state();

    let mut poisoned = inputs(2, 2, 3);
    poisoned.generator_latents[0] = Tensor::full(f32::NAN, &[2, 3]);
    let result = scheduler.step_with(&poisoned, 1);
    assert_err!(result, StepError::Unstable(e) if e.substep == Substep::Generator && e.attempt == 1);
    assert_eq!(scheduler.step_count(), 0);
    assert_eq!(scheduler.state(), before);

    // 回滚之后还能正常继续
    assert_eq!(scheduler.step_with(&inputs(2, 2, 4), 2).unwrap().step, 1);
}

#[test]
fn test_wrong_image_shape_is_a_data_error() {
    let mut scheduler = scheduler(&tiny_config());
    let mut bad = inputs(1, 2, 5);
    bad.real[0] = Tensor::zeros(&[2, 3, 4, 4]);
    assert_err!(scheduler.step_with(&bad, 0), StepError::Data(_));
    assert_eq!(scheduler.step_count(), 0);
}

#[test]
fn test_overflow_skips_update_and_backs_off() {
    let config = RunConfig {
        amp: true,
        amp_init_scale: 1.0e30,
        ..tiny_config()
    };
    let mut scheduler = scheduler(&config);
    let before = scheduler.state();
    let outcome = scheduler.step_with(&inputs(2, 2, 6), 0).unwrap();

    assert!(outcome.discriminator_skipped);
    assert!(outcome.generator_skipped);
    assert_eq!(outcome.step, 1);
    assert_eq!(outcome.discriminator_scale, 0.5e30);
    let after = scheduler.state();
    assert_eq!(after.generator, before.generator);
    assert_eq!(after.discriminator, before.discriminator);
}

#[test]
fn test_amp_with_moderate_scale_updates() {
    let config = RunConfig {
        amp: true,
        amp_init_scale: 256.0,
        amp_growth_interval: 1,
        ..tiny_config()
    };
    let mut scheduler = scheduler(&config);
    let before = scheduler.state();
    let outcome = scheduler.step_with(&inputs(2, 2, 7), 0).unwrap();
    assert!(!outcome.discriminator_skipped);
    assert_eq!(outcome.discriminator_scale, 512.0);
    assert_ne!(scheduler.state().discriminator, before.discriminator);
}

#[test]
fn test_ema_tracks_generator_before_warmup() {
    let config = RunConfig {
        ema_warmup_steps: 10,
        ..tiny_config()
    };
    let mut scheduler = scheduler(&config);
    scheduler.step_with(&inputs(2, 2, 8), 0).unwrap();
    let state = scheduler.state();
    for (name, value) in &state.generator {
        let ema_name = name.replacen("generator", "ema", 1);
        assert_eq!(&state.ema[&ema_name], value);
    }
}

#[test]
fn test_load_state_strict_and_relaxed() {
    let config = RunConfig {
        optimizer: OptimizerKind::Adam,
        ..tiny_config()
    };
    let mut trained = scheduler(&config);
    trained.step_with(&inputs(2, 2, 9), 0).unwrap();
    let saved = trained.state();

    let mut fresh = scheduler(&RunConfig {
        seed: 1,
        ..config.clone()
    });
    let report = fresh.load_state(&saved, LoadMode::Strict).unwrap();
    assert!(report.is_exact());
    assert_eq!(fresh.state(), saved);

    // 隐藏层宽度不同：严格模式报错且不改变任何状态，宽松模式只应用匹配的部分
    let wider = RunConfig {
        hidden_dim: 6,
        ..config
    };
    let mut other = scheduler(&wider);
    let untouched = other.state();
    assert_err!(
        other.load_state(&saved, LoadMode::Strict),
        CheckpointError::TopologyMismatch { mismatched, .. } if !mismatched.is_empty()
    );
    assert_eq!(other.state(), untouched);

    let report = other.load_state(&saved, LoadMode::Relaxed).unwrap();
    assert!(!report.is_exact());
    assert!(report.mismatched.contains(&"generator.fc1.weight".to_string()));
    assert!(report.optimizers_reset);
    assert_eq!(other.step_count(), saved.step);
}
