/*
 * @Date         : 2026-03-18
 * @Description  : 多 worker 集成测试
 *                 验证：2 个 worker 各跑一个 micro-batch，与单 worker 累积同样两个 micro-batch 的结果一致；
 *                 多线程训练只有 rank 0 写检查点
 */

use approx::assert_abs_diff_eq;
use lightweight_gan::checkpoint::CheckpointManager;
use lightweight_gan::data::{ColorMode, DataError, TensorImages};
use lightweight_gan::distributed::{ThreadGroup, WorkerGroup};
use lightweight_gan::gan::sample_latents;
use lightweight_gan::nn::OptimizerKind;
use lightweight_gan::tensor::Tensor;
use lightweight_gan::train::{
    MetricsSink, RunConfig, StepInputs, StepScheduler, TracingSink, TrainingState, train_workers,
};
use lightweight_gan::utils::{RngStream, derive_rng};
use std::collections::BTreeMap;

fn config(accumulate: usize) -> RunConfig {
    RunConfig {
        image_size: 4,
        color_mode: ColorMode::Greyscale,
        latent_dim: 3,
        hidden_dim: 5,
        batch_size: 2,
        gradient_accumulate_every: accumulate,
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.1,
        aug_types: Vec::new(),
        ema_warmup_steps: 0,
        ..RunConfig::default()
    }
}

/// 第`i`个 micro-batch（真图、判别器噪声、生成器噪声）
fn micro_batch(i: u64) -> (Tensor, Tensor, Tensor) {
    let mut rng = derive_rng(21, RngStream::Data, 0, i, 0);
    (
        Tensor::uniform_with_rng(0.0, 1.0, &[2, 1, 4, 4], &mut rng),
        sample_latents(2, 3, &mut rng),
        sample_latents(2, 3, &mut rng),
    )
}

fn inputs(indices: &[u64]) -> StepInputs {
    let mut inputs = StepInputs {
        real: Vec::new(),
        discriminator_latents: Vec::new(),
        generator_latents: Vec::new(),
    };
    for &i in indices {
        let (real, d, g) = micro_batch(i);
        inputs.real.push(real);
        inputs.discriminator_latents.push(d);
        inputs.generator_latents.push(g);
    }
    inputs
}

fn assert_parameters_close(a: &BTreeMap<String, Tensor>, b: &BTreeMap<String, Tensor>) {
    assert_eq!(a.keys().collect::<Vec<_>>(), b.keys().collect::<Vec<_>>());
    for (name, value) in a {
        for (x, y) in value.as_slice().iter().zip(b[name].as_slice()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_two_workers_match_single_worker_accumulation() {
    let distributed_config = config(1);
    let states: Vec<TrainingState> = ThreadGroup::launch(2, |group| {
        let group = WorkerGroup::new(Box::new(group));
        let rank = group.rank() as u64;
        let mut scheduler = StepScheduler::new(&distributed_config, group).unwrap();
        for step in 0..2 {
            scheduler.step_with(&inputs(&[step * 2 + rank]), 0).unwrap();
        }
        scheduler.state()
    })
    .unwrap();

    let mut single = StepScheduler::new(&config(2), WorkerGroup::local()).unwrap();
    for step in 0..2 {
        single.step_with(&inputs(&[step * 2, step * 2 + 1]), 0).unwrap();
    }
    let expected = single.state();

    for state in &states {
        assert_eq!(state.step, 2);
        assert_parameters_close(&state.parameters(), &expected.parameters());
    }
    // 两个 worker 的参数完全相同
    assert_eq!(states[0].parameters(), states[1].parameters());
}

#[test]
fn test_threaded_training_only_rank_zero_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        name: "threads".into(),
        models_dir: dir.path().join("models"),
        results_dir: dir.path().join("results"),
        world_size: 2,
        num_train_steps: 3,
        save_every: 1,
        evaluate_every: 3,
        num_image_tiles: 2,
        ..config(1)
    };
    let summaries = train_workers(
        &config,
        |rank| -> Result<TensorImages, DataError> {
            let mut rng = derive_rng(7, RngStream::Data, rank, 0, 0);
            TensorImages::new(Tensor::uniform_with_rng(0.0, 1.0, &[4, 1, 4, 4], &mut rng))
        },
        |_| -> Box<dyn MetricsSink> { Box::new(TracingSink) },
    )
    .unwrap();

    assert_eq!(summaries.len(), 2);
    assert!(summaries.iter().all(|s| s.step == 3));
    let manager = CheckpointManager::new(&config.models_dir, "threads", None);
    assert_eq!(summaries[0].checkpoint, Some(manager.path(3)));
    assert_eq!(summaries[1].checkpoint, None);
    assert_eq!(manager.indices().unwrap(), vec![1, 2, 3]);
    assert!(config.results_dir.join("threads/1.png").exists());
}
