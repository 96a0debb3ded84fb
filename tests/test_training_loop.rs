/*
 * @Date         : 2026-03-18
 * @Description  : 训练循环集成测试
 *                 验证：完整的小规模训练（检查点、样例图、FID）、梯度累积等价、
 *                 NaN 连续失败时放弃训练且不污染已保存的状态、固定噪声样例逐像素一致
 */

use approx::assert_abs_diff_eq;
use lightweight_gan::checkpoint::{CheckpointManager, CheckpointRef};
use lightweight_gan::data::{ColorMode, TensorImages};
use lightweight_gan::distributed::WorkerGroup;
use lightweight_gan::eval::{Evaluator, PooledStatsExtractor};
use lightweight_gan::gan::sample_latents;
use lightweight_gan::nn::OptimizerKind;
use lightweight_gan::tensor::Tensor;
use lightweight_gan::train::{
    RunConfig, StepInputs, StepScheduler, TrainError, Trainer,
};
use lightweight_gan::utils::{RngStream, derive_rng};
use std::fs;
use std::path::Path;

fn tiny_config(dir: &Path) -> RunConfig {
    RunConfig {
        name: "tiny".into(),
        models_dir: dir.join("models"),
        results_dir: dir.join("results"),
        image_size: 4,
        color_mode: ColorMode::Greyscale,
        latent_dim: 3,
        hidden_dim: 5,
        batch_size: 2,
        gradient_accumulate_every: 2,
        num_train_steps: 6,
        optimizer: OptimizerKind::Sgd,
        learning_rate: 0.05,
        aug_types: Vec::new(),
        ema_warmup_steps: 0,
        save_every: 2,
        evaluate_every: 3,
        calculate_fid_every: Some(3),
        calculate_fid_num_images: 4,
        num_image_tiles: 2,
        log_every: 2,
        ..RunConfig::default()
    }
}

fn images(seed: u64) -> TensorImages {
    let mut rng = derive_rng(seed, RngStream::Data, 0, 0, 0);
    TensorImages::new(Tensor::uniform_with_rng(0.0, 1.0, &[8, 1, 4, 4], &mut rng)).unwrap()
}

fn trainer(config: &RunConfig) -> Trainer {
    Trainer::new(config.clone(), WorkerGroup::local()).unwrap()
}

#[test]
fn test_full_run_writes_checkpoints_samples_and_fid() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path());
    let mut trainer = trainer(&config);
    let summary = trainer.train(&mut images(1)).unwrap();

    assert_eq!(summary.step, 6);
    let manager = CheckpointManager::new(&config.models_dir, "tiny", None);
    assert_eq!(summary.checkpoint, Some(manager.path(3)));
    assert_eq!(manager.indices().unwrap(), vec![1, 2, 3]);
    assert_eq!(manager.latest_index().unwrap(), Some(3));
    assert_eq!(manager.load_config().unwrap().as_ref(), Some(&config));

    let results = config.results_dir.join("tiny");
    for index in [1, 2] {
        for suffix in ["", "-ema", "-fixed", "-fixed-ema"] {
            assert!(results.join(format!("{index}{suffix}.png")).exists());
        }
    }
    assert_eq!(summary.fid_scores.len(), 2);
    assert!(summary.fid_scores.iter().all(|s| s.value.is_finite()));
    let scores = fs::read_to_string(results.join("fid_scores.txt")).unwrap();
    assert_eq!(scores.lines().count(), 2);
    assert!(results.join("fid_reference.bin").exists());

    // 检查点里的状态与训练结束时一致
    let (_, state) = manager.load(CheckpointRef::Latest).unwrap();
    assert_eq!(state, trainer.scheduler().state());
}

#[test]
fn test_accumulated_step_equals_large_batch_step() {
    let dir = tempfile::tempdir().unwrap();
    let accumulate_config = tiny_config(dir.path());
    let single_config = RunConfig {
        batch_size: 4,
        gradient_accumulate_every: 1,
        ..accumulate_config.clone()
    };
    let mut accumulated = StepScheduler::new(&accumulate_config, WorkerGroup::local()).unwrap();
    let mut single = StepScheduler::new(&single_config, WorkerGroup::local()).unwrap();

    let mut rng = derive_rng(9, RngStream::Data, 0, 0, 0);
    let real: Vec<_> = (0..2)
        .map(|_| Tensor::uniform_with_rng(0.0, 1.0, &[2, 1, 4, 4], &mut rng))
        .collect();
    let d_latents: Vec<_> = (0..2).map(|_| sample_latents(2, 3, &mut rng)).collect();
    let g_latents: Vec<_> = (0..2).map(|_| sample_latents(2, 3, &mut rng)).collect();
    let join = |list: &[Tensor]| vec![Tensor::concat(&list.iter().collect::<Vec<_>>(), 0)];

    let a = accumulated
        .step_with(
            &StepInputs {
                real: real.clone(),
                discriminator_latents: d_latents.clone(),
                generator_latents: g_latents.clone(),
            },
            0,
        )
        .unwrap();
    let b = single
        .step_with(
            &StepInputs {
                real: join(&real),
                discriminator_latents: join(&d_latents),
                generator_latents: join(&g_latents),
            },
            0,
        )
        .unwrap();

    assert_abs_diff_eq!(a.discriminator_loss, b.discriminator_loss, epsilon = 1e-5);
    assert_abs_diff_eq!(a.generator_loss, b.generator_loss, epsilon = 1e-5);
    let (a, b) = (accumulated.state().parameters(), single.state().parameters());
    assert_eq!(a.len(), b.len());
    for (name, value) in &a {
        for (x, y) in value.as_slice().iter().zip(b[name].as_slice()) {
            assert_abs_diff_eq!(x, y, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_persistent_nan_aborts_without_touching_checkpoints() {
    let dir = tempfile::tempdir().unwrap();
    let config = RunConfig {
        num_train_steps: 2,
        calculate_fid_every: None,
        ..tiny_config(dir.path())
    };
    trainer(&config).train(&mut images(2)).unwrap();
    let manager = CheckpointManager::new(&config.models_dir, "tiny", None);
    let saved = fs::read(manager.path(1)).unwrap();

    let resumed = RunConfig {
        num_train_steps: 4,
        ..config.clone()
    };
    let mut trainer = trainer(&resumed);
    assert_eq!(trainer.scheduler().step_count(), 2);
    let before = trainer.scheduler().state();

    let mut poisoned =
        TensorImages::new(Tensor::full(f32::NAN, &[8, 1, 4, 4])).unwrap();
    let error = trainer.train(&mut poisoned).unwrap_err();
    assert!(matches!(
        error,
        TrainError::FatalInstability { step: 2, attempts: 3, .. }
    ));
    assert_eq!(error.exit_code(), 2);

    assert_eq!(trainer.scheduler().step_count(), 2);
    assert_eq!(trainer.scheduler().state(), before);
    assert_eq!(manager.latest_index().unwrap(), Some(1));
    assert_eq!(manager.indices().unwrap(), vec![1]);
    assert_eq!(fs::read(manager.path(1)).unwrap(), saved);
}

#[test]
fn test_fixed_latent_samples_are_pixel_identical() {
    let dir = tempfile::tempdir().unwrap();
    let config = tiny_config(dir.path());
    let mut trainer = trainer(&config);
    trainer.train(&mut images(3)).unwrap();

    // 另起一个评估器，使用同一种子：固定噪声相同，参数未变，图像应逐字节一致
    let other = RunConfig {
        results_dir: dir.path().join("again"),
        ..config.clone()
    };
    let mut evaluator = Evaluator::new(&other, Box::new(PooledStatsExtractor::default()));
    let scheduler = trainer.scheduler();
    let written = evaluator
        .evaluate(scheduler.generator(), scheduler.ema().generator(), 2)
        .unwrap();

    let original = config.results_dir.join("tiny");
    for path in &written[2..] {
        let name = path.file_name().unwrap();
        assert_eq!(fs::read(path).unwrap(), fs::read(original.join(name)).unwrap());
    }
}

#[test]
fn test_new_run_discards_previous_results() {
    let reused = tempfile::tempdir().unwrap();
    let config = tiny_config(reused.path());
    trainer(&config).train(&mut images(1)).unwrap();
    let results = config.results_dir.join("tiny");
    fs::write(results.join("stale.png"), b"old").unwrap();

    // 同一目录下以 new 重新开始，换一份数据
    let restarted = RunConfig {
        new: true,
        ..config.clone()
    };
    let reused_summary = trainer(&restarted).train(&mut images(7)).unwrap();
    assert!(!results.join("stale.png").exists());
    let scores = fs::read_to_string(results.join("fid_scores.txt")).unwrap();
    assert_eq!(scores.lines().count(), 2);

    // 与在全新目录里训练同一份数据的结果一致
    let clean = tempfile::tempdir().unwrap();
    let clean_summary = trainer(&tiny_config(clean.path()))
        .train(&mut images(7))
        .unwrap();
    assert_eq!(reused_summary.fid_scores, clean_summary.fid_scores);
}
