use super::{Cli, Command, GenerateArgs, RunArgs, run};
use crate::checkpoint::LoadMode;
use crate::data::{ColorMode, TensorImages};
use crate::distributed::WorkerGroup;
use crate::eval::GenerateKind;
use crate::loss::LossKind;
use crate::tensor::Tensor;
use crate::train::{ConfigError, RunConfig, Trainer};
use crate::utils::{RngStream, derive_rng};
use clap::Parser;

#[test]
fn test_train_args_override_defaults() {
    let cli = Cli::try_parse_from([
        "lightweight-gan",
        "train",
        "--name",
        "faces",
        "--color-mode",
        "greyscale",
        "--aug-types",
        "color,cutout",
        "--batch-size",
        "3",
        "--loss",
        "dual_contrastive",
        "--relaxed",
        "--no-augment-generator",
    ])
    .unwrap();
    let Command::Train(args) = cli.command else {
        panic!("应解析为 train 子命令");
    };
    let config = args.to_config().unwrap();
    assert_eq!(config.name, "faces");
    assert_eq!(config.color_mode, ColorMode::Greyscale);
    assert_eq!(config.aug_types, ["color", "cutout"]);
    assert_eq!(config.batch_size, 3);
    assert_eq!(config.loss, LossKind::DualContrastive);
    assert_eq!(config.load_mode, LoadMode::Relaxed);
    assert!(!config.augment_generator);
    // 未给出的参数保持默认值
    assert_eq!(config.learning_rate, RunConfig::default().learning_rate);
    assert_eq!(config.gradient_accumulate_every, 4);
}

#[test]
fn test_config_file_is_the_base() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    let base = RunConfig {
        name: "from_file".into(),
        latent_dim: 16,
        ..RunConfig::default()
    };
    std::fs::write(&path, base.to_json().unwrap()).unwrap();

    let args = RunArgs {
        config: Some(path),
        hidden_dim: Some(7),
        ..RunArgs::default()
    };
    let config = args.to_config().unwrap();
    assert_eq!(config.name, "from_file");
    assert_eq!(config.latent_dim, 16);
    assert_eq!(config.hidden_dim, 7);
}

#[test]
fn test_unknown_augmentation_is_rejected() {
    let cli = Cli::try_parse_from(["lightweight-gan", "train", "--aug-types", "cutout,blur"]).unwrap();
    let Command::Train(args) = cli.command else {
        panic!("应解析为 train 子命令");
    };
    assert!(matches!(args.to_config(), Err(ConfigError::Augment(_))));
}

#[test]
fn test_bad_enum_values_fail_to_parse() {
    assert!(Cli::try_parse_from(["lightweight-gan", "train", "--optimizer", "lbfgs"]).is_err());
    assert!(Cli::try_parse_from(["lightweight-gan", "generate", "--color-mode", "cmyk"]).is_err());
}

#[test]
fn test_generate_without_checkpoint_is_restore_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Cli {
        command: Command::Generate(GenerateArgs {
            run: RunArgs {
                models_dir: Some(dir.path().join("models")),
                results_dir: Some(dir.path().join("results")),
                ..RunArgs::default()
            },
            types: None,
        }),
    };
    let error = run(cli).unwrap_err();
    assert_eq!(error.exit_code(), 3);
}

#[test]
fn test_generate_types_parse() {
    let cli = Cli::try_parse_from(["lightweight-gan", "generate", "--types", "ema"]).unwrap();
    let Command::Generate(args) = cli.command else {
        panic!("应解析为 generate 子命令");
    };
    assert_eq!(args.kinds(), [GenerateKind::Ema]);
    assert!(Cli::try_parse_from(["lightweight-gan", "generate", "--types", "best"]).is_err());
}

#[test]
fn test_show_progress_renders_every_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let models = dir.path().join("models");
    let results = dir.path().join("results");
    let config = RunConfig {
        name: "walk".into(),
        models_dir: models.clone(),
        results_dir: results.clone(),
        image_size: 4,
        color_mode: ColorMode::Greyscale,
        latent_dim: 3,
        hidden_dim: 5,
        batch_size: 2,
        gradient_accumulate_every: 1,
        num_train_steps: 3,
        aug_types: Vec::new(),
        save_every: 1,
        evaluate_every: 100,
        ..RunConfig::default()
    };
    let mut rng = derive_rng(0, RngStream::Data, 0, 0, 0);
    let mut source =
        TensorImages::new(Tensor::uniform_with_rng(0.0, 1.0, &[4, 1, 4, 4], &mut rng)).unwrap();
    Trainer::new(config, WorkerGroup::local())
        .unwrap()
        .train(&mut source)
        .unwrap();

    let (models, results) = (models.display().to_string(), results.display().to_string());
    let cli = Cli::try_parse_from([
        "lightweight-gan",
        "show-progress",
        "--name",
        "walk",
        "--models-dir",
        models.as_str(),
        "--results-dir",
        results.as_str(),
        "--num-image-tiles",
        "2",
        "--types",
        "ema",
    ])
    .unwrap();
    run(cli).unwrap();

    let progress = dir.path().join("results/walk/progress");
    for index in 1..=3 {
        assert!(progress.join(format!("{index}-ema.png")).exists());
        assert!(!progress.join(format!("{index}.png")).exists());
    }
}

#[test]
fn test_show_progress_without_checkpoint_is_restore_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cli = Cli {
        command: Command::ShowProgress(GenerateArgs {
            run: RunArgs {
                models_dir: Some(dir.path().join("models")),
                ..RunArgs::default()
            },
            types: None,
        }),
    };
    assert_eq!(run(cli).unwrap_err().exit_code(), 3);
}
