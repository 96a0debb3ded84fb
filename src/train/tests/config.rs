use crate::assert_err;
use crate::loss::LossKind;
use crate::train::{ConfigError, RunConfig};

#[test]
fn test_default_config_is_valid() {
    let config = RunConfig::default();
    config.validate().unwrap();
    assert_eq!(config.batch_size, 10);
    assert_eq!(config.gradient_accumulate_every, 4);
    assert_eq!(config.image_shape(), [3, 32, 32]);
    assert_eq!(config.aug_types, vec!["cutout", "translation"]);
}

#[test]
fn test_validate_rejects_bad_values() {
    let bad = [
        RunConfig {
            batch_size: 0,
            ..RunConfig::default()
        },
        RunConfig {
            ema_decay: 1.0,
            ..RunConfig::default()
        },
        RunConfig {
            aug_prob: 1.5,
            ..RunConfig::default()
        },
        RunConfig {
            keep_last: Some(0),
            ..RunConfig::default()
        },
        RunConfig {
            learning_rate: f32::NAN,
            ..RunConfig::default()
        },
    ];
    for config in bad {
        assert_err!(config.validate(), ConfigError::Invalid { .. });
    }

    let config = RunConfig {
        aug_types: vec!["color".to_string(), "blur".to_string()],
        ..RunConfig::default()
    };
    assert_err!(config.validate(), ConfigError::Augment(_));
}

#[test]
fn test_json_round_trip_with_partial_fields() {
    let config = RunConfig {
        name: "faces".to_string(),
        loss: LossKind::DualContrastive,
        ..RunConfig::default()
    };
    let json = config.to_json().unwrap();
    let back: RunConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, config);

    // 缺省的字段取默认值
    let partial: RunConfig = serde_json::from_str(r#"{"name": "x", "loss": "dual_contrastive"}"#).unwrap();
    assert_eq!(partial.name, "x");
    assert_eq!(partial.loss, LossKind::DualContrastive);
    assert_eq!(partial.save_every, 1000);
}

#[test]
fn test_adopt_topology_keeps_stored_shape() {
    let stored = RunConfig {
        image_size: 16,
        hidden_dim: 64,
        ..RunConfig::default()
    };
    let mut config = RunConfig {
        batch_size: 3,
        ..RunConfig::default()
    };
    config.adopt_topology(&stored);
    assert_eq!(config.image_size, 16);
    assert_eq!(config.hidden_dim, 64);
    assert_eq!(config.batch_size, 3);
}
