use super::*;
use crate::nn::Graph;
use crate::utils::{RngStream, derive_rng};
use approx::assert_abs_diff_eq;

fn ramp_batch(n: usize, c: usize, h: usize, w: usize) -> Tensor {
    let data = (0..n * c * h * w)
        .map(|i| (i % 97) as f32 / 97.0)
        .collect::<Vec<_>>();
    Tensor::new(&data, &[n, c, h, w])
}

fn rng(attempt: u32) -> StdRng {
    derive_rng(7, RngStream::Augment, 0, 0, attempt)
}

#[test]
fn test_empty_spec_is_noop() {
    let graph = Graph::new();
    let x = graph.input(&ramp_batch(2, 3, 4, 4)).unwrap();
    let y = augment(&x, &[], &mut rng(0)).unwrap();
    assert_eq!(y.node_id(), x.node_id());

    let pipeline = AugmentPipeline::from_names::<&str>(&[], 1.0).unwrap();
    let y = pipeline.apply(&x, &mut rng(0)).unwrap();
    assert_eq!(y.node_id(), x.node_id());
    assert_eq!(y.value().unwrap(), ramp_batch(2, 3, 4, 4));
}

#[test]
fn test_zero_probability_is_identity() {
    let graph = Graph::new();
    let x = graph.input(&ramp_batch(2, 3, 4, 4)).unwrap();
    let pipeline = AugmentPipeline::from_names(&["color", "cutout"], 0.0).unwrap();
    let y = pipeline.apply(&x, &mut rng(0)).unwrap();
    assert_eq!(y.node_id(), x.node_id());
}

#[test]
fn test_parse_expands_groups() {
    let transforms = parse_transforms(&["color", "offset", "cutout"]).unwrap();
    let names = transforms.iter().map(|t| t.name()).collect::<Vec<_>>();
    assert_eq!(
        names,
        vec!["brightness", "saturation", "contrast", "offset_h", "offset_v", "cutout"]
    );
    assert_eq!(
        parse_transforms(&["zoom"]),
        Err(AugmentError::UnknownTransform("zoom".to_string()))
    );
}

#[test]
fn test_every_transform_preserves_shape_and_is_differentiable() {
    let all = parse_transforms(&["color", "translation", "offset", "cutout"]).unwrap();
    for transform in all {
        let graph = Graph::new();
        let w = graph.parameter("w", &ramp_batch(3, 2, 8, 8)).unwrap();
        let y = transform.apply(&w, &mut rng(1)).unwrap();
        assert_eq!(y.shape().unwrap(), vec![3, 2, 8, 8], "{}", transform.name());
        y.sum().unwrap().backward().unwrap();
        assert!(w.grad().unwrap().is_some(), "{}", transform.name());
    }
}

#[test]
fn test_same_rng_same_result() {
    let graph = Graph::new();
    let x = graph.input(&ramp_batch(4, 3, 8, 8)).unwrap();
    let transforms = parse_transforms(&["color", "translation", "cutout"]).unwrap();
    let a = augment(&x, &transforms, &mut rng(3)).unwrap().value().unwrap();
    let b = augment(&x, &transforms, &mut rng(3)).unwrap().value().unwrap();
    let c = augment(&x, &transforms, &mut rng(4)).unwrap().value().unwrap();
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn test_brightness_shifts_each_sample_uniformly() {
    let graph = Graph::new();
    let input = ramp_batch(3, 3, 4, 4);
    let x = graph.input(&input).unwrap();
    let y = Brightness.apply(&x, &mut rng(0)).unwrap().value().unwrap();
    let diff = &y - &input;
    for s in 0..3 {
        let sample = diff.narrow(0, s, 1);
        let first = sample.as_slice()[0];
        assert!((-0.5..0.5).contains(&first));
        for &v in sample.as_slice() {
            assert_abs_diff_eq!(v, first, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_offset_is_a_permutation_per_sample() {
    let graph = Graph::new();
    let input = ramp_batch(2, 1, 5, 6);
    let x = graph.input(&input).unwrap();
    for transform in [Transform::from(OffsetH::default()), OffsetV::default().into()] {
        let y = transform.apply(&x, &mut rng(2)).unwrap().value().unwrap();
        for s in 0..2 {
            let mut before = input.narrow(0, s, 1).to_vec();
            let mut after = y.narrow(0, s, 1).to_vec();
            before.sort_by(f32::total_cmp);
            after.sort_by(f32::total_cmp);
            assert_eq!(before, after);
        }
    }
}

#[test]
fn test_translation_only_moves_or_zeroes() {
    let graph = Graph::new();
    let x = graph.input(&Tensor::ones(&[4, 1, 8, 8])).unwrap();
    let y = Translation::default().apply(&x, &mut rng(5)).unwrap().value().unwrap();
    assert!(y.as_slice().iter().all(|&v| v == 0.0 || v == 1.0));
    // 最大平移为1像素，至少保留7x7
    for s in 0..4 {
        assert!(y.narrow(0, s, 1).sum_all() >= 49.0);
    }
}

#[test]
fn test_cutout_zeroes_a_clipped_rectangle() {
    let graph = Graph::new();
    let x = graph.input(&Tensor::ones(&[6, 2, 8, 8])).unwrap();
    let y = Cutout::default().apply(&x, &mut rng(6)).unwrap().value().unwrap();
    for s in 0..6 {
        let sample = y.narrow(0, s, 1);
        let zeros = sample.as_slice().iter().filter(|&&v| v == 0.0).count();
        // 两个通道挖同一个洞：单通道被裁后至少2x2，至多4x4
        assert!((8..=32).contains(&zeros), "zeros = {zeros}");
        assert_eq!(zeros % 2, 0);
    }
}
