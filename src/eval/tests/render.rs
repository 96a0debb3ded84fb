use crate::augment::parse_transforms;
use crate::eval::{save_augmentation_preview, save_gif, save_grid, slerp};
use crate::tensor::Tensor;
use crate::utils::{RngStream, derive_rng};
use approx::assert_abs_diff_eq;

#[test]
fn test_slerp_endpoints_and_midpoint() {
    let low = Tensor::new(&[1.0, 0.0, 2.0, 0.0], &[2, 2]);
    let high = Tensor::new(&[0.0, 1.0, 4.0, 0.0], &[2, 2]);
    for (t, expected) in [(0.0, &low), (1.0, &high)] {
        let end = slerp(t, &low, &high);
        for (a, b) in end.as_slice().iter().zip(expected.as_slice()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-6);
        }
    }
    // 第一行正交：中点落在单位圆上；第二行共线：退化为线性插值
    let mid = slerp(0.5, &low, &high);
    let half = std::f32::consts::FRAC_1_SQRT_2;
    assert_abs_diff_eq!(mid.as_slice()[0], half, epsilon = 1e-6);
    assert_abs_diff_eq!(mid.as_slice()[1], half, epsilon = 1e-6);
    assert_abs_diff_eq!(mid.as_slice()[2], 3.0, epsilon = 1e-6);
}

#[test]
fn test_grid_and_gif_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = derive_rng(0, RngStream::Eval, 0, 0, 0);
    let images = Tensor::uniform_with_rng(0.0, 1.0, &[4, 3, 5, 5], &mut rng);

    let grid_path = dir.path().join("samples").join("1.png");
    save_grid(&images, 2, &grid_path).unwrap();
    let grid = image::open(&grid_path).unwrap();
    assert_eq!((grid.width(), grid.height()), (16, 16));

    let frames = vec![images.make_grid(2, 2).unwrap(); 3];
    let gif_path = dir.path().join("walk.gif");
    save_gif(&frames, &gif_path).unwrap();
    assert!(gif_path.metadata().unwrap().len() > 0);

    let transforms = parse_transforms(&["color", "cutout"]).unwrap();
    let preview_path = dir.path().join("aug.png");
    save_augmentation_preview(&images, &transforms, 4, &mut rng, &preview_path).unwrap();
    let preview = image::open(&preview_path).unwrap();
    assert_eq!((preview.width(), preview.height()), (30, 16));
}
