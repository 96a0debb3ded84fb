use crate::eval::{FeatureStats, FidCache, FixedLatentCache};
use ndarray::{Array2, array};

fn stats(value: f64) -> FeatureStats {
    FeatureStats {
        mean: array![value],
        cov: Array2::eye(1),
    }
}

#[test]
fn test_fid_cache_memory_then_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fid_reference.bin");

    let mut cache = FidCache::new(&path);
    let mut computed = 0;
    let first = cache
        .reference(8, [3, 4, 4], || {
            computed += 1;
            Ok(stats(1.0))
        })
        .unwrap()
        .clone();
    let second = cache
        .reference(8, [3, 4, 4], || {
            computed += 1;
            Ok(stats(2.0))
        })
        .unwrap()
        .clone();
    assert_eq!(computed, 1);
    assert_eq!(first, second);
    assert!(path.exists());

    // 新实例从磁盘读取
    let mut reopened = FidCache::new(&path);
    let from_disk = reopened
        .reference(8, [3, 4, 4], || panic!("不应重新计算"))
        .unwrap();
    assert_eq!(from_disk, &first);
}

#[test]
fn test_fid_cache_recomputes_on_key_change_and_invalidate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fid_reference.bin");
    let mut cache = FidCache::new(&path);
    cache.reference(8, [3, 4, 4], || Ok(stats(1.0))).unwrap();

    let changed = cache.reference(16, [3, 4, 4], || Ok(stats(5.0))).unwrap();
    assert_eq!(changed, &stats(5.0));

    cache.invalidate().unwrap();
    assert!(!path.exists());
    let again = cache.reference(16, [3, 4, 4], || Ok(stats(7.0))).unwrap();
    assert_eq!(again, &stats(7.0));
}

#[test]
fn test_fixed_latents_are_stable_until_invalidated() {
    let mut cache = FixedLatentCache::new(42);
    let first = cache.get(4, 3).clone();
    assert_eq!(first.shape(), &[4, 3]);
    assert_eq!(cache.get(4, 3), &first);

    cache.invalidate();
    // 同一种子重建后仍是同一批
    assert_eq!(cache.get(4, 3), &first);
    assert_ne!(FixedLatentCache::new(7).get(4, 3), &first);
}
