use super::*;

#[test]
fn test_local_group_is_identity() {
    let group = WorkerGroup::local();
    let mut buffer = vec![1.0, 2.0];
    group.all_reduce_mean(&mut buffer).unwrap();
    assert_eq!(buffer, vec![1.0, 2.0]);
    assert!(group.is_main());
    assert_eq!(group.world_size(), 1);
    assert!(group.broadcast(&mut buffer, 1).is_err());
}

#[test]
fn test_thread_group_all_reduce() {
    let results = ThreadGroup::launch(3, |group| {
        let rank = group.rank() as f32;
        let mut mean = vec![rank, 10.0 * rank];
        group.all_reduce(&mut mean, AllReduceOp::Average).unwrap();
        let mut sum = vec![rank + 1.0];
        group.all_reduce(&mut sum, AllReduceOp::Sum).unwrap();
        (mean, sum)
    })
    .unwrap();
    for (mean, sum) in results {
        assert_eq!(mean, vec![1.0, 10.0]);
        assert_eq!(sum, vec![6.0]);
    }
}

#[test]
fn test_thread_group_broadcast_from_root() {
    let results = ThreadGroup::launch(4, |group| {
        let mut buffer = vec![group.rank() as f32; 3];
        group.broadcast(&mut buffer, 2).unwrap();
        group.barrier().unwrap();
        buffer
    })
    .unwrap();
    assert!(results.iter().all(|b| b == &vec![2.0; 3]));
}

#[test]
fn test_length_mismatch_is_reported_on_every_rank() {
    let results = ThreadGroup::launch(2, |group| {
        let mut buffer = vec![0.0; group.rank() + 1];
        group.all_reduce(&mut buffer, AllReduceOp::Sum)
    })
    .unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(CollectiveError::LengthMismatch { rank: 1, .. }))));
}

#[test]
fn test_empty_group_is_rejected() {
    assert_eq!(
        ThreadGroup::create(0).err(),
        Some(CollectiveError::EmptyGroup)
    );
}
