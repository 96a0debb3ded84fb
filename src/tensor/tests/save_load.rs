use crate::tensor::Tensor;

#[test]
fn test_save_load_tensor() {
    let orig_tensor = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[2, 3]);
    let mut buffer = Vec::new();
    orig_tensor.save(&mut buffer).unwrap();

    let loaded_tensor = Tensor::load(buffer.as_slice()).unwrap();
    assert_eq!(loaded_tensor, orig_tensor);
    assert_eq!(loaded_tensor.shape(), &[2, 3]);
}

#[test]
fn test_load_garbage_fails() {
    let garbage = [1u8, 2, 3];
    assert!(Tensor::load(garbage.as_slice()).is_err());
}
