/*
 * @Author       : 老董
 * @Date         : 2026-02-11
 * @LastEditors  : 老董
 * @LastEditTime : 2026-03-02
 * @Description  : 张量保存与加载
 */

use crate::tensor::Tensor;
use std::io::Cursor;

#[test]
fn test_save_load_tensor() {
    let orig_tensor = Tensor::new(&[1., 2., 3., 4., 5., 6.], &[2, 3]).unwrap();
    let mut buffer = Vec::new();
    orig_tensor.save(&mut buffer).unwrap();

    let loaded_tensor = Tensor::load(&mut Cursor::new(buffer)).unwrap();
    assert_eq!(loaded_tensor, orig_tensor);
}

#[test]
fn test_load_truncated_payload() {
    let mut buffer = Vec::new();
    Tensor::ones(&[4, 4]).save(&mut buffer).unwrap();
    buffer.truncate(buffer.len() / 2);
    assert!(Tensor::load(&mut Cursor::new(buffer)).is_err());
}
