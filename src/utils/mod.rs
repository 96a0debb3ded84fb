//! # 常用接口模块
//!
//! 本模块提供一些常用的操作接口：单元测试用的断言宏、可复现随机数的派生。

pub mod macro_for_unit_test;
mod rng;

pub use rng::{RngStream, derive_rng};
