/*
 * @Date         : 2026-03-12
 * @Description  : 检查点：训练状态的原子保存与恢复
 *
 * 目录结构：`{models_dir}/{name}/model_{index}.bin`、`latest`（最新序号）、`config.json`。
 * 所有写入都先写临时文件再重命名，中途失败不会损坏已有的检查点。
 */

mod apply;
mod error;
mod manager;

pub use apply::{LoadMode, LoadReport, apply_parameters};
pub use error::CheckpointError;
pub use manager::{CheckpointManager, CheckpointRef, write_atomic};
