use super::{AllReduceOp, Collective, CollectiveError};

/// 单 worker 的“通信组”：所有集合操作都是恒等
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalGroup;

impl Collective for LocalGroup {
    fn rank(&self) -> usize {
        0
    }

    fn world_size(&self) -> usize {
        1
    }

    fn all_reduce(&self, _buffer: &mut [f32], _op: AllReduceOp) -> Result<(), CollectiveError> {
        Ok(())
    }

    fn broadcast(&self, _buffer: &mut [f32], root: usize) -> Result<(), CollectiveError> {
        if root == 0 {
            Ok(())
        } else {
            Err(CollectiveError::InvalidRoot {
                root,
                world_size: 1,
            })
        }
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        Ok(())
    }
}
