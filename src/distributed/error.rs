use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectiveError {
    #[error("通信组的共享状态已损坏（某个 worker 在持锁时 panic）")]
    Poisoned,
    #[error("rank {rank} 提交的缓冲区长度为{got}，而 rank 0 为{expected}")]
    LengthMismatch {
        rank: usize,
        expected: usize,
        got: usize,
    },
    #[error("广播源 rank {root} 超出通信组大小{world_size}")]
    InvalidRoot { root: usize, world_size: usize },
    #[error("worker {0} 异常退出")]
    WorkerPanicked(usize),
    #[error("通信组大小必须大于0")]
    EmptyGroup,
}
