/*
 * @Date         : 2026-03-09
 * @Description  : 多 worker 数据并行的通信原语
 *
 * 每个 worker 持有一份完整的模型副本；启动时从 rank 0 广播参数，
 * 之后每次优化器更新前对梯度做 all-reduce（求均值），保证各副本始终一致。
 */

mod error;
mod local;
mod thread_group;

pub use error::CollectiveError;
pub use local::LocalGroup;
pub use thread_group::ThreadGroup;

/// 梯度合并方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllReduceOp {
    /// 求和
    Sum,
    /// 求均值（数据并行最常用）
    Average,
}

/// 集合通信句柄
pub trait Collective: Send {
    fn rank(&self) -> usize;

    fn world_size(&self) -> usize;

    /// 对所有 worker 的`buffer`逐元素规约，结果写回每个 worker 的`buffer`。
    /// 规约按 rank 顺序进行，各 worker 得到的结果逐位相同
    fn all_reduce(&self, buffer: &mut [f32], op: AllReduceOp) -> Result<(), CollectiveError>;

    /// 把`root`的`buffer`复制到所有 worker
    fn broadcast(&self, buffer: &mut [f32], root: usize) -> Result<(), CollectiveError>;

    fn barrier(&self) -> Result<(), CollectiveError>;
}

/// 本 worker 在组中的身份及通信句柄，训练开始前构造一次后注入调度器
pub struct WorkerGroup {
    collective: Box<dyn Collective>,
}

impl WorkerGroup {
    pub fn new(collective: Box<dyn Collective>) -> Self {
        Self { collective }
    }

    /// 单进程、单 worker
    pub fn local() -> Self {
        Self::new(Box::new(LocalGroup))
    }

    pub fn rank(&self) -> usize {
        self.collective.rank()
    }

    pub fn world_size(&self) -> usize {
        self.collective.world_size()
    }

    /// 只有 rank 0 负责写检查点、记录指标和评估
    pub fn is_main(&self) -> bool {
        self.rank() == 0
    }

    pub fn all_reduce_mean(&self, buffer: &mut [f32]) -> Result<(), CollectiveError> {
        self.collective.all_reduce(buffer, AllReduceOp::Average)
    }

    pub fn all_reduce_sum(&self, buffer: &mut [f32]) -> Result<(), CollectiveError> {
        self.collective.all_reduce(buffer, AllReduceOp::Sum)
    }

    pub fn broadcast(&self, buffer: &mut [f32], root: usize) -> Result<(), CollectiveError> {
        self.collective.broadcast(buffer, root)
    }

    pub fn barrier(&self) -> Result<(), CollectiveError> {
        self.collective.barrier()
    }
}

#[cfg(test)]
mod tests;
