/*
 * @Date         : 2026-03-09
 * @Description  : 进程内的多线程通信组：每个 worker 一个 OS 线程，经共享内存 + 屏障交换数据
 */

use super::{AllReduceOp, Collective, CollectiveError};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use tracing::debug;

struct Shared {
    world_size: usize,
    barrier: Barrier,
    /// 每个 rank 一个投递槽
    slots: Mutex<Vec<Vec<f32>>>,
}

/// 一个 worker 在进程内通信组中的句柄
pub struct ThreadGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadGroup {
    /// 创建`world_size`个互相连通的句柄，下标即 rank
    pub fn create(world_size: usize) -> Result<Vec<Self>, CollectiveError> {
        if world_size == 0 {
            return Err(CollectiveError::EmptyGroup);
        }
        let shared = Arc::new(Shared {
            world_size,
            barrier: Barrier::new(world_size),
            slots: Mutex::new(vec![Vec::new(); world_size]),
        });
        Ok((0..world_size)
            .map(|rank| Self {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect())
    }

    /// 为每个 rank 起一个线程运行`worker`，按 rank 顺序返回各自的结果
    pub fn launch<T, F>(world_size: usize, worker: F) -> Result<Vec<T>, CollectiveError>
    where
        T: Send,
        F: Fn(Self) -> T + Sync,
    {
        let groups = Self::create(world_size)?;
        debug!(world_size, "启动进程内通信组");
        thread::scope(|scope| {
            let handles = groups
                .into_iter()
                .map(|group| {
                    let worker = &worker;
                    scope.spawn(move || worker(group))
                })
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .enumerate()
                .map(|(rank, handle)| {
                    handle
                        .join()
                        .map_err(|_| CollectiveError::WorkerPanicked(rank))
                })
                .collect()
        })
    }

    fn lock_slots(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<f32>>>, CollectiveError> {
        self.shared
            .slots
            .lock()
            .map_err(|_| CollectiveError::Poisoned)
    }
}

impl Collective for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.shared.world_size
    }

    fn all_reduce(&self, buffer: &mut [f32], op: AllReduceOp) -> Result<(), CollectiveError> {
        self.lock_slots()?[self.rank] = buffer.to_vec();
        self.shared.barrier.wait();

        // 每个 rank 都按相同顺序独立规约，出错也要等到第二道屏障之后再返回，避免其它 worker 死等
        let reduced = {
            let slots = self.lock_slots()?;
            let expected = slots[0].len();
            match slots.iter().enumerate().find(|(_, s)| s.len() != expected) {
                Some((rank, s)) => Err(CollectiveError::LengthMismatch {
                    rank,
                    expected,
                    got: s.len(),
                }),
                None => {
                    let mut acc = slots[0].clone();
                    for slot in &slots[1..] {
                        for (a, v) in acc.iter_mut().zip(slot) {
                            *a += v;
                        }
                    }
                    if op == AllReduceOp::Average {
                        let n = self.shared.world_size as f32;
                        acc.iter_mut().for_each(|a| *a /= n);
                    }
                    Ok(acc)
                }
            }
        };
        self.shared.barrier.wait();

        let reduced = reduced?;
        buffer.copy_from_slice(&reduced);
        Ok(())
    }

    fn broadcast(&self, buffer: &mut [f32], root: usize) -> Result<(), CollectiveError> {
        if root >= self.shared.world_size {
            return Err(CollectiveError::InvalidRoot {
                root,
                world_size: self.shared.world_size,
            });
        }
        if self.rank == root {
            self.lock_slots()?[root] = buffer.to_vec();
        }
        self.shared.barrier.wait();
        let received = self.lock_slots()?[root].clone();
        self.shared.barrier.wait();

        if received.len() != buffer.len() {
            return Err(CollectiveError::LengthMismatch {
                rank: self.rank,
                expected: received.len(),
                got: buffer.len(),
            });
        }
        buffer.copy_from_slice(&received);
        Ok(())
    }

    fn barrier(&self) -> Result<(), CollectiveError> {
        self.shared.barrier.wait();
        Ok(())
    }
}
