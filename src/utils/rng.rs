/*
 * @Date         : 2026-03-04
 * @Description  : 可复现随机数的派生。
 *                 不使用任何进程级全局RNG：所有需要随机性的组件都从(种子, 用途, 进程序号, 步数, 重试次数)
 *                 派生出独立的`StdRng`，同样的输入永远得到同样的随机序列。
 */

use rand::SeedableRng;
use rand::rngs::StdRng;

/// 随机数用途，不同用途之间互不干扰
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RngStream {
    /// 网络参数初始化
    Init,
    /// 从数据集抽取批次
    Data,
    /// 训练时的噪声
    Latent,
    /// 数据增强
    Augment,
    /// 评估时的随机样本
    Eval,
    /// 评估时缓存的固定噪声
    FixedLatent,
}

impl RngStream {
    const fn tag(self) -> u64 {
        match self {
            Self::Init => 0x11,
            Self::Data => 0x23,
            Self::Latent => 0x37,
            Self::Augment => 0x4b,
            Self::Eval => 0x5f,
            Self::FixedLatent => 0x61,
        }
    }
}

/// splitmix64 混合函数
const fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// 由(种子, 用途, 进程序号, 步数, 重试次数)派生一个确定性的RNG
pub fn derive_rng(seed: u64, stream: RngStream, rank: usize, step: u64, attempt: u32) -> StdRng {
    let mut state = mix(seed);
    for part in [stream.tag(), rank as u64, step, u64::from(attempt)] {
        state = mix(state ^ part);
    }
    StdRng::seed_from_u64(state)
}
