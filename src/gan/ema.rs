/*
 * @Date         : 2026-03-06
 * @Description  : 生成器的指数滑动平均（EMA）影子
 */

use super::Generator;
use crate::nn::{GraphError, Module, Var};
use crate::tensor::Tensor;

/// 用`live`更新`shadow`：
/// - `step < warmup_steps`：硬拷贝；
/// - 否则逐元素`decay·shadow + (1−decay)·live`，以f64计算并夹回新旧值之间，
///   保证结果不会因舍入跑出两者构成的闭区间。
pub fn ema_update(
    shadow: &[Var],
    live: &[Var],
    decay: f32,
    step: u64,
    warmup_steps: u64,
) -> Result<(), GraphError> {
    if shadow.len() != live.len() {
        return Err(GraphError::InvalidOperation(format!(
            "EMA影子有{}个参数，而生成器有{}个",
            shadow.len(),
            live.len()
        )));
    }
    for (shadow_param, live_param) in shadow.iter().zip(live) {
        let live_value = live_param.value()?;
        if step < warmup_steps {
            shadow_param.set_value(&live_value)?;
            continue;
        }
        let old = shadow_param.value()?;
        let decay = f64::from(decay);
        let blended = old
            .as_slice()
            .iter()
            .zip(live_value.as_slice())
            .map(|(&s, &l)| {
                let v = (decay * f64::from(s) + (1.0 - decay) * f64::from(l)) as f32;
                v.clamp(s.min(l), s.max(l))
            })
            .collect::<Vec<_>>();
        shadow_param.set_value(&Tensor::new(&blended, old.shape()))?;
    }
    Ok(())
}

/// EMA 影子生成器：结构与在线生成器相同，只通过`update`改变，不属于任何优化器
pub struct EmaShadow {
    generator: Generator,
    decay: f32,
    warmup_steps: u64,
}

impl EmaShadow {
    pub const fn new(generator: Generator, decay: f32, warmup_steps: u64) -> Self {
        Self {
            generator,
            decay,
            warmup_steps,
        }
    }

    /// 在生成器的一次成功更新之后调用，`step`为自增之后的计数
    pub fn update(&self, live: &Generator, step: u64) -> Result<(), GraphError> {
        ema_update(
            &self.generator.parameters(),
            &live.parameters(),
            self.decay,
            step,
            self.warmup_steps,
        )
    }

    pub const fn generator(&self) -> &Generator {
        &self.generator
    }

    pub const fn decay(&self) -> f32 {
        self.decay
    }

    pub const fn warmup_steps(&self) -> u64 {
        self.warmup_steps
    }
}
