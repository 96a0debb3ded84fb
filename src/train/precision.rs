/*
 * @Date         : 2026-03-11
 * @Description  : 混合精度的动态损失缩放
 *
 * 梯度以 f16 精度表示（借助`half`做量化），超出 f16 范围即溢出为 Inf。
 * 每次优化器更新前先反缩放并检查溢出：溢出则跳过本次更新并把缩放系数减半（不低于1），
 * 连续`growth_interval`次成功后缩放系数翻倍。
 */

use half::f16;
use serde::{Deserialize, Serialize};

const GROWTH_FACTOR: f32 = 2.0;
const BACKOFF_FACTOR: f32 = 0.5;

/// 动态损失缩放器，随检查点一起保存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradScaler {
    enabled: bool,
    scale: f32,
    growth_interval: u32,
    /// 距上次增长（或溢出）以来的成功次数
    steps_since_growth: u32,
    overflow_count: u64,
}

impl GradScaler {
    pub fn new(init_scale: f32, growth_interval: u32) -> Self {
        Self {
            enabled: true,
            scale: init_scale.max(1.0),
            growth_interval,
            steps_since_growth: 0,
            overflow_count: 0,
        }
    }

    /// 关闭混合精度：缩放系数恒为1，梯度保持 f32
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            scale: 1.0,
            growth_interval: 0,
            steps_since_growth: 0,
            overflow_count: 0,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub const fn scale(&self) -> f32 {
        self.scale
    }

    pub const fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// 把（已缩放的）梯度舍入到 f16 精度
    pub fn quantize(&self, grads: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for g in grads.iter_mut() {
            *g = f16::from_f32(*g).to_f32();
        }
    }

    /// 原地反缩放，全部有限时返回 true
    pub fn unscale_and_check(&self, grads: &mut [f32]) -> bool {
        let inv_scale = 1.0 / self.scale;
        let mut finite = true;
        for g in grads.iter_mut() {
            *g *= inv_scale;
            finite &= g.is_finite();
        }
        finite
    }

    /// 每次优化器更新（或因溢出跳过）之后调用
    pub fn update(&mut self, grads_finite: bool) {
        if !self.enabled {
            return;
        }
        if grads_finite {
            self.steps_since_growth += 1;
            if self.steps_since_growth >= self.growth_interval {
                self.scale *= GROWTH_FACTOR;
                self.steps_since_growth = 0;
            }
        } else {
            self.overflow_count += 1;
            self.scale = (self.scale * BACKOFF_FACTOR).max(1.0);
            self.steps_since_growth = 0;
        }
    }
}

impl Default for GradScaler {
    fn default() -> Self {
        Self::disabled()
    }
}
