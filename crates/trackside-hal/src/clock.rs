//! 单调毫秒时钟
//!
//! 控制核心的所有时间参数都是显式传入的 `now_ms`，核心自身从不读
//! 时钟。本模块是运行时一侧的时间来源：开机起算、只增不减、除断电
//! 外永不复位。

use std::time::Instant;

/// 单调时钟
///
/// 以构造时刻为零点。克隆出的副本共享同一零点（`Instant` 按值复制），
/// 因此脉冲注入线程与服务循环读到的是同一条时间轴。
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// 开机至今的毫秒数
    pub fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// 开机至今的微秒数（循环耗时统计用）
    pub fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}
