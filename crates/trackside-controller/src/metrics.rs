//! 运行计数器
//!
//! 原子计数器集合，服务循环与脉冲注入路径随手累加，任何线程可取
//! 一致的快照。只用 `Relaxed`：计数之间不需要相互排序。

use std::sync::atomic::{AtomicU64, Ordering};

/// 控制器运行计数器
#[derive(Debug, Default)]
pub struct ControllerMetrics {
    /// 计入的脉冲
    pub pulses_accepted: AtomicU64,
    /// 保护窗丢弃的脉冲
    pub pulses_discarded: AtomicU64,
    /// 注入队列满而丢失的脉冲
    pub pulses_dropped: AtomicU64,
    /// 成功分发的主机命令
    pub commands_dispatched: AtomicU64,
    /// 无法识别而忽略的令牌
    pub tokens_ignored: AtomicU64,
    /// 上报的单圈成绩
    pub laps_reported: AtomicU64,
    /// 上报的按键
    pub buttons_reported: AtomicU64,
    /// 出站写失败次数
    pub link_write_errors: AtomicU64,
    /// 单个服务节拍忙碌段的最大耗时（微秒，不含节拍休眠）
    pub loop_busy_us_max: AtomicU64,
}

impl ControllerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取一份计数快照
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pulses_accepted: self.pulses_accepted.load(Ordering::Relaxed),
            pulses_discarded: self.pulses_discarded.load(Ordering::Relaxed),
            pulses_dropped: self.pulses_dropped.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            tokens_ignored: self.tokens_ignored.load(Ordering::Relaxed),
            laps_reported: self.laps_reported.load(Ordering::Relaxed),
            buttons_reported: self.buttons_reported.load(Ordering::Relaxed),
            link_write_errors: self.link_write_errors.load(Ordering::Relaxed),
            loop_busy_us_max: self.loop_busy_us_max.load(Ordering::Relaxed),
        }
    }
}

/// 计数快照（普通整数，可随意拷贝、序列化）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsSnapshot {
    pub pulses_accepted: u64,
    pub pulses_discarded: u64,
    pub pulses_dropped: u64,
    pub commands_dispatched: u64,
    pub tokens_ignored: u64,
    pub laps_reported: u64,
    pub buttons_reported: u64,
    pub link_write_errors: u64,
    pub loop_busy_us_max: u64,
}
