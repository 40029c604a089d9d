//! 会话共享状态与控制器快照
//!
//! 服务循环独占控制器本体，外界读状态一律走快照：循环每轮把
//! [`ControllerSnapshot`] 写进 `ArcSwap`，任何线程无锁读取最近一份。
//! 这也是 CLI `status` 命令和调试工具的数据来源。

use std::sync::atomic::AtomicBool;

use arc_swap::ArcSwap;

use crate::race::RaceState;
use trackside_protocol::LANE_COUNT;

/// 比赛侧快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RaceSnapshot {
    pub state: RaceState,
    pub previous: RaceState,
    pub false_start_enabled: bool,
    pub false_start_detected: bool,
    pub penalty_time_ms: u64,
    pub penalty_served_ms: u64,
    pub starting_lights: bool,
}

/// 单车道快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneSnapshot {
    /// 车道编号（1 起）
    pub lane: u8,
    pub lap_count: i32,
    pub last_start_ms: u64,
    pub last_finish_ms: u64,
    pub powered: bool,
    pub false_start_latched: bool,
}

/// 整机快照
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerSnapshot {
    pub race: RaceSnapshot,
    pub lanes: [LaneSnapshot; LANE_COUNT],
    /// 快照生成时刻（开机毫秒）
    pub taken_at_ms: u64,
}

/// 会话共享上下文
///
/// 服务循环与会话句柄之间唯一的共享物：运行标志（Acquire/Release
/// 配对）加最近一份快照。
#[derive(Debug)]
pub struct SessionContext {
    /// 服务循环的运行标志
    pub is_running: AtomicBool,
    /// 最近一轮发布的快照
    pub snapshot: ArcSwap<ControllerSnapshot>,
}

impl SessionContext {
    pub fn new(initial: ControllerSnapshot) -> Self {
        Self {
            is_running: AtomicBool::new(true),
            snapshot: ArcSwap::from_pointee(initial),
        }
    }
}
