//! 控制器层模块
//!
//! 本模块提供赛道计时控制器的核心实现，包括：
//! - 赛况状态机（备战 / 进行 / 暂停 / 完赛）与抢跑罚时秒表
//! - 车道计圈、冲线保护窗与抢跑闩锁
//! - 服务循环（单线程伺服：命令分发、按键扫描、上行回写）
//! - 会话封装（后台线程生命周期、脉冲投递、无锁快照）
//!
//! # 使用场景
//!
//! 嵌入到具体的板卡后端之上：给 [`TrackSession::spawn`] 一个
//! [`TrackBoard`](trackside_hal::TrackBoard) 实现和一条
//! [`HostLink`](trackside_hal::HostLink)，其余交给服务线程。

pub mod controller;
mod error;
pub mod lane;
pub mod metrics;
pub mod race;
pub mod service;
mod session;
pub mod state;

pub use controller::{ControllerConfig, TrackController};
pub use error::SessionError;
pub use lane::{Lane, PulseOutcome};
pub use metrics::{ControllerMetrics, MetricsSnapshot};
pub use race::{PENALTY_TABLE_MS, Race, RaceState};
pub use service::{PulseEvent, service_loop};
pub use session::TrackSession;
pub use state::{ControllerSnapshot, LaneSnapshot, RaceSnapshot, SessionContext};
