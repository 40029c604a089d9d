//! Trackside SDK - 轨道车计时控制 Rust SDK
//!
//! 面向轨道车（slot car）赛道的计时与供电控制器 SDK：六车道计圈、
//! 抢跑检测与罚时断电、灯树联动，经方括号帧文本协议与上位机对话。
//!
//! # 架构设计
//!
//! 本 SDK 采用分层架构，从底层到高层：
//!
//! - **协议层** (`protocol`): 方括号帧扫描、主机命令解码、上行报文编码
//! - **硬件层** (`hal`): 板卡与主机链路的 trait 抽象、单调钟、Mock 适配器
//! - **控制层** (`controller`): 赛况状态机、车道记账、服务循环与会话封装
//!
//! # 快速开始
//!
//! 大多数用户只需要会话入口和配置：
//!
//! ```rust
//! use trackside_sdk::prelude::*;
//! // 或
//! use trackside_sdk::{ControllerConfig, TrackSession};
//! ```
//!
//! 给 [`TrackSession::spawn`] 一个 [`TrackBoard`] 实现和一条
//! [`HostLink`]，其余交给后台服务线程；冲线边沿从中断/GPIO 回调
//! 里调用 [`TrackSession::pulse`] 投递。

// 内部分层（按 crate 划分）
pub use trackside_controller as controller;
pub use trackside_hal as hal;
pub use trackside_protocol as protocol;

// Prelude 模块
pub mod prelude;

// --- 用户以此为界 ---
// 以下是通过 Facade Pattern 提供的公共 API

// 协议层常用类型
pub use trackside_protocol::{
    ALL_LANES, BUTTON_COUNT, Button, HostCommand, HostReport, LANE_COUNT, LaneId, ProtocolError,
    TREE_LIGHT_COUNT, Token, TokenScanner,
};

// 硬件层抽象
pub use trackside_hal::{
    BoardProfile, ChannelLink, HostLink, IndicatorColor, LinkError, LinkPeer, MonotonicClock,
    OutputPolarity, TrackBoard,
};

// 控制层（这是推荐的入口点）
pub use trackside_controller::{
    ControllerConfig, ControllerSnapshot, LaneSnapshot, MetricsSnapshot, RaceSnapshot, RaceState,
    SessionError, TrackSession,
};

/// 初始化 tracing 日志输出
///
/// 过滤规则取自 `RUST_LOG` 环境变量，未设置时退回 `info`。供可执行
/// 程序在 `main` 开头调用一次；重复调用沉默返回。
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 测试常用类型都能从 crate 根拿到
    #[test]
    fn test_facade_reexports() {
        let config = ControllerConfig::default();
        assert_eq!(config.protection_window_ms, 3_000);
        assert_eq!(ALL_LANES.len(), LANE_COUNT);
        assert_eq!(HostCommand::parse(b"RC0"), Some(HostCommand::RaceSetup));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
