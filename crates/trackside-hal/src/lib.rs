//! # Trackside HAL
//!
//! 板卡硬件抽象层，提供统一的赛道板与主机链路接口抽象。
//!
//! ## 模块
//!
//! - `board`: 赛道板输出/输入抽象（继电器、指示灯、模式开关、按键）
//! - `link`: 主机串行链路抽象（逐字节轮询读、整体写）
//! - `clock`: 单调毫秒时钟
//! - `mock`: Mock 板卡与链路（`mock` 特性或测试构建）
//!
//! ## 边界约定
//!
//! 控制核心只操作逻辑电平（"车道 3 供电 = 通"），电气极性（常开/常闭
//! 继电器、灌电流/拉电流 LED）由板卡实现通过 [`BoardProfile`] 自行换算。
//! 不同批次的硬件只需要换一份 profile，核心代码不感知。

pub mod board;
pub mod clock;
pub mod link;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use board::{BoardProfile, IndicatorColor, OutputPolarity, TrackBoard, compose_mode_nibble};
pub use clock::MonotonicClock;
pub use link::{ChannelLink, HostLink, LinkError, LinkPeer};

#[cfg(any(test, feature = "mock"))]
pub use mock::{BoardObserver, BoardState, LinkObserver, MockBoard, MockLink};

// 重新导出协议层的公共标识类型
pub use trackside_protocol::{BUTTON_COUNT, LANE_COUNT, LaneId, TREE_LIGHT_COUNT};
