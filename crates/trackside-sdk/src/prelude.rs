//! Prelude - 常用类型的便捷导入
//!
//! 大多数用户应该使用这个模块来导入常用类型：
//!
//! ```rust
//! use trackside_sdk::prelude::*;
//! ```

// 控制层（推荐使用）
pub use crate::controller::{ControllerConfig, ControllerSnapshot, RaceState, TrackSession};

// 硬件层（实现板卡/链路后端时需要的 Trait）
pub use crate::hal::{HostLink, MonotonicClock, TrackBoard};

// 协议层常用类型
pub use crate::protocol::{Button, HostCommand, HostReport, LaneId};

// 错误类型
pub use crate::controller::SessionError;
pub use crate::hal::LinkError;
pub use crate::protocol::ProtocolError;
