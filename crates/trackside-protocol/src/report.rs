//! 出站报告令牌构建
//!
//! 控制器主动上报两类事件：单圈成绩（`[SF0n$…]`）和物理按键
//! （`[BT0n]`）。两者都是方括号令牌，与入站方向共用同一种帧形态。

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::LaneId;

/// 物理按键编号
///
/// 编号即 `[BT0n]` 中的 n。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Button {
    /// 起跑按键（`[BT01]`）
    Start = 1,
    /// 重新起跑按键（`[BT02]`）
    Restart = 2,
    /// 暂停按键（`[BT03]`）
    Pause = 3,
}

impl Button {
    /// 按键的可读名称（日志与 CLI 用）
    pub fn label(&self) -> &'static str {
        match self {
            Button::Start => "start",
            Button::Restart => "restart",
            Button::Pause => "pause",
        }
    }
}

/// 一条出站报告
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostReport {
    /// 单圈成绩：车道编号 + 圈时（毫秒）
    Lap { lane: LaneId, elapsed_ms: u64 },
    /// 按键按下
    Button(Button),
}

impl HostReport {
    /// 编码为线缆上的令牌文本（含括号）
    ///
    /// # 示例
    ///
    /// ```rust
    /// use trackside_protocol::{HostReport, LaneId};
    ///
    /// let report = HostReport::Lap {
    ///     lane: LaneId::new(1).unwrap(),
    ///     elapsed_ms: 842,
    /// };
    /// assert_eq!(report.encode(), "[SF01$842]");
    /// ```
    pub fn encode(&self) -> String {
        match self {
            HostReport::Lap { lane, elapsed_ms } => {
                format!("[SF0{}${}]", lane.number(), elapsed_ms)
            },
            HostReport::Button(button) => format!("[BT0{}]", u8::from(*button)),
        }
    }
}
