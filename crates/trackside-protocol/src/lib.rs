//! # Trackside Protocol
//!
//! 计时主机 ASCII 协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `framing`: 方括号帧提取（从连续字节流中切出 `[...]` 令牌）
//! - `command`: 入站命令令牌解析
//! - `report`: 出站报告令牌构建（发车/按键）
//!
//! ## 协议形态
//!
//! 协议是行内令牌式的：每条命令被 `[` 和 `]` 包裹，括号之外的任意字节
//! 都是噪声，直接丢弃。无法识别的令牌同样被静默忽略（宽容式协议，
//! 主机端和控制器端的版本差异不会导致任何一方报错）。

pub mod command;
pub mod framing;
pub mod report;

// 重新导出常用类型
pub use command::*;
pub use framing::*;
pub use report::*;

use thiserror::Error;

/// 赛道车道数（协议地址空间固定为 6 条车道）
pub const LANE_COUNT: usize = 6;

/// 发车灯塔的灯位数（`SL01x`..`SL05x`）
pub const TREE_LIGHT_COUNT: usize = 5;

/// 物理按键数（起跑 / 重新起跑 / 暂停）
pub const BUTTON_COUNT: usize = 3;

/// 协议层错误类型
///
/// 注意：入站令牌解析不会产生错误（无法识别即忽略），此类型只用于
/// 构造期的取值校验，例如把用户输入转换为 [`LaneId`]。
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid lane number: {lane} (expected 1..={LANE_COUNT})")]
    InvalidLane { lane: u8 },

    #[error("Invalid tree light index: {index} (expected 1..={TREE_LIGHT_COUNT})")]
    InvalidTreeLight { index: u8 },
}

/// 车道编号
///
/// 协议中的车道编号从 1 开始（`PW011` 是 1 号车道），内部数组索引
/// 从 0 开始。此类型同时提供两种视角，避免散落的 `+1`/`-1` 换算。
///
/// # 示例
///
/// ```rust
/// use trackside_protocol::LaneId;
///
/// let lane = LaneId::new(3).unwrap();
/// assert_eq!(lane.number(), 3);
/// assert_eq!(lane.index(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LaneId(u8);

impl LaneId {
    /// 从 1 开始的车道编号构造，越界返回 `None`
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number <= LANE_COUNT as u8 {
            Some(Self(number))
        } else {
            None
        }
    }

    /// 车道编号（1..=6，协议视角）
    pub const fn number(self) -> u8 {
        self.0
    }

    /// 数组索引（0..=5，存储视角）
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }

    /// 按编号升序遍历全部车道
    pub fn all() -> impl Iterator<Item = LaneId> {
        ALL_LANES.into_iter()
    }
}

/// 全部车道编号，按升序排列
///
/// 控制器用它初始化车道数组，省去逐个构造时的越界分支。
pub const ALL_LANES: [LaneId; LANE_COUNT] = [
    LaneId(1),
    LaneId(2),
    LaneId(3),
    LaneId(4),
    LaneId(5),
    LaneId(6),
];

impl TryFrom<u8> for LaneId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        LaneId::new(value).ok_or(ProtocolError::InvalidLane { lane: value })
    }
}

impl std::fmt::Display for LaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
