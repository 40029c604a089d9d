//! 入站命令令牌解析
//!
//! 把 [`Token`](crate::framing::Token) 内容解析为命令枚举。词汇表固定
//! 且很小，解析失败不是错误：主机可能比控制器新，多出来的令牌直接
//! 忽略即可（宽容式协议）。
//!
//! ## 词汇表
//!
//! | 令牌 | 含义 |
//! |------|------|
//! | `RC0…` | 赛钟：进入准备状态（只看 3 字节前缀） |
//! | `RC2…` | 赛钟：比赛结束 |
//! | `RC3…` | 赛钟：比赛暂停 |
//! | `SL0n1`/`SL0n0` (n=1..5) | 发车灯塔第 n 灯亮/灭 |
//! | `SL061`/`SL060` | 绿灯（发车）亮/灭 |
//! | `SL071`/`SL070` | 停车灯亮/灭 |
//! | `SL081`/`SL080` | 警示灯亮/灭 |
//! | `PW001`/`PW000` | 全部车道供电通/断 |
//! | `PW0n1`/`PW0n0` (n=1..6) | 第 n 车道供电通/断 |
//! | `DEB…` | 调试转储请求（只看 3 字节前缀） |

use crate::LaneId;

/// 一条已识别的主机命令
///
/// 解析层只负责"这是什么命令"，副作用（状态迁移、继电器、灯）由
/// 上层的分发器决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HostCommand {
    /// `RC0`：赛钟进入准备状态
    RaceSetup,
    /// `RC2`：比赛结束
    RaceFinished,
    /// `RC3`：比赛暂停
    RacePaused,
    /// `SL01x`..`SL05x`：发车灯塔单灯开关
    TreeLight { index: u8, on: bool },
    /// `SL06x`：绿灯（发车信号）
    GoLight { on: bool },
    /// `SL07x`：停车灯（赛道暂停信号）
    StopLight { on: bool },
    /// `SL08x`：警示灯
    CautionLight { on: bool },
    /// `PW00x`：全部车道供电
    AllPower { on: bool },
    /// `PW0nx`：单车道供电
    LanePower { lane: LaneId, on: bool },
    /// `DEB`：转储内部状态
    DebugDump,
}

impl HostCommand {
    /// 解析一条令牌内容（不含括号）
    ///
    /// # 返回值
    ///
    /// 无法识别或格式不符时返回 `None`，调用方应当静默忽略。
    pub fn parse(token: &[u8]) -> Option<HostCommand> {
        match token {
            // 赛钟令牌只约定 3 字节前缀，后面允许跟任意内容
            [b'R', b'C', b'0', ..] => Some(HostCommand::RaceSetup),
            [b'R', b'C', b'2', ..] => Some(HostCommand::RaceFinished),
            [b'R', b'C', b'3', ..] => Some(HostCommand::RacePaused),
            [b'D', b'E', b'B', ..] => Some(HostCommand::DebugDump),
            // 灯与电源令牌是精确的 5 字节字面量
            [b'S', b'L', b'0', channel, state] => {
                let on = parse_switch(*state)?;
                match channel {
                    b'1'..=b'5' => Some(HostCommand::TreeLight {
                        index: channel - b'0',
                        on,
                    }),
                    b'6' => Some(HostCommand::GoLight { on }),
                    b'7' => Some(HostCommand::StopLight { on }),
                    b'8' => Some(HostCommand::CautionLight { on }),
                    _ => None,
                }
            },
            [b'P', b'W', b'0', channel, state] => {
                let on = parse_switch(*state)?;
                match channel {
                    b'0' => Some(HostCommand::AllPower { on }),
                    b'1'..=b'6' => Some(HostCommand::LanePower {
                        lane: LaneId::new(channel - b'0')?,
                        on,
                    }),
                    _ => None,
                }
            },
            _ => None,
        }
    }
}

/// 末位开关字符：`'1'` 通，`'0'` 断，其余视为格式错误
fn parse_switch(byte: u8) -> Option<bool> {
    match byte {
        b'1' => Some(true),
        b'0' => Some(false),
        _ => None,
    }
}
