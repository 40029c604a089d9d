//! 比赛生命周期状态机与抢跑处罚秒表
//!
//! 整场比赛只有一个 [`Race`] 实例，负责两件事：
//!
//! 1. **生命周期**：`Init -> Started -> (Paused <-> Started)* -> Finished`
//!    无限循环。每次迁移都记录迁移前的状态，便于区分"从哪来"
//!    （比如从 Finished 进入 Init 要先全场断电）。
//! 2. **处罚秒表**：抢跑处罚是全场共用的一只可暂停秒表。比赛暂停时
//!    秒表冻结，恢复时无缝续走，已服刑时长不清零不重算。
//!
//! 所有接口都是全函数：没有非法状态迁移，没有错误路径。时间一律由
//! 调用方以 `now_ms` 显式传入，本模块不读时钟。

use tracing::{debug, info};

/// 处罚时长查找表（毫秒）
///
/// 模式半字节 8..=15 依次映射到 0s..7s。下标 0 对应零时长处罚：
/// 检测照常、断电照常，但发车后立即恢复。
pub const PENALTY_TABLE_MS: [u64; 8] = [0, 1000, 2000, 3000, 4000, 5000, 6000, 7000];

/// 处罚起点哨兵值
///
/// 配置阶段还没有真正的发车时刻，把起点放到"遥远的未来"，保证在
/// `start()` 覆写它之前，处罚永远不会被判定为已服满。
const PENALTY_BEGIN_SENTINEL_MS: u64 = u64::MAX;

/// 比赛生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RaceState {
    /// 已配置，等待绿灯；抢跑监视在此状态生效
    Init = 0,
    /// 比赛进行中
    Started = 1,
    /// 比赛暂停（赛道召回、分段间歇）
    Paused = 2,
    /// 比赛结束
    Finished = 3,
}

impl RaceState {
    /// 状态的可读名称（日志与调试转储用）
    pub fn label(&self) -> &'static str {
        match self {
            RaceState::Init => "init",
            RaceState::Started => "started",
            RaceState::Paused => "paused",
            RaceState::Finished => "finished",
        }
    }
}

/// 比赛状态机
///
/// # 秒表算法
///
/// 维护三个毫秒量：
///
/// - `penalty_begin_ms`: 概念上的"开始计刑时刻"。它会随暂停被向后
///   平移，使得任意时刻 `now - penalty_begin_ms` 恰好等于已服刑时长。
/// - `penalty_served_ms`: 最近一次计算出的已服刑时长。比赛不在
///   `Started` 状态时它就是冻结值，时间不前进。
/// - `penalty_time_ms`: 配置的处罚总时长。
///
/// 从 `Paused` 恢复时执行 `penalty_begin_ms := now - penalty_served_ms`，
/// 即把起点前移暂停了多久就补多久，已服刑部分原样保留。
#[derive(Debug, Clone)]
pub struct Race {
    state: RaceState,
    previous: RaceState,
    false_start_enabled: bool,
    false_start_detected: bool,
    penalty_begin_ms: u64,
    penalty_served_ms: u64,
    penalty_time_ms: u64,
    starting_lights: bool,
}

impl Race {
    /// 开机初态是 `Finished`
    ///
    /// 这样第一条配置命令就会走"从 Finished 进入 Init"的分支，
    /// 触发全场断电再重新武装的完整流程。
    pub fn new() -> Self {
        Self {
            state: RaceState::Finished,
            previous: RaceState::Finished,
            false_start_enabled: false,
            false_start_detected: false,
            penalty_begin_ms: PENALTY_BEGIN_SENTINEL_MS,
            penalty_served_ms: 0,
            penalty_time_ms: 0,
            starting_lights: false,
        }
    }

    /// 当前状态
    pub fn state(&self) -> RaceState {
        self.state
    }

    /// 上一次迁移之前的状态
    pub fn previous_state(&self) -> RaceState {
        self.previous
    }

    /// 查询上一状态是否为 `expected`
    pub fn from_state(&self, expected: RaceState) -> bool {
        self.previous == expected
    }

    fn transition(&mut self, next: RaceState) {
        self.previous = self.state;
        self.state = next;
        info!(
            from = self.previous.label(),
            to = next.label(),
            "race transition"
        );
    }

    /// 进入准备状态（主机赛钟 = setup）
    pub fn init(&mut self) {
        self.transition(RaceState::Init);
    }

    /// 发车（绿灯亮 / 起跑按键）
    ///
    /// 秒表处理：从 `Init` 来是全新倒计时，起点就是现在；从 `Paused`
    /// 来要把起点向后平移，补偿暂停期间流逝的墙钟时间；其余来源
    /// 不动秒表。
    pub fn start(&mut self, now_ms: u64) {
        let from = self.state;
        self.transition(RaceState::Started);
        match from {
            RaceState::Init => {
                self.penalty_begin_ms = now_ms;
            },
            RaceState::Paused => {
                self.penalty_begin_ms = now_ms.saturating_sub(self.penalty_served_ms);
            },
            _ => {},
        }
    }

    /// 暂停（绿灯灭 / 停车灯亮 / 赛钟 paused / 暂停按键）
    ///
    /// 离开 `Started` 之前先把已服刑时长刷新一次，保证冻结值精确到
    /// 暂停那一刻，而不是上一次查询那一刻。
    pub fn pause(&mut self, now_ms: u64) {
        if self.false_start_detected && self.state == RaceState::Started {
            self.penalty_served_ms = now_ms.saturating_sub(self.penalty_begin_ms);
        }
        self.transition(RaceState::Paused);
    }

    /// 结束（主机赛钟 = finished）
    pub fn finish(&mut self) {
        self.transition(RaceState::Finished);
    }

    /// 按模式半字节重新武装抢跑检测
    ///
    /// `mode` 取 0..=15：大于 7 启用检测，处罚时长查
    /// [`PENALTY_TABLE_MS`]`[mode - 8]`。不大于 7 仅仅关掉使能位，
    /// 其余字段不动（反正检测逻辑全部以使能位为闸）。
    pub fn init_false_start(&mut self, mode: u8) {
        self.false_start_enabled = mode > 7;
        if self.false_start_enabled {
            self.false_start_detected = false;
            self.penalty_begin_ms = PENALTY_BEGIN_SENTINEL_MS;
            self.penalty_served_ms = 0;
            self.penalty_time_ms = PENALTY_TABLE_MS[(mode - 8) as usize];
            debug!(
                mode,
                penalty_ms = self.penalty_time_ms,
                "false start armed"
            );
        } else {
            debug!(mode, "false start disabled");
        }
    }

    /// 点燃全场抢跑保险丝
    ///
    /// 任意一条车道抢跑即置位，直到下一次武装才清除。
    pub fn flag_false_start(&mut self) {
        self.false_start_detected = true;
    }

    /// 抢跑检测是否启用
    pub fn false_start_enabled(&self) -> bool {
        self.false_start_enabled
    }

    /// 本场是否已经有人抢跑
    pub fn false_start_detected(&self) -> bool {
        self.false_start_detected
    }

    /// 配置的处罚总时长（毫秒）
    pub fn penalty_time_ms(&self) -> u64 {
        self.penalty_time_ms
    }

    /// 已服刑时长（毫秒）
    ///
    /// 只有"保险丝已点燃且比赛正在进行"时才实时推进并存回，其余
    /// 状态一律返回冻结值。哨兵起点经 `saturating_sub` 自然得 0。
    pub fn penalty_served_ms(&mut self, now_ms: u64) -> u64 {
        if self.false_start_detected && self.state == RaceState::Started {
            self.penalty_served_ms = now_ms.saturating_sub(self.penalty_begin_ms);
        }
        self.penalty_served_ms
    }

    /// 处罚是否已服满（严格大于：恰好等于总时长仍算未服满）
    pub fn is_false_start_penalty_served(&mut self, now_ms: u64) -> bool {
        self.penalty_served_ms(now_ms) > self.penalty_time_ms
    }

    /// 主机发车灯一号位的镜像标志
    pub fn starting_lights(&self) -> bool {
        self.starting_lights
    }

    /// 记录主机发车灯一号位的开/关
    pub fn set_starting_lights(&mut self, on: bool) {
        self.starting_lights = on;
    }
}

impl Default for Race {
    fn default() -> Self {
        Self::new()
    }
}
