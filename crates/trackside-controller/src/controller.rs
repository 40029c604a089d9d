//! 控制器核心：主机命令分发、车道记账与抢跑处置
//!
//! [`TrackController`] 把赛况状态机（[`Race`]）和六条车道（[`Lane`]）
//! 拼在一起：主机令牌经 [`apply`](TrackController::apply) 落成板卡
//! 动作，冲线脉冲经 [`on_pulse`](TrackController::on_pulse) 入账，
//! [`drain_reports`](TrackController::drain_reports) 统一产出上行
//! 报文并执行抢跑断电与恢复。控制器本身不碰链路与线程，服务循环
//! （[`service_loop`](crate::service_loop)）负责喂命令、取输出。

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use tracing::{info, trace, warn};

use trackside_hal::{TrackBoard, compose_mode_nibble};
use trackside_protocol::{
    ALL_LANES, BUTTON_COUNT, Button, HostCommand, HostReport, LANE_COUNT, LaneId, TREE_LIGHT_COUNT,
};

use crate::{
    lane::{Lane, PulseOutcome},
    metrics::ControllerMetrics,
    race::{Race, RaceState},
    state::{ControllerSnapshot, LaneSnapshot, RaceSnapshot},
};

/// 控制器运行参数
///
/// 全部字段为普通数据，可整体拷贝进服务线程。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControllerConfig {
    /// 冲线保护窗（毫秒），窗内的再次触发按抖动丢弃
    pub protection_window_ms: u64,
    /// 服务循环节拍（毫秒）
    pub pacing_interval_ms: u64,
    /// 上电自检时每条车道继电器的保持时间（毫秒）
    pub startup_dwell_ms: u64,
    /// 冲线脉冲队列深度，队列满后新边沿丢弃并计数
    pub pulse_queue_depth: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            protection_window_ms: 3_000,
            pacing_interval_ms: 2,
            startup_dwell_ms: 150,
            pulse_queue_depth: 64,
        }
    }
}

/// 赛道控制器
///
/// ## 职责
///
/// - 执行主机命令（灯位、电源、赛况迁移、调试转储）；
/// - 维护六条车道的计圈、保护窗与抢跑闩锁；
/// - 扫描物理按键的上升沿并转发给主机；
/// - 导出 [`ControllerSnapshot`] 供会话侧只读查询。
///
/// 上行输出统一写进调用方传入的 `out` 行缓冲，由服务循环在每个
/// 节拍末尾一次性写给链路。
pub struct TrackController<B: TrackBoard> {
    config: ControllerConfig,
    board: B,
    race: Race,
    lanes: [Lane; LANE_COUNT],
    /// 上一轮扫描到的按键电平，用于取上升沿
    button_levels: [bool; BUTTON_COUNT],
    metrics: Arc<ControllerMetrics>,
}

impl<B: TrackBoard> TrackController<B> {
    pub fn new(board: B, config: ControllerConfig) -> Self {
        Self {
            config,
            board,
            race: Race::new(),
            lanes: ALL_LANES.map(Lane::new),
            button_levels: [false; BUTTON_COUNT],
            metrics: Arc::new(ControllerMetrics::new()),
        }
    }

    /// 执行一条主机命令
    ///
    /// `out` 收集本条命令直接产生的上行行（目前只有调试转储写它）。
    pub fn apply(&mut self, command: HostCommand, now_ms: u64, out: &mut Vec<String>) {
        match command {
            HostCommand::RaceSetup => self.enter_setup(),
            HostCommand::RaceFinished => self.race.finish(),
            HostCommand::RacePaused => self.race.pause(now_ms),
            HostCommand::TreeLight { index, on } => {
                // 第一级灯亮起视作起跑灯序开始，随后的发车要熄灭整棵灯树
                if index == 1 {
                    self.race.set_starting_lights(on);
                }
                self.board.set_tree_light(index, on);
            },
            HostCommand::GoLight { on } => {
                self.board.set_go_light(on);
                if on {
                    self.begin_race(now_ms);
                } else {
                    self.race.pause(now_ms);
                }
            },
            HostCommand::StopLight { on } => {
                self.board.set_stop_light(on);
                if on {
                    self.race.pause(now_ms);
                }
            },
            HostCommand::CautionLight { on } => self.board.set_caution_light(on),
            HostCommand::AllPower { on } => self.set_all_power(on),
            HostCommand::LanePower { lane, on } => {
                let slot = &mut self.lanes[lane.index()];
                if on {
                    slot.power_on(&mut self.board);
                } else {
                    slot.power_off(&mut self.board);
                }
            },
            HostCommand::DebugDump => self.render_debug_dump(now_ms, out),
        }
    }

    /// 进入比赛配置态（RC0）
    ///
    /// 从完赛态过来时先统一断电清场，随后读模式拨码决定抢跑罚时，
    /// 最后复位全部车道的计圈与闩锁。车道时间戳不清零，保护窗跨
    /// 场次连续。
    fn enter_setup(&mut self) {
        self.race.init();
        if self.race.from_state(RaceState::Finished) {
            self.set_all_power(false);
        }
        let mode = compose_mode_nibble(self.board.read_mode_lines());
        self.race.init_false_start(mode);
        for lane in &mut self.lanes {
            lane.reset();
        }
        info!(
            mode,
            false_start = self.race.false_start_enabled(),
            penalty_ms = self.race.penalty_time_ms(),
            "比赛配置完成"
        );
    }

    /// 发车（SL061 或物理按键之后主机补发的灯令）
    ///
    /// 若此前主机点亮过起跑灯序，发车瞬间熄灭整棵灯树；暂停后的
    /// 恢复发车不带灯序，灯树保持原样。
    fn begin_race(&mut self, now_ms: u64) {
        self.race.start(now_ms);
        if self.race.starting_lights() {
            for index in 1..=TREE_LIGHT_COUNT as u8 {
                self.board.set_tree_light(index, false);
            }
            self.race.set_starting_lights(false);
        }
    }

    /// 总电源开关（PW001 / PW000）
    ///
    /// 同时驱动总继电器与六条车道。闩锁中的车道在上电分支里被
    /// [`Lane::power_on`] 拦下，保持断电。
    fn set_all_power(&mut self, on: bool) {
        let Self { board, lanes, .. } = self;
        board.set_global_power(on);
        for lane in lanes {
            if on {
                lane.power_on(board);
            } else {
                lane.power_off(board);
            }
        }
    }

    /// 记录一次冲线脉冲
    ///
    /// `at_ms` 是边沿发生时刻，不是处理时刻：脉冲在队列里排队的
    /// 时间不会吃掉保护窗。
    pub fn on_pulse(&mut self, lane: LaneId, at_ms: u64) {
        let window = self.config.protection_window_ms;
        match self.lanes[lane.index()].on_pulse(at_ms, window) {
            PulseOutcome::Accepted => {
                self.metrics.pulses_accepted.fetch_add(1, Ordering::Relaxed);
                trace!(lane = lane.number(), at_ms, "冲线脉冲入账");
            },
            PulseOutcome::Discarded => {
                self.metrics.pulses_discarded.fetch_add(1, Ordering::Relaxed);
                trace!(lane = lane.number(), at_ms, "保护窗内脉冲丢弃");
            },
        }
    }

    /// 扫描物理按键，取上升沿并立即触发对应动作
    pub fn scan_buttons(&mut self, now_ms: u64, out: &mut Vec<String>) {
        let levels = self.board.read_buttons();
        let previous = self.button_levels;
        self.button_levels = levels;
        for index in 0..BUTTON_COUNT {
            if levels[index]
                && !previous[index]
                && let Ok(button) = Button::try_from(index as u8 + 1)
            {
                self.press_button(button, now_ms, out);
            }
        }
    }

    /// 物理按键动作：开始 / 重新开始按发车处理，暂停按停表处理
    ///
    /// 灯树熄灭交给主机随后补发的 SL061，按键路径只迁移赛况。
    fn press_button(&mut self, button: Button, now_ms: u64, out: &mut Vec<String>) {
        match button {
            Button::Start | Button::Restart => self.race.start(now_ms),
            Button::Pause => self.race.pause(now_ms),
        }
        out.push(HostReport::Button(button).encode());
        self.metrics.buttons_reported.fetch_add(1, Ordering::Relaxed);
        info!(button = button.label(), "物理按键触发");
    }

    /// 汇集六条车道的待上报事项，执行抢跑处置
    ///
    /// 每条车道依次做三件事：
    ///
    /// 1. 取走待上报圈记录，编码成 `[SF0n$毫秒]`；
    /// 2. 备战态里出现首次冲线且启用抢跑检测时，当场断电并压下
    ///    闩锁；
    /// 3. 闩锁中的车道在罚时服满后恢复供电。
    ///
    /// 罚时判定是严格大于，服满的那一毫秒还不放行。
    pub fn drain_reports(&mut self, now_ms: u64, out: &mut Vec<String>) {
        let Self {
            board,
            race,
            lanes,
            metrics,
            ..
        } = self;
        for lane in lanes {
            if let Some(report) = lane.take_report() {
                out.push(report.encode());
                metrics.laps_reported.fetch_add(1, Ordering::Relaxed);
            }
            if !race.false_start_enabled() {
                continue;
            }
            if race.state() == RaceState::Init
                && !lane.is_false_start_latched()
                && lane.lap_count() == 0
            {
                lane.power_off(board);
                lane.latch_false_start();
                race.flag_false_start();
                warn!(lane = lane.id().number(), "备战阶段冲线，判为抢跑断电");
            }
            if lane.is_false_start_latched() && race.is_false_start_penalty_served(now_ms) {
                lane.clear_false_start_latch();
                lane.power_on(board);
                info!(lane = lane.id().number(), "抢跑罚时服满，恢复供电");
            }
        }
    }

    /// 导出一段人读的内部状态（DEB 命令）
    ///
    /// 输出是若干行普通文本，不加方括号帧，主机侧解析器会原样忽略。
    fn render_debug_dump(&mut self, now_ms: u64, out: &mut Vec<String>) {
        let served_ms = self.race.penalty_served_ms(now_ms);
        let race = &self.race;
        out.push(format!(
            "race: state={} previous={}",
            race.state().label(),
            race.previous_state().label()
        ));
        out.push(format!(
            "false-start: enabled={} detected={} penalty_ms={} served_ms={} lights={}",
            race.false_start_enabled(),
            race.false_start_detected(),
            race.penalty_time_ms(),
            served_ms,
            race.starting_lights()
        ));
        for lane in &self.lanes {
            out.push(format!(
                "lane {}: laps={} start_ms={} finish_ms={} powered={} latched={} pending={}",
                lane.id().number(),
                lane.lap_count(),
                lane.last_start_ms(),
                lane.last_finish_ms(),
                lane.is_powered(),
                lane.is_false_start_latched(),
                lane.has_pending_report()
            ));
        }
        let counters = self.metrics.snapshot();
        out.push(format!(
            "counters: accepted={} discarded={} dropped={} commands={} ignored={} laps={} buttons={}",
            counters.pulses_accepted,
            counters.pulses_discarded,
            counters.pulses_dropped,
            counters.commands_dispatched,
            counters.tokens_ignored,
            counters.laps_reported,
            counters.buttons_reported
        ));
    }

    /// 生成当前状态快照
    ///
    /// 罚时秒表取的是 `now_ms` 时刻的读数，其余字段为调用瞬间的值。
    pub fn snapshot(&mut self, now_ms: u64) -> ControllerSnapshot {
        let penalty_served_ms = self.race.penalty_served_ms(now_ms);
        let race = RaceSnapshot {
            state: self.race.state(),
            previous: self.race.previous_state(),
            false_start_enabled: self.race.false_start_enabled(),
            false_start_detected: self.race.false_start_detected(),
            penalty_time_ms: self.race.penalty_time_ms(),
            penalty_served_ms,
            starting_lights: self.race.starting_lights(),
        };
        let lanes = std::array::from_fn(|index| {
            let lane = &self.lanes[index];
            LaneSnapshot {
                lane: lane.id().number(),
                lap_count: lane.lap_count(),
                last_start_ms: lane.last_start_ms(),
                last_finish_ms: lane.last_finish_ms(),
                powered: lane.is_powered(),
                false_start_latched: lane.is_false_start_latched(),
            }
        });
        ControllerSnapshot {
            race,
            lanes,
            taken_at_ms: now_ms,
        }
    }

    /// 上电自检：逐条车道拉合继电器再断开，最后熄灭全部灯位
    ///
    /// 继电器保持时间来自 [`ControllerConfig::startup_dwell_ms`]。
    /// 自检结束后总电源断开，车道供电等待主机的 PW 命令。
    pub fn startup_exercise(&mut self) {
        info!(
            dwell_ms = self.config.startup_dwell_ms,
            "上电自检：车道继电器逐路通断"
        );
        let dwell = Duration::from_millis(self.config.startup_dwell_ms);
        for lane in ALL_LANES {
            self.board.set_lane_power(lane, true);
            spin_sleep::sleep(dwell);
            self.board.set_lane_power(lane, false);
        }
        self.board.set_global_power(false);
        self.board.blank_lights();
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &ControllerMetrics {
        &self.metrics
    }

    /// 计数器的共享句柄，跨线程读取用
    pub fn metrics_handle(&self) -> Arc<ControllerMetrics> {
        Arc::clone(&self.metrics)
    }
}
