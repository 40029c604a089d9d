//! 车道计时器
//!
//! 每条物理车道一个 [`Lane`] 实例：把原始感应脉冲变成单圈成绩，
//! 用保护窗滤掉触点抖动和一次通过的多次触发，并在个别处罚期间
//! 把住本车道的供电闸门。
//!
//! `on_pulse` 是脉冲注入路径的终点，保持最小且无阻塞；其余方法都
//! 只在服务循环的屏蔽窗口内调用。

use trackside_hal::board::{IndicatorColor, TrackBoard};
use trackside_protocol::{HostReport, LaneId};

/// 一次脉冲的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// 计入：时间戳滚动，圈数加一
    Accepted,
    /// 落在保护窗内，按抖动丢弃，状态不变
    Discarded,
}

impl PulseOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PulseOutcome::Accepted)
    }
}

/// 车道计时器
#[derive(Debug, Clone)]
pub struct Lane {
    id: LaneId,
    last_start_ms: u64,
    last_finish_ms: u64,
    lap_count: i32,
    reported: bool,
    false_start_latched: bool,
    powered: bool,
}

impl Lane {
    /// 以固定车道编号构造，整个进程生命周期不再销毁
    pub fn new(id: LaneId) -> Self {
        Self {
            id,
            last_start_ms: 0,
            last_finish_ms: 0,
            // -1 哨兵："还没有完成过任何一圈"。0 标记复位后的第一次
            // 压线，是抢跑判定的依据，不算成绩
            lap_count: -1,
            // 开机没有可上报的成绩
            reported: true,
            false_start_latched: false,
            powered: false,
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    /// 处理一个上升沿脉冲
    ///
    /// 距离上一次计入的 `last_finish_ms` 不足 `window_ms` 的脉冲一律
    /// 丢弃。开机时 `last_finish_ms` 为 0，窗口同样相对 0 生效：部署
    /// 中从上电到发车远超窗口长度，首个真实脉冲必然计入。
    ///
    /// # 性能
    ///
    /// 一次减法一次比较，无分配无阻塞，可以在脉冲注入上下文直接调用。
    pub fn on_pulse(&mut self, now_ms: u64, window_ms: u64) -> PulseOutcome {
        if now_ms.saturating_sub(self.last_finish_ms) < window_ms {
            return PulseOutcome::Discarded;
        }
        self.last_start_ms = self.last_finish_ms;
        self.last_finish_ms = now_ms;
        self.lap_count += 1;
        self.reported = false;
        PulseOutcome::Accepted
    }

    /// 取走一条待上报成绩（每次脉冲至多产出一条）
    pub fn take_report(&mut self) -> Option<HostReport> {
        if self.reported {
            return None;
        }
        self.reported = true;
        Some(HostReport::Lap {
            lane: self.id,
            elapsed_ms: self.last_finish_ms - self.last_start_ms,
        })
    }

    /// 闭合本车道供电继电器，指示灯转绿
    ///
    /// 处罚闩锁期间是空操作：主机的全场上电命令也从这里走，闸门只
    /// 设在这一处。
    pub fn power_on<B: TrackBoard>(&mut self, board: &mut B) {
        if self.false_start_latched {
            return;
        }
        board.set_lane_power(self.id, true);
        board.set_lane_indicator(self.id, IndicatorColor::Green);
        self.powered = true;
    }

    /// 断开本车道供电继电器，指示灯转红
    pub fn power_off<B: TrackBoard>(&mut self, board: &mut B) {
        board.set_lane_power(self.id, false);
        board.set_lane_indicator(self.id, IndicatorColor::Red);
        self.powered = false;
    }

    /// 每次比赛配置时复位计数与标志
    ///
    /// 时间戳保持不动：跨场次的保护窗仍然生效，刚冲线的车在新配置
    /// 后立刻再压线依旧按抖动处理。
    pub fn reset(&mut self) {
        self.reported = true;
        self.false_start_latched = false;
        self.lap_count = -1;
    }

    /// 压下抢跑闩锁
    pub fn latch_false_start(&mut self) {
        self.false_start_latched = true;
    }

    /// 解除抢跑闩锁（服刑完毕）
    pub fn clear_false_start_latch(&mut self) {
        self.false_start_latched = false;
    }

    pub fn is_false_start_latched(&self) -> bool {
        self.false_start_latched
    }

    pub fn lap_count(&self) -> i32 {
        self.lap_count
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// 是否有尚未上报的圈记录
    pub fn has_pending_report(&self) -> bool {
        !self.reported
    }

    pub fn last_start_ms(&self) -> u64 {
        self.last_start_ms
    }

    pub fn last_finish_ms(&self) -> u64 {
        self.last_finish_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use trackside_hal::mock::MockBoard;

    const WINDOW_MS: u64 = 3000;

    fn test_lane() -> Lane {
        Lane::new(LaneId::new(1).unwrap())
    }

    #[test]
    fn test_first_pulse_inside_boot_window_discarded() {
        let mut lane = test_lane();
        // 开机瞬间的杂散脉冲落在相对 0 的窗口里
        assert_eq!(lane.on_pulse(100, WINDOW_MS), PulseOutcome::Discarded);
        assert_eq!(lane.lap_count(), -1);
    }

    #[test]
    fn test_protection_window_drops_second_pulse() {
        let mut lane = test_lane();

        assert_eq!(lane.on_pulse(5000, WINDOW_MS), PulseOutcome::Accepted);
        assert_eq!(lane.lap_count(), 0);

        // 1 秒后的回弹：窗口内，整个状态原样不动
        assert_eq!(lane.on_pulse(6000, WINDOW_MS), PulseOutcome::Discarded);
        assert_eq!(lane.lap_count(), 0);
        assert_eq!(lane.last_finish_ms(), 5000);

        assert_eq!(lane.on_pulse(9000, WINDOW_MS), PulseOutcome::Accepted);
        assert_eq!(lane.lap_count(), 1);
        assert_eq!(lane.last_start_ms(), 5000);
        assert_eq!(lane.last_finish_ms(), 9000);
    }

    #[test]
    fn test_take_report_is_idempotent() {
        let mut lane = test_lane();
        lane.on_pulse(5000, WINDOW_MS);
        lane.on_pulse(9200, WINDOW_MS);

        let report = lane.take_report().unwrap();
        assert_eq!(
            report,
            HostReport::Lap {
                lane: LaneId::new(1).unwrap(),
                elapsed_ms: 4200,
            }
        );
        // 两次脉冲之间重复排空：第二次必须是空操作
        assert!(lane.take_report().is_none());
        assert!(lane.take_report().is_none());

        lane.on_pulse(20_000, WINDOW_MS);
        assert!(lane.take_report().is_some());
    }

    #[test]
    fn test_pulse_refreshes_pending_report() {
        let mut lane = test_lane();
        lane.on_pulse(5000, WINDOW_MS);
        // 没来得及排空就来了下一圈：上一条成绩被覆盖，只出最新的
        lane.on_pulse(9000, WINDOW_MS);

        let report = lane.take_report().unwrap();
        assert_eq!(
            report,
            HostReport::Lap {
                lane: LaneId::new(1).unwrap(),
                elapsed_ms: 4000,
            }
        );
    }

    #[test]
    fn test_power_on_blocked_while_latched() {
        let (mut board, observer) = MockBoard::new();
        let mut lane = test_lane();

        lane.power_on(&mut board);
        assert!(lane.is_powered());

        lane.power_off(&mut board);
        lane.latch_false_start();

        // 闩锁期间上电是空操作：继电器不动
        lane.power_on(&mut board);
        assert!(!lane.is_powered());
        assert_eq!(
            observer.take_power_log(),
            vec![(1, true), (1, false)]
        );

        lane.clear_false_start_latch();
        lane.power_on(&mut board);
        assert!(lane.is_powered());
        assert_eq!(observer.take_power_log(), vec![(1, true)]);
    }

    #[test]
    fn test_power_drives_indicator() {
        let (mut board, observer) = MockBoard::new();
        let mut lane = test_lane();

        lane.power_on(&mut board);
        assert_eq!(
            observer.state().lane_indicator[0],
            trackside_hal::IndicatorColor::Green
        );

        lane.power_off(&mut board);
        assert_eq!(
            observer.state().lane_indicator[0],
            trackside_hal::IndicatorColor::Red
        );
    }

    #[test]
    fn test_reset_clears_counters_keeps_timestamps() {
        let mut lane = test_lane();
        lane.on_pulse(5000, WINDOW_MS);
        lane.latch_false_start();

        lane.reset();
        assert_eq!(lane.lap_count(), -1);
        assert!(!lane.is_false_start_latched());
        assert!(lane.take_report().is_none());
        // 时间戳保留：新场次里紧贴上一次冲线的脉冲仍被窗口挡住
        assert_eq!(lane.on_pulse(6000, WINDOW_MS), PulseOutcome::Discarded);
        assert_eq!(lane.on_pulse(8000, WINDOW_MS), PulseOutcome::Accepted);
        assert_eq!(lane.lap_count(), 0);
    }

    proptest! {
        /// 任意脉冲序列下：相邻两次"计入"之间至少隔一个保护窗，
        /// 圈数恰好等于计入次数减一
        #[test]
        fn prop_window_spacing_holds(deltas in prop::collection::vec(0u64..5000, 1..60)) {
            let mut lane = test_lane();
            let mut now = 0u64;
            let mut accepted_at = Vec::new();

            for delta in deltas {
                now += delta;
                if lane.on_pulse(now, WINDOW_MS).is_accepted() {
                    accepted_at.push(now);
                }
            }

            for pair in accepted_at.windows(2) {
                prop_assert!(pair[1] - pair[0] >= WINDOW_MS);
            }
            if let Some(&first) = accepted_at.first() {
                prop_assert!(first >= WINDOW_MS);
            }
            prop_assert_eq!((lane.lap_count() + 1) as usize, accepted_at.len());
        }
    }
}
