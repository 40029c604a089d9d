//! Mock 板卡与链路
//!
//! 无硬件依赖的测试替身。板卡输出先经极性档案换算成引脚电平再落进
//! 共享状态，观测时换算回逻辑电平，和真实板卡实现走同一条路径；
//! 输入（模式开关、按键）由测试脚本随时改写；链路的入站队列和出站
//! 记录同样对测试可见。所有共享句柄都能跨线程使用，服务循环把 mock
//! 拿走之后，测试仍可通过 observer 观测与编排。

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::board::{BoardProfile, IndicatorColor, TrackBoard};
use crate::link::{HostLink, LinkError};
use trackside_protocol::{BUTTON_COUNT, Button, LANE_COUNT, LaneId, TREE_LIGHT_COUNT};

/// Mock 板卡的可观测状态（逻辑视角）
#[derive(Debug, Clone, Default)]
pub struct BoardState {
    pub lane_power: [bool; LANE_COUNT],
    pub lane_indicator: [IndicatorColor; LANE_COUNT],
    pub global_power: bool,
    pub tree_lights: [bool; TREE_LIGHT_COUNT],
    pub go_light: bool,
    pub stop_light: bool,
    pub caution_light: bool,
}

/// 各输出的引脚电平（物理视角）
///
/// 双色指示灯占两只引脚：绿脚在前，红脚在后。
#[derive(Debug)]
struct PinState {
    lane_relay: [bool; LANE_COUNT],
    indicator_legs: [(bool, bool); LANE_COUNT],
    global_relay: bool,
    tree_lights: [bool; TREE_LIGHT_COUNT],
    go_light: bool,
    stop_light: bool,
    caution_light: bool,
}

impl PinState {
    /// 全部输出处于逻辑"断"时的引脚电平
    fn blank(profile: BoardProfile) -> Self {
        let relay_off = profile.lane_relay.drive(false);
        let leg_off = profile.indicator.drive(false);
        let light_off = profile.light.drive(false);
        Self {
            lane_relay: [relay_off; LANE_COUNT],
            indicator_legs: [(leg_off, leg_off); LANE_COUNT],
            global_relay: profile.global_relay.drive(false),
            tree_lights: [light_off; TREE_LIGHT_COUNT],
            go_light: light_off,
            stop_light: light_off,
            caution_light: light_off,
        }
    }
}

#[derive(Debug)]
struct BoardShared {
    profile: BoardProfile,
    pins: PinState,
    mode_lines: [bool; 4],
    buttons: [bool; BUTTON_COUNT],
    // 每次车道继电器写入都记一笔，幂等性测试据此断言
    power_log: Vec<(u8, bool)>,
}

impl BoardShared {
    fn new(profile: BoardProfile) -> Self {
        Self {
            profile,
            pins: PinState::blank(profile),
            // 模式开关默认全部断开：四线被上拉为高 => 模式 0
            mode_lines: [true; 4],
            buttons: [false; BUTTON_COUNT],
            power_log: Vec::new(),
        }
    }
}

/// Mock 赛道板
///
/// 通过 [`MockBoard::new`] 与 [`BoardObserver`] 成对构造。
pub struct MockBoard {
    shared: Arc<Mutex<BoardShared>>,
}

/// Mock 板卡的观测/编排句柄
///
/// 可克隆，可跨线程。
#[derive(Clone)]
pub struct BoardObserver {
    shared: Arc<Mutex<BoardShared>>,
}

impl MockBoard {
    /// 用量产批次的默认极性档案构造
    pub fn new() -> (MockBoard, BoardObserver) {
        Self::with_profile(BoardProfile::default())
    }

    /// 用指定极性档案构造（极性换算测试用）
    pub fn with_profile(profile: BoardProfile) -> (MockBoard, BoardObserver) {
        let shared = Arc::new(Mutex::new(BoardShared::new(profile)));
        (
            MockBoard {
                shared: Arc::clone(&shared),
            },
            BoardObserver { shared },
        )
    }
}

impl TrackBoard for MockBoard {
    fn set_lane_power(&mut self, lane: LaneId, on: bool) {
        let mut shared = self.shared.lock();
        let level = shared.profile.lane_relay.drive(on);
        shared.pins.lane_relay[lane.index()] = level;
        shared.power_log.push((lane.number(), on));
    }

    fn set_lane_indicator(&mut self, lane: LaneId, color: IndicatorColor) {
        let mut shared = self.shared.lock();
        let polarity = shared.profile.indicator;
        let (green, red) = match color {
            IndicatorColor::Off => (false, false),
            IndicatorColor::Green => (true, false),
            IndicatorColor::Red => (false, true),
        };
        shared.pins.indicator_legs[lane.index()] = (polarity.drive(green), polarity.drive(red));
    }

    fn set_global_power(&mut self, on: bool) {
        let mut shared = self.shared.lock();
        let level = shared.profile.global_relay.drive(on);
        shared.pins.global_relay = level;
    }

    fn set_tree_light(&mut self, index: u8, on: bool) {
        if (1..=TREE_LIGHT_COUNT as u8).contains(&index) {
            let mut shared = self.shared.lock();
            let level = shared.profile.light.drive(on);
            shared.pins.tree_lights[(index - 1) as usize] = level;
        }
    }

    fn set_go_light(&mut self, on: bool) {
        let mut shared = self.shared.lock();
        let level = shared.profile.light.drive(on);
        shared.pins.go_light = level;
    }

    fn set_stop_light(&mut self, on: bool) {
        let mut shared = self.shared.lock();
        let level = shared.profile.light.drive(on);
        shared.pins.stop_light = level;
    }

    fn set_caution_light(&mut self, on: bool) {
        let mut shared = self.shared.lock();
        let level = shared.profile.light.drive(on);
        shared.pins.caution_light = level;
    }

    fn read_mode_lines(&mut self) -> [bool; 4] {
        self.shared.lock().mode_lines
    }

    fn read_buttons(&mut self) -> [bool; BUTTON_COUNT] {
        self.shared.lock().buttons
    }
}

impl BoardObserver {
    /// 当前输出状态的逻辑视角快照
    ///
    /// 极性换算自反，逆向判读复用 `drive`。
    pub fn state(&self) -> BoardState {
        let shared = self.shared.lock();
        let BoardShared { profile, pins, .. } = &*shared;
        let mut state = BoardState::default();
        for index in 0..LANE_COUNT {
            state.lane_power[index] = profile.lane_relay.drive(pins.lane_relay[index]);
            let (green_pin, red_pin) = pins.indicator_legs[index];
            let green = profile.indicator.drive(green_pin);
            let red = profile.indicator.drive(red_pin);
            state.lane_indicator[index] = match (green, red) {
                (true, _) => IndicatorColor::Green,
                (false, true) => IndicatorColor::Red,
                (false, false) => IndicatorColor::Off,
            };
        }
        state.global_power = profile.global_relay.drive(pins.global_relay);
        for index in 0..TREE_LIGHT_COUNT {
            state.tree_lights[index] = profile.light.drive(pins.tree_lights[index]);
        }
        state.go_light = profile.light.drive(pins.go_light);
        state.stop_light = profile.light.drive(pins.stop_light);
        state.caution_light = profile.light.drive(pins.caution_light);
        state
    }

    /// 直接给四路模式线设原始电平（MSB 线在前）
    pub fn set_mode_lines(&self, levels: [bool; 4]) {
        self.shared.lock().mode_lines = levels;
    }

    /// 按目标模式值摆好拨码（内部换算成抵消上拉的电平）
    pub fn set_mode_nibble(&self, nibble: u8) {
        let mut levels = [true; 4];
        for (i, level) in levels.iter_mut().enumerate() {
            let bit = 3 - i as u8;
            *level = nibble & (1 << bit) == 0;
        }
        self.shared.lock().mode_lines = levels;
    }

    /// 压下一只按键（保持到 [`release_button`](Self::release_button)）
    pub fn press_button(&self, button: Button) {
        self.shared.lock().buttons[(u8::from(button) - 1) as usize] = true;
    }

    /// 松开一只按键
    pub fn release_button(&self, button: Button) {
        self.shared.lock().buttons[(u8::from(button) - 1) as usize] = false;
    }

    /// 取走并清空车道继电器写入记录
    pub fn take_power_log(&self) -> Vec<(u8, bool)> {
        std::mem::take(&mut self.shared.lock().power_log)
    }
}

#[derive(Debug, Default)]
struct LinkShared {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    closed: bool,
}

/// Mock 主机链路
///
/// 入站字节从测试脚本排进队列，出站字节全部留底。
pub struct MockLink {
    shared: Arc<Mutex<LinkShared>>,
}

/// Mock 链路的观测/编排句柄
#[derive(Clone)]
pub struct LinkObserver {
    shared: Arc<Mutex<LinkShared>>,
}

impl MockLink {
    pub fn new() -> (MockLink, LinkObserver) {
        let shared = Arc::new(Mutex::new(LinkShared::default()));
        (
            MockLink {
                shared: Arc::clone(&shared),
            },
            LinkObserver { shared },
        )
    }
}

impl HostLink for MockLink {
    fn poll_byte(&mut self) -> Result<Option<u8>, LinkError> {
        let mut shared = self.shared.lock();
        if let Some(byte) = shared.inbound.pop_front() {
            return Ok(Some(byte));
        }
        if shared.closed {
            Err(LinkError::Closed)
        } else {
            Ok(None)
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut shared = self.shared.lock();
        if shared.closed {
            return Err(LinkError::Closed);
        }
        shared.outbound.extend_from_slice(bytes);
        Ok(())
    }
}

impl LinkObserver {
    /// 排入一段入站字节
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.shared.lock().inbound.extend(bytes.iter().copied());
    }

    /// 出站留底的文本视图
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.shared.lock().outbound).into_owned()
    }

    /// 取走并清空出站留底
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.shared.lock().outbound)
    }

    /// 模拟对端断开（入站残余字节读完后开始报 `Closed`）
    pub fn close(&self) {
        self.shared.lock().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::OutputPolarity;

    #[test]
    fn test_mock_board_records_outputs() {
        let (mut board, observer) = MockBoard::new();
        let lane = LaneId::new(2).unwrap();

        board.set_lane_power(lane, true);
        board.set_lane_indicator(lane, IndicatorColor::Green);
        board.set_tree_light(3, true);

        let state = observer.state();
        assert!(state.lane_power[1]);
        assert_eq!(state.lane_indicator[1], IndicatorColor::Green);
        assert!(state.tree_lights[2]);
        assert_eq!(observer.take_power_log(), vec![(2, true)]);
    }

    #[test]
    fn test_mock_board_active_low_pins() {
        let profile = BoardProfile {
            lane_relay: OutputPolarity::ActiveLow,
            global_relay: OutputPolarity::ActiveLow,
            indicator: OutputPolarity::ActiveHigh,
            light: OutputPolarity::ActiveLow,
        };
        let (mut board, observer) = MockBoard::with_profile(profile);
        let lane = LaneId::new(1).unwrap();

        // 逻辑"断"时常闭继电器引脚为高
        assert!(board.shared.lock().pins.lane_relay[0]);
        assert!(board.shared.lock().pins.global_relay);

        board.set_lane_power(lane, true);
        board.set_global_power(true);
        board.set_go_light(true);
        assert!(!board.shared.lock().pins.lane_relay[0]);
        assert!(!board.shared.lock().pins.global_relay);
        assert!(!board.shared.lock().pins.go_light);

        // 观测侧仍是逻辑视角
        let state = observer.state();
        assert!(state.lane_power[0]);
        assert!(state.global_power);
        assert!(state.go_light);
    }

    #[test]
    fn test_mock_board_indicator_legs() {
        let (mut board, observer) = MockBoard::new();
        let lane = LaneId::new(4).unwrap();

        board.set_lane_indicator(lane, IndicatorColor::Red);
        assert_eq!(board.shared.lock().pins.indicator_legs[3], (false, true));
        assert_eq!(observer.state().lane_indicator[3], IndicatorColor::Red);

        board.set_lane_indicator(lane, IndicatorColor::Off);
        assert_eq!(observer.state().lane_indicator[3], IndicatorColor::Off);
    }

    #[test]
    fn test_mock_board_mode_nibble_scripting() {
        let (mut board, observer) = MockBoard::new();
        observer.set_mode_nibble(11);
        // 11 = 0b1011：bit3/bit1/bit0 闭合（低），bit2 断开（高）
        assert_eq!(board.read_mode_lines(), [false, true, false, false]);
        assert_eq!(
            crate::board::compose_mode_nibble(board.read_mode_lines()),
            11
        );
    }

    #[test]
    fn test_mock_board_buttons() {
        let (mut board, observer) = MockBoard::new();
        assert_eq!(board.read_buttons(), [false; BUTTON_COUNT]);

        observer.press_button(Button::Pause);
        assert_eq!(board.read_buttons(), [false, false, true]);

        observer.release_button(Button::Pause);
        assert_eq!(board.read_buttons(), [false; BUTTON_COUNT]);
    }

    #[test]
    fn test_mock_link_round_trip() {
        let (mut link, observer) = MockLink::new();
        observer.push_bytes(b"[RC0]");

        let mut collected = Vec::new();
        while let Ok(Some(byte)) = link.poll_byte() {
            collected.push(byte);
        }
        assert_eq!(collected, b"[RC0]");

        link.write_line("[SF01$842]").unwrap();
        assert_eq!(observer.output_string(), "[SF01$842]\r\n");
    }

    #[test]
    fn test_mock_link_close_after_drain() {
        let (mut link, observer) = MockLink::new();
        observer.push_bytes(b"x");
        observer.close();

        // 残余字节仍可读出，然后才报断开
        assert_eq!(link.poll_byte().unwrap(), Some(b'x'));
        assert!(matches!(link.poll_byte(), Err(LinkError::Closed)));
        assert!(matches!(link.write_all(b"y"), Err(LinkError::Closed)));
    }
}
