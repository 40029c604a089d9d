//! 赛道板输出/输入抽象
//!
//! 一块赛道板上的全部固定 I/O：每车道一路继电器和一只红绿双色指示灯、
//! 一路总电源继电器（带指示灯）、五灯发车灯塔、绿/停/警示三只全局灯、
//! 四位模式拨码开关、三只瞬时按键。
//!
//! 控制核心通过 [`TrackBoard`] trait 驱动这些 I/O，只讲逻辑电平；
//! 电气极性换算收敛在板卡实现内部，见 [`BoardProfile`]。

use trackside_protocol::{BUTTON_COUNT, LaneId, TREE_LIGHT_COUNT};

/// 输出端电气极性
///
/// 不同批次的板子混用了常开/常闭继电器和灌电流/拉电流 LED 接法，
/// 历史上为此反复改过驱动代码。极性在这里一次性建模：逻辑"通"经
/// [`OutputPolarity::drive`] 换算成引脚电平，核心代码不再出现取反。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OutputPolarity {
    /// 高电平有效（常开继电器、拉电流 LED）
    ActiveHigh,
    /// 低电平有效（常闭继电器、灌电流 LED）
    ActiveLow,
}

impl OutputPolarity {
    /// 把逻辑"通/断"换算成引脚电平
    pub fn drive(self, logical_on: bool) -> bool {
        match self {
            OutputPolarity::ActiveHigh => logical_on,
            OutputPolarity::ActiveLow => !logical_on,
        }
    }
}

/// 一块板子的极性档案
///
/// 每类输出一个极性常量，按部署批次整体替换。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoardProfile {
    /// 车道继电器
    pub lane_relay: OutputPolarity,
    /// 总电源继电器
    pub global_relay: OutputPolarity,
    /// 车道双色指示灯
    pub indicator: OutputPolarity,
    /// 灯塔与全局信号灯
    pub light: OutputPolarity,
}

impl Default for BoardProfile {
    /// 当前量产批次：常开继电器高电平吸合，全部 LED 拉电流接法
    fn default() -> Self {
        Self {
            lane_relay: OutputPolarity::ActiveHigh,
            global_relay: OutputPolarity::ActiveHigh,
            indicator: OutputPolarity::ActiveHigh,
            light: OutputPolarity::ActiveHigh,
        }
    }
}

/// 车道双色指示灯状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum IndicatorColor {
    /// 熄灭
    #[default]
    Off,
    /// 绿：车道供电正常
    Green,
    /// 红：车道断电（抢跑处罚或人工断电）
    Red,
}

/// 赛道板接口
///
/// 输出方法讲逻辑电平；输入方法返回原始电平（模式开关）或已判读的
/// 逻辑电平（按键），具体见各方法说明。所有方法都不允许阻塞。
pub trait TrackBoard {
    /// 车道供电继电器
    fn set_lane_power(&mut self, lane: LaneId, on: bool);

    /// 车道双色指示灯
    fn set_lane_indicator(&mut self, lane: LaneId, color: IndicatorColor);

    /// 总电源继电器（其随动指示灯由实现一并驱动）
    fn set_global_power(&mut self, on: bool);

    /// 发车灯塔单灯，`index` 取 1..=5
    fn set_tree_light(&mut self, index: u8, on: bool);

    /// 绿灯（发车信号）
    fn set_go_light(&mut self, on: bool);

    /// 停车灯
    fn set_stop_light(&mut self, on: bool);

    /// 警示灯
    fn set_caution_light(&mut self, on: bool);

    /// 读模式拨码开关的四路原始电平
    ///
    /// 四条线上拉、拨码闭合时拉低。返回顺序是 MSB 在前（bit3..bit0
    /// 对应的四条线），换算见 [`compose_mode_nibble`]。
    fn read_mode_lines(&mut self) -> [bool; 4];

    /// 读三只按键的逻辑电平（`true` = 按下）
    fn read_buttons(&mut self) -> [bool; BUTTON_COUNT];

    /// 熄灭全部信号灯（灯塔 + 绿/停/警示）
    ///
    /// 上电自检和会话启动时使用。
    fn blank_lights(&mut self) {
        for index in 1..=TREE_LIGHT_COUNT as u8 {
            self.set_tree_light(index, false);
        }
        self.set_go_light(false);
        self.set_stop_light(false);
        self.set_caution_light(false);
    }
}

/// 把模式开关的四路原始电平合成模式半字节
///
/// 线序 MSB 在前：`levels[0]` 是 bit3，`levels[3]` 是 bit0。线上拉、
/// 拨码闭合拉低，因此电平取反后才是该位的值。
///
/// # 示例
///
/// ```rust
/// use trackside_hal::board::compose_mode_nibble;
///
/// // bit3 闭合(低) + bit1/bit0 闭合(低)，bit2 断开(高) => 8 + 2 + 1 = 11
/// assert_eq!(compose_mode_nibble([false, true, false, false]), 11);
/// ```
pub fn compose_mode_nibble(levels: [bool; 4]) -> u8 {
    levels
        .iter()
        .fold(0u8, |nibble, &level| (nibble << 1) | (!level as u8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polarity_drive() {
        assert!(OutputPolarity::ActiveHigh.drive(true));
        assert!(!OutputPolarity::ActiveHigh.drive(false));
        assert!(!OutputPolarity::ActiveLow.drive(true));
        assert!(OutputPolarity::ActiveLow.drive(false));
    }

    #[test]
    fn test_default_profile_is_active_high() {
        let profile = BoardProfile::default();
        assert_eq!(profile.lane_relay, OutputPolarity::ActiveHigh);
        assert_eq!(profile.indicator, OutputPolarity::ActiveHigh);
    }

    #[test]
    fn test_compose_mode_nibble_all_open() {
        // 全部拨码断开：四线都被上拉为高 => 0
        assert_eq!(compose_mode_nibble([true, true, true, true]), 0);
    }

    #[test]
    fn test_compose_mode_nibble_all_closed() {
        assert_eq!(compose_mode_nibble([false, false, false, false]), 15);
    }

    #[test]
    fn test_compose_mode_nibble_msb_first() {
        // 只有 bit3 线拉低 => 8
        assert_eq!(compose_mode_nibble([false, true, true, true]), 8);
        // 只有 bit0 线拉低 => 1
        assert_eq!(compose_mode_nibble([true, true, true, false]), 1);
    }

    #[test]
    fn test_compose_mode_nibble_eleven() {
        assert_eq!(compose_mode_nibble([false, true, false, false]), 11);
    }
}
