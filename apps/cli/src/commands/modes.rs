//! 模式拨码一览
//!
//! 板卡上的四路拨码开关（低电平有效，闭合 = 对应位取 1）决定抢跑
//! 检测与罚时档位。这里把 16 个组合摊开打印，方便贴在赛道旁。

use trackside_sdk::controller::PENALTY_TABLE_MS;

/// 打印全部模式拨码的含义
pub fn run() {
    println!("mode  switches(1-4)  false-start  penalty");
    for mode in 0u8..16 {
        if mode > 7 {
            let penalty = PENALTY_TABLE_MS[(mode - 8) as usize];
            println!("{mode:>4}  {mode:04b}           on           {penalty} ms");
        } else {
            println!("{mode:>4}  {mode:04b}           off          -");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 罚时表和拨码档位一一对应
    #[test]
    fn test_penalty_table_covers_modes_8_to_15() {
        assert_eq!(PENALTY_TABLE_MS.len(), 8);
        assert_eq!(PENALTY_TABLE_MS[0], 0);
        assert_eq!(PENALTY_TABLE_MS[7], 7_000);
    }
}
