//! 模拟命令
//!
//! 在 Mock 板卡 + 内存链路上拉起一个完整的控制器会话，把终端当
//! 作上位机用：输入的文本帧原样发给控制器，控制器写出的报文按行
//! 回显。联调主机软件、演示抢跑流程都在这一个命令里。

use std::{
    io::{self, BufRead, Write},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, bail};
use clap::Args;
use rand::Rng;
use trackside_sdk::{
    ControllerConfig, LaneId, TrackSession,
    controller::PENALTY_TABLE_MS,
    hal::{BoardObserver, ChannelLink, LinkPeer, MockBoard},
    protocol::Button,
};

/// 模拟命令参数
#[derive(Args, Debug)]
pub struct SimulateCommand {
    /// 模式拨码（0-15，8 及以上启用抢跑检测）
    #[arg(short, long, default_value_t = 0)]
    pub mode: u8,

    /// 冲线保护窗（毫秒）
    #[arg(long, default_value_t = 3000)]
    pub window_ms: u64,

    /// 后台随机车流：随机车道、随机间隔地冲线
    #[arg(long)]
    pub demo: bool,
}

impl SimulateCommand {
    /// 执行模拟会话
    pub fn execute(&self) -> Result<()> {
        if self.mode > 15 {
            bail!("mode must be 0-15, got {}", self.mode);
        }

        let (board, observer) = MockBoard::new();
        observer.set_mode_nibble(self.mode);
        let (link, peer) = ChannelLink::pair(1024);
        let config = ControllerConfig {
            protection_window_ms: self.window_ms,
            ..ControllerConfig::default()
        };
        let session = Arc::new(TrackSession::spawn(board, link, config)?);

        let running = Arc::new(AtomicBool::new(true));
        {
            let running = Arc::clone(&running);
            ctrlc::set_handler(move || {
                running.store(false, Ordering::Release);
                println!("\n(已中断，回车或输入 quit 退出)");
            })?;
        }

        println!(
            "🏁 模拟会话已启动（mode={}，保护窗 {}ms）",
            self.mode, self.window_ms
        );
        if self.mode > 7 {
            println!(
                "   拨码含义：抢跑检测 on，罚时 {} ms（发 RC0 后生效）",
                PENALTY_TABLE_MS[(self.mode - 8) as usize]
            );
        } else {
            println!("   拨码含义：抢跑检测 off（发 RC0 后生效）");
        }
        println!("   命令：pulse <1-6> | btn <1-3> | status | quit，其余内容发给控制器");

        // 打印线程：控制器写出的字节按行回显为 "<< ..."
        let printer = {
            let running = Arc::clone(&running);
            let peer_rx = peer.receiver();
            thread::spawn(move || {
                let mut acc: Vec<u8> = Vec::new();
                while running.load(Ordering::Acquire) {
                    while let Ok(byte) = peer_rx.try_recv() {
                        acc.push(byte);
                    }
                    while let Some(pos) = acc.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = acc.drain(..=pos).collect();
                        let text = String::from_utf8_lossy(&line);
                        let text = text.trim_end_matches(['\r', '\n']);
                        if !text.is_empty() {
                            println!("<< {text}");
                        }
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            })
        };

        // 随机车流线程（--demo）
        let demo = self.demo.then(|| {
            let running = Arc::clone(&running);
            let session = Arc::clone(&session);
            thread::spawn(move || {
                let mut rng = rand::thread_rng();
                while running.load(Ordering::Acquire) {
                    thread::sleep(Duration::from_millis(rng.gen_range(400..2_500)));
                    let lane_number = rng.gen_range(1u8..=6);
                    if let Some(lane) = LaneId::new(lane_number)
                        && session.pulse(lane).is_err()
                    {
                        break;
                    }
                }
            })
        });

        // 输入循环：终端扮演上位机
        let stdin = io::stdin();
        print_prompt();
        for line in stdin.lock().lines() {
            let line = line?;
            let input = line.trim();
            if !running.load(Ordering::Acquire) {
                break;
            }
            match input {
                "" => {},
                "quit" | "exit" => break,
                "status" => print_status(&session, &observer),
                _ => {
                    if let Some(rest) = input.strip_prefix("pulse ") {
                        handle_pulse(&session, rest);
                    } else if let Some(rest) = input.strip_prefix("btn ") {
                        handle_button(&observer, rest);
                    } else if input.starts_with('[') {
                        send_raw(&peer, input.as_bytes());
                    } else {
                        send_raw(&peer, format!("[{input}]").as_bytes());
                    }
                },
            }
            if !running.load(Ordering::Acquire) {
                break;
            }
            print_prompt();
        }

        running.store(false, Ordering::Release);
        let _ = printer.join();
        if let Some(handle) = demo {
            let _ = handle.join();
        }
        println!("👋 会话结束");
        Ok(())
    }
}

fn print_prompt() {
    print!("trackside> ");
    let _ = io::stdout().flush();
}

fn handle_pulse(session: &TrackSession, arg: &str) {
    match arg.trim().parse::<u8>().ok().and_then(LaneId::new) {
        Some(lane) => {
            if let Err(e) = session.pulse(lane) {
                println!("!! pulse failed: {e}");
            }
        },
        None => println!("!! lane must be 1-6"),
    }
}

fn handle_button(observer: &BoardObserver, arg: &str) {
    let button = arg
        .trim()
        .parse::<u8>()
        .ok()
        .and_then(|n| Button::try_from(n).ok());
    match button {
        Some(button) => {
            observer.press_button(button);
            // 按住几个服务节拍，让扫描抓到上升沿
            thread::sleep(Duration::from_millis(20));
            observer.release_button(button);
        },
        None => println!("!! button must be 1-3"),
    }
}

fn send_raw(peer: &LinkPeer, bytes: &[u8]) {
    if let Err(e) = peer.send_bytes(bytes) {
        println!("!! link error: {e}");
    }
}

fn print_status(session: &TrackSession, observer: &BoardObserver) {
    let snapshot = session.snapshot();
    let board = observer.state();
    println!(
        "race: {:?} (prev {:?})  false-start: enabled={} detected={} penalty={}ms served={}ms",
        snapshot.race.state,
        snapshot.race.previous,
        snapshot.race.false_start_enabled,
        snapshot.race.false_start_detected,
        snapshot.race.penalty_time_ms,
        snapshot.race.penalty_served_ms
    );
    println!(
        "lights: tree={:?} go={} stop={} caution={}  global-power={}",
        board.tree_lights, board.go_light, board.stop_light, board.caution_light, board.global_power
    );
    for lane in snapshot.lanes.iter() {
        println!(
            "lane {}: laps={} powered={} latched={} last_finish={}ms",
            lane.lane, lane.lap_count, lane.powered, lane.false_start_latched, lane.last_finish_ms
        );
    }
    let metrics = session.metrics();
    println!(
        "pulses: {} ok / {} window-drop / {} queue-drop",
        metrics.pulses_accepted, metrics.pulses_discarded, metrics.pulses_dropped
    );
    println!(
        "loop: busy_max={}us  write-errors={}",
        metrics.loop_busy_us_max, metrics.link_write_errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_command_defaults() {
        let cmd = SimulateCommand {
            mode: 0,
            window_ms: 3_000,
            demo: false,
        };

        assert_eq!(cmd.mode, 0);
        assert_eq!(cmd.window_ms, 3_000);
        assert!(!cmd.demo);
    }

    #[test]
    fn test_mode_out_of_range_rejected() {
        let cmd = SimulateCommand {
            mode: 16,
            window_ms: 3_000,
            demo: false,
        };

        assert!(cmd.execute().is_err());
    }
}
