//! 服务循环：脉冲入队、令牌分发与上行回写
//!
//! 单线程伺服模型：全部板卡写入和赛况变更都发生在服务线程内，
//! 冲线脉冲从别的线程经有界通道投递进来，节拍入口一次性排净。
//! 通道在这里扮演边沿锁存器的角色：脉冲带着发生时刻入队，排队
//! 延迟不会吃掉圈时精度。

use std::{
    sync::{Arc, atomic::Ordering},
    time::Duration,
};

use crossbeam_channel::{Receiver, TryRecvError};
use tracing::{debug, error, info, trace};

use trackside_hal::{HostLink, LinkError, MonotonicClock, TrackBoard};
use trackside_protocol::{HostCommand, LaneId, TokenScanner};

use crate::{controller::TrackController, state::SessionContext};

/// 一次冲线脉冲事件
///
/// `at_ms` 是边沿被捕获的时刻（单调钟毫秒），由投递方打点。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseEvent {
    pub lane: LaneId,
    pub at_ms: u64,
}

// 编译期断言：PulseEvent 必须保持 Copy（跨线程按值投递）
#[cfg(test)]
const _: () = {
    fn assert_copy<T: Copy>() {}
    fn check() {
        assert_copy::<PulseEvent>();
    }
    let _ = check;
};

/// 服务循环
///
/// # 参数
/// - `controller`: 赛道控制器（循环独占）
/// - `link`: 主机链路
/// - `pulse_rx`: 冲线脉冲接收端（有界通道）
/// - `clock`: 单调钟
/// - `ctx`: 共享会话上下文（运行标志 + 状态快照）
///
/// # 节拍结构
/// 每个节拍依次是：排净脉冲队列、至多一条主机命令、按键扫描、
/// 车道汇集、上行回写、快照发布，最后按配置间隔休眠。
pub fn service_loop<B: TrackBoard, L: HostLink>(
    mut controller: TrackController<B>,
    mut link: L,
    pulse_rx: Receiver<PulseEvent>,
    clock: MonotonicClock,
    ctx: Arc<SessionContext>,
) {
    // 设置线程优先级（可选 feature）
    #[cfg(feature = "realtime")]
    {
        use thread_priority::*;
        use tracing::warn;

        match set_current_thread_priority(ThreadPriority::Max) {
            Ok(_) => {
                info!("Service thread priority set to MAX (realtime)");
            },
            Err(e) => {
                warn!(
                    "Failed to set service thread priority: {}. \
                    On Linux, you may need to run with CAP_SYS_NICE or use rtkit. \
                    See README for details.",
                    e
                );
            },
        }
    }

    let metrics = controller.metrics_handle();
    let pacing = Duration::from_millis(controller.config().pacing_interval_ms);

    // 上电自检先于第一个服务节拍
    controller.startup_exercise();

    // 行缓冲与帧扫描器跨节拍复用
    let mut out: Vec<String> = Vec::new();
    let mut scanner = TokenScanner::new();

    info!(
        pacing_ms = controller.config().pacing_interval_ms,
        "服务循环启动"
    );

    'outer: loop {
        // 检查运行标志
        // Acquire: 读到 false 时，置位线程此前的写入都已可见
        if !ctx.is_running.load(Ordering::Acquire) {
            trace!("Service loop: is_running flag is false, exiting");
            break;
        }

        let pass_begin_us = clock.now_us();

        // ============================================================
        // 1. 排净脉冲队列（时间戳在投递侧已打好）
        // ============================================================
        loop {
            match pulse_rx.try_recv() {
                Ok(pulse) => controller.on_pulse(pulse.lane, pulse.at_ms),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // 会话句柄已销毁，正常收尾
                    debug!("Service loop: pulse channel disconnected, exiting");
                    break 'outer;
                },
            }
        }

        let now_ms = clock.now_ms();

        // ============================================================
        // 2. 至多一条主机命令，随后按键扫描与车道汇集
        // ============================================================
        if dispatch_one_command(&mut controller, &mut link, &mut scanner, now_ms, &mut out) {
            break 'outer;
        }
        controller.scan_buttons(now_ms, &mut out);
        controller.drain_reports(now_ms, &mut out);

        // ============================================================
        // 3. 上行回写、快照发布、节拍休眠
        // ============================================================
        for line in out.drain(..) {
            match link.write_line(&line) {
                Ok(()) => {},
                Err(LinkError::Closed) => {
                    error!("Service loop: host link closed, exiting");
                    break 'outer;
                },
                Err(e) => {
                    metrics.link_write_errors.fetch_add(1, Ordering::Relaxed);
                    error!("Service loop: link write error: {}", e);
                },
            }
        }
        ctx.snapshot.store(Arc::new(controller.snapshot(now_ms)));

        let busy_us = clock.now_us().saturating_sub(pass_begin_us);
        metrics.loop_busy_us_max.fetch_max(busy_us, Ordering::Relaxed);
        spin_sleep::sleep(pacing);
    }

    // Release: 之后读到 false 的线程能看到循环内的全部写入
    ctx.is_running.store(false, Ordering::Release);
    info!("Service loop exited");
}

/// 从链路取字节喂进帧扫描器，至多分发一条完整命令
///
/// 单节拍单命令：两条命令之间必然隔着一轮车道汇集，主机连发与
/// 逐条慢发行为一致。
///
/// # 返回值
/// 返回链路是否已关闭（需要退出服务循环）。
fn dispatch_one_command<B: TrackBoard, L: HostLink>(
    controller: &mut TrackController<B>,
    link: &mut L,
    scanner: &mut TokenScanner,
    now_ms: u64,
    out: &mut Vec<String>,
) -> bool {
    loop {
        let byte = match link.poll_byte() {
            Ok(Some(byte)) => byte,
            Ok(None) => return false,
            Err(LinkError::Closed) => {
                error!("Service loop: host link closed while reading");
                return true;
            },
            Err(e) => {
                error!("Service loop: link read error: {}", e);
                return false;
            },
        };
        if let Some(token) = scanner.push(byte) {
            match HostCommand::parse(token.as_bytes()) {
                Some(command) => {
                    controller
                        .metrics()
                        .commands_dispatched
                        .fetch_add(1, Ordering::Relaxed);
                    trace!(?command, "主机命令分发");
                    controller.apply(command, now_ms, out);
                },
                None => {
                    controller
                        .metrics()
                        .tokens_ignored
                        .fetch_add(1, Ordering::Relaxed);
                    debug!(token = %token, "未识别令牌，忽略");
                },
            }
            return false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{controller::ControllerConfig, metrics::ControllerMetrics};
    use crossbeam_channel::{Sender, bounded};
    use std::{thread, time::Instant};
    use trackside_hal::{BoardObserver, LinkObserver, MockBoard, MockLink};
    use trackside_protocol::Button;

    /// 轮询等待条件成立，超时视为测试失败
    fn wait_for(mut predicate: impl FnMut() -> bool) {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(2) {
            if predicate() {
                return;
            }
            thread::sleep(Duration::from_millis(2));
        }
        panic!("condition not met within 2s");
    }

    struct Rig {
        ctx: Arc<SessionContext>,
        board: BoardObserver,
        host: LinkObserver,
        pulse_tx: Sender<PulseEvent>,
        metrics: Arc<ControllerMetrics>,
        clock: MonotonicClock,
        handle: thread::JoinHandle<()>,
    }

    impl Rig {
        fn shutdown(self) {
            self.ctx.is_running.store(false, Ordering::Release);
            let _ = self.handle.join();
        }
    }

    fn spawn_rig() -> Rig {
        let (board, board_observer) = MockBoard::new();
        let (link, host) = MockLink::new();
        let clock = MonotonicClock::new();
        // 测试里把保护窗和自检保持时间归零，免得空等
        let config = ControllerConfig {
            protection_window_ms: 0,
            startup_dwell_ms: 0,
            ..ControllerConfig::default()
        };
        let mut controller = TrackController::new(board, config);
        let metrics = controller.metrics_handle();
        let ctx = Arc::new(SessionContext::new(controller.snapshot(0)));
        let (pulse_tx, pulse_rx) = bounded(config.pulse_queue_depth);
        let loop_ctx = Arc::clone(&ctx);
        let handle = thread::spawn(move || {
            service_loop(controller, link, pulse_rx, clock, loop_ctx);
        });
        Rig {
            ctx,
            board: board_observer,
            host,
            pulse_tx,
            metrics,
            clock,
            handle,
        }
    }

    #[test]
    fn test_framed_command_survives_line_noise() {
        let rig = spawn_rig();

        rig.host.push_bytes(b"garbage[PW011]more");
        wait_for(|| rig.board.state().lane_power[0]);
        // 快照同步发布
        wait_for(|| rig.ctx.snapshot.load().lanes[0].powered);

        rig.shutdown();
    }

    #[test]
    fn test_lap_pulse_writes_report_line() {
        let rig = spawn_rig();

        let at_ms = rig.clock.now_ms();
        rig.pulse_tx
            .send(PulseEvent {
                lane: LaneId::new(3).unwrap(),
                at_ms,
            })
            .unwrap();
        wait_for(|| rig.host.output_string().contains("[SF03$"));
        assert!(rig.host.output_string().contains("\r\n"));

        rig.shutdown();
    }

    #[test]
    fn test_button_press_reported_over_link() {
        let rig = spawn_rig();

        rig.board.press_button(Button::Start);
        wait_for(|| rig.host.output_string().contains("[BT01]"));
        wait_for(|| rig.ctx.snapshot.load().race.state == crate::race::RaceState::Started);

        rig.shutdown();
    }

    #[test]
    fn test_unknown_token_ignored_and_counted() {
        let rig = spawn_rig();

        rig.host.push_bytes(b"[XX999]");
        wait_for(|| rig.metrics.snapshot().tokens_ignored == 1);
        assert!(!rig.host.output_string().contains("[SF"));

        rig.shutdown();
    }

    #[test]
    fn test_debug_dump_renders_plain_lines() {
        let rig = spawn_rig();

        rig.host.push_bytes(b"[RC0]");
        rig.host.push_bytes(b"[DEBUG]");
        wait_for(|| rig.host.output_string().contains("race: state=init"));
        let output = rig.host.output_string();
        assert!(output.contains("lane 6:"));
        assert!(output.contains("counters:"));

        rig.shutdown();
    }

    #[test]
    fn test_loop_exits_when_pulse_channel_dropped() {
        let rig = spawn_rig();

        drop(rig.pulse_tx);
        wait_for(|| !rig.ctx.is_running.load(Ordering::Acquire));
        let _ = rig.handle.join();
    }

    #[test]
    fn test_loop_exits_when_host_link_closes() {
        let rig = spawn_rig();

        rig.host.close();
        wait_for(|| !rig.ctx.is_running.load(Ordering::Acquire));
        let _ = rig.handle.join();
    }
}
