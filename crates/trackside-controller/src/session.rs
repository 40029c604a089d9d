//! 会话 API 模块
//!
//! 提供对外的 [`TrackSession`] 结构体，封装服务线程的生命周期、
//! 脉冲投递和状态查询细节。

use std::{
    mem::ManuallyDrop,
    sync::{Arc, atomic::Ordering},
    thread::{Builder, JoinHandle, spawn},
    time::Duration,
};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{error, warn};

use trackside_hal::{HostLink, MonotonicClock, TrackBoard};
use trackside_protocol::LaneId;

use crate::{
    controller::{ControllerConfig, TrackController},
    error::SessionError,
    metrics::{ControllerMetrics, MetricsSnapshot},
    service::{PulseEvent, service_loop},
    state::{ControllerSnapshot, SessionContext},
};

/// Extension trait for timeout-capable thread joins
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        let (tx, rx) = mpsc::channel();

        // 看门狗线程代为 join，结果经通道传回
        spawn(move || {
            let result = self.join();
            // 接收端可能已超时离开，发送失败可忽略
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // 超时后看门狗继续挂着，进程退出时由系统回收
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 赛道会话（对外 API）
///
/// [`spawn`](TrackSession::spawn) 把板卡与主机链路移交给后台服务
/// 线程，此后调用方只经三个通道与它打交道：
///
/// - [`pulse`](TrackSession::pulse) 投递冲线边沿；
/// - [`snapshot`](TrackSession::snapshot) 读取无锁状态快照；
/// - [`metrics`](TrackSession::metrics) 读取累计计数器。
///
/// Drop 时通知服务线程退出并等待其收尾。
pub struct TrackSession {
    /// 冲线脉冲发送端
    ///
    /// Drop 时必须在 join 服务线程 **之前** 真正丢弃，否则服务
    /// 循环收不到 `Disconnected`，退出会卡在 join 上。
    pulse_tx: ManuallyDrop<Sender<PulseEvent>>,
    /// 共享会话上下文（运行标志 + 状态快照）
    ctx: Arc<SessionContext>,
    /// 单调钟，投递脉冲时打时间戳
    clock: MonotonicClock,
    /// 计数器句柄
    metrics: Arc<ControllerMetrics>,
    /// 服务线程句柄（Drop 时 join）
    service_thread: Option<JoinHandle<()>>,
}

impl TrackSession {
    /// 启动会话
    ///
    /// # 参数
    /// - `board`: 赛道板卡（移交给服务线程）
    /// - `link`: 主机链路（移交给服务线程）
    /// - `config`: 控制器运行参数
    ///
    /// # 错误
    /// - [`SessionError::Spawn`]: 操作系统拒绝创建线程
    pub fn spawn<B, L>(board: B, link: L, config: ControllerConfig) -> Result<Self, SessionError>
    where
        B: TrackBoard + Send + 'static,
        L: HostLink + Send + 'static,
    {
        let clock = MonotonicClock::new();
        let mut controller = TrackController::new(board, config);
        let metrics = controller.metrics_handle();
        let ctx = Arc::new(SessionContext::new(controller.snapshot(clock.now_ms())));
        let (pulse_tx, pulse_rx) = crossbeam_channel::bounded(config.pulse_queue_depth);

        let loop_ctx = Arc::clone(&ctx);
        let service_thread = Builder::new()
            .name("trackside-service".into())
            .spawn(move || {
                service_loop(controller, link, pulse_rx, clock, loop_ctx);
            })?;

        Ok(Self {
            pulse_tx: ManuallyDrop::new(pulse_tx),
            ctx,
            clock,
            metrics,
            service_thread: Some(service_thread),
        })
    }

    /// 投递一次冲线边沿
    ///
    /// 时间戳在本方法内当场打好，之后经有界队列交给服务线程，
    /// 排队延迟不影响圈时。队列满按硬件丢边沿对待：计数、告警、
    /// 返回 `Ok`。
    ///
    /// # 错误
    /// - [`SessionError::ServiceStopped`]: 服务线程已退出
    pub fn pulse(&self, lane: LaneId) -> Result<(), SessionError> {
        let event = PulseEvent {
            lane,
            at_ms: self.clock.now_ms(),
        };
        match self.pulse_tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.metrics.pulses_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(lane = lane.number(), "脉冲队列已满，边沿丢弃");
                Ok(())
            },
            Err(TrySendError::Disconnected(_)) => Err(SessionError::ServiceStopped),
        }
    }

    /// 最近一次发布的状态快照
    ///
    /// 无锁读取，适合高频轮询。
    pub fn snapshot(&self) -> Arc<ControllerSnapshot> {
        self.ctx.snapshot.load_full()
    }

    /// 累计计数器的一致性读数
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 服务线程是否仍在运行
    pub fn is_running(&self) -> bool {
        self.ctx.is_running.load(Ordering::Acquire)
    }
}

impl Drop for TrackSession {
    fn drop(&mut self) {
        // 置运行标志为 false，通知服务线程退出
        // Release: 保证此前的写入对服务线程可见
        self.ctx.is_running.store(false, Ordering::Release);

        // 关闭脉冲通道
        // 必须在 join 之前真正 drop 掉 Sender，否则接收端不会 Disconnected
        unsafe {
            ManuallyDrop::drop(&mut self.pulse_tx);
        }

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.service_thread.take()
            && let Err(_e) = handle.join_timeout(join_timeout)
        {
            error!(
                "Service thread panicked or failed to shut down within {:?}",
                join_timeout
            );
        }
    }
}
