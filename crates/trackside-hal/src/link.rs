//! 主机串行链路抽象
//!
//! 控制器与计时主机之间是一条字节流链路（串口或其替身）。服务循环
//! 对链路的要求只有两条：读必须是非阻塞轮询（每次至多取一个字节），
//! 写把整段字节交出去。帧提取在协议层完成，链路层不理解括号。

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use thiserror::Error;
use tracing::debug;

/// 链路统一错误类型
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Host link closed")]
    Closed,
    #[error("Outbound buffer full")]
    OutboundFull,
}

/// 主机链路接口
pub trait HostLink {
    /// 非阻塞地取一个入站字节
    ///
    /// # 返回值
    ///
    /// - `Ok(Some(byte))`: 取到一个字节
    /// - `Ok(None)`: 当前无数据（正常情况，调用方继续本轮其它工作）
    /// - `Err(LinkError::Closed)`: 对端已断开，会话应当收尾
    fn poll_byte(&mut self) -> Result<Option<u8>, LinkError>;

    /// 写出一段字节
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// 写出一行文本（补 CRLF，串口惯例）
    fn write_line(&mut self, line: &str) -> Result<(), LinkError> {
        self.write_all(line.as_bytes())?;
        self.write_all(b"\r\n")
    }
}

/// 基于通道的链路实现
///
/// 把 [`HostLink`] 架在一对 crossbeam 通道上：入站字节由任意线程喂入,
/// 出站字节由任意线程取走。CLI 仿真器用它把 stdin/stdout 线程接到
/// 服务循环上，回路测试用它做可编排的假主机。
///
/// # 背压
///
/// 出站通道满时丢弃本次写并返回 [`LinkError::OutboundFull`]，服务循环
/// 记数后继续跑（计时器不能因为主机侧卡住而停摆）。
pub struct ChannelLink {
    inbound: Receiver<u8>,
    outbound: Sender<u8>,
}

/// [`ChannelLink`] 的对端（主机侧）
///
/// 持有入站方向的发送端和出站方向的接收端，两者都可克隆后分给
/// 独立线程（例如 stdin 读线程和 stdout 打印线程）。
pub struct LinkPeer {
    to_controller: Sender<u8>,
    from_controller: Receiver<u8>,
}

impl ChannelLink {
    /// 建一对互联的链路端点
    ///
    /// `capacity` 同时作为两个方向的通道容量。
    pub fn pair(capacity: usize) -> (ChannelLink, LinkPeer) {
        let (in_tx, in_rx) = bounded(capacity);
        let (out_tx, out_rx) = bounded(capacity);
        debug!(capacity, "Channel link pair created");
        (
            ChannelLink {
                inbound: in_rx,
                outbound: out_tx,
            },
            LinkPeer {
                to_controller: in_tx,
                from_controller: out_rx,
            },
        )
    }
}

impl HostLink for ChannelLink {
    fn poll_byte(&mut self) -> Result<Option<u8>, LinkError> {
        match self.inbound.try_recv() {
            Ok(byte) => Ok(Some(byte)),
            Err(crossbeam_channel::TryRecvError::Empty) => Ok(None),
            Err(crossbeam_channel::TryRecvError::Disconnected) => Err(LinkError::Closed),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        for &byte in bytes {
            match self.outbound.try_send(byte) {
                Ok(()) => {},
                Err(TrySendError::Full(_)) => return Err(LinkError::OutboundFull),
                Err(TrySendError::Disconnected(_)) => return Err(LinkError::Closed),
            }
        }
        Ok(())
    }
}

impl LinkPeer {
    /// 向控制器喂入站字节
    pub fn send_bytes(&self, bytes: &[u8]) -> Result<(), LinkError> {
        for &byte in bytes {
            self.to_controller
                .send(byte)
                .map_err(|_| LinkError::Closed)?;
        }
        Ok(())
    }

    /// 克隆入站方向的发送端（交给喂数线程）
    pub fn sender(&self) -> Sender<u8> {
        self.to_controller.clone()
    }

    /// 克隆出站方向的接收端（交给打印线程）
    pub fn receiver(&self) -> Receiver<u8> {
        self.from_controller.clone()
    }

    /// 非阻塞地取走当前积压的全部出站字节
    pub fn drain_output(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        while let Ok(byte) = self.from_controller.try_recv() {
            bytes.push(byte);
        }
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_byte_round_trip() {
        let (mut link, peer) = ChannelLink::pair(64);
        peer.send_bytes(b"[RC0]").unwrap();

        let mut collected = Vec::new();
        while let Some(byte) = link.poll_byte().unwrap() {
            collected.push(byte);
        }
        assert_eq!(collected, b"[RC0]");
        // 读空之后返回 None 而不是阻塞
        assert!(link.poll_byte().unwrap().is_none());
    }

    #[test]
    fn test_write_line_appends_crlf() {
        let (mut link, peer) = ChannelLink::pair(64);
        link.write_line("[SF01$842]").unwrap();
        assert_eq!(peer.drain_output(), b"[SF01$842]\r\n");
    }

    #[test]
    fn test_poll_byte_reports_closed_peer() {
        let (mut link, peer) = ChannelLink::pair(8);
        drop(peer);
        assert!(matches!(link.poll_byte(), Err(LinkError::Closed)));
    }

    #[test]
    fn test_write_reports_full_outbound() {
        let (mut link, _peer) = ChannelLink::pair(2);
        let result = link.write_all(b"abcd");
        assert!(matches!(result, Err(LinkError::OutboundFull)));
    }
}
