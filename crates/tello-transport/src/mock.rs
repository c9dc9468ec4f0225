//! Mock 传输实现（内存通道，无 socket）
//!
//! `MockDevice` 扮演设备：可以观察链路写出的命令，也可以注入应答、遥测或接收错误。
//!
//! ```rust,ignore
//! use tello_transport::{DatagramRx, DatagramTx, SplittableLink};
//! use tello_transport::mock::MockLink;
//! use std::time::Duration;
//!
//! let (link, device) = MockLink::new();
//! let (mut rx, mut tx) = link.split().unwrap();
//! tx.send(b"command").unwrap();
//! assert_eq!(device.next_command(Duration::from_secs(1)).as_deref(), Some("command"));
//! device.reply("ok");
//! assert_eq!(&rx.receive().unwrap()[..], b"ok");
//! ```

use crate::{CloseHandle, DatagramRx, DatagramTx, SplittableLink, TransportError};
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// 注入给接收端的事件
#[derive(Debug)]
enum Inbound {
    Datagram(Bytes),
    /// 模拟一次 socket 接收错误
    Fault(std::io::ErrorKind),
}

/// 设备侧句柄
#[derive(Debug, Clone)]
pub struct MockDevice {
    inbound: Sender<Inbound>,
    outbound: Receiver<Bytes>,
    close: CloseHandle,
    tx_dropped: Arc<AtomicBool>,
}

impl MockDevice {
    /// 注入一个文本数据报（应答或遥测包）
    pub fn reply(&self, text: &str) {
        self.inject(Bytes::copy_from_slice(text.as_bytes()));
    }

    /// 注入原始数据报
    pub fn inject(&self, datagram: Bytes) {
        let _ = self.inbound.send(Inbound::Datagram(datagram));
    }

    /// 让接收端下一次 `receive()` 返回 IO 错误
    pub fn inject_fault(&self, kind: std::io::ErrorKind) {
        let _ = self.inbound.send(Inbound::Fault(kind));
    }

    /// 等待链路写出的下一条命令
    pub fn next_command(&self, timeout: Duration) -> Option<String> {
        self.outbound
            .recv_timeout(timeout)
            .ok()
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// 已写出但尚未被读取的命令数
    pub fn pending_commands(&self) -> usize {
        self.outbound.len()
    }

    pub fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    /// 链路的发送端是否已被 drop
    pub fn sender_dropped(&self) -> bool {
        self.tx_dropped.load(Ordering::Acquire)
    }
}

/// Mock 链路（分离前）
pub struct MockLink {
    rx: MockRx,
    tx: MockTx,
}

impl MockLink {
    /// 使用默认接收超时（10ms）创建链路
    pub fn new() -> (Self, MockDevice) {
        Self::with_receive_timeout(Duration::from_millis(10))
    }

    pub fn with_receive_timeout(timeout: Duration) -> (Self, MockDevice) {
        let (inbound_tx, inbound_rx) = unbounded();
        let (outbound_tx, outbound_rx) = unbounded();
        let close = CloseHandle::new();
        let tx_dropped = Arc::new(AtomicBool::new(false));

        let link = Self {
            rx: MockRx {
                inbound: inbound_rx,
                timeout,
                close: close.clone(),
            },
            tx: MockTx {
                outbound: outbound_tx,
                close: close.clone(),
                dropped: tx_dropped.clone(),
            },
        };
        let device = MockDevice {
            inbound: inbound_tx,
            outbound: outbound_rx,
            close,
            tx_dropped,
        };
        (link, device)
    }

    /// 只接收的链路（遥测）
    pub fn receiver() -> (MockRx, MockDevice) {
        let (link, device) = Self::new();
        (link.rx, device)
    }
}

impl SplittableLink for MockLink {
    type Rx = MockRx;
    type Tx = MockTx;

    fn close_handle(&self) -> CloseHandle {
        self.rx.close.clone()
    }

    fn split(self) -> Result<(MockRx, MockTx), TransportError> {
        Ok((self.rx, self.tx))
    }
}

/// Mock 接收端
pub struct MockRx {
    inbound: Receiver<Inbound>,
    timeout: Duration,
    close: CloseHandle,
}

impl DatagramRx for MockRx {
    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        if self.close.is_closed() {
            return Err(TransportError::Closed);
        }
        match self.inbound.recv_timeout(self.timeout) {
            Ok(_) if self.close.is_closed() => Err(TransportError::Closed),
            Ok(Inbound::Datagram(bytes)) => Ok(bytes),
            Ok(Inbound::Fault(kind)) => Err(TransportError::Io(std::io::Error::new(
                kind,
                "injected mock fault",
            ))),
            Err(RecvTimeoutError::Timeout) if self.close.is_closed() => {
                Err(TransportError::Closed)
            },
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
            // 设备侧句柄全部被 drop，等价于对端消失
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

/// Mock 发送端
pub struct MockTx {
    outbound: Sender<Bytes>,
    close: CloseHandle,
    dropped: Arc<AtomicBool>,
}

impl Drop for MockTx {
    fn drop(&mut self) {
        self.dropped.store(true, Ordering::Release);
    }
}

impl DatagramTx for MockTx {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.close.is_closed() {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(Bytes::copy_from_slice(payload))
            .map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_timeout_when_idle() {
        let (mut rx, _device) = MockLink::receiver();
        assert!(matches!(rx.receive(), Err(TransportError::Timeout)));
    }

    #[test]
    fn test_mock_fault_injection() {
        let (mut rx, device) = MockLink::receiver();
        device.inject_fault(std::io::ErrorKind::ConnectionReset);
        device.reply("after");
        assert!(matches!(rx.receive(), Err(TransportError::Io(_))));
        assert_eq!(&rx.receive().unwrap()[..], b"after");
    }

    #[test]
    fn test_mock_close_from_device_side() {
        let (link, device) = MockLink::new();
        let (mut rx, mut tx) = link.split().unwrap();
        device.reply("queued");
        device.close_handle().close();
        assert!(matches!(rx.receive(), Err(TransportError::Closed)));
        assert!(matches!(tx.send(b"x"), Err(TransportError::Closed)));
    }

    #[test]
    fn test_mock_reports_sender_drop() {
        let (link, device) = MockLink::new();
        let (_rx, tx) = link.split().unwrap();
        assert!(!device.sender_dropped());
        drop(tx);
        assert!(device.sender_dropped());
    }

    #[test]
    fn test_mock_device_dropped() {
        let (mut rx, device) = MockLink::receiver();
        drop(device);
        assert!(matches!(rx.receive(), Err(TransportError::Closed)));
    }
}
