//! # Tello Transport Layer
//!
//! 数据报传输抽象层，为驱动层提供统一的收发接口。
//!
//! - `udp`: 基于 `std::net::UdpSocket` 的真实实现
//! - `mock`: 内存通道实现（feature `mock`），用于无设备测试
//!
//! 每个 socket 只有一个所有者；关闭通过 [`CloseHandle`] 完成，可在任意线程调用且幂等。

use bytes::Bytes;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub mod udp;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use udp::{UdpLink, UdpRx, UdpTx};

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Socket closed")]
    Closed,
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

impl TransportError {
    /// socket 已被关闭（正常终止，而非故障）
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}

/// socket 关闭句柄
///
/// 收发两端共享同一个句柄。`close()` 只会生效一次，之后所有收发都返回
/// `TransportError::Closed`；接收端在下一次超时轮询时观察到关闭并退出。
#[derive(Debug, Clone, Default)]
pub struct CloseHandle {
    closed: Arc<AtomicBool>,
}

impl CloseHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// 关闭 socket
    ///
    /// 返回 `true` 表示本次调用完成了关闭；已关闭时返回 `false`。
    pub fn close(&self) -> bool {
        !self.closed.swap(true, Ordering::AcqRel)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// 数据报接收端
pub trait DatagramRx {
    /// 接收一个数据报
    ///
    /// # 错误
    /// - `TransportError::Timeout`: 超时内没有数据（正常情况）
    /// - `TransportError::Closed`: socket 已关闭
    fn receive(&mut self) -> Result<Bytes, TransportError>;

    /// 接收端所属 socket 的关闭句柄
    fn close_handle(&self) -> CloseHandle;
}

/// 数据报发送端
pub trait DatagramTx {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;
}

/// 可分离为独立收发端的链路
///
/// 分离后接收端交给监听线程，发送端交给命令链路，互不阻塞。
pub trait SplittableLink {
    type Rx: DatagramRx;
    type Tx: DatagramTx;

    /// 链路的关闭句柄（分离前获取，收发两端共享）
    fn close_handle(&self) -> CloseHandle;

    fn split(self) -> Result<(Self::Rx, Self::Tx), TransportError>;
}

impl<R: DatagramRx + ?Sized> DatagramRx for Box<R> {
    fn receive(&mut self) -> Result<Bytes, TransportError> {
        (**self).receive()
    }

    fn close_handle(&self) -> CloseHandle {
        (**self).close_handle()
    }
}

impl<T: DatagramTx + ?Sized> DatagramTx for Box<T> {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        (**self).send(payload)
    }
}
