//! UDP 传输实现
//!
//! 命令链路：本地绑定一个端口，向固定的设备地址发送命令，同一 socket 接收应答。
//! 遥测链路：只接收，绑定在固定的本地端口上。
//!
//! 接收端设置了读超时，用于周期性检查关闭标志；`std::net::UdpSocket`
//! 无法从其他线程打断阻塞中的 `recv_from`。

use crate::{CloseHandle, DatagramRx, DatagramTx, SplittableLink, TransportError};
use bytes::Bytes;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tello_protocol::MAX_FRAME_SIZE;
use tracing::{debug, trace};

/// 默认接收超时
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(100);

fn resolve(addr: &str) -> Result<SocketAddr, TransportError> {
    addr.to_socket_addrs()
        .map_err(|e| TransportError::InvalidAddress(format!("{}: {}", addr, e)))?
        .next()
        .ok_or_else(|| TransportError::InvalidAddress(addr.to_string()))
}

/// 双向 UDP 链路（命令 + 应答）
pub struct UdpLink {
    socket: UdpSocket,
    peer: SocketAddr,
    close: CloseHandle,
}

impl UdpLink {
    /// 绑定本地地址，设备地址固定为 `peer`
    ///
    /// # 参数
    /// - `local`: 本地绑定地址（如 "0.0.0.0:9000"）
    /// - `peer`: 设备地址（如 "192.168.10.1:8889"）
    pub fn bind(local: &str, peer: &str) -> Result<Self, TransportError> {
        let peer = resolve(peer)?;
        let socket = UdpSocket::bind(resolve(local)?)?;
        socket.set_read_timeout(Some(DEFAULT_RECEIVE_TIMEOUT))?;
        debug!("UDP link bound to {:?}, peer {}", socket.local_addr().ok(), peer);

        Ok(Self {
            socket,
            peer,
            close: CloseHandle::new(),
        })
    }

    /// 设置接收超时（决定监听线程观察关闭标志的延迟）
    pub fn with_receive_timeout(self, timeout: Duration) -> Result<Self, TransportError> {
        // 零超时在 std 中是非法参数
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl SplittableLink for UdpLink {
    type Rx = UdpRx;
    type Tx = UdpTx;

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    fn split(self) -> Result<(UdpRx, UdpTx), TransportError> {
        let rx_socket = self.socket.try_clone()?;
        let rx = UdpRx {
            socket: rx_socket,
            buf: vec![0u8; MAX_FRAME_SIZE],
            close: self.close.clone(),
        };
        let tx = UdpTx {
            socket: self.socket,
            peer: self.peer,
            close: self.close,
        };
        Ok((rx, tx))
    }
}

/// UDP 接收端
pub struct UdpRx {
    socket: UdpSocket,
    buf: Vec<u8>,
    close: CloseHandle,
}

impl UdpRx {
    /// 创建只接收的链路（遥测广播）
    pub fn bind(local: &str) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(resolve(local)?)?;
        socket.set_read_timeout(Some(DEFAULT_RECEIVE_TIMEOUT))?;
        debug!("UDP receiver bound to {:?}", socket.local_addr().ok());

        Ok(Self {
            socket,
            buf: vec![0u8; MAX_FRAME_SIZE],
            close: CloseHandle::new(),
        })
    }

    pub fn with_receive_timeout(self, timeout: Duration) -> Result<Self, TransportError> {
        let timeout = timeout.max(Duration::from_millis(1));
        self.socket.set_read_timeout(Some(timeout))?;
        Ok(self)
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.socket.local_addr()?)
    }
}

impl DatagramRx for UdpRx {
    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    fn receive(&mut self) -> Result<Bytes, TransportError> {
        if self.close.is_closed() {
            return Err(TransportError::Closed);
        }

        match self.socket.recv_from(&mut self.buf) {
            Ok((len, from)) => {
                // 关闭之后才到达的数据报不再交付
                if self.close.is_closed() {
                    return Err(TransportError::Closed);
                }
                trace!("UDP rx {} bytes from {}", len, from);
                Ok(Bytes::copy_from_slice(&self.buf[..len]))
            },
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                if self.close.is_closed() {
                    Err(TransportError::Closed)
                } else {
                    Err(TransportError::Timeout)
                }
            },
            Err(e) if self.close.is_closed() => {
                trace!("UDP rx error after close: {}", e);
                Err(TransportError::Closed)
            },
            Err(e) => Err(TransportError::Io(e)),
        }
    }
}

/// UDP 发送端（目标地址固定）
pub struct UdpTx {
    socket: UdpSocket,
    peer: SocketAddr,
    close: CloseHandle,
}

impl UdpTx {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl DatagramTx for UdpTx {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if self.close.is_closed() {
            return Err(TransportError::Closed);
        }
        // 设备关机时可能返回 "Network is unreachable"，原样上报
        self.socket.send_to(payload, self.peer)?;
        trace!("UDP tx {} bytes to {}", payload.len(), self.peer);
        Ok(())
    }
}
