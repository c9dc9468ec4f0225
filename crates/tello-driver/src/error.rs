//! 驱动层错误类型定义

use tello_protocol::ProtocolError;
use tello_transport::TransportError;
use thiserror::Error;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（socket 收发失败）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 协议错误（非 UTF-8 负载、超长命令）
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// 连接探测认为设备不可达（发送前检查，仅作参考）
    #[error("Device unreachable")]
    TransportUnavailable,

    /// 命令链路已释放
    #[error("Command link closed")]
    Closed,

    /// 应答监听线程已永久退出，不会再有应答
    #[error("Response listener stopped")]
    ListenerStopped,

    /// 等待应答超时
    #[error("Reply timeout")]
    Timeout,

    /// 线程创建/退出错误
    #[error("IO thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// socket 被主动关闭导致的错误（正常终止）
    pub fn is_closed(&self) -> bool {
        matches!(
            self,
            DriverError::Closed | DriverError::Transport(TransportError::Closed)
        )
    }
}
