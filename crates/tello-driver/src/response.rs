//! 应答通道（ResponseChannel）
//!
//! 单生产者（应答监听线程）/ 单消费者（CommandLink）的无界 FIFO 队列。
//! 线协议没有序列号，应答只能按到达顺序与命令对应，所以每条应答恰好被消费一次。
//! 无法解码的应答同样占一个位置，等待中的调用方会收到解码错误而不是一直阻塞。

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, unbounded};
use std::time::Duration;
use tello_protocol::{ProtocolError, Reply};
use thiserror::Error;

/// 接收应答失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseRecvError {
    /// 超时内没有应答
    #[error("No reply within timeout")]
    Timeout,
    /// 生产者已全部退出，且队列为空
    #[error("Response channel disconnected")]
    Disconnected,
    /// 设备回了一个无法解码的应答
    #[error("Malformed reply: {0}")]
    Malformed(ProtocolError),
}

type Entry = Result<Reply, ProtocolError>;

/// 创建应答通道
pub fn response_channel() -> (ResponseSender, ResponseReceiver) {
    let (tx, rx) = unbounded();
    (ResponseSender { tx }, ResponseReceiver { rx })
}

/// 生产端（由应答监听线程持有）
///
/// 被 drop 后，消费端在取完剩余应答后得到 `Disconnected`。
#[derive(Debug)]
pub struct ResponseSender {
    tx: Sender<Entry>,
}

impl ResponseSender {
    /// 入队一条应答
    ///
    /// 返回 `false` 表示消费端已不存在（应答被丢弃）。
    pub fn push(&self, reply: Reply) -> bool {
        self.tx.send(Ok(reply)).is_ok()
    }

    /// 入队一条无法解码的应答
    pub fn push_malformed(&self, err: ProtocolError) -> bool {
        self.tx.send(Err(err)).is_ok()
    }
}

/// 消费端（由 CommandLink 持有）
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: Receiver<Entry>,
}

impl ResponseReceiver {
    /// 阻塞等待下一条应答
    ///
    /// `timeout` 为 `None` 时一直等到应答到达或生产端退出。
    pub fn recv(&self, timeout: Option<Duration>) -> Result<Reply, ResponseRecvError> {
        let entry = match timeout {
            Some(timeout) => self.rx.recv_timeout(timeout).map_err(|e| match e {
                RecvTimeoutError::Timeout => ResponseRecvError::Timeout,
                RecvTimeoutError::Disconnected => ResponseRecvError::Disconnected,
            })?,
            None => self.rx.recv().map_err(|_| ResponseRecvError::Disconnected)?,
        };
        entry.map_err(ResponseRecvError::Malformed)
    }

    pub fn try_recv(&self) -> Result<Reply, ResponseRecvError> {
        let entry = self.rx.try_recv().map_err(|e| match e {
            TryRecvError::Empty => ResponseRecvError::Timeout,
            TryRecvError::Disconnected => ResponseRecvError::Disconnected,
        })?;
        entry.map_err(ResponseRecvError::Malformed)
    }

    /// 队列中尚未消费的应答数
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let (tx, rx) = response_channel();
        assert!(tx.push(Reply::new("R1")));
        assert!(tx.push(Reply::new("R2")));
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.recv(None).unwrap().as_str(), "R1");
        assert_eq!(rx.recv(None).unwrap().as_str(), "R2");
        assert!(rx.is_empty());
    }

    #[test]
    fn test_recv_timeout() {
        let (_tx, rx) = response_channel();
        assert_eq!(
            rx.recv(Some(Duration::from_millis(10))),
            Err(ResponseRecvError::Timeout)
        );
        assert_eq!(rx.try_recv(), Err(ResponseRecvError::Timeout));
    }

    #[test]
    fn test_disconnect_after_drain() {
        let (tx, rx) = response_channel();
        tx.push(Reply::new("last"));
        drop(tx);
        // 剩余应答仍可取出
        assert_eq!(rx.recv(None).unwrap().as_str(), "last");
        assert_eq!(rx.recv(None), Err(ResponseRecvError::Disconnected));
    }

    #[test]
    fn test_malformed_reply_keeps_its_slot() {
        let (tx, rx) = response_channel();
        let err = ProtocolError::InvalidUtf8 { valid_up_to: 0 };
        assert!(tx.push_malformed(err.clone()));
        assert!(tx.push(Reply::new("ok")));
        assert_eq!(rx.recv(None), Err(ResponseRecvError::Malformed(err)));
        assert_eq!(rx.recv(None).unwrap().as_str(), "ok");
    }

    #[test]
    fn test_push_without_receiver() {
        let (tx, rx) = response_channel();
        drop(rx);
        assert!(!tx.push(Reply::new("lost")));
    }
}
