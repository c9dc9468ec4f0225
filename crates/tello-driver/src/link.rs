//! 命令链路（CommandLink）
//!
//! 独占设备 socket 的发送端，提供同步的 `send(command) -> reply`。
//!
//! 线协议没有关联 ID，应答只能按顺序对应。链路内部的互斥锁在
//! "写出命令 + 等待应答" 整个过程中持有，保证同一时刻最多只有一条命令在等待应答，
//! 多个调用方并发调用时自动排队。

use crate::error::DriverError;
use crate::metrics::BridgeMetrics;
use crate::probe::ConnectivityProbe;
use crate::response::{ResponseReceiver, ResponseRecvError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tello_protocol::{Command, Reply};
use tello_transport::{CloseHandle, DatagramTx};
use tracing::{debug, info, warn};

/// 命令链路配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkConfig {
    /// 等待应答的超时，`None` 表示一直等待
    pub reply_timeout: Option<Duration>,
}

struct LinkState {
    tx: Option<Box<dyn DatagramTx + Send>>,
    /// 已超时放弃、但应答尚未到达的命令数
    abandoned: usize,
}

/// 命令链路
pub struct CommandLink {
    state: Mutex<LinkState>,
    replies: ResponseReceiver,
    probe: Arc<dyn ConnectivityProbe>,
    close: CloseHandle,
    config: LinkConfig,
    metrics: Arc<BridgeMetrics>,
}

impl CommandLink {
    /// 创建命令链路
    ///
    /// # 参数
    /// - `tx`: 设备 socket 的发送端
    /// - `replies`: 应答通道的消费端（生产端由应答监听线程持有）
    /// - `close`: 设备 socket 的关闭句柄
    /// - `probe`: 发送前检查的连接探测
    pub fn new(
        tx: impl DatagramTx + Send + 'static,
        replies: ResponseReceiver,
        close: CloseHandle,
        probe: Arc<dyn ConnectivityProbe>,
        config: LinkConfig,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            state: Mutex::new(LinkState {
                tx: Some(Box::new(tx)),
                abandoned: 0,
            }),
            replies,
            probe,
            close,
            config,
            metrics,
        }
    }

    /// 发送命令并阻塞等待应答
    ///
    /// # 错误
    /// - `DriverError::TransportUnavailable`: 连接探测认为设备不可达（未发送）
    /// - `DriverError::Protocol`: 命令超过最大帧长（未发送），或设备应答无法解码
    /// - `DriverError::Closed`: 链路已释放
    /// - `DriverError::Transport`: socket 写失败
    /// - `DriverError::Timeout`: 配置了应答超时且已超时
    /// - `DriverError::ListenerStopped`: 应答监听线程已永久退出
    pub fn send(&self, command: &Command) -> Result<Reply, DriverError> {
        // 握手之后才有可达信号的探测，不能拦住握手命令本身
        let handshake = command.is_enter_sdk() && self.probe.requires_handshake();
        if !handshake && !self.probe.is_reachable() {
            warn!("Not sending {:?}: device unreachable ({} probe)", command.as_str(), self.probe.name());
            return Err(DriverError::TransportUnavailable);
        }

        let payload = command.encode()?;

        let mut state = self.state.lock();
        if self.close.is_closed() {
            state.tx = None;
            return Err(DriverError::Closed);
        }
        let Some(tx) = state.tx.as_mut() else {
            return Err(DriverError::Closed);
        };

        info!("Sending: {}", command);
        if let Err(e) = tx.send(payload) {
            if self.close.is_closed() {
                state.tx = None;
            }
            return Err(e.into());
        }
        self.metrics.commands_sent.fetch_add(1, Ordering::Relaxed);

        loop {
            let result = self.replies.recv(self.config.reply_timeout);

            if state.abandoned > 0
                && matches!(result, Ok(_) | Err(ResponseRecvError::Malformed(_)))
            {
                // 属于之前超时的命令，不能交给当前调用方
                state.abandoned -= 1;
                self.metrics.replies_discarded.fetch_add(1, Ordering::Relaxed);
                debug!("Discarding late reply {:?}", result);
                continue;
            }

            match result {
                Ok(reply) => return Ok(reply),
                Err(ResponseRecvError::Malformed(e)) => {
                    warn!("Reply to {:?} could not be decoded: {}", command.as_str(), e);
                    return Err(DriverError::Protocol(e));
                },
                Err(ResponseRecvError::Timeout) => {
                    state.abandoned += 1;
                    self.metrics.reply_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "No reply to {:?} within {:?}",
                        command.as_str(),
                        self.config.reply_timeout
                    );
                    return Err(DriverError::Timeout);
                },
                Err(ResponseRecvError::Disconnected) => {
                    if self.close.is_closed() {
                        // release() 拿不到锁时由这里丢弃发送端
                        state.tx = None;
                        return Err(DriverError::Closed);
                    }
                    return Err(DriverError::ListenerStopped);
                },
            }
        }
    }

    /// 释放设备 socket
    ///
    /// 幂等；返回 `true` 表示本次调用完成了关闭。
    /// 正在等待应答的调用方会在应答监听线程退出后得到 `DriverError::Closed`。
    pub fn release(&self) -> bool {
        let closed_now = self.close.close();
        // 发送中持有锁时不等待；等待中的调用方被唤醒后丢弃发送端
        if let Some(mut state) = self.state.try_lock() {
            state.tx = None;
        }
        closed_now
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_closed()
    }

    /// 当前可达性（连接探测的结果）
    pub fn is_reachable(&self) -> bool {
        self.probe.is_reachable()
    }

    /// 等待中尚未被取走的应答数
    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}
