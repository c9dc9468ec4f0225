//! Pipeline IO 循环模块
//!
//! 负责两个监听循环以及重启它们的 supervisor：
//! - `response_loop`: 应答 socket → ResponseChannel
//! - `telemetry_loop`: 遥测 socket → TelemetryStore
//! - `supervise`: 循环失败后按退避策略重新进入
//!
//! 循环本身是 fail-stop 的：遇到第一个解码或 socket 错误即返回。
//! socket 被主动关闭属于正常终止，不重启，也不输出错误日志。

use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::metrics::BridgeMetrics;
use crate::response::ResponseSender;
use crate::state::TelemetryStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tello_protocol::{Reply, TelemetryPacket, decode_payload};
use tello_transport::{DatagramRx, TransportError};
use tracing::{debug, error, info, trace, warn};

/// 退避等待时检查运行标志的间隔
const BACKOFF_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// 运行超过该时长视为已恢复
pub const STABLE_RUN: Duration = Duration::from_secs(10);

/// 监听线程重启策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPolicy {
    /// 失败后不重启（原始 fail-stop 行为）
    Never,
    /// 指数退避重启
    Backoff {
        /// 首次重启前的等待（毫秒）
        initial_ms: u64,
        /// 等待上限（毫秒）
        max_ms: u64,
        /// 连续失败次数上限，`None` 表示不限
        max_attempts: Option<u32>,
    },
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::Backoff {
            initial_ms: 100,
            max_ms: 5_000,
            max_attempts: None,
        }
    }
}

impl RestartPolicy {
    /// 第 `attempt` 次（从 0 开始）重启前的等待时间
    ///
    /// 返回 `None` 表示不再重启。
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        match self {
            RestartPolicy::Never => None,
            RestartPolicy::Backoff {
                initial_ms,
                max_ms,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                let factor = 1u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
                let delay_ms = initial_ms.saturating_mul(factor).min(*max_ms);
                Some(Duration::from_millis(delay_ms))
            },
        }
    }
}

/// 监听线程配置
///
/// # Example
///
/// ```
/// # use tello_driver::pipeline::{ListenerConfig, RestartPolicy};
/// let config = ListenerConfig {
///     receive_timeout_ms: 50,
///     restart: RestartPolicy::Never,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// socket 接收超时（毫秒），决定观察到关闭/停止的最大延迟
    pub receive_timeout_ms: u64,
    pub restart: RestartPolicy,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 100,
            restart: RestartPolicy::default(),
        }
    }
}

impl ListenerConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

/// 单次循环的退出原因
#[derive(Debug)]
pub enum LoopExit {
    /// 运行标志被清除
    Stopped,
    /// socket 已关闭（正常终止）
    Closed,
    /// 解码或 socket 错误
    Failed(DriverError),
}

impl LoopExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, LoopExit::Failed(_))
    }
}

/// 应答监听循环
///
/// 每个数据报解码为一条 [`Reply`] 并入队；消费端已不存在时停止。
/// 解码失败时先把错误入队（占住这条应答的位置），再以 `Failed` 返回。
pub fn response_loop(
    rx: &mut impl DatagramRx,
    replies: &ResponseSender,
    is_running: &AtomicBool,
    metrics: &BridgeMetrics,
) -> LoopExit {
    loop {
        // Acquire: If we see false, we must see all cleanup writes from other threads
        if !is_running.load(Ordering::Acquire) {
            trace!("Response listener: is_running flag is false, exiting");
            return LoopExit::Stopped;
        }

        let datagram = match rx.receive() {
            Ok(datagram) => datagram,
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Closed) => {
                debug!("Response listener: socket closed");
                return LoopExit::Closed;
            },
            Err(e) => {
                metrics.socket_errors.fetch_add(1, Ordering::Relaxed);
                error!("Response listener: receive failed: {}", e);
                return LoopExit::Failed(e.into());
            },
        };

        let reply = match Reply::decode(&datagram) {
            Ok(reply) => reply,
            Err(e) => {
                metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                metrics.replies_received.fetch_add(1, Ordering::Relaxed);
                error!("Response listener: {}", e);
                replies.push_malformed(e.clone());
                return LoopExit::Failed(e.into());
            },
        };

        info!("Received: {}", reply);
        metrics.replies_received.fetch_add(1, Ordering::Relaxed);
        if !replies.push(reply) {
            debug!("Response listener: command link dropped, exiting");
            return LoopExit::Stopped;
        }
    }
}

/// 遥测监听循环
///
/// 每个数据报按 `;` / `:` 解析后整包写入 `store`；
/// 缺少分隔符的字段只计数，不视为错误。
pub fn telemetry_loop(
    rx: &mut impl DatagramRx,
    store: &TelemetryStore,
    monitor: Option<&ConnectionMonitor>,
    is_running: &AtomicBool,
    metrics: &BridgeMetrics,
) -> LoopExit {
    loop {
        if !is_running.load(Ordering::Acquire) {
            trace!("Telemetry listener: is_running flag is false, exiting");
            return LoopExit::Stopped;
        }

        let datagram = match rx.receive() {
            Ok(datagram) => datagram,
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Closed) => {
                debug!("Telemetry listener: socket closed");
                return LoopExit::Closed;
            },
            Err(e) => {
                metrics.socket_errors.fetch_add(1, Ordering::Relaxed);
                error!("Telemetry listener: receive failed: {}", e);
                return LoopExit::Failed(e.into());
            },
        };

        metrics.telemetry_packets.fetch_add(1, Ordering::Relaxed);
        if let Some(monitor) = monitor {
            monitor.register_feedback();
        }

        let text = match decode_payload(&datagram) {
            Ok(text) => text,
            Err(e) => {
                metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                error!("Telemetry listener: {}", e);
                return LoopExit::Failed(e.into());
            },
        };

        let packet = TelemetryPacket::parse(text);
        let applied = store.apply(&packet);
        metrics.telemetry_fields_applied.fetch_add(applied as u64, Ordering::Relaxed);
        if packet.skipped > 0 {
            metrics
                .telemetry_fields_skipped
                .fetch_add(packet.skipped as u64, Ordering::Relaxed);
            trace!("Telemetry listener: skipped {} malformed field(s)", packet.skipped);
        }
    }
}

/// 监听循环 supervisor
///
/// 反复调用 `run_once`，直到：
/// - 循环返回 `Stopped` / `Closed`
/// - 运行标志被清除
/// - 重启策略不再允许重启
///
/// 一次运行持续超过 [`STABLE_RUN`] 后，连续失败计数清零。
pub fn supervise(
    name: &str,
    policy: &RestartPolicy,
    is_running: &AtomicBool,
    metrics: &BridgeMetrics,
    mut run_once: impl FnMut() -> LoopExit,
) -> LoopExit {
    let mut attempt: u32 = 0;

    loop {
        let started = Instant::now();
        let exit = run_once();

        let err = match exit {
            LoopExit::Failed(err) => err,
            other => {
                debug!("{} listener exited: {:?}", name, other);
                return other;
            },
        };

        if started.elapsed() >= STABLE_RUN {
            attempt = 0;
        }

        let Some(delay) = policy.delay_for(attempt) else {
            error!("{} listener stopped permanently after error: {}", name, err);
            return LoopExit::Failed(err);
        };

        warn!(
            "{} listener failed ({}), restarting in {:?} (attempt {})",
            name,
            err,
            delay,
            attempt + 1
        );

        if !sleep_while_running(delay, is_running) {
            return LoopExit::Stopped;
        }

        attempt = attempt.saturating_add(1);
        metrics.listener_restarts.fetch_add(1, Ordering::Relaxed);
    }
}

/// 分片睡眠；运行标志被清除时提前返回 `false`
fn sleep_while_running(total: Duration, is_running: &AtomicBool) -> bool {
    let deadline = Instant::now() + total;
    loop {
        if !is_running.load(Ordering::Acquire) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(BACKOFF_POLL_INTERVAL));
    }
}
