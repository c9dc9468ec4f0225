//! Bridge：命令链路 + 两个监听线程 + 遥测状态
//!
//! 生命周期：
//! - 创建时启动应答监听线程与遥测监听线程（各自运行在 supervisor 下）
//! - `release()` 关闭两个 socket（只生效一次），监听线程在下一次接收超时后退出
//! - Drop 时释放 socket 并在限定时间内 join 线程

use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::link::{CommandLink, LinkConfig};
use crate::metrics::{BridgeMetrics, MetricsSnapshot};
use crate::pipeline::{ListenerConfig, response_loop, supervise, telemetry_loop};
use crate::probe::ConnectivityProbe;
use crate::response::response_channel;
use crate::state::{TelemetryRecord, TelemetryStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tello_protocol::{Command, Reply};
use tello_transport::{CloseHandle, DatagramRx, SplittableLink};
use tracing::{debug, error, info};

/// Drop 时等待监听线程退出的上限
const JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// 监听线程未能按时退出的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinFailure {
    Panicked,
    TimedOut,
}

/// 在 `timeout` 内 join 线程
///
/// 超时后放弃等待；旁路线程会在目标线程结束时自行退出。
fn join_within<T: Send + 'static>(
    handle: JoinHandle<T>,
    timeout: Duration,
) -> Result<(), JoinFailure> {
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    spawn(move || {
        let _ = done_tx.send(handle.join().is_ok());
    });

    match done_rx.recv_timeout(timeout) {
        Ok(true) => Ok(()),
        Ok(false) => Err(JoinFailure::Panicked),
        Err(_) => Err(JoinFailure::TimedOut),
    }
}

/// Tello 桥接（对外 API）
pub struct Bridge {
    link: Arc<CommandLink>,
    telemetry: Arc<TelemetryStore>,
    monitor: Arc<ConnectionMonitor>,
    probe: Arc<dyn ConnectivityProbe>,
    telemetry_close: CloseHandle,
    response_thread: Option<JoinHandle<()>>,
    telemetry_thread: Option<JoinHandle<()>>,
    /// 运行标志（Drop 时清除，通知监听线程退出）
    is_running: Arc<AtomicBool>,
    released: AtomicBool,
    metrics: Arc<BridgeMetrics>,
}

/// 启动参数（由 Builder 组装）
pub(crate) struct BridgeParts {
    pub probe: Arc<dyn ConnectivityProbe>,
    pub monitor: Arc<ConnectionMonitor>,
    pub listener: ListenerConfig,
    pub link: LinkConfig,
}

impl Bridge {
    /// 分离设备链路并启动监听线程
    ///
    /// # 错误
    /// - `DriverError::Transport`: 分离链路失败
    /// - `DriverError::IoThread`: 线程创建失败
    pub(crate) fn start<L, R>(link: L, telemetry_rx: R, parts: BridgeParts) -> Result<Self, DriverError>
    where
        L: SplittableLink,
        L::Rx: Send + 'static,
        L::Tx: Send + 'static,
        R: DatagramRx + Send + 'static,
    {
        let BridgeParts {
            probe,
            monitor,
            listener,
            link: link_config,
        } = parts;

        let command_close = link.close_handle();
        let telemetry_close = telemetry_rx.close_handle();
        let (response_rx, command_tx) = link.split()?;

        let (replies_tx, replies_rx) = response_channel();
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(BridgeMetrics::new());
        let telemetry = Arc::new(TelemetryStore::new());

        let command_link = Arc::new(CommandLink::new(
            command_tx,
            replies_rx,
            command_close.clone(),
            probe.clone(),
            link_config,
            metrics.clone(),
        ));

        // 启动应答监听线程
        let is_running_rx = is_running.clone();
        let metrics_rx = metrics.clone();
        let policy = listener.restart.clone();
        let response_thread = std::thread::Builder::new()
            .name("tello-response".into())
            .spawn(move || {
                let mut rx = response_rx;
                // replies_tx 随线程结束被 drop，等待中的 send 因此不会永久阻塞
                let replies_tx = replies_tx;
                supervise("Response", &policy, &is_running_rx, &metrics_rx, || {
                    response_loop(&mut rx, &replies_tx, &is_running_rx, &metrics_rx)
                });
            })
            .map_err(|e| DriverError::IoThread(e.to_string()))?;

        // 启动遥测监听线程
        let is_running_tm = is_running.clone();
        let metrics_tm = metrics.clone();
        let store = telemetry.clone();
        let monitor_tm = monitor.clone();
        let policy = listener.restart.clone();
        let telemetry_thread = std::thread::Builder::new()
            .name("tello-telemetry".into())
            .spawn(move || {
                let mut rx = telemetry_rx;
                supervise("Telemetry", &policy, &is_running_tm, &metrics_tm, || {
                    telemetry_loop(
                        &mut rx,
                        &store,
                        Some(&*monitor_tm),
                        &is_running_tm,
                        &metrics_tm,
                    )
                });
            });

        let telemetry_thread = match telemetry_thread {
            Ok(handle) => handle,
            Err(e) => {
                // 已启动的应答线程随 socket 关闭退出
                is_running.store(false, Ordering::Release);
                command_close.close();
                return Err(DriverError::IoThread(e.to_string()));
            },
        };

        debug!("Bridge started (probe: {})", probe.name());

        Ok(Self {
            link: command_link,
            telemetry,
            monitor,
            probe,
            telemetry_close,
            response_thread: Some(response_thread),
            telemetry_thread: Some(telemetry_thread),
            is_running,
            released: AtomicBool::new(false),
            metrics,
        })
    }

    /// 发送命令并等待应答（同一时刻只有一条命令在等待，并发调用自动排队）
    pub fn send_command(&self, command: impl Into<Command>) -> Result<Reply, DriverError> {
        self.link.send(&command.into())
    }

    /// 获取遥测快照
    pub fn telemetry_snapshot(&self) -> TelemetryRecord {
        self.telemetry.get_snapshot()
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    pub fn link(&self) -> &CommandLink {
        &self.link
    }

    /// 连接探测结果（仅作参考）
    pub fn is_reachable(&self) -> bool {
        self.probe.is_reachable()
    }

    pub fn connection_monitor(&self) -> &ConnectionMonitor {
        &self.monitor
    }

    /// 关闭命令与遥测 socket
    ///
    /// 幂等，可在任意线程调用。返回 `true` 表示本次调用完成了关闭。
    pub fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("Closing sockets...");
        self.link.release();
        self.telemetry_close.close();
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// 检查线程健康状态
    ///
    /// # 返回
    /// - `(response_alive, telemetry_alive)`
    pub fn check_health(&self) -> (bool, bool) {
        let response_alive = self
            .response_thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        let telemetry_alive = self
            .telemetry_thread
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false);
        (response_alive, telemetry_alive)
    }

    pub fn is_healthy(&self) -> bool {
        let (response_alive, telemetry_alive) = self.check_health();
        response_alive && telemetry_alive
    }

    /// 获取性能指标快照
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.release();
        // Release: 监听线程 Acquire 读取
        self.is_running.store(false, Ordering::Release);

        let threads = [
            ("Response", self.response_thread.take()),
            ("Telemetry", self.telemetry_thread.take()),
        ];
        for (name, handle) in threads {
            let Some(handle) = handle else { continue };
            match join_within(handle, JOIN_TIMEOUT) {
                Ok(()) => {},
                Err(JoinFailure::Panicked) => error!("{} listener thread panicked", name),
                Err(JoinFailure::TimedOut) => {
                    error!("{} listener thread did not exit within {:?}", name, JOIN_TIMEOUT)
                },
            }
        }
    }
}
