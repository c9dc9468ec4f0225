//! Builder 模式实现
//!
//! 提供链式构造 `Bridge` 实例的便捷方式。

use crate::bridge::{Bridge, BridgeParts};
use crate::error::DriverError;
use crate::heartbeat::ConnectionMonitor;
use crate::link::LinkConfig;
use crate::pipeline::ListenerConfig;
use crate::probe::{AlwaysReachable, ConnectivityProbe};
use std::sync::Arc;
use std::time::Duration;
use tello_protocol::{COMMAND_BIND_ADDR, DEVICE_COMMAND_ADDR, TELEMETRY_BIND_ADDR};
use tello_transport::{DatagramRx, SplittableLink, UdpLink, UdpRx};

/// 默认遥测新鲜度窗口（设备约 10Hz 广播）
pub const DEFAULT_MONITOR_TIMEOUT: Duration = Duration::from_secs(3);

/// 连接探测选择
#[derive(Clone)]
enum ProbeSelection {
    Custom(Arc<dyn ConnectivityProbe>),
    /// 以遥测是否新鲜作为可达性
    Telemetry,
}

/// Bridge Builder（链式构造）
///
/// # Example
///
/// ```no_run
/// use tello_driver::{BridgeBuilder, LinkConfig};
/// use std::time::Duration;
///
/// let bridge = BridgeBuilder::new()
///     .device_addr("192.168.10.1:8889")
///     .link_config(LinkConfig {
///         reply_timeout: Some(Duration::from_secs(10)),
///     })
///     .use_telemetry_probe()
///     .build()
///     .unwrap();
///
/// let reply = bridge.send_command("command").unwrap();
/// println!("{}", reply);
/// ```
pub struct BridgeBuilder {
    /// 设备命令地址
    device_addr: String,
    /// 命令 socket 本地绑定地址
    command_bind: String,
    /// 遥测 socket 本地绑定地址
    telemetry_bind: String,
    probe: ProbeSelection,
    listener_config: ListenerConfig,
    link_config: LinkConfig,
    monitor_timeout: Duration,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self {
            device_addr: DEVICE_COMMAND_ADDR.to_string(),
            command_bind: COMMAND_BIND_ADDR.to_string(),
            telemetry_bind: TELEMETRY_BIND_ADDR.to_string(),
            probe: ProbeSelection::Custom(Arc::new(AlwaysReachable)),
            listener_config: ListenerConfig::default(),
            link_config: LinkConfig::default(),
            monitor_timeout: DEFAULT_MONITOR_TIMEOUT,
        }
    }

    /// 设置设备命令地址（默认 `192.168.10.1:8889`）
    pub fn device_addr(mut self, addr: impl Into<String>) -> Self {
        self.device_addr = addr.into();
        self
    }

    /// 设置命令 socket 本地绑定地址（默认 `0.0.0.0:9000`）
    pub fn command_bind(mut self, addr: impl Into<String>) -> Self {
        self.command_bind = addr.into();
        self
    }

    /// 设置遥测 socket 本地绑定地址（默认 `0.0.0.0:8890`）
    pub fn telemetry_bind(mut self, addr: impl Into<String>) -> Self {
        self.telemetry_bind = addr.into();
        self
    }

    /// 使用自定义连接探测（默认总是可达）
    pub fn probe(mut self, probe: Arc<dyn ConnectivityProbe>) -> Self {
        self.probe = ProbeSelection::Custom(probe);
        self
    }

    /// 以遥测新鲜度作为连接探测
    pub fn use_telemetry_probe(mut self) -> Self {
        self.probe = ProbeSelection::Telemetry;
        self
    }

    pub fn listener_config(mut self, config: ListenerConfig) -> Self {
        self.listener_config = config;
        self
    }

    pub fn link_config(mut self, config: LinkConfig) -> Self {
        self.link_config = config;
        self
    }

    /// 遥测新鲜度窗口（默认 3s）
    pub fn monitor_timeout(mut self, timeout: Duration) -> Self {
        self.monitor_timeout = timeout;
        self
    }

    /// 绑定 UDP socket 并启动 Bridge
    ///
    /// # 错误
    /// - `DriverError::Transport`: 地址非法或端口绑定失败
    /// - `DriverError::IoThread`: 线程创建失败
    pub fn build(self) -> Result<Bridge, DriverError> {
        let receive_timeout = self.listener_config.receive_timeout();
        let link = UdpLink::bind(&self.command_bind, &self.device_addr)?
            .with_receive_timeout(receive_timeout)?;
        let telemetry = UdpRx::bind(&self.telemetry_bind)?.with_receive_timeout(receive_timeout)?;
        self.build_with(link, telemetry)
    }

    /// 使用已创建的链路启动 Bridge（测试与自定义传输）
    ///
    /// 接收超时由传入的链路自身决定。
    pub fn build_with<L, R>(self, link: L, telemetry: R) -> Result<Bridge, DriverError>
    where
        L: SplittableLink,
        L::Rx: Send + 'static,
        L::Tx: Send + 'static,
        R: DatagramRx + Send + 'static,
    {
        let monitor = Arc::new(ConnectionMonitor::new(self.monitor_timeout));
        let probe: Arc<dyn ConnectivityProbe> = match self.probe {
            ProbeSelection::Custom(probe) => probe,
            ProbeSelection::Telemetry => monitor.clone() as Arc<dyn ConnectivityProbe>,
        };

        Bridge::start(
            link,
            telemetry,
            BridgeParts {
                probe,
                monitor,
                listener: self.listener_config,
                link: self.link_config,
            },
        )
    }
}
