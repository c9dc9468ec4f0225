//! 连接探测
//!
//! "设备当前是否可达"是一个外部能力，桥接核心只把它当作布尔信号使用。
//! 探测结果仅作参考：发送前检查一次，不保证发送时仍然成立。

use std::process::Command as ProcessCommand;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{trace, warn};

/// macOS 上查询当前 Wi-Fi SSID 的命令
pub const MACOS_SSID_QUERY: &str = "/System/Library/PrivateFrameworks/Apple80211.framework/Resources/airport -I | awk -F: '/ SSID/{print $2}'";

/// Linux 上查询当前 Wi-Fi SSID 的命令
pub const LINUX_SSID_QUERY: &str = "iwgetid -r";

/// Tello 热点 SSID 中包含的标记
pub const TELLO_SSID_MARKER: &str = "TELLO";

/// 连接探测接口
pub trait ConnectivityProbe: Send + Sync {
    fn is_reachable(&self) -> bool;

    /// 探测器名称（用于日志）
    fn name(&self) -> &str {
        "probe"
    }

    /// 是否只有在设备收到握手命令（`command`）之后才可能报告可达
    ///
    /// 为 `true` 时，握手命令本身不受本探测拦截。
    fn requires_handshake(&self) -> bool {
        false
    }
}

impl<P: ConnectivityProbe + ?Sized> ConnectivityProbe for Arc<P> {
    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn requires_handshake(&self) -> bool {
        (**self).requires_handshake()
    }
}

/// 总是可达（跳过探测）
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysReachable;

impl ConnectivityProbe for AlwaysReachable {
    fn is_reachable(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "always"
    }
}

/// 手动设置的探测结果（测试或强制离线）
#[derive(Debug, Default)]
pub struct ManualProbe {
    reachable: AtomicBool,
}

impl ManualProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }
}

impl ConnectivityProbe for ManualProbe {
    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "manual"
    }
}

/// 通过外部命令探测：执行 shell 命令，标准输出包含 `marker` 即视为可达
///
/// 默认用于检查当前 Wi-Fi 是否连接到无人机热点。
#[derive(Debug, Clone)]
pub struct CommandProbe {
    shell_command: String,
    marker: String,
}

impl CommandProbe {
    pub fn new(shell_command: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            shell_command: shell_command.into(),
            marker: marker.into(),
        }
    }

    /// 按平台选择 SSID 查询命令，标记为 `TELLO`
    pub fn wifi_ssid() -> Self {
        let query = if cfg!(target_os = "macos") {
            MACOS_SSID_QUERY
        } else {
            LINUX_SSID_QUERY
        };
        Self::new(query, TELLO_SSID_MARKER)
    }

    pub fn shell_command(&self) -> &str {
        &self.shell_command
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl ConnectivityProbe for CommandProbe {
    fn is_reachable(&self) -> bool {
        let output = match ProcessCommand::new("sh").arg("-c").arg(&self.shell_command).output() {
            Ok(output) => output,
            Err(e) => {
                warn!("Connectivity probe `{}` failed to run: {}", self.shell_command, e);
                return false;
            },
        };
        let stdout = String::from_utf8_lossy(&output.stdout);
        trace!("Connectivity probe output: {:?}", stdout.trim());
        stdout.contains(&self.marker)
    }

    fn name(&self) -> &str {
        "command"
    }
}
