//! 网关配置
//!
//! 来源优先级：命令行参数 > 配置文件 > 默认值。
//! 配置文件为 TOML，默认位置 `<config_dir>/tello-bridge/gateway.toml`，不存在时使用默认值。

use crate::recorder::{FfmpegRecorder, NoopRecorder, VideoRecorder};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tello_driver::probe::TELLO_SSID_MARKER;
use tello_driver::{
    AlwaysReachable, BridgeBuilder, CommandProbe, ConnectivityProbe, LinkConfig, ListenerConfig,
};
use tello_protocol::{COMMAND_BIND_ADDR, DEVICE_COMMAND_ADDR, TELEMETRY_BIND_ADDR, VIDEO_STREAM_URL};

/// 连接探测方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    /// 不探测，总是认为可达
    Always,
    /// 最近收到过遥测即认为可达
    Telemetry,
    /// 当前 Wi-Fi SSID 包含 `TELLO`
    Wifi,
}

/// 视频录制配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub enabled: bool,
    pub ffmpeg: String,
    pub source: String,
    pub duration_secs: u64,
    pub output_dir: PathBuf,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ffmpeg: "ffmpeg".to_string(),
            source: VIDEO_STREAM_URL.to_string(),
            duration_secs: 30,
            output_dir: PathBuf::from("."),
        }
    }
}

/// 网关配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP 监听地址
    pub http_addr: String,
    /// 设备命令地址
    pub device_addr: String,
    pub command_bind: String,
    pub telemetry_bind: String,
    pub probe: ProbeKind,
    /// 自定义探测命令（`probe = "wifi"` 时替代默认的 SSID 查询）
    pub probe_command: Option<String>,
    pub probe_marker: String,
    /// 等待应答的超时（毫秒），不设置则一直等待
    pub reply_timeout_ms: Option<u64>,
    /// 监听 socket 的接收超时（毫秒）
    pub receive_timeout_ms: u64,
    /// 日志文件目录（每日轮转），不设置则只输出到终端
    pub log_dir: Option<PathBuf>,
    /// 状态日志间隔（秒），0 表示关闭
    pub status_interval_secs: u64,
    pub video: VideoConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            device_addr: DEVICE_COMMAND_ADDR.to_string(),
            command_bind: COMMAND_BIND_ADDR.to_string(),
            telemetry_bind: TELEMETRY_BIND_ADDR.to_string(),
            probe: ProbeKind::Wifi,
            probe_command: None,
            probe_marker: TELLO_SSID_MARKER.to_string(),
            reply_timeout_ms: None,
            receive_timeout_ms: 100,
            log_dir: None,
            status_interval_secs: 30,
            video: VideoConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// 默认配置文件路径
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tello-bridge").join("gateway.toml"))
    }

    /// 加载配置
    ///
    /// - 显式给出路径时，文件必须存在
    /// - 否则尝试默认路径，不存在时返回默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn reply_timeout(&self) -> Option<Duration> {
        self.reply_timeout_ms.map(Duration::from_millis)
    }

    /// 按配置组装 BridgeBuilder
    pub fn bridge_builder(&self) -> BridgeBuilder {
        let builder = BridgeBuilder::new()
            .device_addr(&self.device_addr)
            .command_bind(&self.command_bind)
            .telemetry_bind(&self.telemetry_bind)
            .listener_config(ListenerConfig {
                receive_timeout_ms: self.receive_timeout_ms,
                ..Default::default()
            })
            .link_config(LinkConfig {
                reply_timeout: self.reply_timeout(),
            });

        match self.probe {
            ProbeKind::Telemetry => builder.use_telemetry_probe(),
            ProbeKind::Always | ProbeKind::Wifi => builder.probe(self.probe()),
        }
    }

    /// 非遥测类的连接探测
    pub fn probe(&self) -> Arc<dyn ConnectivityProbe> {
        match (self.probe, &self.probe_command) {
            (ProbeKind::Wifi, Some(command)) => {
                Arc::new(CommandProbe::new(command.as_str(), self.probe_marker.as_str()))
            },
            (ProbeKind::Wifi, None) => {
                let default = CommandProbe::wifi_ssid();
                Arc::new(CommandProbe::new(
                    default.shell_command(),
                    self.probe_marker.as_str(),
                ))
            },
            _ => Arc::new(AlwaysReachable),
        }
    }

    pub fn recorder(&self) -> Arc<dyn VideoRecorder> {
        if self.video.enabled {
            Arc::new(FfmpegRecorder::new(
                self.video.ffmpeg.as_str(),
                self.video.source.as_str(),
                Duration::from_secs(self.video.duration_secs),
                self.video.output_dir.clone(),
            ))
        } else {
            Arc::new(NoopRecorder)
        }
    }
}
