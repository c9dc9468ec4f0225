//! 请求分发（RequestGateway）
//!
//! 与 HTTP 无关：一个请求对应一个动作，返回文本或遥测快照。
//! 所有失败都以状态文本返回，不向调用方抛错。

use crate::recorder::VideoRecorder;
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tello_driver::{Bridge, DriverError, TelemetryRecord};
use tello_protocol::Command;
use tracing::warn;

/// 设备不可达时的状态文本
pub const OFFLINE: &str = "Drone offline";

/// `/end` 的响应文本
pub const ENDED: &str = "Ended";

/// 网关请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// 进入 SDK 模式
    Start,
    /// 释放 socket
    End,
    /// 开启视频流并录制
    StreamOn,
    /// 读取遥测
    Stats,
    /// 其他路径：原样作为命令发送
    Passthrough(String),
}

impl Request {
    /// 由原始请求目标（路径 + 查询串，未解码）构造
    ///
    /// 固定路径按原文精确匹配，所以 `/%73tart` 与 `/start?x` 都是透传命令。
    /// 透传时去掉开头的一个 `/` 再做百分号解码（非法 UTF-8 以替换字符代替）。
    pub fn from_path(raw: &str) -> Self {
        match raw {
            "/start" => Request::Start,
            "/end" => Request::End,
            "/streamon" => Request::StreamOn,
            "/stats" => Request::Stats,
            other => {
                let encoded = other.strip_prefix('/').unwrap_or(other);
                Request::Passthrough(percent_decode_str(encoded).decode_utf8_lossy().into_owned())
            },
        }
    }
}

/// 网关响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayResponse {
    Text(String),
    Stats(TelemetryRecord),
}

impl GatewayResponse {
    /// 响应正文（遥测快照序列化为 JSON 对象）
    pub fn to_body(&self) -> String {
        match self {
            GatewayResponse::Text(text) => text.clone(),
            GatewayResponse::Stats(record) => {
                serde_json::to_string(record).unwrap_or_else(|_| "{}".to_string())
            },
        }
    }
}

/// 命令结果文本
pub fn command_message(command: &str, reply: &str) -> String {
    format!("Command sent: \"{}\", drone responded: \"{}\"", command, reply)
}

/// 周期状态日志的内容
///
/// 只读取遥测新鲜度与线程状态，不调用连接探测（Wi-Fi 探测会执行阻塞的外部命令）。
pub fn status_line(bridge: &Bridge) -> String {
    let (response_alive, telemetry_alive) = bridge.check_health();
    format!(
        "telemetry_age={:?} listeners=({}, {}) {}",
        bridge.connection_monitor().time_since_last_feedback(),
        response_alive,
        telemetry_alive,
        bridge.get_metrics()
    )
}

/// 请求分发器
pub struct RequestGateway {
    bridge: Arc<Bridge>,
    recorder: Arc<dyn VideoRecorder>,
}

impl RequestGateway {
    pub fn new(bridge: Arc<Bridge>, recorder: Arc<dyn VideoRecorder>) -> Self {
        Self { bridge, recorder }
    }

    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// 处理一个请求（可能阻塞在等待设备应答上）
    pub fn handle(&self, request: Request) -> GatewayResponse {
        match request {
            Request::Start => self.send(Command::enter_sdk()),
            Request::End => {
                self.bridge.release();
                GatewayResponse::Text(ENDED.to_string())
            },
            Request::StreamOn => {
                let response = self.send(Command::stream_on());
                self.recorder.start();
                response
            },
            Request::Stats => {
                if self.bridge.is_reachable() {
                    GatewayResponse::Stats(self.bridge.telemetry_snapshot())
                } else {
                    GatewayResponse::Text(OFFLINE.to_string())
                }
            },
            Request::Passthrough(text) => self.send(Command::new(text)),
        }
    }

    fn send(&self, command: Command) -> GatewayResponse {
        let reply = match self.bridge.send_command(command.clone()) {
            Ok(reply) => reply.into_string(),
            Err(DriverError::TransportUnavailable) => {
                warn!("Not connected to Drone WiFi");
                OFFLINE.to_string()
            },
            Err(e) => {
                warn!("Command {:?} failed: {}", command.as_str(), e);
                format!("Error: {}", e)
            },
        };
        GatewayResponse::Text(command_message(command.as_str(), &reply))
    }
}
