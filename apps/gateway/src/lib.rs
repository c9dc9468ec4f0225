//! # Tello Gateway
//!
//! 把浏览器发来的 HTTP GET 请求翻译为无人机命令：
//!
//! | 路径 | 动作 |
//! |------|------|
//! | `/start` | 发送 `command`（进入 SDK 模式） |
//! | `/end` | 关闭命令与遥测 socket |
//! | `/streamon` | 发送 `streamon` 并在后台录制视频 |
//! | `/stats` | 返回最新遥测（JSON） |
//! | `/<其他>` | URL 解码后原样作为命令发送 |
//!
//! 所有响应都是 200，并带 `Access-Control-Allow-Origin: *`。

pub mod config;
pub mod gateway;
pub mod recorder;
pub mod server;

pub use config::{GatewayConfig, ProbeKind, VideoConfig};
pub use gateway::{GatewayResponse, Request, RequestGateway, status_line};
pub use recorder::{FfmpegRecorder, NoopRecorder, VideoRecorder};
