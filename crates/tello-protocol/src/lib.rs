//! # Tello Protocol
//!
//! Tello 文本协议定义（无 IO 依赖）
//!
//! ## 模块
//!
//! - `constants`: 端口、地址、分隔符等协议常量
//! - `telemetry`: 遥测广播包解析
//!
//! ## 报文格式
//!
//! 命令与应答都是单个 UTF-8 数据报，没有序列号、没有校验和。
//! 命令原样透传，本层不做任何语法检查；应答与命令之间只能依靠发送顺序对应。

pub mod constants;
pub mod telemetry;

pub use constants::*;
pub use telemetry::{TelemetryField, TelemetryPacket};

use std::fmt;
use thiserror::Error;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Payload is not valid UTF-8 (valid up to byte {valid_up_to})")]
    InvalidUtf8 { valid_up_to: usize },

    #[error("Frame too large: {len} bytes (max {max})")]
    FrameTooLarge { len: usize, max: usize },
}

/// 将数据报解码为文本
///
/// 与原始设备交互时，任何非 UTF-8 数据都视为解码失败。
pub fn decode_payload(data: &[u8]) -> Result<&str, ProtocolError> {
    std::str::from_utf8(data).map_err(|e| ProtocolError::InvalidUtf8 {
        valid_up_to: e.valid_up_to(),
    })
}

/// 设备命令（不透明文本，原样发送）
///
/// # 示例
///
/// ```rust
/// use tello_protocol::Command;
///
/// let cmd = Command::new("takeoff");
/// assert_eq!(cmd.as_str(), "takeoff");
/// assert_eq!(cmd.encode().unwrap(), b"takeoff");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Command(String);

impl Command {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// 进入 SDK 模式（`command`）
    pub fn enter_sdk() -> Self {
        Self::new(CMD_ENTER_SDK)
    }

    /// 开启视频推流（`streamon`）
    pub fn stream_on() -> Self {
        Self::new(CMD_STREAM_ON)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 是否为进入 SDK 模式的握手命令
    pub fn is_enter_sdk(&self) -> bool {
        self.0 == CMD_ENTER_SDK
    }

    /// 编码为数据报负载
    ///
    /// # 错误
    /// - `ProtocolError::FrameTooLarge`: 超过 [`MAX_FRAME_SIZE`]
    pub fn encode(&self) -> Result<&[u8], ProtocolError> {
        let bytes = self.0.as_bytes();
        if bytes.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                len: bytes.len(),
                max: MAX_FRAME_SIZE,
            });
        }
        Ok(bytes)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self(text)
    }
}

/// 设备应答（不透明文本）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Reply(String);

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// 从数据报解码
    pub fn decode(data: &[u8]) -> Result<Self, ProtocolError> {
        decode_payload(data).map(Self::new)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_encode_verbatim() {
        let cmd = Command::new("up 20");
        assert_eq!(cmd.encode().unwrap(), b"up 20");
        assert_eq!(cmd.to_string(), "up 20");
    }

    #[test]
    fn test_command_encode_too_large() {
        let cmd = Command::new("x".repeat(MAX_FRAME_SIZE + 1));
        let err = cmd.encode().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::FrameTooLarge {
                len: MAX_FRAME_SIZE + 1,
                max: MAX_FRAME_SIZE
            }
        );
    }

    #[test]
    fn test_command_encode_at_limit() {
        let cmd = Command::new("x".repeat(MAX_FRAME_SIZE));
        assert_eq!(cmd.encode().unwrap().len(), MAX_FRAME_SIZE);
    }

    #[test]
    fn test_well_known_commands() {
        assert_eq!(Command::enter_sdk().as_str(), "command");
        assert_eq!(Command::stream_on().as_str(), "streamon");
        assert!(Command::enter_sdk().is_enter_sdk());
        assert!(Command::from("command").is_enter_sdk());
        assert!(!Command::new("command ").is_enter_sdk());
    }

    #[test]
    fn test_reply_decode() {
        assert_eq!(Reply::decode(b"ok").unwrap().as_str(), "ok");
        assert!(matches!(
            Reply::decode(&[b'o', 0xFF]),
            Err(ProtocolError::InvalidUtf8 { valid_up_to: 1 })
        ));
    }

    #[test]
    fn test_error_display() {
        let msg = ProtocolError::InvalidUtf8 { valid_up_to: 3 }.to_string();
        assert!(msg.contains("UTF-8") && msg.contains('3'), "{}", msg);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Command::new("land")).unwrap();
        assert_eq!(json, "\"land\"");
    }
}
