//! 遥测包解析
//!
//! 设备以固定频率广播形如 `pitch:0;roll:0;yaw:0;...;bat:80;\r\n` 的文本包。
//! 解析规则：
//! - 按 `;` 切分为字段
//! - 不含 `:` 的字段直接跳过（包括包尾的 `\r\n`），不视为错误
//! - key 为第一个 `:` 之前的文本，value 为第一个与第二个 `:` 之间的文本
//! - 不做任何 trim

use crate::constants::{KV_SEPARATOR, RECORD_SEPARATOR};
use smallvec::SmallVec;

/// 单个遥测字段（借用原始包文本）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryField<'a> {
    pub key: &'a str,
    pub value: &'a str,
}

impl<'a> TelemetryField<'a> {
    /// 解析单个字段
    ///
    /// 字段不含 key/value 分隔符时返回 `None`。
    pub fn parse(field: &'a str) -> Option<Self> {
        let mut bits = field.split(KV_SEPARATOR);
        let key = bits.next()?;
        let value = bits.next()?;
        Some(Self { key, value })
    }
}

/// 一个已解析的遥测包
///
/// Tello 每包大约 16~20 个字段，`SmallVec` 容量按此取值以避免堆分配。
#[derive(Debug, Clone, Default)]
pub struct TelemetryPacket<'a> {
    /// 合法字段（按包内顺序）
    pub fields: SmallVec<[TelemetryField<'a>; 24]>,
    /// 因缺少分隔符而被跳过的字段数（纯空白字段不计入）
    pub skipped: usize,
}

impl<'a> TelemetryPacket<'a> {
    /// 解析整包文本
    pub fn parse(payload: &'a str) -> Self {
        let mut packet = Self::default();
        for raw in payload.split(RECORD_SEPARATOR) {
            match TelemetryField::parse(raw) {
                Some(field) => packet.fields.push(field),
                None if raw.trim().is_empty() => {},
                None => packet.skipped += 1,
            }
        }
        packet
    }

    /// 按 key 查找（同一包内重复的 key 以最后一次为准）
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.fields.iter().rev().find(|f| f.key == key).map(|f| f.value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
