//! 遥测状态存储
//!
//! 单写者（遥测监听线程）/ 多读者（请求处理）。读取走 `ArcSwap::load`，无锁。
//! 写入整包替换：同一个遥测包内的所有字段对读者同时可见。

use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tello_protocol::TelemetryPacket;

/// 遥测快照：key → 最新值
///
/// `BTreeMap` 使 JSON 输出的 key 顺序稳定。
pub type TelemetryRecord = BTreeMap<String, String>;

/// 遥测状态（每个 key 只保留最新值，永不删除）
#[derive(Debug)]
pub struct TelemetryStore {
    fields: ArcSwap<TelemetryRecord>,
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self {
            fields: ArcSwap::from_pointee(TelemetryRecord::new()),
        }
    }

    /// 写入单个字段（对同一 key 幂等）
    pub fn set(&self, key: &str, value: &str) {
        self.fields.rcu(|current| {
            let mut next = TelemetryRecord::clone(current);
            next.insert(key.to_string(), value.to_string());
            next
        });
    }

    /// 整包写入，返回写入的字段数
    ///
    /// 一次原子替换：读者要么看到整包之前的状态，要么看到整包之后的状态。
    pub fn apply(&self, packet: &TelemetryPacket<'_>) -> usize {
        if packet.is_empty() {
            return 0;
        }
        self.fields.rcu(|current| {
            let mut next = TelemetryRecord::clone(current);
            for field in &packet.fields {
                next.insert(field.key.to_string(), field.value.to_string());
            }
            next
        });
        packet.len()
    }

    /// 获取快照副本（调用时刻的不可变拷贝）
    pub fn get_snapshot(&self) -> TelemetryRecord {
        self.fields.load().as_ref().clone()
    }

    /// 获取共享快照（不拷贝）
    pub fn load(&self) -> Arc<TelemetryRecord> {
        self.fields.load_full()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.fields.load().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.fields.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.load().is_empty()
    }
}
