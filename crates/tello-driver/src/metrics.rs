//! 桥接性能指标模块
//!
//! 原子计数器，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// 桥接实时指标
///
/// # 使用示例
///
/// ```rust
/// use tello_driver::BridgeMetrics;
/// use std::sync::atomic::Ordering;
///
/// let metrics = BridgeMetrics::default();
/// metrics.commands_sent.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(metrics.snapshot().commands_sent, 1);
/// ```
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    /// 写出的命令数
    pub commands_sent: AtomicU64,

    /// 进入应答队列的应答数（含无法解码的）
    pub replies_received: AtomicU64,

    /// 因前一次等待超时而被丢弃的迟到应答数
    pub replies_discarded: AtomicU64,

    /// 等待应答超时次数
    pub reply_timeouts: AtomicU64,

    /// 收到的遥测包数
    pub telemetry_packets: AtomicU64,

    /// 写入 TelemetryStore 的字段数
    pub telemetry_fields_applied: AtomicU64,

    /// 缺少 key/value 分隔符而被跳过的字段数
    pub telemetry_fields_skipped: AtomicU64,

    /// 非 UTF-8 负载次数
    pub decode_errors: AtomicU64,

    /// socket 接收错误次数（不含超时与主动关闭）
    pub socket_errors: AtomicU64,

    /// 监听线程被 supervisor 重启的次数
    pub listener_restarts: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取指标快照
    ///
    /// 不同计数器之间可能有微小的时间差。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            replies_received: self.replies_received.load(Ordering::Relaxed),
            replies_discarded: self.replies_discarded.load(Ordering::Relaxed),
            reply_timeouts: self.reply_timeouts.load(Ordering::Relaxed),
            telemetry_packets: self.telemetry_packets.load(Ordering::Relaxed),
            telemetry_fields_applied: self.telemetry_fields_applied.load(Ordering::Relaxed),
            telemetry_fields_skipped: self.telemetry_fields_skipped.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            socket_errors: self.socket_errors.load(Ordering::Relaxed),
            listener_restarts: self.listener_restarts.load(Ordering::Relaxed),
        }
    }

    /// 重置所有计数器
    pub fn reset(&self) {
        self.commands_sent.store(0, Ordering::Relaxed);
        self.replies_received.store(0, Ordering::Relaxed);
        self.replies_discarded.store(0, Ordering::Relaxed);
        self.reply_timeouts.store(0, Ordering::Relaxed);
        self.telemetry_packets.store(0, Ordering::Relaxed);
        self.telemetry_fields_applied.store(0, Ordering::Relaxed);
        self.telemetry_fields_skipped.store(0, Ordering::Relaxed);
        self.decode_errors.store(0, Ordering::Relaxed);
        self.socket_errors.store(0, Ordering::Relaxed);
        self.listener_restarts.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub commands_sent: u64,
    pub replies_received: u64,
    pub replies_discarded: u64,
    pub reply_timeouts: u64,
    pub telemetry_packets: u64,
    pub telemetry_fields_applied: u64,
    pub telemetry_fields_skipped: u64,
    pub decode_errors: u64,
    pub socket_errors: u64,
    pub listener_restarts: u64,
}

impl MetricsSnapshot {
    /// 已发出但还没有对应应答的命令数（估算值）
    pub fn outstanding_commands(&self) -> u64 {
        (self.replies_discarded + self.commands_sent).saturating_sub(self.replies_received)
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cmd={} reply={} discarded={} timeouts={} telemetry={} fields={}/{} skipped \
             decode_err={} socket_err={} restarts={}",
            self.commands_sent,
            self.replies_received,
            self.replies_discarded,
            self.reply_timeouts,
            self.telemetry_packets,
            self.telemetry_fields_applied,
            self.telemetry_fields_skipped,
            self.decode_errors,
            self.socket_errors,
            self.listener_restarts,
        )
    }
}
