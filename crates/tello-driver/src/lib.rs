//! # Tello Driver
//!
//! 命令/应答关联与遥测接收驱动，包括：
//! - 命令链路（单飞行：同一时刻最多一条命令等待应答）
//! - 应答监听与遥测监听线程（supervisor 下运行，失败后退避重启）
//! - 遥测状态（ArcSwap 无锁读取）
//! - 连接探测与遥测新鲜度监控
//!
//! # 使用场景
//!
//! ```no_run
//! use tello_driver::BridgeBuilder;
//!
//! let bridge = BridgeBuilder::new().build().unwrap();
//! let reply = bridge.send_command("command").unwrap();
//! println!("drone responded: {}", reply);
//! println!("{:?}", bridge.telemetry_snapshot());
//! bridge.release();
//! ```

mod bridge;
mod builder;
mod error;
pub mod heartbeat;
pub mod link;
pub mod metrics;
pub mod pipeline;
pub mod probe;
pub mod response;
pub mod state;

pub use bridge::Bridge;
pub use builder::{BridgeBuilder, DEFAULT_MONITOR_TIMEOUT};
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use link::{CommandLink, LinkConfig};
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use pipeline::{ListenerConfig, LoopExit, RestartPolicy, response_loop, supervise, telemetry_loop};
pub use probe::{AlwaysReachable, CommandProbe, ConnectivityProbe, ManualProbe};
pub use response::{ResponseReceiver, ResponseRecvError, ResponseSender, response_channel};
pub use state::{TelemetryRecord, TelemetryStore};

pub use tello_protocol::{Command, Reply};
