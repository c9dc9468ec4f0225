//! 协议常量定义
//!
//! 端口、地址与分隔符均取自 Tello SDK 的默认约定。

/// 设备命令端口（无人机侧）
pub const DEVICE_COMMAND_ADDR: &str = "192.168.10.1:8889";

/// 本地命令 socket 绑定地址（接收应答）
pub const COMMAND_BIND_ADDR: &str = "0.0.0.0:9000";

/// 本地遥测 socket 绑定地址（接收广播状态包）
pub const TELEMETRY_BIND_ADDR: &str = "0.0.0.0:8890";

/// 视频流地址（`streamon` 之后设备推送到此端口）
pub const VIDEO_STREAM_URL: &str = "udp://0.0.0.0:11111";

/// 单个数据报的最大长度（字节）
///
/// 命令与应答都必须能装进一个数据报。
pub const MAX_FRAME_SIZE: usize = 1518;

/// 遥测包的字段分隔符
pub const RECORD_SEPARATOR: char = ';';

/// 遥测字段内的 key/value 分隔符
pub const KV_SEPARATOR: char = ':';

/// 进入 SDK 模式的命令
pub const CMD_ENTER_SDK: &str = "command";

/// 开启视频推流的命令
pub const CMD_STREAM_ON: &str = "streamon";
