//! Tello 网关主入口

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tello_gateway::server;
use tello_gateway::{GatewayConfig, ProbeKind, RequestGateway, status_line};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Tello 网关
///
/// 通过 HTTP 接收命令，转发给无人机并返回应答；同时接收遥测广播。
#[derive(Parser, Debug)]
#[command(name = "tello-gateway")]
#[command(about = "HTTP gateway for Tello drones", long_about = None)]
struct Args {
    /// 配置文件路径（TOML）
    ///
    /// 默认: <config_dir>/tello-bridge/gateway.toml（不存在则使用内置默认值）
    #[arg(long)]
    config: Option<PathBuf>,

    /// HTTP 监听地址（默认 0.0.0.0:8080）
    #[arg(long)]
    http: Option<String>,

    /// 设备命令地址（默认 192.168.10.1:8889）
    #[arg(long)]
    device: Option<String>,

    /// 命令 socket 本地绑定地址（默认 0.0.0.0:9000）
    #[arg(long)]
    command_bind: Option<String>,

    /// 遥测 socket 本地绑定地址（默认 0.0.0.0:8890）
    #[arg(long)]
    telemetry_bind: Option<String>,

    /// 连接探测方式
    #[arg(long, value_enum)]
    probe: Option<ProbeKind>,

    /// 等待应答的超时（毫秒），默认一直等待
    #[arg(long)]
    reply_timeout_ms: Option<u64>,

    /// 不录制视频
    #[arg(long)]
    no_video: bool,

    /// 视频录制时长（秒）
    #[arg(long)]
    video_duration: Option<u64>,

    /// 视频输出目录
    #[arg(long)]
    video_dir: Option<PathBuf>,

    /// 日志文件目录（每日轮转）
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

impl Args {
    /// 用命令行参数覆盖配置
    fn apply(self, config: &mut GatewayConfig) {
        if let Some(http) = self.http {
            config.http_addr = http;
        }
        if let Some(device) = self.device {
            config.device_addr = device;
        }
        if let Some(bind) = self.command_bind {
            config.command_bind = bind;
        }
        if let Some(bind) = self.telemetry_bind {
            config.telemetry_bind = bind;
        }
        if let Some(probe) = self.probe {
            config.probe = probe;
        }
        if self.reply_timeout_ms.is_some() {
            config.reply_timeout_ms = self.reply_timeout_ms;
        }
        if self.no_video {
            config.video.enabled = false;
        }
        if let Some(secs) = self.video_duration {
            config.video.duration_secs = secs;
        }
        if let Some(dir) = self.video_dir {
            config.video.output_dir = dir;
        }
        if self.log_dir.is_some() {
            config.log_dir = self.log_dir;
        }
    }
}

/// 初始化日志：终端 + 可选的每日轮转文件
///
/// 返回的 guard 必须存活到进程结束，否则文件日志会丢失尾部。
fn init_tracing(log_dir: Option<&Path>) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::from_default_env()
        .add_directive("tello_gateway=info".parse()?)
        .add_directive("tello_driver=info".parse()?);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tello-gateway.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to initialise logging")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = GatewayConfig::load(args.config.as_deref())?;
    args.apply(&mut config);

    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    let bridge = Arc::new(
        config
            .bridge_builder()
            .build()
            .context("Failed to open drone sockets")?,
    );

    let reachable = {
        let bridge = bridge.clone();
        tokio::task::spawn_blocking(move || bridge.is_reachable()).await?
    };
    if !reachable {
        warn!("WARNING: Not connected to Drone WiFi");
    }

    let gateway = Arc::new(RequestGateway::new(bridge.clone(), config.recorder()));

    // Ctrl+C：关闭 socket 并停止 HTTP 服务
    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        let bridge = bridge.clone();
        ctrlc::set_handler(move || {
            info!("Received interrupt signal. Shutting down...");
            bridge.release();
            shutdown.notify_one();
        })
        .context("Failed to set signal handler")?;
    }

    if config.status_interval_secs > 0 {
        let bridge = bridge.clone();
        let period = Duration::from_secs(config.status_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                debug!("Status: {}", status_line(&bridge));
            }
        });
    }

    let listener = TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", config.http_addr))?;
    info!("serving at {}", listener.local_addr()?);

    server::serve(listener, gateway, async move { shutdown.notified().await }).await?;

    bridge.release();
    info!("Gateway stopped");
    Ok(())
}
