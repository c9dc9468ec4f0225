//! RequestGateway 分发测试（Mock 设备）

mod common;

use common::{fixture, respond, wait_until};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tello_gateway::{GatewayResponse, Request};

fn text(response: GatewayResponse) -> String {
    match response {
        GatewayResponse::Text(text) => text,
        other => panic!("expected text response, got {:?}", other),
    }
}

#[test]
fn test_start_reports_command_and_reply() {
    let f = fixture();
    let device = respond(&f.device, 1, "ok");

    let message = text(f.gateway.handle(Request::Start));
    assert_eq!(message, "Command sent: \"command\", drone responded: \"ok\"");
    assert_eq!(device.join().unwrap(), vec!["command"]);
}

#[test]
fn test_passthrough_is_sent_verbatim() {
    let f = fixture();
    let device = respond(&f.device, 1, "ok");

    let message = text(f.gateway.handle(Request::from_path("/flip l")));
    assert_eq!(message, "Command sent: \"flip l\", drone responded: \"ok\"");
    assert_eq!(device.join().unwrap(), vec!["flip l"]);
}

#[test]
fn test_offline_send_reports_offline() {
    let f = fixture();
    f.probe.set(false);

    let message = text(f.gateway.handle(Request::Start));
    assert_eq!(
        message,
        "Command sent: \"command\", drone responded: \"Drone offline\""
    );
    assert_eq!(f.device.pending_commands(), 0);
}

#[test]
fn test_streamon_launches_recorder() {
    let f = fixture();
    let device = respond(&f.device, 1, "ok");

    let message = text(f.gateway.handle(Request::StreamOn));
    assert_eq!(message, "Command sent: \"streamon\", drone responded: \"ok\"");
    assert_eq!(device.join().unwrap(), vec!["streamon"]);
    assert_eq!(f.recorder.starts.load(Ordering::Relaxed), 1);
}

#[test]
fn test_stats_offline_ignores_store() {
    let f = fixture();
    f.telemetry_device.reply("bat:80;");
    assert!(wait_until(Duration::from_secs(2), || {
        !f.gateway.bridge().telemetry().is_empty()
    }));

    f.probe.set(false);
    assert_eq!(
        f.gateway.handle(Request::Stats),
        GatewayResponse::Text("Drone offline".to_string())
    );
    assert_eq!(f.device.pending_commands(), 0);
    assert_eq!(f.gateway.bridge().get_metrics().commands_sent, 0);
}

#[test]
fn test_stats_returns_snapshot() {
    let f = fixture();
    f.telemetry_device.reply("battery:80;temp:25;");
    assert!(wait_until(Duration::from_secs(2), || {
        f.gateway.bridge().telemetry().len() == 2
    }));

    let body = f.gateway.handle(Request::Stats).to_body();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, serde_json::json!({"battery": "80", "temp": "25"}));
    assert_eq!(f.device.pending_commands(), 0);
}

#[test]
fn test_end_then_start_does_not_hang() {
    let f = fixture();

    assert_eq!(text(f.gateway.handle(Request::End)), "Ended");
    // 再次 end 不报错
    assert_eq!(text(f.gateway.handle(Request::End)), "Ended");

    let message = text(f.gateway.handle(Request::Start));
    assert!(message.starts_with("Command sent: \"command\", drone responded: \"Error:"));
    assert!(message.contains("closed"), "{}", message);
    assert_eq!(f.device.pending_commands(), 0);
}

/// 统计连接探测调用次数
struct CountingProbe {
    calls: std::sync::atomic::AtomicUsize,
}

impl tello_driver::ConnectivityProbe for CountingProbe {
    fn is_reachable(&self) -> bool {
        self.calls.fetch_add(1, Ordering::Relaxed);
        true
    }
}

#[test]
fn test_status_line_does_not_run_probe() {
    let probe = std::sync::Arc::new(CountingProbe {
        calls: std::sync::atomic::AtomicUsize::new(0),
    });
    let (command_link, _device) = tello_transport::mock::MockLink::new();
    let (telemetry_rx, telemetry_device) = tello_transport::mock::MockLink::receiver();
    let bridge = tello_driver::BridgeBuilder::new()
        .probe(probe.clone())
        .build_with(command_link, telemetry_rx)
        .unwrap();

    let line = tello_gateway::status_line(&bridge);
    assert!(line.contains("telemetry_age=None"), "{}", line);

    telemetry_device.reply("bat:80;");
    assert!(wait_until(Duration::from_secs(2), || !bridge.telemetry().is_empty()));
    let line = tello_gateway::status_line(&bridge);
    assert!(line.contains("telemetry_age=Some("), "{}", line);
    assert!(line.contains("cmd=0"), "{}", line);

    assert_eq!(probe.calls.load(Ordering::Relaxed), 0);
}
