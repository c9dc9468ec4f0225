//! HTTP 接口测试（真实 TCP 监听 + Mock 设备）

mod common;

use common::{fixture, respond, wait_until};
use std::time::Duration;
use tello_gateway::server;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct Running {
    base: String,
    stop: Option<oneshot::Sender<()>>,
    handle: tokio::task::JoinHandle<anyhow::Result<()>>,
}

async fn start(gateway: std::sync::Arc<tello_gateway::RequestGateway>) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server::serve(listener, gateway, async move {
        let _ = stop_rx.await;
    }));
    Running {
        base,
        stop: Some(stop_tx),
        handle,
    }
}

async fn get(url: &str) -> reqwest::Response {
    reqwest::Client::new()
        .get(url)
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_over_http() {
    let f = fixture();
    let device = respond(&f.device, 1, "ok");
    let running = start(f.gateway.clone()).await;

    let response = get(&format!("{}/start", running.base)).await;
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("command") && body.contains("ok"), "{}", body);
    assert_eq!(device.join().unwrap(), vec!["command"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_passthrough_is_url_decoded() {
    let f = fixture();
    let device = respond(&f.device, 1, "ok");
    let running = start(f.gateway.clone()).await;

    let response = get(&format!("{}/up%2020", running.base)).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "Command sent: \"up 20\", drone responded: \"ok\"");
    assert_eq!(device.join().unwrap(), vec!["up 20"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stats_over_http() {
    let f = fixture();
    f.telemetry_device.reply("battery:80;temp:25;");
    assert!(wait_until(Duration::from_secs(2), || {
        f.gateway.bridge().telemetry().len() == 2
    }));
    let running = start(f.gateway.clone()).await;

    let response = get(&format!("{}/stats", running.base)).await;
    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(value, serde_json::json!({"battery": "80", "temp": "25"}));

    f.probe.set(false);
    let body = get(&format!("{}/stats", running.base)).await.text().await.unwrap();
    assert_eq!(body, "Drone offline");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_end_over_http_then_graceful_shutdown() {
    let f = fixture();
    let mut running = start(f.gateway.clone()).await;

    let body = get(&format!("{}/end", running.base)).await.text().await.unwrap();
    assert_eq!(body, "Ended");
    assert!(f.gateway.bridge().is_released());

    if let Some(stop) = running.stop.take() {
        let _ = stop.send(());
    }
    let result = tokio::time::timeout(Duration::from_secs(5), running.handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fixed_routes_match_raw_target() {
    let f = fixture();
    let device = respond(&f.device, 2, "ok");
    let running = start(f.gateway.clone()).await;

    let body = get(&format!("{}/%73tart", running.base)).await.text().await.unwrap();
    assert_eq!(body, "Command sent: \"start\", drone responded: \"ok\"");

    let body = get(&format!("{}/stats?x=1", running.base)).await.text().await.unwrap();
    assert_eq!(body, "Command sent: \"stats?x=1\", drone responded: \"ok\"");

    assert_eq!(device.join().unwrap(), vec!["start", "stats?x=1"]);
}
