//! 网关测试公共设施：Mock 设备上的 Bridge

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tello_driver::{BridgeBuilder, ListenerConfig, ManualProbe, RestartPolicy};
use tello_gateway::{RequestGateway, VideoRecorder};
use tello_transport::mock::{MockDevice, MockLink};

/// 只计数的录制器
#[derive(Default)]
pub struct CountingRecorder {
    pub starts: AtomicUsize,
}

impl VideoRecorder for CountingRecorder {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct Fixture {
    pub gateway: Arc<RequestGateway>,
    pub device: MockDevice,
    pub telemetry_device: MockDevice,
    pub probe: Arc<ManualProbe>,
    pub recorder: Arc<CountingRecorder>,
}

pub fn fixture() -> Fixture {
    let probe = Arc::new(ManualProbe::new(true));
    let (command_link, device) = MockLink::new();
    let (telemetry_rx, telemetry_device) = MockLink::receiver();
    let bridge = BridgeBuilder::new()
        .probe(probe.clone())
        .listener_config(ListenerConfig {
            receive_timeout_ms: 10,
            restart: RestartPolicy::default(),
        })
        .build_with(command_link, telemetry_rx)
        .unwrap();
    let recorder = Arc::new(CountingRecorder::default());
    let gateway = Arc::new(RequestGateway::new(Arc::new(bridge), recorder.clone()));
    Fixture {
        gateway,
        device,
        telemetry_device,
        probe,
        recorder,
    }
}

/// 模拟设备：对接下来的 `count` 条命令回复 `reply`
pub fn respond(device: &MockDevice, count: usize, reply: &'static str) -> thread::JoinHandle<Vec<String>> {
    let device = device.clone();
    thread::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..count {
            let Some(command) = device.next_command(Duration::from_secs(5)) else {
                break;
            };
            device.reply(reply);
            seen.push(command);
        }
        seen
    })
}

pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
