//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use madigan_bridge::config::BridgeConfig;
use madigan_bridge::net::{read_frame, write_frame, FrameError, Listener, MAX_FRAME_LEN};
use madigan_bridge::paraminfo::{AllInfo, CatalogSource, ParameterSource};
use madigan_bridge::protocol::{decode_bytes, CompositeKey, KvMap, Registration, Report};
use madigan_bridge::{BridgeServer, Shutdown};

pub const FILTER_PLUGIN: &str = "urn:madigan:filter";

/// Catalog with one plugin: a cutoff slider and a file path patch parameter.
pub fn catalog() -> Arc<dyn ParameterSource> {
    let filter: AllInfo = serde_json::from_value(serde_json::json!({
        "control": [
            {"index": "0", "symbol": "cutoff", "name": "Cutoff", "input": true, "control": true, "min": 20.0, "max": 20000.0},
            {"index": "1", "symbol": "level", "name": "Level", "output": true, "control": true}
        ],
        "midi": [{"name": "Volume", "midicc": "7", "max": 127.0}],
        "patch": [{"name": "Sample", "uri": "urn:madigan:filter#sample", "range": "http://lv2plug.in/ns/ext/atom#Path"}]
    }))
    .unwrap();
    let mut plugins = HashMap::new();
    plugins.insert(FILTER_PLUGIN.to_string(), filter);
    Arc::new(CatalogSource::new(plugins))
}

/// A bridge running on ephemeral ports.
pub struct TestBridge {
    pub http_url: String,
    pub device_addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestBridge {
    pub async fn start() -> Self {
        let mut config = BridgeConfig::default();
        config.shutdown.drain_timeout_secs = 2;
        Self::start_with(config).await
    }

    pub async fn start_with(config: BridgeConfig) -> Self {
        let http_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let http_url = format!("http://{}", http_listener.local_addr().unwrap());
        let device_listener = Listener::from_listener(
            TcpListener::bind("127.0.0.1:0").await.unwrap(),
            config.devices.max_connections,
        );
        let device_addr = device_listener.local_addr().unwrap();

        let shutdown = Shutdown::new();
        let server = BridgeServer::new(config, catalog());
        let handle = tokio::spawn(server.run(http_listener, device_listener, shutdown.clone()));

        Self {
            http_url,
            device_addr,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}{}", self.http_url, path_and_query)
    }

    /// Poll `/madigan-state` until `id` is registered.
    pub async fn wait_registered(&self, client: &reqwest::Client, id: &str) {
        self.wait_for_state(client, id, |_| true).await;
    }

    /// Poll `/madigan-state` until its body satisfies `ready`; returns the body.
    pub async fn wait_for_state<F>(&self, client: &reqwest::Client, id: &str, ready: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        for _ in 0..100 {
            let res = client
                .get(self.url("/madigan-state"))
                .query(&[("id", id)])
                .send()
                .await
                .unwrap();
            if res.status().is_success() {
                let body = res.text().await.unwrap();
                if ready(&body) {
                    return body;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("device {id} never reached the expected state");
    }
}

/// A scripted device connection.
pub struct TestDevice {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl TestDevice {
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self { reader, writer }
    }

    pub async fn register(addr: SocketAddr, id: &str, plugin: &str) -> Self {
        let mut device = Self::connect(addr).await;
        let registration = Registration {
            source: id.to_string(),
            plugin: plugin.to_string(),
        };
        device.send_raw(registration.encode().as_bytes()).await;
        device
    }

    pub async fn send_raw(&mut self, payload: &[u8]) {
        write_frame(&mut self.writer, payload).await.unwrap();
    }

    pub async fn report(&mut self, kind: &str, key: &str, value: &str) {
        let report = Report {
            key: CompositeKey::new(kind, key),
            value: value.to_string(),
        };
        self.send_raw(report.encode().as_bytes()).await;
    }

    /// Next command from the bridge, failing after a second.
    pub async fn next_command(&mut self) -> KvMap {
        let payload = tokio::time::timeout(
            Duration::from_secs(1),
            read_frame(&mut self.reader, MAX_FRAME_LEN),
        )
        .await
        .expect("no command within a second")
        .unwrap();
        decode_bytes(&payload).unwrap()
    }

    /// `None` if nothing arrives within `wait`.
    pub async fn try_next_frame(&mut self, wait: Duration) -> Option<Result<Vec<u8>, FrameError>> {
        tokio::time::timeout(wait, read_frame(&mut self.reader, MAX_FRAME_LEN))
            .await
            .ok()
    }
}
