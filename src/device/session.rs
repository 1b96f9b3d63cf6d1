//! One device connection, from registration to removal.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;

use crate::config::BridgeConfig;
use crate::net::{read_frame, ConnectionGuard, FrameError};
use crate::observability::metrics;
use crate::protocol::codec::decode_bytes;
use crate::protocol::{CodecError, Registration, Report};
use crate::registry::{Entry, Registry};

/// Session limits, derived from [`BridgeConfig`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub max_frame_len: usize,
    pub registration_timeout: Duration,
    pub idle_timeout: Option<Duration>,
}

impl From<&BridgeConfig> for SessionConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            max_frame_len: config.protocol.max_frame_len,
            registration_timeout: config.devices.registration_timeout(),
            idle_timeout: config.devices.idle_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&BridgeConfig::default())
    }
}

/// Why a session stopped.
#[derive(Debug)]
pub enum SessionEnd {
    /// Peer closed the stream.
    Closed,
    /// No frame within the idle timeout.
    Idle,
    /// Server shutting down.
    Shutdown,
    /// Bad frame length or undecodable message.
    Protocol(String),
    /// Socket error.
    Transport(std::io::Error),
}

impl From<FrameError> for SessionEnd {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Closed => SessionEnd::Closed,
            FrameError::Io(e) => SessionEnd::Transport(e),
            too_large @ FrameError::TooLarge { .. } => SessionEnd::Protocol(too_large.to_string()),
        }
    }
}

impl From<CodecError> for SessionEnd {
    fn from(err: CodecError) -> Self {
        SessionEnd::Protocol(err.to_string())
    }
}

impl SessionEnd {
    fn metric_reason(&self) -> Option<&'static str> {
        match self {
            SessionEnd::Protocol(_) => Some("protocol"),
            _ => None,
        }
    }
}

/// Drive one device connection to completion.
///
/// Returns `None` when registration failed, otherwise why the read loop ended.
pub async fn run_session<S>(
    stream: S,
    peer_addr: SocketAddr,
    registry: Registry,
    guard: ConnectionGuard,
    config: SessionConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Option<SessionEnd>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let connection_id = guard.id();
    let (mut reader, writer) = tokio::io::split(stream);

    let registration = tokio::select! {
        registration = tokio::time::timeout(
            config.registration_timeout,
            read_registration(&mut reader, config.max_frame_len),
        ) => registration,
        _ = shutdown.recv() => return None,
    };
    let registration = match registration {
        Ok(Ok(registration)) => registration,
        Ok(Err(reason)) => {
            tracing::warn!(
                peer_addr = %peer_addr,
                connection_id = %connection_id,
                reason = %reason,
                "Invalid connection: failure reading id message"
            );
            metrics::record_protocol_error("registration");
            return None;
        }
        Err(_) => {
            tracing::warn!(
                peer_addr = %peer_addr,
                connection_id = %connection_id,
                "Invalid connection: no id message before timeout"
            );
            metrics::record_protocol_error("registration_timeout");
            return None;
        }
    };

    let entry = registry
        .register(
            &registration.source,
            connection_id,
            Box::new(writer),
            &registration.plugin,
        )
        .await;

    let end = read_loop(&mut reader, &entry, &registry, &config, &mut shutdown).await;

    match &end {
        SessionEnd::Closed | SessionEnd::Shutdown => tracing::info!(
            device_id = %registration.source,
            connection_id = %connection_id,
            reason = ?end,
            "UI disconnected"
        ),
        _ => tracing::warn!(
            device_id = %registration.source,
            connection_id = %connection_id,
            reason = ?end,
            "UI connection dropped"
        ),
    }
    if let Some(reason) = end.metric_reason() {
        metrics::record_protocol_error(reason);
    }

    entry.close().await;
    registry.remove(&registration.source, connection_id);
    drop(guard);
    Some(end)
}

async fn read_registration<R>(reader: &mut R, max_frame_len: usize) -> Result<Registration, String>
where
    R: AsyncRead + Unpin,
{
    let payload = read_frame(reader, max_frame_len)
        .await
        .map_err(|e| e.to_string())?;
    let map = decode_bytes(&payload).map_err(|e| e.to_string())?;
    Registration::from_map(&map).ok_or_else(|| "missing source or plugin".to_string())
}

async fn next_frame<R>(reader: &mut R, config: &SessionConfig) -> Result<Vec<u8>, SessionEnd>
where
    R: AsyncRead + Unpin,
{
    match config.idle_timeout {
        Some(idle) => match tokio::time::timeout(idle, read_frame(reader, config.max_frame_len)).await {
            Ok(frame) => Ok(frame?),
            Err(_) => Err(SessionEnd::Idle),
        },
        None => Ok(read_frame(reader, config.max_frame_len).await?),
    }
}

async fn read_loop<R>(
    reader: &mut R,
    entry: &Entry,
    registry: &Registry,
    config: &SessionConfig,
    shutdown: &mut broadcast::Receiver<()>,
) -> SessionEnd
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = tokio::select! {
            frame = next_frame(reader, config) => frame,
            _ = shutdown.recv() => return SessionEnd::Shutdown,
        };
        let payload = match frame {
            Ok(payload) => payload,
            Err(end) => return end,
        };
        metrics::record_frame_received();

        if payload.is_empty() {
            tracing::trace!(device_id = %entry.identifier(), "Keepalive");
            continue;
        }

        let map = match decode_bytes(&payload) {
            Ok(map) => map,
            Err(e) => return e.into(),
        };
        let line = String::from_utf8_lossy(&payload).into_owned();
        tracing::debug!(device_id = %entry.identifier(), message = %line, "From device");

        if let Some(report) = Report::from_map(&map) {
            let merged = registry.record_report(
                entry.identifier(),
                entry.connection_id(),
                report.key,
                report.value,
            );
            if !merged {
                tracing::debug!(
                    device_id = %entry.identifier(),
                    connection_id = %entry.connection_id(),
                    "Report from replaced connection ignored"
                );
            }
        }
        entry.push_history(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::net::{write_frame, ConnectionTracker, MAX_FRAME_LEN};
    use crate::paraminfo::EmptySource;
    use crate::protocol::{Command, CompositeKey};
    use std::sync::Arc;
    use tokio::io::{duplex, AsyncWriteExt, DuplexStream};
    use tokio::task::JoinHandle;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn spawn_session(
        registry: &Registry,
        tracker: &ConnectionTracker,
        shutdown: &Shutdown,
        config: SessionConfig,
    ) -> (DuplexStream, JoinHandle<Option<SessionEnd>>) {
        let (device, server) = duplex(4096);
        let handle = tokio::spawn(run_session(
            server,
            peer(),
            registry.clone(),
            tracker.track(),
            config,
            shutdown.subscribe(),
        ));
        (device, handle)
    }

    async fn wait_registered(registry: &Registry, id: &str) -> Arc<Entry> {
        for _ in 0..200 {
            if let Ok(entry) = registry.lookup(id) {
                return entry;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("{id} never registered");
    }

    #[tokio::test]
    async fn registers_merges_reports_and_removes_on_close() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());

        write_frame(&mut device, b"source|ui-1||plugin|urn:synth").await.unwrap();
        let entry = wait_registered(&registry, "ui-1").await;

        write_frame(&mut device, b"").await.unwrap();
        write_frame(&mut device, b"type|control||key|2||value|0.8").await.unwrap();
        let key = CompositeKey::new("control", "2");
        let value = entry.wait_for_report(&key, Duration::from_secs(2)).await;
        assert_eq!(value.as_deref(), Some("0.8"));
        for _ in 0..200 {
            if !entry.history().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        // Keepalives are not recorded.
        assert_eq!(entry.history(), ["type|control||key|2||value|0.8"]);

        // Commands reach the device through the entry.
        entry.send(&Command::Get { key: key.clone() }).await.unwrap();
        let frame = read_frame(&mut device, MAX_FRAME_LEN).await.unwrap();
        assert_eq!(frame, b"cmd|get||type|control||key|2");

        drop(device);
        let end = handle.await.unwrap();
        assert!(matches!(end, Some(SessionEnd::Closed)));
        assert!(registry.is_empty());
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn missing_plugin_rejects_registration() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());

        write_frame(&mut device, b"source|ui-1").await.unwrap();
        assert!(handle.await.unwrap().is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn oversized_frame_drops_connection() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let config = SessionConfig {
            max_frame_len: 64,
            ..SessionConfig::default()
        };
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, config);

        write_frame(&mut device, b"source|ui-2||plugin|p").await.unwrap();
        wait_registered(&registry, "ui-2").await;
        device.write_all(&1000u32.to_be_bytes()).await.unwrap();

        let end = handle.await.unwrap();
        assert!(matches!(end, Some(SessionEnd::Protocol(_))));
        assert!(registry.lookup("ui-2").is_err());
    }

    #[tokio::test]
    async fn malformed_message_drops_connection() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());

        write_frame(&mut device, b"source|ui-3||plugin|p").await.unwrap();
        wait_registered(&registry, "ui-3").await;
        write_frame(&mut device, b"no separator here").await.unwrap();

        assert!(matches!(handle.await.unwrap(), Some(SessionEnd::Protocol(_))));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn idle_timeout_ends_session() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let config = SessionConfig {
            idle_timeout: Some(Duration::from_millis(50)),
            ..SessionConfig::default()
        };
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, config);

        write_frame(&mut device, b"source|ui-4||plugin|p").await.unwrap();
        assert!(matches!(handle.await.unwrap(), Some(SessionEnd::Idle)));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn replaced_session_leaves_new_entry_alone() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();

        let (mut first, first_handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());
        write_frame(&mut first, b"source|ui-5||plugin|p").await.unwrap();
        let old = wait_registered(&registry, "ui-5").await;

        let (mut second, _second_handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());
        write_frame(&mut second, b"source|ui-5||plugin|p").await.unwrap();
        for _ in 0..200 {
            if registry.lookup("ui-5").unwrap().connection_id() != old.connection_id() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let current = registry.lookup("ui-5").unwrap();
        assert_ne!(current.connection_id(), old.connection_id());

        // A late report from the orphaned connection is not merged.
        write_frame(&mut first, b"type|control||key|1||value|5").await.unwrap();
        drop(first);
        first_handle.await.unwrap();

        let still = registry.lookup("ui-5").unwrap();
        assert_eq!(still.connection_id(), current.connection_id());
        assert!(still.reported(&CompositeKey::new("control", "1")).is_none());
    }

    #[tokio::test]
    async fn shutdown_drains_sessions() {
        let registry = Registry::new(Arc::new(EmptySource), 10);
        let tracker = ConnectionTracker::new();
        let shutdown = Shutdown::new();
        let (mut device, handle) = spawn_session(&registry, &tracker, &shutdown, SessionConfig::default());

        write_frame(&mut device, b"source|ui-6||plugin|p").await.unwrap();
        wait_registered(&registry, "ui-6").await;

        shutdown.trigger();
        assert!(matches!(handle.await.unwrap(), Some(SessionEnd::Shutdown)));
        assert!(registry.is_empty());
        assert!(tracker.wait_for_drain(Duration::from_secs(1)).await);
        // The device observes the close.
        assert!(matches!(
            read_frame(&mut device, MAX_FRAME_LEN).await,
            Err(FrameError::Closed)
        ));
    }
}
