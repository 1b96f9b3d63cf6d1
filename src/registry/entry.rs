//! Per-connection state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::net::{write_frame, ConnectionId, FrameError};
use crate::observability::metrics;
use crate::paraminfo::AllInfo;
use crate::protocol::{Command, CompositeKey};
use crate::registry::history::History;

/// Write side of a device connection.
pub type Transport = Box<dyn AsyncWrite + Send + Unpin>;

/// State of one registered device.
///
/// `reported` is written only by the owning session and read by any number
/// of HTTP handlers. Writes to the transport are serialized by its own
/// async mutex, never by the registry map.
pub struct Entry {
    identifier: String,
    connection_id: ConnectionId,
    plugin: String,
    description: Arc<AllInfo>,
    transport: tokio::sync::Mutex<Option<Transport>>,
    reported: RwLock<HashMap<CompositeKey, String>>,
    history: Mutex<History>,
    updates: Notify,
    closed: AtomicBool,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("identifier", &self.identifier)
            .field("connection_id", &self.connection_id)
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

impl Entry {
    pub fn new(
        identifier: String,
        connection_id: ConnectionId,
        plugin: String,
        description: AllInfo,
        transport: Transport,
        history_capacity: usize,
    ) -> Self {
        Self {
            identifier,
            connection_id,
            plugin,
            description: Arc::new(description),
            transport: tokio::sync::Mutex::new(Some(transport)),
            reported: RwLock::new(HashMap::new()),
            history: Mutex::new(History::new(history_capacity)),
            updates: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Parameter description fetched at registration.
    pub fn description(&self) -> Arc<AllInfo> {
        Arc::clone(&self.description)
    }

    /// Encode and send a command as one frame.
    pub async fn send(&self, command: &Command) -> Result<(), FrameError> {
        let payload = command.encode();
        let mut transport = self.transport.lock().await;
        let writer = transport
            .as_mut()
            .ok_or_else(|| FrameError::Io(std::io::ErrorKind::NotConnected.into()))?;
        write_frame(writer, payload.as_bytes()).await?;
        metrics::record_frame_sent();
        tracing::debug!(
            device_id = %self.identifier,
            connection_id = %self.connection_id,
            payload = %payload,
            "Command sent"
        );
        Ok(())
    }

    /// Shut the transport down. Later calls and sends see it closed.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let transport = self.transport.lock().await.take();
        if let Some(mut writer) = transport {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(device_id = %self.identifier, error = %e, "Transport shutdown failed");
            }
        }
        self.updates.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn reported(&self, key: &CompositeKey) -> Option<String> {
        self.reported
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn reported_values(&self) -> HashMap<CompositeKey, String> {
        self.reported
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn store_report(&self, key: CompositeKey, value: String) {
        self.reported
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, value);
        self.updates.notify_waiters();
    }

    pub(crate) fn push_history(&self, line: String) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    }

    /// Recent raw messages, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Wait until a value for `key` is reported, the connection closes or
    /// `timeout` elapses.
    pub async fn wait_for_report(&self, key: &CompositeKey, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.updates.notified();
            tokio::pin!(notified);
            // Register before checking so a report landing in between is not missed.
            notified.as_mut().enable();

            if let Some(value) = self.reported(key) {
                return Some(value);
            }
            if self.is_closed() {
                return None;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.reported(key);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::BrokenPipe;
    use super::*;
    use crate::net::{read_frame, MAX_FRAME_LEN};
    use tokio::io::duplex;

    fn entry(transport: Transport) -> Entry {
        Entry::new(
            "ui-1".into(),
            ConnectionId::new(),
            "urn:synth".into(),
            AllInfo::default(),
            transport,
            4,
        )
    }

    #[tokio::test]
    async fn send_writes_one_frame() {
        let (client, mut device) = duplex(1024);
        let entry = entry(Box::new(client));
        let command = Command::Set {
            key: CompositeKey::new("control", "1"),
            value: "0.5".into(),
        };

        entry.send(&command).await.unwrap();
        let frame = read_frame(&mut device, MAX_FRAME_LEN).await.unwrap();
        assert_eq!(frame, command.encode().as_bytes());
    }

    #[tokio::test]
    async fn send_after_close_fails() {
        let (client, _device) = duplex(64);
        let entry = entry(Box::new(client));
        entry.close().await;
        entry.close().await;

        let err = entry
            .send(&Command::Get { key: CompositeKey::new("control", "1") })
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == std::io::ErrorKind::NotConnected));
    }

    #[tokio::test]
    async fn broken_transport_surfaces_io_error() {
        let entry = entry(Box::new(BrokenPipe));
        let err = entry
            .send(&Command::Get { key: CompositeKey::new("control", "1") })
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[tokio::test]
    async fn waiter_wakes_on_report() {
        let (client, _device) = duplex(64);
        let entry = Arc::new(entry(Box::new(client)));
        let key = CompositeKey::new("midicc", "7");

        let writer = Arc::clone(&entry);
        let stored = key.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            writer.store_report(stored, "99".into());
        });

        let value = entry.wait_for_report(&key, Duration::from_secs(2)).await;
        assert_eq!(value.as_deref(), Some("99"));
    }

    #[tokio::test]
    async fn waiter_times_out_empty() {
        let (client, _device) = duplex(64);
        let entry = entry(Box::new(client));
        let value = entry
            .wait_for_report(&CompositeKey::new("control", "9"), Duration::from_millis(20))
            .await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn waiter_returns_when_connection_closes() {
        let (client, _device) = duplex(64);
        let entry = Arc::new(entry(Box::new(client)));

        let closer = Arc::clone(&entry);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            closer.close().await;
        });

        let started = Instant::now();
        let value = entry
            .wait_for_report(&CompositeKey::new("control", "1"), Duration::from_secs(10))
            .await;
        assert!(value.is_none());
        assert!(entry.is_closed());
        assert!(started.elapsed() < Duration::from_secs(2));

        // Already closed: no wait at all.
        let value = entry
            .wait_for_report(&CompositeKey::new("control", "1"), Duration::from_secs(10))
            .await;
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (client, _device) = duplex(64);
        let entry = entry(Box::new(client));
        for i in 0..6 {
            entry.push_history(format!("m{i}"));
        }
        assert_eq!(entry.history(), ["m2", "m3", "m4", "m5"]);
    }
}
