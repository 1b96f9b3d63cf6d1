//! Device side of the bridge.
//!
//! # Data Flow
//! ```text
//! Listener::accept
//!     → session.rs: registration frame (source, plugin)
//!     → Registry::register (description fetched, entry inserted)
//!     → read loop: reports merged, raw lines logged
//!     → on EOF / error / idle / shutdown: transport closed, entry removed
//! ```
//!
//! # Design Decisions
//! - One task per connection; nothing here waits on HTTP work
//! - The registry never closes sockets; only the owning session does

pub mod session;

pub use session::{run_session, SessionConfig, SessionEnd};

use crate::lifecycle::Shutdown;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::registry::Registry;

/// Accept device connections until shutdown, one session task each.
pub async fn serve_devices(
    listener: Listener,
    registry: Registry,
    tracker: ConnectionTracker,
    config: SessionConfig,
    shutdown: Shutdown,
) {
    let mut stop = shutdown.subscribe();
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = stop.recv() => {
                tracing::info!("Device listener stopping");
                break;
            }
        };

        match accepted {
            Ok((stream, peer_addr, permit)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!(peer_addr = %peer_addr, error = %e, "Failed to set TCP_NODELAY");
                }
                let guard = tracker.track();
                let registry = registry.clone();
                let config = config.clone();
                let session_shutdown = shutdown.subscribe();
                tokio::spawn(async move {
                    let _permit = permit;
                    run_session(stream, peer_addr, registry, guard, config, session_shutdown).await;
                });
            }
            Err(ListenerError::Closed) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Device accept failed");
            }
        }
    }
}
