//! Observer interface through which the listener reports peer activity.
//!
//! The listener holds an `Arc<dyn PeerObserver>` and calls it from its
//! background tasks, so implementations must be `Send + Sync` and should
//! return quickly.  A panic inside an observer is caught and logged; it does
//! not stop the receive loop or the sweep.
//!
//! Two adapters cover the common cases:
//!
//! - [`CallbackObserver`] wraps plain closures.
//! - [`ChannelObserver`] forwards [`DiscoveryEvent`]s over an unbounded tokio
//!   channel for consumers that live on their own task.

use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};

use mesh_core::{NodeId, PeerUpdate};
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::PeerTimeoutError;

/// A valid announcement as seen by the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerAnnouncement {
    pub node_id: NodeId,
    /// IP address the datagram arrived from.  Not part of the payload.
    pub source_ip: IpAddr,
    /// Service port advertised by the peer.
    pub service_port: u16,
    /// The sender's clock when the announcement was built, in ms since the
    /// Unix epoch.  Informational only; liveness uses the local clock.
    pub timestamp_ms: u64,
    /// Whether the peer was new to the table or already known.
    pub update: PeerUpdate,
}

impl PeerAnnouncement {
    pub fn is_new(&self) -> bool {
        self.update == PeerUpdate::New
    }
}

/// Receives peer notifications from a [`crate::Listener`].
///
/// Only `on_announcement` is required.  `on_timeout` and `on_removed` are
/// both invoked, in that order, when a sweep evicts a peer.
#[cfg_attr(test, mockall::automock)]
pub trait PeerObserver: Send + Sync {
    /// Called for every valid announcement, including repeats.
    fn on_announcement(&self, announcement: PeerAnnouncement);

    /// Called when a peer exceeds the timeout.
    fn on_timeout(&self, error: PeerTimeoutError) {
        let _ = error;
    }

    /// Called when a peer has been removed from the table.
    fn on_removed(&self, node_id: NodeId) {
        let _ = node_id;
    }
}

/// Runs one observer callback and keeps a panic from escaping into the
/// calling task.
pub(crate) fn notify<F: FnOnce()>(callback: &'static str, f: F) {
    if let Err(panic) = catch_unwind(AssertUnwindSafe(f)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(callback, %message, "peer observer panicked; continuing");
    }
}

// ── CallbackObserver ─────────────────────────────────────────────────────────

type AnnouncementFn = dyn Fn(PeerAnnouncement) + Send + Sync;
type TimeoutFn = dyn Fn(PeerTimeoutError) + Send + Sync;
type RemovedFn = dyn Fn(NodeId) + Send + Sync;

/// A [`PeerObserver`] built from closures.
pub struct CallbackObserver {
    on_announcement: Box<AnnouncementFn>,
    on_timeout: Option<Box<TimeoutFn>>,
    on_removed: Option<Box<RemovedFn>>,
}

impl CallbackObserver {
    pub fn new<F>(on_announcement: F) -> Self
    where
        F: Fn(PeerAnnouncement) + Send + Sync + 'static,
    {
        Self {
            on_announcement: Box::new(on_announcement),
            on_timeout: None,
            on_removed: None,
        }
    }

    pub fn with_timeout<F>(mut self, on_timeout: F) -> Self
    where
        F: Fn(PeerTimeoutError) + Send + Sync + 'static,
    {
        self.on_timeout = Some(Box::new(on_timeout));
        self
    }

    pub fn with_removed<F>(mut self, on_removed: F) -> Self
    where
        F: Fn(NodeId) + Send + Sync + 'static,
    {
        self.on_removed = Some(Box::new(on_removed));
        self
    }
}

impl PeerObserver for CallbackObserver {
    fn on_announcement(&self, announcement: PeerAnnouncement) {
        (self.on_announcement)(announcement);
    }

    fn on_timeout(&self, error: PeerTimeoutError) {
        if let Some(f) = &self.on_timeout {
            f(error);
        }
    }

    fn on_removed(&self, node_id: NodeId) {
        if let Some(f) = &self.on_removed {
            f(node_id);
        }
    }
}

impl std::fmt::Debug for CallbackObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackObserver")
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_removed", &self.on_removed.is_some())
            .finish_non_exhaustive()
    }
}

// ── ChannelObserver ──────────────────────────────────────────────────────────

/// Peer activity forwarded by a [`ChannelObserver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Announced(PeerAnnouncement),
    TimedOut(PeerTimeoutError),
    Removed(NodeId),
}

/// A [`PeerObserver`] that forwards every notification as a
/// [`DiscoveryEvent`].
///
/// The channel is unbounded so the listener's tasks never wait on a slow
/// consumer.  Events sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<DiscoveryEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DiscoveryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: DiscoveryEvent) {
        if self.tx.send(event).is_err() {
            debug!("discovery event receiver dropped; event discarded");
        }
    }
}

impl PeerObserver for ChannelObserver {
    fn on_announcement(&self, announcement: PeerAnnouncement) {
        self.forward(DiscoveryEvent::Announced(announcement));
    }

    fn on_timeout(&self, error: PeerTimeoutError) {
        self.forward(DiscoveryEvent::TimedOut(error));
    }

    fn on_removed(&self, node_id: NodeId) {
        self.forward(DiscoveryEvent::Removed(node_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn announcement(byte: u8) -> PeerAnnouncement {
        PeerAnnouncement {
            node_id: NodeId::from_bytes([byte; 16]),
            source_ip: IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)),
            service_port: 4464,
            timestamp_ms: 1_700_000_000_000,
            update: PeerUpdate::New,
        }
    }

    #[test]
    fn test_callback_observer_forwards_all_three_callbacks() {
        // Arrange
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let (a, t, r) = (seen.clone(), seen.clone(), seen.clone());
        let observer = CallbackObserver::new(move |p| a.lock().unwrap().push(format!("ann {}", p.service_port)))
            .with_timeout(move |e| t.lock().unwrap().push(format!("timeout {:?}", e.timeout)))
            .with_removed(move |_| r.lock().unwrap().push("removed".to_string()));

        // Act
        observer.on_announcement(announcement(1));
        observer.on_timeout(PeerTimeoutError {
            node_id: NodeId::from_bytes([1; 16]),
            silent_for: Duration::from_millis(25),
            timeout: Duration::from_millis(10),
        });
        observer.on_removed(NodeId::from_bytes([1; 16]));

        // Assert
        assert_eq!(
            *seen.lock().unwrap(),
            vec!["ann 4464", "timeout 10ms", "removed"]
        );
    }

    #[test]
    fn test_callback_observer_without_optional_callbacks_ignores_them() {
        let observer = CallbackObserver::new(|_| {});
        observer.on_removed(NodeId::from_bytes([2; 16]));
    }

    #[test]
    fn test_channel_observer_emits_events_in_order() {
        // Arrange
        let (observer, mut rx) = ChannelObserver::new();
        let node_id = NodeId::from_bytes([3; 16]);

        // Act
        observer.on_announcement(announcement(3));
        observer.on_removed(node_id);

        // Assert
        assert_eq!(rx.try_recv().unwrap(), DiscoveryEvent::Announced(announcement(3)));
        assert_eq!(rx.try_recv().unwrap(), DiscoveryEvent::Removed(node_id));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_observer_survives_dropped_receiver() {
        let (observer, rx) = ChannelObserver::new();
        drop(rx);
        observer.on_announcement(announcement(4));
    }

    #[test]
    fn test_notify_contains_panics() {
        notify("on_announcement", || panic!("observer bug"));
        notify("on_removed", || std::panic::panic_any(42_u32));
    }
}
