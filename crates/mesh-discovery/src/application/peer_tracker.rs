//! The listener's receive and sweep rules.
//!
//! [`PeerTracker`] owns the peer table and the observer.  The receive task
//! feeds it raw datagrams; the sweep task feeds it clock ticks.
//!
//! Two locks are involved.  The dispatch lock is held across a table change
//! *and* the observer calls it produces, so the observer sees events in the
//! same order the table changed, even with receive and sweep running on
//! different worker threads.  The table lock is held only for the mutation
//! itself, so an observer may still query the tracker (e.g.
//! [`PeerTracker::known_peers`]) from a callback.  An observer must not call
//! [`PeerTracker::handle_datagram`] or [`PeerTracker::sweep`] re-entrantly.
//!
//! Instants are passed in rather than read here so tests can replay exact
//! timelines.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mesh_core::protocol::messages::ANNOUNCEMENT_SIZE;
use mesh_core::{decode_announcement, NodeId, PeerTable, PeerUpdate};
use tracing::{debug, info, trace};

use crate::application::observer::{notify, PeerAnnouncement, PeerObserver};
use crate::error::PeerTimeoutError;

pub struct PeerTracker {
    dispatch: Mutex<()>,
    table: Mutex<PeerTable>,
    observer: Arc<dyn PeerObserver>,
}

impl PeerTracker {
    pub fn new(timeout: Duration, observer: Arc<dyn PeerObserver>) -> Self {
        Self {
            dispatch: Mutex::new(()),
            table: Mutex::new(PeerTable::new(timeout)),
            observer,
        }
    }

    /// Processes one received datagram.
    ///
    /// Datagrams that are not exactly one announcement long are dropped
    /// silently (a trace event is the only trace of them).  For a valid
    /// announcement the peer's last-seen instant is set to `now` and the
    /// observer's `on_announcement` is called.  Returns the notification that
    /// was delivered, or `None` if the datagram was ignored.
    pub fn handle_datagram(
        &self,
        datagram: &[u8],
        source: SocketAddr,
        now: Instant,
    ) -> Option<PeerAnnouncement> {
        if datagram.len() != ANNOUNCEMENT_SIZE {
            trace!(len = datagram.len(), %source, "ignoring datagram of unexpected size");
            return None;
        }
        let announcement = match decode_announcement(datagram) {
            Ok(a) => a,
            Err(e) => {
                trace!(%source, "ignoring undecodable datagram: {e}");
                return None;
            }
        };

        let _dispatch = self.dispatch();
        let update = self.table().observe(announcement.node_id, now);

        let event = PeerAnnouncement {
            node_id: announcement.node_id,
            source_ip: source.ip(),
            service_port: announcement.port,
            timestamp_ms: announcement.timestamp_ms,
            update,
        };
        match update {
            PeerUpdate::New => info!(
                node_id = %event.node_id,
                ip = %event.source_ip,
                port = event.service_port,
                "discovered peer"
            ),
            PeerUpdate::Refreshed => trace!(node_id = %event.node_id, "peer refreshed"),
        }

        notify("on_announcement", || self.observer.on_announcement(event));
        Some(event)
    }

    /// Evicts every peer silent for longer than the timeout as of `now`.
    ///
    /// For each evicted peer the observer receives `on_timeout` followed by
    /// `on_removed`.  Returns the evicted ids in ascending order.
    pub fn sweep(&self, now: Instant) -> Vec<NodeId> {
        let _dispatch = self.dispatch();
        let (expired, timeout) = {
            let mut table = self.table();
            let timeout = table.timeout();
            (table.expire(now), timeout)
        };

        for peer in &expired {
            info!(
                node_id = %peer.node_id,
                silent_for_ms = peer.silent_for.as_millis() as u64,
                "peer timed out"
            );
            let error = PeerTimeoutError {
                node_id: peer.node_id,
                silent_for: peer.silent_for,
                timeout,
            };
            notify("on_timeout", || self.observer.on_timeout(error));
            notify("on_removed", || self.observer.on_removed(peer.node_id));
        }
        if !expired.is_empty() {
            debug!(evicted = expired.len(), remaining = self.table().len(), "sweep complete");
        }

        expired.into_iter().map(|p| p.node_id).collect()
    }

    /// Ids of the peers currently considered alive, in ascending order.
    pub fn known_peers(&self) -> Vec<NodeId> {
        self.table().node_ids()
    }

    pub fn last_seen(&self, node_id: &NodeId) -> Option<Instant> {
        self.table().last_seen(node_id)
    }

    // Observer panics are caught inside `notify`, and a poisoned table is
    // still structurally valid, so both locks recover from poisoning.
    fn table(&self) -> MutexGuard<'_, PeerTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PeerTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerTracker")
            .field("table", &*self.table())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::observer::MockPeerObserver;
    use mesh_core::{encode_announcement, Announcement};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn source() -> SocketAddr {
        "10.0.0.5:50000".parse().unwrap()
    }

    fn datagram(byte: u8, port: u16) -> [u8; ANNOUNCEMENT_SIZE] {
        encode_announcement(&Announcement::new(NodeId::from_bytes([byte; 16]), port, 1_000))
    }

    #[test]
    fn test_valid_datagram_reaches_observer_with_source_ip() {
        // Arrange
        let mut observer = MockPeerObserver::new();
        observer
            .expect_on_announcement()
            .withf(|a| {
                a.node_id == NodeId::from_bytes([b'b'; 16])
                    && a.source_ip.to_string() == "10.0.0.5"
                    && a.service_port == 99
                    && a.timestamp_ms == 1_000
                    && a.is_new()
            })
            .times(1)
            .return_const(());
        let tracker = PeerTracker::new(Duration::from_secs(10), Arc::new(observer));

        // Act
        let delivered = tracker.handle_datagram(&datagram(b'b', 99), source(), Instant::now());

        // Assert
        assert!(delivered.is_some());
        assert_eq!(tracker.known_peers(), vec![NodeId::from_bytes([b'b'; 16])]);
    }

    #[test]
    fn test_crafted_packet_is_delivered_verbatim() {
        // Arrange
        let mut observer = MockPeerObserver::new();
        observer
            .expect_on_announcement()
            .withf(|a| {
                a.node_id == NodeId::from_bytes([b'b'; 16])
                    && a.source_ip == std::net::IpAddr::from([1, 2, 3, 4])
                    && a.service_port == 10
                    && a.timestamp_ms == 99
            })
            .times(1)
            .return_const(());
        let tracker = PeerTracker::new(Duration::from_secs(10), Arc::new(observer));
        let bytes = encode_announcement(&Announcement::new(NodeId::from_bytes([b'b'; 16]), 10, 99));

        // Act
        let delivered = tracker.handle_datagram(&bytes, "1.2.3.4:0".parse().unwrap(), Instant::now());

        // Assert
        let delivered = delivered.unwrap();
        assert_eq!(
            (delivered.node_id, delivered.source_ip.to_string(), delivered.service_port, delivered.timestamp_ms),
            (NodeId::from_bytes([b'b'; 16]), "1.2.3.4".to_string(), 10, 99)
        );
    }

    #[test]
    fn test_wrong_length_datagrams_are_ignored() {
        // Arrange
        let mut observer = MockPeerObserver::new();
        observer.expect_on_announcement().never();
        let tracker = PeerTracker::new(Duration::from_secs(10), Arc::new(observer));
        let now = Instant::now();

        // Act / Assert
        for len in [0, 1, 25, 27, 1500] {
            let bytes = vec![0u8; len];
            assert!(tracker.handle_datagram(&bytes, source(), now).is_none());
        }
        assert!(tracker.known_peers().is_empty());
    }

    #[test]
    fn test_repeat_announcement_is_delivered_as_refresh() {
        // Arrange
        let mut observer = MockPeerObserver::new();
        let mut seq = Sequence::new();
        observer
            .expect_on_announcement()
            .withf(|a| a.update == PeerUpdate::New)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_on_announcement()
            .withf(|a| a.update == PeerUpdate::Refreshed)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let tracker = PeerTracker::new(Duration::from_secs(10), Arc::new(observer));
        let t0 = Instant::now();

        // Act
        tracker.handle_datagram(&datagram(1, 4464), source(), t0);
        tracker.handle_datagram(&datagram(1, 4464), source(), t0 + Duration::from_secs(5));

        // Assert
        assert_eq!(
            tracker.last_seen(&NodeId::from_bytes([1; 16])),
            Some(t0 + Duration::from_secs(5))
        );
    }

    #[test]
    fn test_refreshed_peer_survives_sweep() {
        // Arrange: timeout 10s, announcements at t0 and t0+5s, sweep at t0+12s.
        let mut observer = MockPeerObserver::new();
        observer.expect_on_announcement().times(2).return_const(());
        observer.expect_on_timeout().never();
        observer.expect_on_removed().never();
        let tracker = PeerTracker::new(Duration::from_secs(10), Arc::new(observer));
        let t0 = Instant::now();
        tracker.handle_datagram(&datagram(1, 4464), source(), t0);
        tracker.handle_datagram(&datagram(1, 4464), source(), t0 + Duration::from_secs(5));

        // Act
        let evicted = tracker.sweep(t0 + Duration::from_secs(12));

        // Assert
        assert!(evicted.is_empty());
        assert_eq!(tracker.known_peers().len(), 1);
    }

    #[test]
    fn test_expired_peer_is_reported_once_timeout_then_removed() {
        // Arrange
        let node_id = NodeId::from_bytes([7; 16]);
        let timeout = Duration::from_millis(10);
        let mut observer = MockPeerObserver::new();
        let mut seq = Sequence::new();
        observer.expect_on_announcement().times(1).return_const(());
        observer
            .expect_on_timeout()
            .withf(move |e| e.node_id == node_id && e.timeout == timeout && e.silent_for > timeout)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        observer
            .expect_on_removed()
            .with(eq(node_id))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        let tracker = PeerTracker::new(timeout, Arc::new(observer));
        let t0 = Instant::now();
        tracker.handle_datagram(&datagram(7, 4464), source(), t0);

        // Act
        let first = tracker.sweep(t0 + Duration::from_millis(20));
        let second = tracker.sweep(t0 + Duration::from_millis(40));

        // Assert
        assert_eq!(first, vec![node_id]);
        assert!(second.is_empty());
        assert!(tracker.known_peers().is_empty());
    }

    #[test]
    fn test_panicking_observer_does_not_break_tracking() {
        // Arrange
        let observer = CallbackObserverForPanic;
        let tracker = PeerTracker::new(Duration::from_millis(10), Arc::new(observer));
        let t0 = Instant::now();

        // Act
        let delivered = tracker.handle_datagram(&datagram(9, 1), source(), t0);
        let evicted = tracker.sweep(t0 + Duration::from_millis(11));

        // Assert
        assert!(delivered.is_some());
        assert_eq!(evicted, vec![NodeId::from_bytes([9; 16])]);
    }

    struct CallbackObserverForPanic;

    impl PeerObserver for CallbackObserverForPanic {
        fn on_announcement(&self, _: PeerAnnouncement) {
            panic!("announcement handler failed");
        }

        fn on_removed(&self, _: NodeId) {
            panic!("removal handler failed");
        }
    }

    #[test]
    fn test_observer_may_query_tracker_from_callback() {
        // Arrange
        let seen_from_callback = Arc::new(Mutex::new(None));
        let seen = seen_from_callback.clone();
        let tracker = Arc::new_cyclic(|weak: &std::sync::Weak<PeerTracker>| {
            let weak = weak.clone();
            let observer = crate::application::observer::CallbackObserver::new(move |_| {
                if let Some(tracker) = weak.upgrade() {
                    *seen.lock().unwrap() = Some(tracker.known_peers().len());
                }
            });
            PeerTracker::new(Duration::from_secs(10), Arc::new(observer))
        });

        // Act
        tracker.handle_datagram(&datagram(5, 1), source(), Instant::now());

        // Assert
        assert_eq!(*seen_from_callback.lock().unwrap(), Some(1));
    }

    /// Records events and announces when a timeout callback has begun, then
    /// stalls inside it so a concurrent announcement has a chance to race.
    struct SlowTimeoutObserver {
        events: Mutex<Vec<String>>,
        timeout_entered: Mutex<std::sync::mpsc::Sender<()>>,
    }

    impl PeerObserver for SlowTimeoutObserver {
        fn on_announcement(&self, announcement: PeerAnnouncement) {
            self.events
                .lock()
                .unwrap()
                .push(format!("announced new={}", announcement.is_new()));
        }

        fn on_timeout(&self, _: PeerTimeoutError) {
            self.events.lock().unwrap().push("timeout".to_string());
            let _ = self.timeout_entered.lock().unwrap().send(());
            std::thread::sleep(Duration::from_millis(50));
        }

        fn on_removed(&self, _: NodeId) {
            self.events.lock().unwrap().push("removed".to_string());
        }
    }

    #[test]
    fn test_concurrent_announcement_is_ordered_after_sweep_notifications() {
        // Arrange
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let observer = Arc::new(SlowTimeoutObserver {
            events: Mutex::new(Vec::new()),
            timeout_entered: Mutex::new(entered_tx),
        });
        let tracker = Arc::new(PeerTracker::new(Duration::from_millis(10), observer.clone()));
        let t0 = Instant::now();
        tracker.handle_datagram(&datagram(1, 4464), source(), t0);

        // Act: sweep on one thread; once its timeout callback is running,
        // announce the same peer from another thread.
        let sweeper = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || tracker.sweep(t0 + Duration::from_millis(20)))
        };
        entered_rx.recv().unwrap();
        let announcer = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                tracker.handle_datagram(&datagram(1, 4464), source(), t0 + Duration::from_millis(21))
            })
        };
        let evicted = sweeper.join().unwrap();
        let delivered = announcer.join().unwrap();

        // Assert: the last event matches the final table state.
        assert_eq!(evicted, vec![NodeId::from_bytes([1; 16])]);
        assert!(delivered.unwrap().is_new());
        assert_eq!(
            *observer.events.lock().unwrap(),
            vec!["announced new=true", "timeout", "removed", "announced new=true"]
        );
        assert_eq!(tracker.known_peers(), vec![NodeId::from_bytes([1; 16])]);
    }
}
