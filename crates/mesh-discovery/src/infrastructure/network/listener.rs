//! Multicast announcement listener.
//!
//! Runs two tasks over a shared [`PeerTracker`]:
//!
//! - **receive** – reads datagrams from the group socket and hands them to
//!   the tracker.
//! - **sweep** – wakes every `peer_timeout` and evicts peers that have been
//!   silent for longer than `peer_timeout`.
//!
//! Receive and sweep both go through the tracker's dispatch lock, so the
//! observer sees events in the order the peer table changed.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mesh_core::NodeId;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{now, socket};
use crate::application::observer::PeerObserver;
use crate::application::peer_tracker::PeerTracker;
use crate::config::ListenerConfig;
use crate::error::DiscoveryError;
use crate::lifecycle::LifecycleState;

/// Maximum UDP payload, so every datagram is seen at its true length.
const RECV_BUFFER_SIZE: usize = 65_536;

/// First wait after a failed receive; doubles per consecutive failure.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);
const RECV_ERROR_BACKOFF_MAX: Duration = Duration::from_secs(1);

pub struct Listener {
    config: ListenerConfig,
    tracker: Arc<PeerTracker>,
    state: LifecycleState,
    local_addr: Option<SocketAddr>,
    tasks: Option<ListenTasks>,
}

struct ListenTasks {
    shutdown: watch::Sender<bool>,
    receive: JoinHandle<()>,
    sweep: JoinHandle<()>,
}

impl Listener {
    pub fn new(config: ListenerConfig, observer: Arc<dyn PeerObserver>) -> Self {
        let tracker = Arc::new(PeerTracker::new(config.peer_timeout, observer));
        Self {
            config,
            tracker,
            state: LifecycleState::Created,
            local_addr: None,
            tasks: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Local address of the group socket while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Peers currently considered alive, in ascending id order.
    pub fn known_peers(&self) -> Vec<NodeId> {
        self.tracker.known_peers()
    }

    /// Joins the group and starts the receive and sweep tasks.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidState`] unless the listener is freshly
    ///   created.
    /// - [`DiscoveryError::InvalidConfig`] for a zero peer timeout.
    /// - [`DiscoveryError::SocketSetup`] if the socket cannot be bound or the
    ///   group cannot be joined.
    ///
    /// A failed `start()` leaves the listener `Stopped`.
    pub async fn start(&mut self) -> Result<(), DiscoveryError> {
        if self.state != LifecycleState::Created {
            return Err(DiscoveryError::InvalidState(self.state));
        }
        self.state = LifecycleState::Starting;

        let socket = match self.config.validate().and_then(|()| self.open_socket()) {
            Ok(socket) => socket,
            Err(e) => {
                self.state = LifecycleState::Stopped;
                return Err(e);
            }
        };
        self.local_addr = socket.local_addr().ok();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let receive = tokio::spawn(receive_loop(
            socket,
            Arc::clone(&self.tracker),
            shutdown_rx.clone(),
        ));
        let sweep = tokio::spawn(sweep_loop(
            Arc::clone(&self.tracker),
            self.config.peer_timeout,
            shutdown_rx,
        ));
        self.tasks = Some(ListenTasks {
            shutdown: shutdown_tx,
            receive,
            sweep,
        });
        self.state = LifecycleState::Running;

        info!(
            group = %self.config.group,
            interface = %self.config.interface,
            timeout_ms = self.config.peer_timeout.as_millis() as u64,
            "listener started"
        );
        Ok(())
    }

    /// Stops both tasks and closes the socket.
    ///
    /// Returns once both tasks have exited, so no observer callback runs
    /// after this completes.  Calling `stop()` before `start()` or more than
    /// once is a no-op.
    pub async fn stop(&mut self) {
        let Some(tasks) = self.tasks.take() else {
            debug!(state = %self.state, "listener stop requested while not running");
            return;
        };
        self.state = LifecycleState::Stopping;

        let _ = tasks.shutdown.send(true);
        for (name, handle) in [("receive", tasks.receive), ("sweep", tasks.sweep)] {
            if let Err(e) = handle.await {
                warn!(task = name, "listener task ended abnormally: {e}");
            }
        }

        self.local_addr = None;
        self.state = LifecycleState::Stopped;
        info!(group = %self.config.group, "listener stopped");
    }

    fn open_socket(&self) -> Result<UdpSocket, DiscoveryError> {
        let std_socket = socket::open_receiver(self.config.interface, self.config.group)?;
        let local = std_socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from((self.config.interface, self.config.group.port())));
        UdpSocket::from_std(std_socket)
            .map_err(|source| DiscoveryError::SocketSetup { addr: local, source })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        if let Some(tasks) = self.tasks.take() {
            tasks.receive.abort();
            tasks.sweep.abort();
        }
    }
}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

// ── Tasks ────────────────────────────────────────────────────────────────────

async fn receive_loop(
    socket: UdpSocket,
    tracker: Arc<PeerTracker>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; RECV_BUFFER_SIZE];
    let mut errors = ReceiveErrors::default();
    loop {
        let received = tokio::select! {
            received = socket.recv_from(&mut buf) => received,
            _ = shutdown_requested(&mut shutdown) => break,
        };
        match received {
            Ok((len, source)) => {
                errors.reset();
                tracker.handle_datagram(&buf[..len], source, now());
            }
            Err(e) => {
                let delay = errors.record(&e);
                tokio::select! {
                    _ = time::sleep(delay) => {}
                    _ = shutdown_requested(&mut shutdown) => break,
                }
            }
        }
    }
    debug!("receive loop exited");
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Consecutive receive failures.  Only the first of a run is logged at warn
/// level, and each retry waits twice as long as the last, up to a cap.
#[derive(Debug, Default)]
struct ReceiveErrors {
    consecutive: u32,
}

impl ReceiveErrors {
    /// Records a failure and returns how long to wait before receiving again.
    fn record(&mut self, error: &io::Error) -> Duration {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive == 1 {
            warn!("discovery receive error: {error}");
        } else {
            debug!(consecutive = self.consecutive, "discovery receive error: {error}");
        }
        let exponent = (self.consecutive - 1).min(16);
        RECV_ERROR_BACKOFF
            .saturating_mul(1 << exponent)
            .min(RECV_ERROR_BACKOFF_MAX)
    }

    fn reset(&mut self) {
        if self.consecutive > 0 {
            info!(failures = self.consecutive, "discovery receive recovered");
            self.consecutive = 0;
        }
    }
}

async fn sweep_loop(
    tracker: Arc<PeerTracker>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracker.sweep(now());
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("sweep loop exited");
}
