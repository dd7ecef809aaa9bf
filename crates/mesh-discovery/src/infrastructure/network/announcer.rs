//! Periodic multicast announcer.
//!
//! `start()` opens the send socket, sends one announcement immediately, and
//! spawns a task that sends another every `interval`.  Each announcement is
//! built fresh, so its timestamp reflects the moment it was sent.  A failed
//! send is logged and retried on the next tick; only socket setup failures
//! surface to the caller.

use std::net::SocketAddr;
use std::time::Duration;

use mesh_core::{encode_announcement, Announcement, NodeId};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::socket;
use crate::config::AnnouncerConfig;
use crate::error::DiscoveryError;
use crate::lifecycle::LifecycleState;

pub struct Announcer {
    config: AnnouncerConfig,
    state: LifecycleState,
    local_addr: Option<SocketAddr>,
    task: Option<SendTask>,
}

struct SendTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Announcer {
    pub fn new(config: AnnouncerConfig) -> Self {
        Self {
            config,
            state: LifecycleState::Created,
            local_addr: None,
            task: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Local address of the send socket while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Opens the socket, sends the first announcement, and starts the
    /// periodic task.
    ///
    /// # Errors
    ///
    /// - [`DiscoveryError::InvalidState`] unless the announcer is freshly
    ///   created.
    /// - [`DiscoveryError::InvalidConfig`] for a zero interval.
    /// - [`DiscoveryError::SocketSetup`] if the socket cannot be opened.
    ///
    /// A failed `start()` leaves the announcer `Stopped`.
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

        let sender = AnnouncementSender {
            socket,
            node_id: self.config.node_id,
            service_port: self.config.service_port,
            dest: SocketAddr::V4(self.config.group),
        };

        if let Err(e) = sender.send().await {
            warn!("initial announcement failed: {e}");
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(announce_loop(sender, self.config.interval, shutdown_rx));
        self.task = Some(SendTask {
            shutdown: shutdown_tx,
            handle,
        });
        self.state = LifecycleState::Running;

        info!(
            node_id = %self.config.node_id,
            port = self.config.service_port,
            group = %self.config.group,
            interval_ms = self.config.interval.as_millis() as u64,
            "announcer started"
        );
        Ok(())
    }

    /// Stops the periodic task and closes the socket.
    ///
    /// Returns once the task has exited.  Calling `stop()` before `start()`
    /// or more than once is a no-op.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            debug!(state = %self.state, "announcer stop requested while not running");
            return;
        };
        self.state = LifecycleState::Stopping;

        let _ = task.shutdown.send(true);
        if let Err(e) = task.handle.await {
            warn!("announce task ended abnormally: {e}");
        }

        self.local_addr = None;
        self.state = LifecycleState::Stopped;
        info!(node_id = %self.config.node_id, "announcer stopped");
    }

    fn open_socket(&self) -> Result<UdpSocket, DiscoveryError> {
        let std_socket = socket::open_sender(self.config.interface, self.config.multicast_ttl)?;
        let local = std_socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from((self.config.interface, 0)));
        UdpSocket::from_std(std_socket)
            .map_err(|source| DiscoveryError::SocketSetup { addr: local, source })
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
    }
}

impl std::fmt::Debug for Announcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Announcer")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

// ── Send task ────────────────────────────────────────────────────────────────

struct AnnouncementSender {
    socket: UdpSocket,
    node_id: NodeId,
    service_port: u16,
    dest: SocketAddr,
}

impl AnnouncementSender {
    async fn send(&self) -> Result<usize, DiscoveryError> {
        let bytes = encode_announcement(&Announcement::now(self.node_id, self.service_port));
        self.socket
            .send_to(&bytes, self.dest)
            .await
            .map_err(|source| DiscoveryError::Send {
                dest: self.dest,
                source,
            })
    }
}

async fn announce_loop(
    sender: AnnouncementSender,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    // The first announcement went out in start(); the first tick is one
    // interval later.
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sender.send().await {
                    Ok(n) => trace!(bytes = n, dest = %sender.dest, "announcement sent"),
                    Err(e) => warn!("{e}"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("announce loop exited");
}
