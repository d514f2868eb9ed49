//! Coalescing wake-up channel between producers and the consumer.

use std::net::{SocketAddr, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::{net::UdpSocket, sync::Notify, task::JoinHandle, time::Duration};
use tracing::{debug, warn};

use crate::types::QueueKind;

#[derive(Debug)]
struct Inner {
    queue: QueueKind,
    notify: Notify,
    pings: AtomicU64,
}

/// Ping channel for one queue. Clones share the channel.
///
/// Pings sent while nobody waits collapse into one stored wake-up, so a burst of
/// enqueues wakes the consumer once.
#[derive(Debug, Clone)]
pub struct WakeUp {
    inner: Arc<Inner>,
}

impl WakeUp {
    /// Creates the channel for `queue`.
    pub fn new(queue: QueueKind) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                notify: Notify::new(),
                pings: AtomicU64::new(0),
            }),
        }
    }

    /// Queue this channel belongs to.
    pub fn queue(&self) -> QueueKind {
        self.inner.queue
    }

    /// Signals that new work is available. Never blocks.
    pub fn ping(&self) {
        self.inner.pings.fetch_add(1, Ordering::Relaxed);
        self.inner.notify.notify_one();
    }

    /// Pings sent so far.
    pub fn pings_sent(&self) -> u64 {
        self.inner.pings.load(Ordering::Relaxed)
    }

    /// Waits for a ping for at most `timeout`; true when one arrived.
    pub async fn wait_for_ping(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.inner.notify.notified())
            .await
            .is_ok()
    }

    /// Binds `addr` and turns every datagram received into a ping.
    pub async fn listen_udp(&self, addr: SocketAddr) -> std::io::Result<JoinHandle<()>> {
        let socket = UdpSocket::bind(addr).await?;
        let wakeup = self.clone();
        debug!(%addr, queue = %wakeup.queue(), "listening for pings");
        Ok(tokio::spawn(async move {
            let mut buf = [0u8; 16];
            loop {
                match socket.recv_from(&mut buf).await {
                    Ok(_) => wakeup.ping(),
                    Err(err) => {
                        warn!(%err, "ping listener stopped");
                        break;
                    }
                }
            }
        }))
    }
}

/// Sends pings to a consumer in another process.
#[derive(Debug)]
pub struct UdpPinger {
    socket: StdUdpSocket,
    target: SocketAddr,
}

impl UdpPinger {
    /// Prepares a non-blocking sender towards `target`.
    pub fn new(target: SocketAddr) -> std::io::Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([127, 0, 0, 1], 0))
        } else {
            SocketAddr::from((std::net::Ipv6Addr::LOCALHOST, 0))
        };
        let socket = StdUdpSocket::bind(local)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, target })
    }

    /// Sends one ping; delivery failures are logged and otherwise ignored.
    pub fn ping(&self) {
        if let Err(err) = self.socket.send_to(b"ping", self.target) {
            debug!(%err, target = %self.target, "ping not delivered");
        }
    }
}
