//! Per-session data connection negotiation.
//!
//! A session holds at most one pending data connection. PASV binds a listener
//! owned by the session, PORT records a target address; either way the pending
//! entry is consumed by exactly one transfer and a new PASV/PORT silently
//! replaces a stale one. A passive listener nobody connects to is closed once
//! the data timeout elapses.

use super::pasv::{advertised_ipv4, canonical_ip};
use super::DataChannelError;
use crate::constants::DEFAULT_DATA_TIMEOUT_SECS;
use log::{debug, info, warn};
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct DataChannelConfig {
    /// Address advertised in PASV replies instead of the control connection's local address.
    pub pasv_address: Option<Ipv4Addr>,
    /// Ports used for passive listeners; an ephemeral port when unset.
    pub pasv_ports: Option<RangeInclusive<u16>>,
    /// Bound on accepting/connecting, and lifetime of an unused passive listener.
    pub timeout: Duration,
}

impl Default for DataChannelConfig {
    fn default() -> Self {
        Self {
            pasv_address: None,
            pasv_ports: None,
            timeout: Duration::from_secs(DEFAULT_DATA_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    Passive,
    Active,
}

#[derive(Debug)]
pub enum PendingDataConnection {
    Passive { listener: TcpListener },
    Active { target: SocketAddr },
}

impl PendingDataConnection {
    pub fn mode(&self) -> DataMode {
        match self {
            PendingDataConnection::Passive { .. } => DataMode::Passive,
            PendingDataConnection::Active { .. } => DataMode::Active,
        }
    }

    /// Establishes the data stream. A passive listener accepts one connection from
    /// `peer` and is closed afterwards; connections from other hosts are dropped.
    pub async fn connect(self, peer: IpAddr, limit: Duration) -> Result<TcpStream, DataChannelError> {
        match self {
            PendingDataConnection::Passive { listener } => {
                let expected = canonical_ip(peer);
                let accept = async {
                    loop {
                        let (stream, remote) = listener.accept().await?;
                        if canonical_ip(remote.ip()) == expected {
                            debug!("Accepted data connection from {}", remote);
                            return Ok::<TcpStream, std::io::Error>(stream);
                        }
                        warn!(
                            "Rejected data connection from {} (control peer is {})",
                            remote, expected
                        );
                    }
                };
                timeout(limit, accept)
                    .await
                    .map_err(|_| DataChannelError::Timeout)?
                    .map_err(DataChannelError::Accept)
            }
            PendingDataConnection::Active { target } => {
                let stream = timeout(limit, TcpStream::connect(target))
                    .await
                    .map_err(|_| DataChannelError::Timeout)?
                    .map_err(|e| DataChannelError::Connect(target, e))?;
                debug!("Connected to client data port {}", target);
                Ok(stream)
            }
        }
    }
}

// Shared with the expiry task, which empties the slot when the listener goes unused.
type ListenerSlot = Arc<Mutex<Option<TcpListener>>>;

#[derive(Debug)]
enum Pending {
    Passive(ListenerSlot),
    Active(SocketAddr),
}

#[derive(Debug)]
pub struct DataChannel {
    config: DataChannelConfig,
    pending: Option<Pending>,
}

impl DataChannel {
    pub fn new(config: DataChannelConfig) -> Self {
        Self {
            config,
            pending: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Opens a passive listener on `local_ip` and returns the address to advertise.
    pub async fn open_passive(&mut self, local_ip: IpAddr) -> Result<SocketAddrV4, DataChannelError> {
        self.discard();

        let advertised = advertised_ipv4(self.config.pasv_address, local_ip)
            .ok_or(DataChannelError::NoIpv4(local_ip))?;
        let listener = match &self.config.pasv_ports {
            Some(range) => bind_in_range(local_ip, range).await?,
            None => TcpListener::bind(SocketAddr::new(local_ip, 0))
                .await
                .map_err(DataChannelError::Listen)?,
        };
        let port = listener.local_addr().map_err(DataChannelError::Listen)?.port();

        info!("Passive listener opened on {}:{}", local_ip, port);
        let slot: ListenerSlot = Arc::new(Mutex::new(Some(listener)));
        spawn_expiry(Arc::downgrade(&slot), self.config.timeout, port);
        self.pending = Some(Pending::Passive(slot));
        Ok(SocketAddrV4::new(advertised, port))
    }

    /// Records the client's data port for an active-mode transfer.
    pub fn set_active(&mut self, target: SocketAddr) {
        self.discard();
        debug!("Active data target set to {}", target);
        self.pending = Some(Pending::Active(target));
    }

    /// Hands out the pending connection; the channel is empty afterwards. An
    /// expired passive listener counts as nothing pending.
    pub fn take(&mut self) -> Option<PendingDataConnection> {
        match self.pending.take()? {
            Pending::Active(target) => Some(PendingDataConnection::Active { target }),
            Pending::Passive(slot) => {
                let listener = slot.lock().ok().and_then(|mut slot| slot.take())?;
                Some(PendingDataConnection::Passive { listener })
            }
        }
    }

    pub fn discard(&mut self) {
        if self.pending.take().is_some() {
            debug!("Discarded stale pending data connection");
        }
    }
}

// Holds only a weak reference so that discarding the entry closes the listener
// right away instead of at expiry.
fn spawn_expiry(slot: Weak<Mutex<Option<TcpListener>>>, after: Duration, port: u16) {
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        let Some(slot) = slot.upgrade() else {
            return;
        };
        let expired = slot.lock().ok().and_then(|mut slot| slot.take());
        if expired.is_some() {
            info!("Passive listener on port {} expired unused", port);
        }
    });
}

async fn bind_in_range(
    ip: IpAddr,
    range: &RangeInclusive<u16>,
) -> Result<TcpListener, DataChannelError> {
    let (start, end) = (*range.start(), *range.end());
    let span = u32::from(end - start) + 1;
    let offset = rand::thread_rng().gen_range(0..span);

    for step in 0..span {
        let port = start + ((offset + step) % span) as u16;
        match TcpListener::bind(SocketAddr::new(ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
            Err(e) => return Err(DataChannelError::Listen(e)),
        }
    }
    Err(DataChannelError::NoFreePort(start, end))
}
