use crate::constants::DEFAULT_LISTEN_PORT;
use crate::core_auth::{AllowAll, Authenticator, Authorizer};
use crate::core_driver::DriverFactory;
use crate::core_ftpcommand::reply::Reply;
use crate::session::{Session, SessionConfig};
use log::{error, info, warn};
use std::collections::HashMap;
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Everything needed to start a server. Built directly by library users.
#[derive(Clone)]
pub struct ServerOpts {
    pub listen_addr: SocketAddr,
    pub factory: Arc<dyn DriverFactory>,
    pub authenticator: Arc<dyn Authenticator>,
    pub authorizer: Arc<dyn Authorizer>,
    pub session: SessionConfig,
}

impl ServerOpts {
    pub fn new(factory: Arc<dyn DriverFactory>, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_LISTEN_PORT)),
            factory,
            authenticator,
            authorizer: Arc::new(AllowAll),
            session: SessionConfig::default(),
        }
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.listen_addr = addr;
        self
    }

    pub fn with_authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    pub fn with_session_config(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

/// Stops a running server: every session receives 421 and closes, then
/// [`Server::run`] returns.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        info!("Shutdown requested");
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug)]
struct SessionEntry {
    peer: SocketAddr,
    started_at: Instant,
}

/// Live sessions, keyed by id. Touched only on accept and on close.
#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: Mutex<HashMap<u64, SessionEntry>>,
}

impl SessionRegistry {
    fn register(self: &Arc<Self>, id: u64, peer: SocketAddr) -> RegistryGuard {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.insert(
                id,
                SessionEntry {
                    peer,
                    started_at: Instant::now(),
                },
            );
        }
        RegistryGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    fn len(&self) -> usize {
        self.sessions.lock().map(|sessions| sessions.len()).unwrap_or(0)
    }
}

struct RegistryGuard {
    registry: Arc<SessionRegistry>,
    id: u64,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        if let Ok(mut sessions) = self.registry.sessions.lock() {
            if let Some(entry) = sessions.remove(&self.id) {
                info!(
                    "[session {}] Connection closed for {} after {:?}",
                    self.id,
                    entry.peer,
                    entry.started_at.elapsed()
                );
            }
        }
    }
}

pub struct Server {
    listener: TcpListener,
    opts: ServerOpts,
    session_config: Arc<SessionConfig>,
    registry: Arc<SessionRegistry>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    next_id: u64,
}

impl Server {
    pub async fn bind(opts: ServerOpts) -> io::Result<Server> {
        let listener = TcpListener::bind(opts.listen_addr).await?;
        let session_config = Arc::new(opts.session.clone());
        Ok(Server {
            listener,
            opts,
            session_config,
            registry: Arc::new(SessionRegistry::default()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_id: 0,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.shutdown.clone(),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Accepts connections until shutdown, then waits for every session to end.
    pub async fn run(mut self) -> io::Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };
            let (socket, peer) = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    // usually descriptor exhaustion; back off instead of spinning
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            self.spawn_session(socket, peer);
        }

        drop(self.listener);
        self.tracker.close();
        info!("Waiting for {} session(s) to finish", self.registry.len());
        self.tracker.wait().await;
        info!("Server stopped with {} session(s) left", self.registry.len());
        Ok(())
    }

    fn spawn_session(&mut self, socket: TcpStream, peer: SocketAddr) {
        self.next_id += 1;
        let id = self.next_id;
        info!("[session {}] New connection from {}", id, peer);

        let guard = self.registry.register(id, peer);
        let opts = self.opts.clone();
        let config = Arc::clone(&self.session_config);
        let token = self.shutdown.child_token();

        self.tracker.spawn(async move {
            let _guard = guard;
            if let Err(e) = serve_connection(id, socket, peer, opts, config, token).await {
                warn!("[session {}] Connection error: {}", id, e);
            }
        });
    }
}

async fn serve_connection(
    id: u64,
    mut socket: TcpStream,
    peer: SocketAddr,
    opts: ServerOpts,
    config: Arc<SessionConfig>,
    token: CancellationToken,
) -> io::Result<()> {
    let local_addr = socket.local_addr()?;

    let driver = match timeout(config.data_channel.timeout, opts.factory.new_driver()).await {
        Ok(Ok(driver)) => driver,
        Ok(Err(e)) => {
            error!("[session {}] Storage driver unavailable: {}", id, e);
            return refuse(&mut socket).await;
        }
        Err(_) => {
            error!("[session {}] Timed out creating storage driver", id);
            return refuse(&mut socket).await;
        }
    };

    let session = Session::new(
        id,
        peer,
        local_addr,
        driver,
        opts.authenticator,
        opts.authorizer,
        config,
        token,
    );
    session.serve(socket).await
}

async fn refuse(socket: &mut TcpStream) -> io::Result<()> {
    let reply = Reply::new(421, "Service not available, closing control connection.");
    socket.write_all(reply.to_wire().as_bytes()).await?;
    socket.shutdown().await
}
