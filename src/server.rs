//! DNS server setup and lifecycle management.

use hickory_server::ServerFuture;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::DnsConfig;
use crate::error::DnsError;
use crate::forward::{Forwarder, UdpForwarder};
use crate::handler::MeshnameHandler;
use crate::loader::load_zone_file;
use crate::metrics;
use crate::network::NetworkRegistry;
use crate::resolver::Resolver;
use crate::state::DnsState;
use crate::zone::ZoneTable;

/// Interval for emitting state metrics.
const METRICS_INTERVAL: Duration = Duration::from_secs(10);

/// Periodically emit state metrics.
async fn metrics_loop(state: DnsState, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(METRICS_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                state.emit_metrics();
                debug!(generation = state.generation(), "emitted state metrics");
            }
            _ = shutdown.changed() => {
                debug!("metrics loop shutting down");
                return;
            }
        }
    }
}

/// Bind the listener, report the outcome through `ready`, then serve until
/// `shutdown` fires or the server fails.
async fn serve(
    listen_addr: SocketAddr,
    handler: MeshnameHandler,
    ready: oneshot::Sender<io::Result<SocketAddr>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let bound = match UdpSocket::bind(listen_addr).await {
        Ok(socket) => socket.local_addr().map(|addr| (socket, addr)),
        Err(e) => Err(e),
    };
    let (socket, local_addr) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let mut server = ServerFuture::new(handler);
    server.register_socket(socket);
    info!(addr = %local_addr, "DNS UDP listening");

    if ready.send(Ok(local_addr)).is_err() {
        // Nobody is waiting for the server any more.
        let _ = server.shutdown_gracefully().await;
        return;
    }

    let shutdown_requested = tokio::select! {
        result = server.block_until_done() => {
            if let Err(e) = result {
                error!("DNS server error: {}", e);
            }
            false
        }
        _ = shutdown.changed() => true,
    };

    if shutdown_requested {
        info!(addr = %local_addr, "DNS server shutdown requested");
        if let Err(e) = server.shutdown_gracefully().await {
            warn!("DNS server did not shut down cleanly: {}", e);
        }
    }
}

struct Running {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<()>,
    metrics: JoinHandle<()>,
}

/// Meshname DNS server.
///
/// Owns the live tables and the listener. `start` and `stop` move it
/// between Stopped and Running; the tables can be replaced in either state.
pub struct DnsServer {
    config: DnsConfig,
    state: DnsState,
    forwarder: Arc<dyn Forwarder>,
    running: Mutex<Option<Running>>,
}

impl DnsServer {
    /// Create a stopped server. Loads `config.zone_file` when set.
    pub fn new(config: DnsConfig) -> Result<Self, DnsError> {
        config.validate()?;

        let networks = config.network_registry()?;
        let zones = match &config.zone_file {
            Some(path) => load_zone_file(path)?,
            None => ZoneTable::new(),
        };
        let forwarder =
            UdpForwarder::new(config.forward_timeout()).with_port(config.forward_port);

        Ok(Self {
            state: DnsState::new(zones, networks),
            forwarder: Arc::new(forwarder),
            running: Mutex::new(None),
            config,
        })
    }

    /// Use `forwarder` for questions that are not answered locally. Takes
    /// effect on the next `start`.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    /// Get a reference to the DNS state.
    pub fn state(&self) -> &DnsState {
        &self.state
    }

    /// The configuration this server was created with.
    pub fn config(&self) -> &DnsConfig {
        &self.config
    }

    /// Bind the listener and begin serving.
    ///
    /// Returns once the socket is bound, with the bound address.
    pub async fn start(&self) -> Result<SocketAddr, DnsError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(DnsError::AlreadyStarted);
        }

        info!(
            listen_addr = %self.config.listen_addr,
            networks = %self.state.networks(),
            remote_lookups = ?self.config.remote_lookups,
            "Starting meshname DNS server"
        );

        let resolver = Resolver::new(
            self.state.clone(),
            self.forwarder.clone(),
            self.config.resolver_options(),
        );
        let handler = MeshnameHandler::new(Arc::new(resolver));

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let server = tokio::spawn(serve(
            self.config.listen_addr,
            handler,
            ready_tx,
            shutdown_rx.clone(),
        ));

        let local_addr = match ready_rx.await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                error!(listen_addr = %self.config.listen_addr, "failed to bind: {}", e);
                let _ = server.await;
                return Err(DnsError::Io(e));
            }
            Err(_) => {
                let _ = server.await;
                return Err(DnsError::Io(io::Error::other(
                    "DNS server task exited before binding",
                )));
            }
        };

        self.state.emit_metrics();
        let metrics = tokio::spawn(metrics_loop(self.state.clone(), shutdown_rx));

        *running = Some(Running {
            local_addr,
            shutdown: shutdown_tx,
            server,
            metrics,
        });

        info!(addr = %local_addr, "DNS server ready to serve queries");
        Ok(local_addr)
    }

    /// Shut the listener down and wait for the server task to finish.
    pub async fn stop(&self) -> Result<(), DnsError> {
        let mut guard = self.running.lock().await;
        let Some(running) = guard.take() else {
            return Err(DnsError::NotRunning);
        };

        let _ = running.shutdown.send(true);
        if let Err(e) = running.server.await {
            error!("DNS server task failed: {}", e);
        }
        let _ = running.metrics.await;

        info!(addr = %running.local_addr, "DNS server stopped");
        Ok(())
    }

    /// Whether the server is Running.
    pub async fn is_started(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Bound listener address while Running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    /// Publish a new zone table.
    pub fn replace_zones(&self, zones: ZoneTable) {
        info!(
            labels = zones.len(),
            records = zones.records_count(),
            "replacing zone table"
        );
        self.state.replace_zones(zones);
    }

    /// Publish a new network registry.
    pub fn replace_networks(&self, networks: NetworkRegistry) {
        info!(networks = %networks, "replacing network registry");
        self.state.replace_networks(networks);
    }

    /// Load `path` and publish it. On failure the current table stays live.
    pub fn reload_zones(&self, path: impl AsRef<Path>) -> Result<(), DnsError> {
        let path = path.as_ref();
        match load_zone_file(path) {
            Ok(zones) => {
                self.replace_zones(zones);
                metrics::record_reload(true);
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), "zone reload failed, keeping current table: {}", e);
                metrics::record_reload(false);
                Err(e)
            }
        }
    }

    /// Reload the configured zone file, if any.
    pub fn reload(&self) -> Result<(), DnsError> {
        match &self.config.zone_file {
            Some(path) => self.reload_zones(path),
            None => {
                info!("no zone file configured, nothing to reload");
                Ok(())
            }
        }
    }
}
