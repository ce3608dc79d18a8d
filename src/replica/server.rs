//! Replica server

use crate::common::{QueryHasher, ReplicaConfig, ReplicaMetrics, Result};
use crate::replica::http::{create_router, ReplicaState};
use crate::replica::registry::RequestRegistry;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

/// Sweeps never run more often than this, even with a tiny grace period
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// One replica: a listener plus the registry its handlers share.
///
/// `start` and `stop` are idempotent and may be called from any task.
pub struct ReplicaServer {
    config: ReplicaConfig,
    registry: Arc<RequestRegistry>,
    metrics: Arc<ReplicaMetrics>,
    hasher: Arc<QueryHasher>,
    running: AtomicBool,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl ReplicaServer {
    pub fn new(config: ReplicaConfig) -> Self {
        let registry = Arc::new(RequestRegistry::new(config.cancel_grace()));
        let hasher = Arc::new(QueryHasher::new(&config.hash_key));
        Self {
            config,
            registry,
            metrics: Arc::new(ReplicaMetrics::new()),
            hasher,
            running: AtomicBool::new(false),
            shutdown: Mutex::new(None),
            local_addr: Mutex::new(None),
        }
    }

    /// Bind and start serving in the background. No-op when already listening.
    pub async fn start(&self) -> Result<()> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Replica already listening");
            return Ok(());
        }

        let bind = SocketAddr::new(self.config.bind_addr, self.config.port);
        let listener = match TcpListener::bind(bind).await {
            Ok(listener) => listener,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };
        let local = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = Some(shutdown_tx);
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner) = Some(local);

        let state = ReplicaState {
            registry: self.registry.clone(),
            metrics: self.metrics.clone(),
            hasher: self.hasher.clone(),
            method_duration: self.config.method_duration(),
            mode: self.config.mode,
        };
        let router = create_router(state, &self.config.method_path());

        tracing::info!("Starting replica on {}", local);
        tracing::info!("  Method: {}", self.config.method_path());
        tracing::info!("  Mode: {}", self.config.mode);
        tracing::info!("  Processing time: {:?}", self.config.method_duration());

        let mut server_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let server = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async move {
                // A dropped sender counts as shutdown too
                let _ = server_rx.wait_for(|stop| *stop).await;
            });
            if let Err(e) = server.await {
                tracing::error!("HTTP server error: {}", e);
            }
            tracing::info!("Replica on {} stopped", local);
        });

        spawn_sweeper(self.registry.clone(), shutdown_rx);

        tracing::info!("✓ Replica ready at {}", self.listen_uri());
        Ok(())
    }

    /// Stop accepting calls. Requests already being processed still finish.
    /// No-op when already stopped.
    pub fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Replica already stopped");
            return;
        }
        if let Some(tx) = self
            .shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            tx.send_replace(true);
        }
        tracing::info!("Replica stopping");
    }

    pub fn is_listening(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Address actually bound by the most recent `start`
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// URI for client replica lists, e.g. `http://127.0.0.1:8080/some_method/`.
    ///
    /// Uses the bound port once started, so port 0 resolves to the real one.
    pub fn listen_uri(&self) -> String {
        match self.local_addr() {
            Some(addr) => format!("http://{}/{}/", addr, self.config.method_name),
            None => self.config.listen_uri(),
        }
    }

    pub fn config(&self) -> &ReplicaConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<RequestRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &Arc<ReplicaMetrics> {
        &self.metrics
    }
}

impl Drop for ReplicaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Purge expired cancel tombstones every grace period until shutdown.
fn spawn_sweeper(registry: Arc<RequestRegistry>, mut shutdown: watch::Receiver<bool>) {
    let every = registry.grace().max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = registry.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "Purged expired registry entries");
                    }
                }
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn local_config() -> ReplicaConfig {
        ReplicaConfig {
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            port: 0,
            method_duration_ms: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let server = ReplicaServer::new(local_config());
        assert!(!server.is_listening());
        assert!(server.local_addr().is_none());

        server.start().await.unwrap();
        assert!(server.is_listening());
        let addr = server.local_addr().unwrap();
        assert_ne!(addr.port(), 0);

        // Second start keeps the same listener
        server.start().await.unwrap();
        assert_eq!(server.local_addr(), Some(addr));

        server.stop();
        assert!(!server.is_listening());
        server.stop();
        assert!(!server.is_listening());
    }

    #[tokio::test]
    async fn test_listen_uri_uses_bound_port() {
        let server = ReplicaServer::new(local_config());
        server.start().await.unwrap();
        let port = server.local_addr().unwrap().port();
        assert_eq!(
            server.listen_uri(),
            format!("http://127.0.0.1:{}/some_method/", port)
        );
        server.stop();
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_server_stopped() {
        let first = ReplicaServer::new(local_config());
        first.start().await.unwrap();
        let port = first.local_addr().unwrap().port();

        let second = ReplicaServer::new(ReplicaConfig {
            port,
            ..local_config()
        });
        assert!(second.start().await.is_err());
        assert!(!second.is_listening());
        first.stop();
    }
}
