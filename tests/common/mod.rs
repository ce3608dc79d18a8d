//! Shared helpers for integration tests: local replica clusters on ephemeral ports

#![allow(dead_code)]

use hedgerpc::client::StrategyKind;
use hedgerpc::common::{QueryHasher, ReplicaConfig, ServerMode};
use hedgerpc::{ClusterClient, ReplicaServer};
use std::future::Future;
use std::net::{IpAddr, TcpListener};
use std::time::Duration;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn replica_config(delay_ms: u64, mode: ServerMode) -> ReplicaConfig {
    ReplicaConfig {
        bind_addr: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        method_name: "some_method".to_string(),
        method_duration_ms: delay_ms,
        mode,
        ..Default::default()
    }
}

pub async fn start_replica(delay_ms: u64, mode: ServerMode) -> ReplicaServer {
    let server = ReplicaServer::new(replica_config(delay_ms, mode));
    server.start().await.expect("replica should bind an ephemeral port");
    server
}

/// Address of a port nothing listens on
pub fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("reserve a port");
    let port = listener.local_addr().expect("reserved port").port();
    drop(listener);
    format!("http://127.0.0.1:{}/some_method/", port)
}

/// Digest every replica returns for `query`
pub fn expected(query: &str) -> String {
    QueryHasher::default().digest(query)
}

/// A set of async-mode replicas with the given processing delays
pub struct TestCluster {
    pub servers: Vec<ReplicaServer>,
    pub dead: Vec<String>,
}

impl TestCluster {
    pub async fn start(delays_ms: &[u64]) -> Self {
        init_tracing();
        let mut servers = Vec::with_capacity(delays_ms.len());
        for &delay in delays_ms {
            servers.push(start_replica(delay, ServerMode::Async).await);
        }
        Self {
            servers,
            dead: Vec::new(),
        }
    }

    /// Add `n` addresses that refuse connections
    pub fn with_dead(mut self, n: usize) -> Self {
        self.dead.extend((0..n).map(|_| dead_address()));
        self
    }

    pub fn address(&self, i: usize) -> String {
        self.servers[i].listen_uri()
    }

    pub fn addresses(&self) -> Vec<String> {
        self.servers
            .iter()
            .map(ReplicaServer::listen_uri)
            .chain(self.dead.iter().cloned())
            .collect()
    }

    pub fn client(&self, kind: StrategyKind) -> ClusterClient {
        ClusterClient::with_strategy(self.addresses(), kind).expect("client")
    }

    pub fn stop(&self) {
        for server in &self.servers {
            server.stop();
        }
    }
}

impl Drop for TestCluster {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Poll `check` until it holds or `within` elapses
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
