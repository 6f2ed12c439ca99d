//! BlobAgent - supervisor tying dispatchers, endpoint and server together
//!
//! Startup order: size limit and port are read, dispatchers are selected and
//! initialized, and only then is the port bound. Shutdown stops the server,
//! drains in-flight requests and closes every dispatcher exactly once.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, instrument, warn};

use contracts::{AgentsConfig, BlobAgentConfig, ContractError, BLOB_AGENT_NAME};
use dispatcher::{activate, DispatcherLifecycle, DispatcherRegistry, ShutdownReport};
use observability::record_dispatcher_closed;

use crate::codec::TransportLimits;
use crate::endpoint::IngestEndpoint;
use crate::error::AgentError;
use crate::server::{DrainReport, IngestServer};

/// Agent that has not been started yet
#[derive(Debug)]
pub struct BlobAgent {
    config: BlobAgentConfig,
    registry: DispatcherRegistry,
}

impl BlobAgent {
    pub fn new(config: BlobAgentConfig, registry: DispatcherRegistry) -> Self {
        Self { config, registry }
    }

    /// Build from the `agents.blobs` section
    pub fn from_agents_config(
        config: &AgentsConfig,
        registry: DispatcherRegistry,
    ) -> Result<Self, AgentError> {
        let section = config
            .blobs()
            .ok_or_else(|| AgentError::MissingSection(BLOB_AGENT_NAME.to_string()))?;
        Ok(Self::new(section.clone(), registry))
    }

    pub fn config(&self) -> &BlobAgentConfig {
        &self.config
    }

    /// Initialize dispatchers, bind the port and start serving
    ///
    /// # Errors
    /// Nothing is bound when the agent is disabled, the size limit is zero,
    /// no dispatcher is selected or a dispatcher fails to initialize.
    #[instrument(
        name = "blob_agent_start",
        skip(self),
        fields(port = self.config.port, max_blob_size_in_kb = self.config.max_blob_size_in_kb)
    )]
    pub async fn start(self) -> Result<RunningAgent, AgentError> {
        let Self { config, registry } = self;

        if !config.enabled {
            return Err(AgentError::Disabled(BLOB_AGENT_NAME.to_string()));
        }
        if config.max_blob_size_in_kb == 0 {
            return Err(ContractError::config_validation(
                "max_blob_size_in_kb",
                "must be greater than 0",
            )
            .into());
        }

        let max_blob_size = config.max_blob_size_in_bytes();
        let lifecycle = activate(
            registry,
            &config.dispatcher_configs(),
            config.dispatch_timeout(),
        )
        .await?;

        let endpoint = Arc::new(IngestEndpoint::new(lifecycle.active_set(), max_blob_size));
        let limits = TransportLimits::for_blob_limit(max_blob_size);
        let addr = config.bind_addr();

        let bound = match IngestServer::bind(addr.as_str(), Arc::clone(&endpoint), limits).await {
            Ok(server) => server.local_addr().map(|local| (server, local)),
            Err(e) => Err(e),
        };
        let (server, local_addr) = match bound {
            Ok(bound) => bound,
            Err(source) => {
                error!(%addr, error = %source, "Bind failed, releasing dispatchers");
                lifecycle.close_all().await;
                return Err(AgentError::Bind { addr, source });
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_task = tokio::spawn(server.serve(shutdown_rx, config.shutdown_grace_period()));

        info!(
            %local_addr,
            dispatchers = ?endpoint.active_set().names(),
            max_blob_size,
            max_frame_size = limits.max_frame_size,
            "Blob agent started"
        );

        Ok(RunningAgent {
            config,
            local_addr,
            endpoint,
            lifecycle,
            shutdown_tx,
            server_task,
        })
    }
}

/// Agent with a bound port and an active dispatcher set
#[derive(Debug)]
pub struct RunningAgent {
    config: BlobAgentConfig,
    local_addr: SocketAddr,
    endpoint: Arc<IngestEndpoint>,
    lifecycle: DispatcherLifecycle,
    shutdown_tx: watch::Sender<bool>,
    server_task: JoinHandle<DrainReport>,
}

impl RunningAgent {
    /// Address the server is actually listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self) -> &Arc<IngestEndpoint> {
        &self.endpoint
    }

    pub fn config(&self) -> &BlobAgentConfig {
        &self.config
    }

    /// Serve until `signal` resolves or the server stops on its own, then shut down
    pub async fn run_until<F>(mut self, signal: F) -> ShutdownReport
    where
        F: Future<Output = ()>,
    {
        let finished = tokio::select! {
            _ = signal => {
                info!("Termination signal received");
                None
            }
            joined = &mut self.server_task => {
                error!("Server stopped unexpectedly");
                Some(joined)
            }
        };
        self.shutdown(finished).await
    }

    /// Stop serving, drain and close all dispatchers
    ///
    /// Never fails; per-dispatcher close failures are in the report.
    pub async fn close(self) -> ShutdownReport {
        self.shutdown(None).await
    }

    #[instrument(name = "blob_agent_shutdown", skip_all, fields(addr = %self.local_addr))]
    async fn shutdown(self, finished: Option<Result<DrainReport, JoinError>>) -> ShutdownReport {
        let Self {
            endpoint,
            lifecycle,
            shutdown_tx,
            server_task,
            ..
        } = self;

        // Receiver may already be gone if the server task ended
        let _ = shutdown_tx.send(true);
        let joined = match finished {
            Some(joined) => joined,
            None => server_task.await,
        };
        match joined {
            Ok(drain) if drain.aborted > 0 => {
                warn!(drained = drain.drained, aborted = drain.aborted, "Drain incomplete")
            }
            Ok(drain) => info!(drained = drain.drained, "In-flight requests drained"),
            Err(e) => error!(error = %e, "Server task failed"),
        }

        let report = lifecycle.close_all().await;
        for outcome in &report.closed {
            record_dispatcher_closed(&outcome.dispatcher, outcome.error.is_none());
        }

        info!(summary = %endpoint.summary(), clean = report.is_clean(), "Blob agent stopped");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DispatcherParams;
    use dispatcher::{DispatcherError, MockDispatcher};
    use tokio::net::TcpListener;

    use crate::client::BlobClient;

    fn config_with(keys: &[&str]) -> BlobAgentConfig {
        let mut config = BlobAgentConfig::new(0, 1);
        config.host = "127.0.0.1".to_string();
        for key in keys {
            config = config.with_dispatcher(*key, DispatcherParams::new());
        }
        config
    }

    #[tokio::test]
    async fn test_start_and_close() {
        let mock = MockDispatcher::new("sink");
        let probe = mock.probe();
        let registry = DispatcherRegistry::new().with(Box::new(mock)).unwrap();

        let agent = BlobAgent::new(config_with(&["sink"]), registry).start().await.unwrap();
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();
        assert!(client.dispatch(vec![1u8; 16]).await.unwrap().is_success());
        client.close().await.unwrap();

        let report = agent.close().await;
        assert!(report.is_clean());
        assert_eq!(probe.accept_count(), 1);
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn test_run_until_signal() {
        let registry = DispatcherRegistry::new()
            .with(Box::new(MockDispatcher::new("sink")))
            .unwrap();
        let agent = BlobAgent::new(config_with(&["sink"]), registry).start().await.unwrap();

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let running = tokio::spawn(agent.run_until(async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();

        let report = running.await.unwrap();
        assert_eq!(report.closed.len(), 1);
    }

    #[tokio::test]
    async fn test_no_dispatchers_means_no_bind() {
        let probe_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = probe_listener.local_addr().unwrap().port();
        drop(probe_listener);

        let mut config = config_with(&["unknown"]);
        config.port = port;
        let registry = DispatcherRegistry::new()
            .with(Box::new(MockDispatcher::new("sink")))
            .unwrap();

        let err = BlobAgent::new(config, registry).start().await.unwrap_err();
        assert!(matches!(
            err,
            AgentError::Dispatcher(DispatcherError::NoDispatchersConfigured)
        ));
        assert!(TcpListener::bind(("127.0.0.1", port)).await.is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_closes_dispatchers() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = config_with(&["sink"]);
        config.port = taken.local_addr().unwrap().port();

        let mock = MockDispatcher::new("sink");
        let probe = mock.probe();
        let registry = DispatcherRegistry::new().with(Box::new(mock)).unwrap();

        let err = BlobAgent::new(config, registry).start().await.unwrap_err();
        assert!(matches!(err, AgentError::Bind { .. }));
        assert_eq!(probe.init_count(), 1);
        assert_eq!(probe.close_count(), 1);
    }

    #[tokio::test]
    async fn test_disabled_agent_does_not_start() {
        let mut config = config_with(&["sink"]);
        config.enabled = false;
        let mock = MockDispatcher::new("sink");
        let probe = mock.probe();
        let registry = DispatcherRegistry::new().with(Box::new(mock)).unwrap();

        let err = BlobAgent::new(config, registry).start().await.unwrap_err();
        assert!(matches!(err, AgentError::Disabled(_)));
        assert_eq!(probe.init_count(), 0);
    }

    #[test]
    fn test_missing_section() {
        let err = BlobAgent::from_agents_config(&AgentsConfig::default(), DispatcherRegistry::new())
            .unwrap_err();
        assert!(matches!(err, AgentError::MissingSection(name) if name == "blobs"));
    }
}
