//! # Integration Tests
//!
//! End-to-end scenarios over real TCP sockets.
//!
//! Covers:
//! - Size limit enforcement at the wire
//! - Dispatcher selection, failure isolation and shutdown
//! - Startup failures that must leave the port unbound

#[cfg(test)]
mod support {
    use contracts::{BlobAgentConfig, DispatcherParams};
    use dispatcher::{DispatcherRegistry, MockDispatcher, MockProbe};
    use ingestion::{BlobAgent, RunningAgent};
    use tokio::net::TcpListener;

    /// Loopback config on an ephemeral port
    pub fn agent_config(max_blob_size_in_kb: u32, keys: &[&str]) -> BlobAgentConfig {
        let mut config = BlobAgentConfig::new(0, max_blob_size_in_kb);
        config.host = "127.0.0.1".to_string();
        for key in keys {
            config = config.with_dispatcher(*key, DispatcherParams::new());
        }
        config
    }

    /// Registry of mocks plus their probes, in registration order
    pub fn mock_registry(mocks: Vec<MockDispatcher>) -> (DispatcherRegistry, Vec<MockProbe>) {
        let probes = mocks.iter().map(MockDispatcher::probe).collect();
        let mut registry = DispatcherRegistry::new();
        for mock in mocks {
            registry.register(Box::new(mock)).unwrap();
        }
        (registry, probes)
    }

    pub async fn start(config: BlobAgentConfig, registry: DispatcherRegistry) -> RunningAgent {
        BlobAgent::new(config, registry).start().await.unwrap()
    }

    /// A port that was free a moment ago
    pub async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    pub async fn port_is_free(port: u16) -> bool {
        TcpListener::bind(("127.0.0.1", port)).await.is_ok()
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::time::Duration;

    use contracts::DispatcherParams;
    use dispatcher::{DispatcherError, FileDispatcher, MockDispatcher};
    use ingestion::{AgentError, BlobClient, ResultCode};
    use serde_json::json;
    use tempfile::tempdir;

    use crate::support::*;

    /// Files written under `dir`, recursively
    fn written_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    pending.push(path);
                } else {
                    files.push(path);
                }
            }
        }
        files
    }

    /// 1 KB limit, `file` and `remote` known, only `file` configured
    #[tokio::test]
    async fn test_file_only_scenario() {
        let dir = tempdir().unwrap();
        let remote = MockDispatcher::new("remote");
        let remote_probe = remote.probe();
        let registry = dispatcher::DispatcherRegistry::new()
            .with(Box::new(FileDispatcher::new()))
            .unwrap()
            .with(Box::new(remote))
            .unwrap();

        let params: DispatcherParams =
            serde_json::from_value(json!({ "base_path": dir.path().to_str().unwrap() })).unwrap();
        let mut config = agent_config(1, &[]);
        config = config.with_dispatcher("file", params);

        let agent = start(config, registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let rejected = client.dispatch(vec![0xAAu8; 2000]).await.unwrap();
        assert_eq!(rejected.code, ResultCode::SizeLimitExceeded);
        assert!(written_files(dir.path()).is_empty());

        let accepted = client.dispatch(vec![0x55u8; 500]).await.unwrap();
        assert_eq!(accepted.code, ResultCode::Success);
        assert!(accepted.failed_dispatchers.is_empty());

        let files = written_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(std::fs::read(&files[0]).unwrap(), vec![0x55u8; 500]);

        client.close().await.unwrap();
        let report = agent.close().await;
        assert!(report.is_clean());
        assert_eq!(report.closed.len(), 1);
        assert_eq!(remote_probe.init_count(), 0);
        assert_eq!(remote_probe.close_count(), 0);
    }

    #[tokio::test]
    async fn test_limit_boundary_over_the_wire() {
        let (registry, probes) = mock_registry(vec![MockDispatcher::new("sink")]);
        let agent = start(agent_config(4, &["sink"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let exact = client.dispatch(vec![1u8; 4096]).await.unwrap();
        assert_eq!(exact.code, ResultCode::Success);

        let over = client.dispatch(vec![1u8; 4097]).await.unwrap();
        assert_eq!(over.code, ResultCode::SizeLimitExceeded);

        // The connection stays usable after a size rejection
        let small = client.dispatch(vec![2u8; 10]).await.unwrap();
        assert_eq!(small.code, ResultCode::Success);

        assert_eq!(probes[0].accept_count(), 2);
        assert_eq!(probes[0].accepted()[0].len(), 4096);
        agent.close().await;
    }

    #[tokio::test]
    async fn test_case_insensitive_selection() {
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("file"),
            MockDispatcher::new("remote"),
            MockDispatcher::new("log"),
        ]);
        let agent = start(agent_config(1, &["FILE", "Log", "kafka"]), registry).await;

        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();
        client.dispatch(b"x".to_vec()).await.unwrap();

        assert_eq!(probes[0].accept_count(), 1);
        assert_eq!(probes[1].init_count(), 0);
        assert_eq!(probes[2].accept_count(), 1);
        assert_eq!(agent.endpoint().active_set().names(), vec!["file", "log"]);
        agent.close().await;
    }

    #[tokio::test]
    async fn test_accept_failure_is_isolated() {
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("d0"),
            MockDispatcher::new("d1").failing_accept(),
            MockDispatcher::new("d2"),
        ]);
        let agent = start(agent_config(1, &["d0", "d1", "d2"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let result = client.dispatch(b"payload".to_vec()).await.unwrap();

        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(result.failed_dispatchers, vec!["d1".to_string()]);
        assert_eq!(probes[0].accept_count(), 1);
        assert_eq!(probes[2].accept_count(), 1);
        agent.close().await;
    }

    #[tokio::test]
    async fn test_slow_dispatcher_times_out() {
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("slow").with_accept_delay(Duration::from_secs(2)),
            MockDispatcher::new("fast"),
        ]);
        let mut config = agent_config(1, &["slow", "fast"]);
        config.dispatch_timeout_ms = 50;
        let agent = start(config, registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let result = client.dispatch(b"payload".to_vec()).await.unwrap();

        assert_eq!(result.failed_dispatchers, vec!["slow".to_string()]);
        assert!(result.error_message.unwrap().contains("timed out"));
        assert_eq!(probes[1].accept_count(), 1);
        agent.close().await;
    }

    #[tokio::test]
    async fn test_close_failure_still_closes_everything() {
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("a"),
            MockDispatcher::new("b").failing_close(),
            MockDispatcher::new("c"),
        ]);
        let agent = start(agent_config(1, &["a", "b", "c"]), registry).await;

        let report = agent.close().await;

        assert!(!report.is_clean());
        let failed: Vec<&str> = report.failures().map(|c| c.dispatcher.as_str()).collect();
        assert_eq!(failed, vec!["b"]);
        for probe in &probes {
            assert_eq!(probe.close_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_request() {
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("slow").with_accept_delay(Duration::from_millis(300)),
        ]);
        let agent = start(agent_config(1, &["slow"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let in_flight = tokio::spawn(async move { client.dispatch(b"last".to_vec()).await });
        tokio::time::sleep(Duration::from_millis(50)).await;

        let report = agent.close().await;

        // close only returns after the request finished and dispatchers closed
        let result = in_flight.await.unwrap().unwrap();
        assert_eq!(result.code, ResultCode::Success);
        assert!(report.is_clean());
        assert_eq!(probes[0].accept_count(), 1);
        assert_eq!(probes[0].close_count(), 1);
    }

    #[tokio::test]
    async fn test_new_connections_refused_after_close() {
        let (registry, _) = mock_registry(vec![MockDispatcher::new("sink")]);
        let agent = start(agent_config(1, &["sink"]), registry).await;
        let addr = agent.local_addr();

        agent.close().await;

        assert!(BlobClient::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_no_matching_dispatcher_leaves_port_unbound() {
        let port = free_port().await;
        let (registry, probes) = mock_registry(vec![MockDispatcher::new("file")]);
        let mut config = agent_config(1, &["remote"]);
        config.port = port;

        let err = ingestion::BlobAgent::new(config, registry)
            .start()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Dispatcher(DispatcherError::NoDispatchersConfigured)
        ));
        assert_eq!(probes[0].init_count(), 0);
        assert!(port_is_free(port).await);
    }

    #[tokio::test]
    async fn test_init_failure_leaves_port_unbound() {
        let port = free_port().await;
        let (registry, probes) = mock_registry(vec![
            MockDispatcher::new("ok"),
            MockDispatcher::new("broken").failing_initialize(),
        ]);
        let mut config = agent_config(1, &["ok", "broken"]);
        config.port = port;

        let err = ingestion::BlobAgent::new(config, registry)
            .start()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AgentError::Dispatcher(DispatcherError::Initialization { .. })
        ));
        assert_eq!(probes[0].close_count(), 1);
        assert!(port_is_free(port).await);
    }

    #[tokio::test]
    async fn test_frame_ceiling_follows_large_blob_limit() {
        let (registry, probes) = mock_registry(vec![MockDispatcher::new("sink")]);
        let agent = start(agent_config(6 * 1024, &["sink"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let big = vec![7u8; 5 * 1024 * 1024];
        let result = client.dispatch(big).await.unwrap();

        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(probes[0].accepted()[0].len(), 5 * 1024 * 1024);
        agent.close().await;
    }

    #[tokio::test]
    async fn test_one_byte_over_4096_kb_limit_is_size_error() {
        let (registry, probes) = mock_registry(vec![MockDispatcher::new("sink")]);
        let agent = start(agent_config(4096, &["sink"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let result = client.dispatch(vec![0u8; 4 * 1024 * 1024 + 1]).await.unwrap();
        assert_eq!(result.code, ResultCode::SizeLimitExceeded);
        assert_eq!(probes[0].accept_count(), 0);

        let result = client.dispatch(vec![0u8; 4 * 1024 * 1024]).await.unwrap();
        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(probes[0].accept_count(), 1);

        client.close().await.unwrap();
        agent.close().await;
    }

    #[tokio::test]
    async fn test_multi_megabyte_blob_against_small_limit_is_size_error() {
        let (registry, probes) = mock_registry(vec![MockDispatcher::new("sink")]);
        let agent = start(agent_config(1, &["sink"]), registry).await;
        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();

        let result = client.dispatch(vec![0u8; 5 * 1024 * 1024]).await.unwrap();
        assert_eq!(result.code, ResultCode::SizeLimitExceeded);
        assert!(result.error_message.unwrap().contains("1024"));

        let result = client.dispatch(vec![1u8; 1024]).await.unwrap();
        assert_eq!(result.code, ResultCode::Success);
        assert_eq!(probes[0].accept_count(), 1);

        client.close().await.unwrap();
        agent.close().await;
    }
}

#[cfg(test)]
mod config_tests {
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use dispatcher::DispatcherRegistry;
    use ingestion::{AgentError, BlobAgent, BlobClient, ResultCode};
    use tokio::net::UdpSocket;

    #[test]
    fn test_empty_configuration_is_rejected() {
        let config = ConfigLoader::load_from_str("", ConfigFormat::Toml).unwrap();
        let err = BlobAgent::from_agents_config(&config, DispatcherRegistry::builtin()).unwrap_err();
        assert!(matches!(err, AgentError::MissingSection(_)));
    }

    #[test]
    fn test_duplicate_keys_rejected_at_load() {
        let result = ConfigLoader::load_from_str(
            r#"
[agents.blobs]
port = 35001
max_blob_size_in_kb = 1

[agents.blobs.dispatchers.log]
[agents.blobs.dispatchers.LOG]
"#,
            ConfigFormat::Toml,
        );
        assert!(result.is_err());
    }

    /// JSON config, builtin registry, UDP forwarding
    #[tokio::test]
    async fn test_builtin_network_dispatcher_end_to_end() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = receiver.local_addr().unwrap();

        let json = format!(
            r#"{{
                "agents": {{
                    "blobs": {{
                        "port": 35001,
                        "host": "127.0.0.1",
                        "maxBlobSizeInKB": 1,
                        "dispatchers": {{
                            "network": {{ "addr": "{target}" }},
                            "log": {{ "level": "debug" }}
                        }}
                    }}
                }}
            }}"#
        );
        let mut config = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        // Ephemeral port for the test; validation already ran on the file value
        config.agent_mut("blobs").unwrap().port = 0;

        let agent = BlobAgent::from_agents_config(&config, DispatcherRegistry::builtin())
            .unwrap()
            .start()
            .await
            .unwrap();
        assert_eq!(agent.endpoint().active_set().names(), vec!["log", "network"]);

        let mut client = BlobClient::connect(agent.local_addr()).await.unwrap();
        let result = client.dispatch(b"over udp".to_vec()).await.unwrap();
        assert_eq!(result.code, ResultCode::Success);

        let mut buf = [0u8; 64];
        let n = tokio::time::timeout(Duration::from_secs(2), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..n], b"over udp");

        client.close().await.unwrap();
        assert!(agent.close().await.is_clean());
    }
}
