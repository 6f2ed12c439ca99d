//! NetworkDispatcher - UDP fire-and-forget forwarding

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use contracts::{BlobDispatcher, BlobRecord, ContractError, DispatcherConfig};

/// Default datagram ceiling (UDP payloads top out at 65507 bytes over IPv4)
const DEFAULT_MAX_PACKET_SIZE: usize = 65000;

/// Configuration for NetworkDispatcher
#[derive(Debug, Clone)]
pub struct NetworkDispatcherConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Largest blob forwarded as one datagram
    pub max_packet_size: usize,
}

impl NetworkDispatcherConfig {
    /// Read `addr` (required) and `max_packet_size` (optional)
    pub fn from_config(config: &DispatcherConfig) -> Result<Self, ContractError> {
        let addr_str = config.require_str("addr")?;
        let addr: SocketAddr = addr_str.parse().map_err(|e| {
            ContractError::config_validation(
                format!("dispatchers.{}.addr", config.name()),
                format!("invalid address '{addr_str}': {e}"),
            )
        })?;

        let max_packet_size = config
            .get_u64("max_packet_size")?
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_MAX_PACKET_SIZE);

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Dispatcher that forwards every blob as one UDP datagram
#[derive(Debug, Default)]
pub struct NetworkDispatcher {
    config: Option<NetworkDispatcherConfig>,
    socket: RwLock<Option<Arc<UdpSocket>>>,
}

impl NetworkDispatcher {
    pub const NAME: &'static str = "network";

    pub fn new() -> Self {
        Self::default()
    }

    /// Target address, once initialized
    pub fn target(&self) -> Option<SocketAddr> {
        self.config.as_ref().map(|c| c.addr)
    }

    async fn socket(&self) -> Result<Arc<UdpSocket>, ContractError> {
        self.socket
            .read()
            .await
            .clone()
            .ok_or_else(|| ContractError::not_open(Self::NAME))
    }

    fn check_size(&self, blob: &BlobRecord) -> Result<(), ContractError> {
        let max = self
            .config
            .as_ref()
            .map(|c| c.max_packet_size)
            .unwrap_or(DEFAULT_MAX_PACKET_SIZE);
        if blob.size() > max {
            warn!(size = blob.size(), max, "Blob too large for one datagram");
            return Err(ContractError::dispatch(
                Self::NAME,
                format!("blob of {} bytes exceeds max_packet_size {}", blob.size(), max),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobDispatcher for NetworkDispatcher {
    fn name(&self) -> &str {
        Self::NAME
    }

    #[instrument(name = "network_dispatcher_initialize", skip(self, config))]
    async fn initialize(&mut self, config: &DispatcherConfig) -> Result<(), ContractError> {
        let net_config = NetworkDispatcherConfig::from_config(config)?;

        let bind_addr = if net_config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| ContractError::DispatcherConnection {
                dispatcher: Self::NAME.to_string(),
                message: e.to_string(),
            })?;
        socket
            .connect(net_config.addr)
            .await
            .map_err(|e| ContractError::DispatcherConnection {
                dispatcher: Self::NAME.to_string(),
                message: e.to_string(),
            })?;

        debug!(target = %net_config.addr, "NetworkDispatcher connected");

        self.config = Some(net_config);
        *self.socket.get_mut() = Some(Arc::new(socket));
        Ok(())
    }

    #[instrument(
        name = "network_dispatcher_accept",
        skip(self, blob),
        fields(sequence = blob.sequence(), size = blob.size())
    )]
    async fn accept(&self, blob: &BlobRecord) -> Result<(), ContractError> {
        let socket = self.socket().await?;
        self.check_size(blob)?;

        let sent = socket
            .send(blob.payload())
            .await
            .map_err(|e| ContractError::dispatch(Self::NAME, format!("UDP send failed: {e}")))?;
        debug!(bytes = sent, "Sent");
        Ok(())
    }

    #[instrument(name = "network_dispatcher_close", skip(self))]
    async fn close(&self) -> Result<(), ContractError> {
        // Dropping the last Arc releases the socket; closing twice is a no-op
        self.socket.write().await.take();
        debug!("NetworkDispatcher closed");
        Ok(())
    }
}
