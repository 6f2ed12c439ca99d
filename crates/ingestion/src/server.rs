//! IngestServer - TCP accept loop with graceful drain
//!
//! One tokio task per connection; requests on a connection are served in
//! order. On shutdown the accept loop stops, every connection finishes the
//! request it is working on, and tasks still running after the grace period
//! are aborted.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use observability::record_open_connections;

use crate::codec::{
    discard_payload, read_body, read_header, write_frame, Frame, TransportLimits, FRAME_DISPATCH,
};
use crate::endpoint::IngestEndpoint;
use crate::error::CodecError;
use crate::protocol::DispatchResult;

/// Back-off after a failed `accept`
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Connection tasks at the end of a drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Finished on their own within the grace period
    pub drained: usize,
    /// Aborted when the grace period ran out
    pub aborted: usize,
}

/// Bound listener, ready to serve
#[derive(Debug)]
pub struct IngestServer {
    listener: TcpListener,
    endpoint: Arc<IngestEndpoint>,
    limits: TransportLimits,
}

impl IngestServer {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        endpoint: Arc<IngestEndpoint>,
        limits: TransportLimits,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            endpoint,
            limits,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` flips to true (or its sender is dropped), then drain
    #[instrument(name = "ingest_serve", skip_all, fields(max_frame_size = self.limits.max_frame_size))]
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>, grace: Duration) -> DrainReport {
        let mut connections = JoinSet::new();
        info!(addr = ?self.listener.local_addr().ok(), "Accepting connections");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => break,

                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Connection opened");
                        let connection = Connection {
                            stream,
                            peer,
                            endpoint: Arc::clone(&self.endpoint),
                            max_frame_size: self.limits.max_frame_size,
                            shutdown: shutdown.clone(),
                        };
                        connections.spawn(connection.run());
                        record_open_connections(connections.len());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Connection task failed");
                    }
                    record_open_connections(connections.len());
                }
            }
        }

        drop(self.listener);
        info!(open = connections.len(), "Stopped accepting, draining connections");
        let report = drain(&mut connections, grace).await;
        record_open_connections(0);
        report
    }
}

async fn drain(connections: &mut JoinSet<()>, grace: Duration) -> DrainReport {
    let pending = connections.len();

    let finished = timeout(grace, async {
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Connection task failed during drain");
            }
        }
    })
    .await;

    match finished {
        Ok(()) => DrainReport {
            drained: pending,
            aborted: 0,
        },
        Err(_) => {
            let aborted = connections.len();
            warn!(
                aborted,
                grace_ms = grace.as_millis() as u64,
                "Grace period elapsed, aborting connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
            DrainReport {
                drained: pending - aborted,
                aborted,
            }
        }
    }
}

/// One client connection
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    endpoint: Arc<IngestEndpoint>,
    max_frame_size: usize,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self) {
        let mut served = 0u64;

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            // Only the wait for the next header is interruptible; once a
            // header has arrived the frame is read and answered in full.
            let header = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                header = read_header(&mut self.stream) => header,
            };

            let header = match header {
                Ok(Some(header)) => header,
                Ok(None) => break,
                Err(e) => {
                    self.fail(e).await;
                    break;
                }
            };

            let frame = match read_body(&mut self.stream, &header, self.max_frame_size).await {
                Err(CodecError::FrameTooLarge { len, .. }) if header.frame_type == FRAME_DISPATCH => {
                    if let Err(e) = discard_payload(&mut self.stream, &header).await {
                        debug!(peer = %self.peer, error = %e, "Connection lost while skipping blob");
                        break;
                    }
                    let result = match self.endpoint.admit(len) {
                        Err(e) => DispatchResult::size_limit_exceeded(e.to_string()),
                        Ok(()) => DispatchResult::bad_request(format!(
                            "frame payload of {len} bytes exceeds the {} byte transport limit",
                            self.max_frame_size
                        )),
                    };
                    if !self.reply(result).await {
                        break;
                    }
                    continue;
                }
                Err(e @ CodecError::FrameTooLarge { .. }) => {
                    // Skip the payload so the rejection is not lost to a reset
                    let _ = discard_payload(&mut self.stream, &header).await;
                    self.fail(e).await;
                    break;
                }
                other => other,
            };

            match frame {
                Ok(Frame::Dispatch(payload)) => {
                    let result = self.endpoint.handle(payload).await;
                    if !self.reply(result).await {
                        break;
                    }
                    served += 1;
                }
                Ok(Frame::Close) => break,
                Ok(other) => {
                    self.fail(CodecError::UnexpectedFrame(other.frame_type())).await;
                    break;
                }
                Err(e) => {
                    self.fail(e).await;
                    break;
                }
            }
        }

        debug!(peer = %self.peer, served, "Connection closed");
    }

    async fn reply(&mut self, result: DispatchResult) -> bool {
        match write_frame(&mut self.stream, &Frame::Result(result)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Failed to write result");
                false
            }
        }
    }

    /// Answer a protocol violation with `bad_request`; the connection is dropped after
    async fn fail(&mut self, reason: CodecError) {
        if let CodecError::Io(e) = &reason {
            debug!(peer = %self.peer, error = %e, "Connection read failed");
            return;
        }
        warn!(peer = %self.peer, error = %reason, "Rejecting request");
        if matches!(reason, CodecError::FrameTooLarge { .. }) {
            observability::record_blob_rejected("frame_too_large");
        }
        let result = DispatchResult::bad_request(reason.to_string());
        if let Err(e) = write_frame(&mut self.stream, &Frame::Result(result)).await {
            debug!(peer = %self.peer, error = %e, "Failed to write rejection");
            return;
        }
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "Failed to shut down write half");
        }
    }
}
