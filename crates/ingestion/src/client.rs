//! BlobClient - minimal client for the ingestion RPC

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::codec::{read_frame, write_frame, Frame, DEFAULT_MAX_FRAME_SIZE};
use crate::error::CodecError;
use crate::protocol::DispatchResult;

/// One connection to a blob agent
///
/// Requests are strictly sequential: each `dispatch` waits for its result.
#[derive(Debug)]
pub struct BlobClient {
    stream: TcpStream,
}

impl BlobClient {
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, CodecError> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Send one blob and wait for the agent's result
    pub async fn dispatch(&mut self, payload: impl Into<Bytes>) -> Result<DispatchResult, CodecError> {
        write_frame(&mut self.stream, &Frame::Dispatch(payload.into())).await?;
        match read_frame(&mut self.stream, DEFAULT_MAX_FRAME_SIZE).await? {
            Some(Frame::Result(result)) => Ok(result),
            Some(other) => Err(CodecError::UnexpectedFrame(other.frame_type())),
            None => Err(CodecError::ConnectionClosed),
        }
    }

    /// Tell the agent we are done and close the socket
    pub async fn close(mut self) -> Result<(), CodecError> {
        write_frame(&mut self.stream, &Frame::Close).await?;
        self.stream.shutdown().await?;
        Ok(())
    }
}
