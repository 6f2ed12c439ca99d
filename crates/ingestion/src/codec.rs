//! Length-prefixed binary framing over any async byte stream
//!
//! ```text
//! | type u8 | flags u8 | header_len u16 | payload_len u32 | crc32 u32 | payload ... |
//! ```
//!
//! All integers are big-endian. The checksum covers the payload only.

use bytes::Bytes;
use tokio::io::{self, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, trace};

use crate::error::CodecError;
use crate::protocol::DispatchResult;

/// Frame ceiling used when the blob limit is below it
pub const DEFAULT_MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

pub const FRAME_DISPATCH: u8 = 0x01;
pub const FRAME_RESULT: u8 = 0x02;
pub const FRAME_CLOSE: u8 = 0x04;

/// Transport settings derived from the blob size limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportLimits {
    /// Largest payload a single frame may carry
    pub max_frame_size: usize,
}

impl TransportLimits {
    /// The frame ceiling is raised to the blob limit when the blob limit is larger
    pub fn for_blob_limit(max_blob_size_in_bytes: usize) -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE.max(max_blob_size_in_bytes),
        }
    }
}

impl Default for TransportLimits {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Fixed-size frame header (12 bytes)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: u8,
    pub flags: u8,
    pub header_len: u16,
    pub payload_len: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 12;

    fn for_payload(frame_type: u8, payload: &[u8]) -> Result<Self, CodecError> {
        let payload_len = u32::try_from(payload.len()).map_err(|_| CodecError::FrameTooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;
        Ok(Self {
            frame_type,
            flags: 0,
            header_len: Self::SIZE as u16,
            payload_len,
            checksum: crc32fast::hash(payload),
        })
    }

    pub fn decode(buf: &[u8; Self::SIZE]) -> Result<Self, CodecError> {
        let header = Self {
            frame_type: buf[0],
            flags: buf[1],
            header_len: u16::from_be_bytes([buf[2], buf[3]]),
            payload_len: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            checksum: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        };

        if header.header_len as usize != Self::SIZE {
            return Err(CodecError::InvalidHeader(format!(
                "header length {} (expected {})",
                header.header_len,
                Self::SIZE
            )));
        }
        Ok(header)
    }

    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.frame_type;
        buf[1] = self.flags;
        buf[2..4].copy_from_slice(&self.header_len.to_be_bytes());
        buf[4..8].copy_from_slice(&self.payload_len.to_be_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_be_bytes());
        buf
    }
}

/// Decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Blob to fan out
    Dispatch(Bytes),
    /// Reply to a `Dispatch`
    Result(DispatchResult),
    /// Client is done with the connection
    Close,
}

impl Frame {
    pub fn frame_type(&self) -> u8 {
        match self {
            Self::Dispatch(_) => FRAME_DISPATCH,
            Self::Result(_) => FRAME_RESULT,
            Self::Close => FRAME_CLOSE,
        }
    }
}

/// Read one frame
///
/// Returns `Ok(None)` on a clean end of stream between frames. A payload
/// length above `max_frame_size` is rejected before any payload byte is read.
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Frame>, CodecError>
where
    R: AsyncRead + Unpin,
{
    match read_header(reader).await? {
        Some(header) => read_body(reader, &header, max_frame_size).await.map(Some),
        None => Ok(None),
    }
}

/// Read the fixed header of the next frame
///
/// Returns `Ok(None)` on a clean end of stream between frames.
pub async fn read_header<R>(reader: &mut R) -> Result<Option<FrameHeader>, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut header_buf = [0u8; FrameHeader::SIZE];
    match reader.read_exact(&mut header_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    FrameHeader::decode(&header_buf).map(Some)
}

/// Read and verify the payload announced by `header`
///
/// Fails with `FrameTooLarge` without consuming anything when the payload
/// is over `max_frame_size`; the caller decides whether to `discard_payload`.
pub async fn read_body<R>(
    reader: &mut R,
    header: &FrameHeader,
    max_frame_size: usize,
) -> Result<Frame, CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = header.payload_len as usize;
    if len > max_frame_size {
        return Err(CodecError::FrameTooLarge {
            len,
            max: max_frame_size,
        });
    }

    let mut payload = vec![0u8; len];
    if len > 0 {
        reader.read_exact(&mut payload).await?;
    }

    let computed = crc32fast::hash(&payload);
    if computed != header.checksum {
        error!(expected = header.checksum, computed, "Checksum mismatch");
        return Err(CodecError::ChecksumMismatch {
            expected: header.checksum,
            computed,
        });
    }

    trace!(frame_type = header.frame_type, len, "Frame read");

    match header.frame_type {
        FRAME_DISPATCH => Ok(Frame::Dispatch(Bytes::from(payload))),
        FRAME_RESULT => Ok(Frame::Result(serde_json::from_slice(&payload)?)),
        FRAME_CLOSE => Ok(Frame::Close),
        other => Err(CodecError::UnknownFrameType(other)),
    }
}

/// Skip the payload announced by `header` without buffering it
pub async fn discard_payload<R>(reader: &mut R, header: &FrameHeader) -> Result<(), CodecError>
where
    R: AsyncRead + Unpin,
{
    let len = u64::from(header.payload_len);
    let skipped = io::copy(&mut (&mut *reader).take(len), &mut io::sink()).await?;
    if skipped < len {
        return Err(CodecError::ConnectionClosed);
    }
    trace!(frame_type = header.frame_type, len, "Payload discarded");
    Ok(())
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let encoded;
    let payload: &[u8] = match frame {
        Frame::Dispatch(data) => &data[..],
        Frame::Result(result) => {
            encoded = serde_json::to_vec(result)?;
            &encoded
        }
        Frame::Close => &[],
    };

    let header = FrameHeader::for_payload(frame.frame_type(), payload)?;
    writer.write_all(&header.encode()).await?;
    if !payload.is_empty() {
        writer.write_all(payload).await?;
    }
    writer.flush().await?;
    Ok(())
}
