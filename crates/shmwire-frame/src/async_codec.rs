//! `tokio_util` codec for hosts that drive the worker stream asynchronously.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::codec::{decode_frame, FrameConfig, WireFormat};
use crate::error::{FrameError, Result};

/// Splits an async byte stream into frames of one wire format.
///
/// Encoding passes already-framed bytes through unchanged.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    format: WireFormat,
    config: FrameConfig,
}

impl FrameCodec {
    pub fn new(format: WireFormat) -> Self {
        Self::with_config(format, FrameConfig::default())
    }

    pub fn with_config(format: WireFormat, config: FrameConfig) -> Self {
        Self { format, config }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        decode_frame(src, self.format, &self.config)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            warn!(received = buf.len(), "stream closed mid-frame");
            buf.clear();
        }
        Ok(None)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.config.check_size(frame.len())?;
        dst.extend_from_slice(&frame);
        Ok(())
    }
}
