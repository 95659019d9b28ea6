use std::io::{ErrorKind, Write};

use tracing::trace;

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

/// Write one fully encoded frame to `writer`, then flush (blocking).
///
/// The frame must already be complete in memory: nothing is written when the
/// size check fails, so a rejected frame never reaches the stream.
pub fn write_frame<W: Write + ?Sized>(
    writer: &mut W,
    frame: &[u8],
    config: &FrameConfig,
) -> Result<()> {
    config.check_size(frame.len())?;

    let mut offset = 0usize;
    while offset < frame.len() {
        match writer.write(&frame[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    trace!(len = frame.len(), "wrote frame");

    flush(writer)
}

fn flush<W: Write + ?Sized>(writer: &mut W) -> Result<()> {
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<W> {
    inner: W,
    config: FrameConfig,
}

impl<W: Write> FrameWriter<W> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: W, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Write a complete frame and flush.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        write_frame(&mut self.inner, frame, &self.config)
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        flush(&mut self.inner)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> W {
        self.inner
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
