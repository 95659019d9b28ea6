use std::io::{BufRead, ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use tracing::warn;

use crate::codec::{
    parse_length_prefix, FrameConfig, WireFormat, LENGTH_PREFIX_SIZE, LINE_TERMINATOR,
    READ_INCREMENT,
};
use crate::error::{FrameError, Result};

/// Read exactly one complete frame from `reader` (blocking).
///
/// Returns `Ok(None)` at end of stream. A stream that ends partway through a
/// frame is reported the same way: the partial bytes are dropped and a
/// warning is logged, but callers cannot tell the two cases apart.
///
/// Only the bytes of the returned frame are consumed. Text frames rely on
/// `reader`'s buffer to hold anything read past the terminator; binary frames
/// are read with exact-length reads of at most [`READ_INCREMENT`] bytes.
///
/// An oversized text line is discarded through its terminator before
/// [`FrameError::FrameTooLarge`] is returned, so the next call starts on the
/// following line. An oversized or invalid binary header leaves the stream
/// unsynchronised.
pub fn read_frame<R: BufRead + ?Sized>(
    reader: &mut R,
    format: WireFormat,
    config: &FrameConfig,
) -> Result<Option<Bytes>> {
    match format {
        WireFormat::Text => read_line_frame(reader, config),
        WireFormat::Binary => read_prefixed_frame(reader, config),
    }
}

fn read_line_frame<R: BufRead + ?Sized>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Option<Bytes>> {
    let mut line = Vec::new();
    let read = match config.max_frame_size {
        Some(max) => {
            let limit = (max as u64).saturating_add(1);
            let read = Read::take(&mut *reader, limit).read_until(LINE_TERMINATOR, &mut line)?;
            if let Err(err) = config.check_size(line.len()) {
                if line.last() != Some(&LINE_TERMINATOR) {
                    skip_line(reader)?;
                }
                return Err(err);
            }
            read
        }
        None => reader.read_until(LINE_TERMINATOR, &mut line)?,
    };

    if read == 0 {
        return Ok(None);
    }
    if line.last() != Some(&LINE_TERMINATOR) {
        warn!(received = line.len(), "stream closed mid-frame");
        return Ok(None);
    }
    Ok(Some(Bytes::from(line)))
}

/// Discard input up to and including the next line terminator.
fn skip_line<R: BufRead + ?Sized>(reader: &mut R) -> Result<()> {
    loop {
        let (done, used) = {
            let available = match reader.fill_buf() {
                Ok(buf) => buf,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };
            if available.is_empty() {
                return Ok(());
            }
            match available.iter().position(|&b| b == LINE_TERMINATOR) {
                Some(i) => (true, i + 1),
                None => (false, available.len()),
            }
        };
        reader.consume(used);
        if done {
            return Ok(());
        }
    }
}

fn read_prefixed_frame<R: Read + ?Sized>(
    reader: &mut R,
    config: &FrameConfig,
) -> Result<Option<Bytes>> {
    let mut header = [0u8; LENGTH_PREFIX_SIZE];
    let got = read_full(reader, &mut header)?;
    if got < LENGTH_PREFIX_SIZE {
        if got > 0 {
            warn!(received = got, "stream closed inside frame header");
        }
        return Ok(None);
    }

    let length = parse_length_prefix(header)?;
    config.check_size(length)?;

    let mut frame = BytesMut::with_capacity(length.min(READ_INCREMENT + LENGTH_PREFIX_SIZE));
    frame.extend_from_slice(&header);

    let mut chunk = [0u8; READ_INCREMENT];
    while frame.len() < length {
        let want = (length - frame.len()).min(READ_INCREMENT);
        let got = read_full(reader, &mut chunk[..want])?;
        frame.extend_from_slice(&chunk[..got]);
        if got < want {
            warn!(
                expected = length,
                received = frame.len(),
                "stream closed mid-frame"
            );
            return Ok(None);
        }
    }

    Ok(Some(frame.freeze()))
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0usize;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(filled)
}

/// Reads complete frames of one wire format from a buffered stream.
///
/// Partial reads are handled internally; callers always get complete frames.
pub struct FrameReader<R> {
    inner: R,
    format: WireFormat,
    config: FrameConfig,
}

impl<R: BufRead> FrameReader<R> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: R, format: WireFormat) -> Self {
        Self::with_config(inner, format, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: R, format: WireFormat, config: FrameConfig) -> Self {
        Self {
            inner,
            format,
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Ok(None)` when the stream ends.
    pub fn read_frame(&mut self) -> Result<Option<Bytes>> {
        read_frame(&mut self.inner, self.format, &self.config)
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> R {
        self.inner
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl<R: BufRead> Iterator for FrameReader<R> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_frame().transpose()
    }
}
