use std::fmt;
use std::str::FromStr;

use bytes::{Bytes, BytesMut};

use crate::error::{FrameError, Result, UnknownFormat};

/// Terminator for text frames.
pub const LINE_TERMINATOR: u8 = b'\n';

/// Size of the binary frame length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Upper bound on a single read while filling a binary frame body.
pub const READ_INCREMENT: usize = 16 * 1024;

/// Wire format, selecting both the document encoding and the boundary rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireFormat {
    /// Newline-terminated JSON text.
    Text,
    /// Self-framing BSON documents.
    Binary,
}

impl WireFormat {
    /// Canonical format name.
    pub fn name(self) -> &'static str {
        match self {
            WireFormat::Text => "json",
            WireFormat::Binary => "bson",
        }
    }
}

impl fmt::Display for WireFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WireFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "text" => Ok(WireFormat::Text),
            "bson" | "binary" => Ok(WireFormat::Binary),
            _ => Err(UnknownFormat(s.to_string())),
        }
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum frame size in bytes, including the terminator or length
    /// prefix. `None` leaves frames bounded only by available memory.
    pub max_frame_size: Option<usize>,
}

impl FrameConfig {
    /// Reject `size` if it exceeds the configured maximum.
    pub fn check_size(&self, size: usize) -> Result<()> {
        match self.max_frame_size {
            Some(max) if size > max => Err(FrameError::FrameTooLarge { size, max }),
            _ => Ok(()),
        }
    }
}

/// Parse a binary frame header into the total frame length.
pub fn parse_length_prefix(header: [u8; LENGTH_PREFIX_SIZE]) -> Result<usize> {
    let length = i32::from_le_bytes(header);
    if length < LENGTH_PREFIX_SIZE as i32 {
        return Err(FrameError::InvalidLength(length));
    }
    Ok(length as usize)
}

/// Split one complete frame off the front of an accumulating buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet; the
/// buffer is left untouched in that case. Suited to hosts that receive the
/// stream in arbitrary chunks and push them into a buffer.
pub fn decode_frame(
    src: &mut BytesMut,
    format: WireFormat,
    config: &FrameConfig,
) -> Result<Option<Bytes>> {
    match format {
        WireFormat::Text => {
            let Some(pos) = src.iter().position(|b| *b == LINE_TERMINATOR) else {
                config.check_size(src.len())?;
                return Ok(None);
            };
            config.check_size(pos + 1)?;
            Ok(Some(src.split_to(pos + 1).freeze()))
        }
        WireFormat::Binary => {
            if src.len() < LENGTH_PREFIX_SIZE {
                return Ok(None);
            }
            let header = [src[0], src[1], src[2], src[3]];
            let length = parse_length_prefix(header)?;
            config.check_size(length)?;
            if src.len() < length {
                return Ok(None);
            }
            Ok(Some(src.split_to(length).freeze()))
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BufMut;

    use super::*;

    fn binary_frame(body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_i32_le((body.len() + LENGTH_PREFIX_SIZE) as i32);
        out.put_slice(body);
        out
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("json".parse::<WireFormat>().unwrap(), WireFormat::Text);
        assert_eq!("TEXT".parse::<WireFormat>().unwrap(), WireFormat::Text);
        assert_eq!("bson".parse::<WireFormat>().unwrap(), WireFormat::Binary);
        assert_eq!(" binary ".parse::<WireFormat>().unwrap(), WireFormat::Binary);
        assert_eq!(
            "yaml".parse::<WireFormat>().unwrap_err(),
            UnknownFormat("yaml".to_string())
        );
        assert_eq!(WireFormat::Binary.to_string(), "bson");
    }

    #[test]
    fn length_prefix_counts_itself() {
        assert_eq!(parse_length_prefix(4i32.to_le_bytes()).unwrap(), 4);
        assert_eq!(parse_length_prefix(300i32.to_le_bytes()).unwrap(), 300);
        assert!(matches!(
            parse_length_prefix(3i32.to_le_bytes()),
            Err(FrameError::InvalidLength(3))
        ));
        assert!(matches!(
            parse_length_prefix((-1i32).to_le_bytes()),
            Err(FrameError::InvalidLength(-1))
        ));
    }

    #[test]
    fn decode_text_lines() {
        let mut buf = BytesMut::from(&b"{\"a\":1}\n{\"b\":"[..]);
        let config = FrameConfig::default();

        let first = decode_frame(&mut buf, WireFormat::Text, &config)
            .unwrap()
            .unwrap();
        assert_eq!(first.as_ref(), b"{\"a\":1}\n");
        assert!(decode_frame(&mut buf, WireFormat::Text, &config)
            .unwrap()
            .is_none());

        buf.extend_from_slice(b"2}\n");
        let second = decode_frame(&mut buf, WireFormat::Text, &config)
            .unwrap()
            .unwrap();
        assert_eq!(second.as_ref(), b"{\"b\":2}\n");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_binary_incrementally() {
        let wire = [binary_frame(b"first"), binary_frame(b"second")].concat();
        let config = FrameConfig::default();
        let mut buf = BytesMut::new();
        let mut frames = Vec::new();

        for byte in wire {
            buf.put_u8(byte);
            if let Some(frame) = decode_frame(&mut buf, WireFormat::Binary, &config).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(frames.len(), 2);
        assert_eq!(&frames[0][4..], b"first");
        assert_eq!(&frames[1][4..], b"second");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_binary_leaves_partial_frame_in_place() {
        let wire = binary_frame(b"partial");
        let mut buf = BytesMut::from(&wire[..6]);

        let result = decode_frame(&mut buf, WireFormat::Binary, &FrameConfig::default()).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 6);
    }

    #[test]
    fn decode_rejects_oversized_frames() {
        let config = FrameConfig {
            max_frame_size: Some(8),
        };

        let mut buf = BytesMut::from(&binary_frame(b"0123456789")[..4]);
        let err = decode_frame(&mut buf, WireFormat::Binary, &config).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { size: 14, max: 8 }));

        let mut buf = BytesMut::from(&b"a line without end"[..]);
        let err = decode_frame(&mut buf, WireFormat::Text, &config).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { .. }));
    }
}
