/// Errors that can occur while encoding, decoding or offloading messages.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A value somewhere in the tree has no representation in the wire format.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// Frame bytes do not parse under the codec's wire format.
    #[error("decode error: {0}")]
    Decode(String),

    /// Array metadata and byte length disagree.
    #[error("invalid array: {0}")]
    InvalidArray(String),

    /// The codec was configured with a format name it does not know.
    #[error("unknown codec format '{0}' (expected json or bson)")]
    UnknownFormat(String),

    /// An operation needed the offload buffer but none is attached.
    #[error("no offload buffer attached")]
    NoOffloadBuffer,

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] shmwire_frame::FrameError),

    /// Segment-level error.
    #[error("segment error: {0}")]
    Segment(#[from] shmwire_segment::SegmentError),
}

impl From<shmwire_frame::UnknownFormat> for CodecError {
    fn from(err: shmwire_frame::UnknownFormat) -> Self {
        CodecError::UnknownFormat(err.0)
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;

pub(crate) fn unsupported(kind: &str, format: shmwire_frame::WireFormat) -> CodecError {
    CodecError::UnsupportedType(format!("{kind} has no {format} representation"))
}
