/// Errors that can occur while reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A binary frame header announced fewer bytes than the header itself.
    #[error("invalid frame length {0} (must be at least 4)")]
    InvalidLength(i32),

    /// The frame exceeds the configured maximum size.
    #[error("frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream stopped accepting bytes before a frame was fully written.
    #[error("connection closed (incomplete frame write)")]
    ConnectionClosed,
}

/// A wire format name that is neither text nor binary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown wire format '{0}' (expected json or bson)")]
pub struct UnknownFormat(pub String);

pub type Result<T> = std::result::Result<T, FrameError>;
