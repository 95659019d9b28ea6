use std::path::PathBuf;

/// Errors that can occur while mapping or managing a segment.
#[derive(Debug, thiserror::Error)]
pub enum SegmentError {
    /// The allocation quantum is not a power of two.
    #[error("allocation quantum must be a non-zero power of two (got {0})")]
    InvalidQuantum(usize),

    /// A segment must span at least one byte.
    #[error("segment length must be greater than zero")]
    EmptySegment,

    /// The offset does not name a live allocation.
    #[error("no allocated chunk at offset {0}")]
    UnknownOffset(usize),

    /// The byte range falls outside the segment.
    #[error("range {offset}+{len} exceeds segment capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    /// Failed to create or map the backing file.
    #[error("failed to map {path}: {source}")]
    Map {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An I/O error occurred on the mapping.
    #[error("segment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SegmentError>;
