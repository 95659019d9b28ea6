use std::path::PathBuf;

use shmwire_frame::{FrameConfig, WireFormat};
use shmwire_segment::{OffloadBuffer, Segment, DEFAULT_QUANTUM};

use crate::error::Result;

/// How a file-backed segment comes into being.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SegmentSource {
    /// Map a file the peer already created, at the file's length.
    #[default]
    Open,
    /// Create the file at the requested size, replacing any stale one.
    /// The mapping removes the file when dropped.
    Create,
}

/// Where and how large the offload segment is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadConfig {
    /// Backing file shared with the peer. `None` maps an anonymous region.
    pub path: Option<PathBuf>,
    /// Segment length in bytes. Ignored when opening an existing file.
    pub size: usize,
    /// Allocation granularity, a power of two.
    pub quantum: usize,
    pub source: SegmentSource,
}

impl OffloadConfig {
    pub fn anonymous(size: usize) -> Self {
        Self {
            path: None,
            size,
            quantum: DEFAULT_QUANTUM,
            source: SegmentSource::Open,
        }
    }

    /// Map a segment file the host already created. The worker side.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            size: 0,
            quantum: DEFAULT_QUANTUM,
            source: SegmentSource::Open,
        }
    }

    /// Create a segment file of `size` bytes. The host side.
    pub fn create_file(path: impl Into<PathBuf>, size: usize) -> Self {
        Self {
            path: Some(path.into()),
            size,
            quantum: DEFAULT_QUANTUM,
            source: SegmentSource::Create,
        }
    }

    pub fn with_quantum(mut self, quantum: usize) -> Self {
        self.quantum = quantum;
        self
    }

    /// Map the segment and wrap it in an allocator.
    pub fn open_buffer(&self) -> Result<OffloadBuffer> {
        let segment = match (&self.path, self.source) {
            (Some(path), SegmentSource::Open) => Segment::open(path)?,
            (Some(path), SegmentSource::Create) => Segment::create(path, self.size)?,
            (None, _) => Segment::anonymous(self.size)?,
        };
        Ok(OffloadBuffer::with_quantum(segment, self.quantum)?)
    }
}

/// Everything needed to build a [`MessageCodec`](crate::MessageCodec).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecConfig {
    pub format: WireFormat,
    pub offload: Option<OffloadConfig>,
    pub frame: FrameConfig,
}

impl CodecConfig {
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            offload: None,
            frame: FrameConfig::default(),
        }
    }

    /// Build from a format name such as `"json"` or `"bson"`.
    pub fn from_format_name(name: &str) -> Result<Self> {
        Ok(Self::new(name.parse::<WireFormat>()?))
    }

    pub fn with_offload(mut self, offload: OffloadConfig) -> Self {
        self.offload = Some(offload);
        self
    }

    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.frame.max_frame_size = Some(max);
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::new(WireFormat::Text)
    }
}
