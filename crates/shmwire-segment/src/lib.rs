//! Fixed-length shared byte segment with a first-fit chunk allocator.
//!
//! This is the lowest layer of shmwire. A [`Segment`] is a byte region mapped
//! once at process start (usually a file both peers map) and never resized.
//! A [`SegmentAllocator`] partitions it into chunks; [`OffloadBuffer`] pairs
//! the two so callers can park array bytes in the segment and hand the peer
//! an offset instead of the bytes themselves.

pub mod allocator;
pub mod buffer;
pub mod error;
pub mod segment;

pub use allocator::{Chunk, ChunkStatus, SegmentAllocator, DEFAULT_QUANTUM};
pub use buffer::OffloadBuffer;
pub use error::{Result, SegmentError};
pub use segment::Segment;
