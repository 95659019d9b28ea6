//! First-fit chunk allocator over a fixed-length segment.
//!
//! The segment is kept as an ordered list of chunks that exactly partition
//! it. `alloc` scans for the first free chunk large enough and splits off the
//! remainder; `free` marks the chunk free and merges it with free neighbours.
//! Both are O(#chunks), which is fine at the chunk counts a single worker
//! produces but will not scale to thousands of live allocations.

use tracing::{debug, trace};

use crate::error::{Result, SegmentError};

/// Default allocation granularity in bytes.
pub const DEFAULT_QUANTUM: usize = 8;

/// Whether a chunk is available for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStatus {
    Free,
    Allocated,
}

/// A maximal run of the segment that is entirely free or entirely allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub status: ChunkStatus,
    pub offset: usize,
    pub length: usize,
}

impl Chunk {
    pub fn is_free(&self) -> bool {
        self.status == ChunkStatus::Free
    }

    /// One past the last byte of the chunk.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Manages a segment of `len` bytes as an ordered chunk list.
///
/// Invariants after every public call:
/// - chunks are sorted by offset, contiguous, and their lengths sum to `len`;
/// - no two neighbouring chunks are both free.
#[derive(Debug, Clone)]
pub struct SegmentAllocator {
    len: usize,
    quantum: usize,
    chunks: Vec<Chunk>,
}

impl SegmentAllocator {
    /// Create an allocator with the default quantum.
    pub fn new(len: usize) -> Result<Self> {
        Self::with_quantum(len, DEFAULT_QUANTUM)
    }

    /// Create an allocator rounding every request up to a multiple of `quantum`.
    pub fn with_quantum(len: usize, quantum: usize) -> Result<Self> {
        if !quantum.is_power_of_two() {
            return Err(SegmentError::InvalidQuantum(quantum));
        }
        if len == 0 {
            return Err(SegmentError::EmptySegment);
        }
        Ok(Self {
            len,
            quantum,
            chunks: vec![Chunk {
                status: ChunkStatus::Free,
                offset: 0,
                length: len,
            }],
        })
    }

    /// Reserve at least `n` bytes and return the chunk offset.
    ///
    /// Returns `None` for a zero-byte request or when no free chunk is large
    /// enough. Running out of space is an ordinary outcome, not an error.
    pub fn alloc(&mut self, n: usize) -> Option<usize> {
        if n == 0 {
            return None;
        }
        let size = n.checked_next_multiple_of(self.quantum)?;

        let Some(index) = self
            .chunks
            .iter()
            .position(|chunk| chunk.is_free() && chunk.length >= size)
        else {
            debug!(
                requested = n,
                rounded = size,
                largest_free = self.largest_free(),
                "segment exhausted"
            );
            return None;
        };

        let chunk = &mut self.chunks[index];
        let offset = chunk.offset;
        let remainder = chunk.length - size;
        chunk.status = ChunkStatus::Allocated;
        chunk.length = size;

        if remainder > 0 {
            self.chunks.insert(
                index + 1,
                Chunk {
                    status: ChunkStatus::Free,
                    offset: offset + size,
                    length: remainder,
                },
            );
        }

        trace!(offset, size, chunks = self.chunks.len(), "allocated chunk");
        Some(offset)
    }

    /// Release the allocation starting at `offset`.
    ///
    /// Fails with [`SegmentError::UnknownOffset`] when `offset` is not the
    /// start of an allocated chunk (including a second release of the same
    /// offset); the chunk list is left untouched in that case.
    pub fn free(&mut self, offset: usize) -> Result<()> {
        let index = self
            .chunks
            .binary_search_by_key(&offset, |chunk| chunk.offset)
            .map_err(|_| SegmentError::UnknownOffset(offset))?;

        let chunk = &mut self.chunks[index];
        if chunk.is_free() {
            return Err(SegmentError::UnknownOffset(offset));
        }
        chunk.status = ChunkStatus::Free;
        let length = chunk.length;

        self.coalesce();
        trace!(offset, length, chunks = self.chunks.len(), "freed chunk");
        Ok(())
    }

    fn coalesce(&mut self) {
        self.chunks.dedup_by(|next, prev| {
            if prev.is_free() && next.is_free() {
                prev.length += next.length;
                true
            } else {
                false
            }
        });
    }

    /// Segment length managed by this allocator.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false: empty segments are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Current chunk list in offset order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Total bytes held by free chunks.
    pub fn free_bytes(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| chunk.is_free())
            .map(|chunk| chunk.length)
            .sum()
    }

    /// Length of the largest free chunk (the biggest request that can succeed).
    pub fn largest_free(&self) -> usize {
        self.chunks
            .iter()
            .filter(|chunk| chunk.is_free())
            .map(|chunk| chunk.length)
            .max()
            .unwrap_or(0)
    }

    /// Number of live allocations.
    pub fn allocated_count(&self) -> usize {
        self.chunks.iter().filter(|chunk| !chunk.is_free()).count()
    }
}
