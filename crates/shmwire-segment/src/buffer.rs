use tracing::debug;

use crate::allocator::{SegmentAllocator, DEFAULT_QUANTUM};
use crate::error::Result;
use crate::segment::Segment;

/// A segment together with the allocator that owns its layout.
///
/// Bytes stored here stay put until the offset is released; the peer reads
/// them directly out of its own mapping of the same segment.
#[derive(Debug)]
pub struct OffloadBuffer {
    segment: Segment,
    allocator: SegmentAllocator,
}

impl OffloadBuffer {
    /// Wrap a segment with a default-quantum allocator spanning all of it.
    pub fn new(segment: Segment) -> Result<Self> {
        Self::with_quantum(segment, DEFAULT_QUANTUM)
    }

    /// Wrap a segment with an allocator using an explicit quantum.
    pub fn with_quantum(segment: Segment, quantum: usize) -> Result<Self> {
        let allocator = SegmentAllocator::with_quantum(segment.len(), quantum)?;
        Ok(Self { segment, allocator })
    }

    /// Copy `bytes` into a fresh chunk and return its offset.
    ///
    /// Returns `Ok(None)` when the bytes are empty or do not fit.
    pub fn store(&mut self, bytes: &[u8]) -> Result<Option<usize>> {
        if bytes.len() > self.segment.len() {
            debug!(
                len = bytes.len(),
                capacity = self.segment.len(),
                "payload larger than segment"
            );
            return Ok(None);
        }
        let Some(offset) = self.allocator.alloc(bytes.len()) else {
            return Ok(None);
        };
        if let Err(err) = self.segment.write(offset, bytes) {
            self.allocator.free(offset)?;
            return Err(err);
        }
        Ok(Some(offset))
    }

    /// Borrow `len` bytes at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.segment.read(offset, len)
    }

    /// Release the chunk at `offset` for reuse.
    pub fn release(&mut self, offset: usize) -> Result<()> {
        self.allocator.free(offset)
    }

    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    pub fn allocator(&self) -> &SegmentAllocator {
        &self.allocator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SegmentError;

    #[test]
    fn store_copies_bytes_verbatim() {
        let mut buffer = OffloadBuffer::new(Segment::anonymous(64).unwrap()).unwrap();

        let first = buffer.store(&[0xAA; 5]).unwrap().unwrap();
        let second = buffer.store(b"payload").unwrap().unwrap();

        assert_eq!(first, 0);
        assert_eq!(second, 8);
        assert_eq!(buffer.bytes(first, 5).unwrap(), &[0xAA; 5]);
        assert_eq!(buffer.bytes(second, 7).unwrap(), b"payload");
    }

    #[test]
    fn oversized_and_empty_payloads_do_not_allocate() {
        let mut buffer = OffloadBuffer::new(Segment::anonymous(16).unwrap()).unwrap();

        assert_eq!(buffer.store(&[0; 17]).unwrap(), None);
        assert_eq!(buffer.store(&[]).unwrap(), None);
        assert_eq!(buffer.allocator().allocated_count(), 0);
    }

    #[test]
    fn release_makes_space_reusable() {
        let mut buffer = OffloadBuffer::new(Segment::anonymous(32).unwrap()).unwrap();

        let offset = buffer.store(&[1; 32]).unwrap().unwrap();
        assert_eq!(buffer.store(&[2; 8]).unwrap(), None);

        buffer.release(offset).unwrap();
        assert_eq!(buffer.store(&[2; 8]).unwrap(), Some(0));
        assert_eq!(buffer.bytes(0, 8).unwrap(), &[2; 8]);
    }

    #[test]
    fn release_unknown_offset_fails() {
        let mut buffer = OffloadBuffer::new(Segment::anonymous(32).unwrap()).unwrap();
        assert!(matches!(
            buffer.release(24),
            Err(SegmentError::UnknownOffset(24))
        ));
    }
}
