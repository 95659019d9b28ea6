//! Extension hook invoked for values a wire format cannot carry natively.

use shmwire_frame::WireFormat;
use shmwire_segment::OffloadBuffer;
use tracing::{debug, trace, warn};

use crate::array::NdArray;
use crate::descriptor::{Descriptor, InlineCarrier};
use crate::error::{unsupported, CodecError, Result};
use crate::value::Value;

/// Replaces unsupported values during structural encoding.
///
/// The encoder calls [`replace`](EncodeHook::replace) bottom-up, once per
/// unsupported value, and encodes the returned value in its place. Exactly
/// one of `commit` or `abort` follows each top-level encode.
pub trait EncodeHook {
    fn replace(&mut self, value: &Value, format: WireFormat) -> Result<Value>;

    /// The enclosing encode succeeded.
    fn commit(&mut self) {}

    /// The enclosing encode failed; undo any side effects of `replace`.
    fn abort(&mut self) {}
}

/// Hook that rejects every value with `UnsupportedType`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectUnsupported;

impl EncodeHook for RejectUnsupported {
    fn replace(&mut self, value: &Value, format: WireFormat) -> Result<Value> {
        Err(unsupported(value.kind(), format))
    }
}

/// Moves array bytes into the shared segment and emits descriptors.
///
/// Without a buffer, or when the segment cannot fit the array, text frames
/// carry the array as nested lists and binary frames carry an inline
/// carrier.
#[derive(Debug, Default)]
pub struct ArrayOffload {
    buffer: Option<OffloadBuffer>,
    pending: Vec<usize>,
}

impl ArrayOffload {
    pub fn new(buffer: OffloadBuffer) -> Self {
        Self {
            buffer: Some(buffer),
            pending: Vec::new(),
        }
    }

    /// Hook with no segment; every array takes the fallback path.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> Option<&OffloadBuffer> {
        self.buffer.as_ref()
    }

    /// Copy `array` into the segment.
    ///
    /// Returns `Ok(None)` when there is no buffer or no room.
    pub fn offload(&mut self, array: &NdArray) -> Result<Option<Descriptor>> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Ok(None);
        };
        let Some(offset) = buffer.store(array.data())? else {
            return Ok(None);
        };
        trace!(offset, len = array.byte_len(), "offloaded array");
        Ok(Some(Descriptor::for_array(array, offset)))
    }

    /// Borrow the bytes a descriptor names.
    pub fn bytes(&self, descriptor: &Descriptor) -> Result<&[u8]> {
        descriptor.validate()?;
        let buffer = self.buffer.as_ref().ok_or(CodecError::NoOffloadBuffer)?;
        Ok(buffer.bytes(descriptor.offset, descriptor.length)?)
    }

    /// Release the chunk at `offset` once its bytes have been consumed.
    pub fn release(&mut self, offset: usize) -> Result<()> {
        let buffer = self.buffer.as_mut().ok_or(CodecError::NoOffloadBuffer)?;
        buffer.release(offset)?;
        trace!(offset, "released offload chunk");
        Ok(())
    }

    /// Copy a descriptor's bytes out of the segment and release its chunk.
    pub fn take(&mut self, descriptor: &Descriptor) -> Result<Vec<u8>> {
        let bytes = self.bytes(descriptor)?.to_vec();
        self.release(descriptor.offset)?;
        Ok(bytes)
    }
}

impl EncodeHook for ArrayOffload {
    fn replace(&mut self, value: &Value, format: WireFormat) -> Result<Value> {
        let Value::Array(array) = value else {
            return RejectUnsupported.replace(value, format);
        };
        if let Some(descriptor) = self.offload(array)? {
            self.pending.push(descriptor.offset);
            return Ok(Value::Offloaded(descriptor));
        }
        debug!(
            len = array.byte_len(),
            %format,
            "array not offloaded, carrying it in the frame"
        );
        match format {
            WireFormat::Text => array.to_nested(),
            WireFormat::Binary => Ok(Value::Inline(InlineCarrier::from_array(array))),
        }
    }

    fn commit(&mut self) {
        self.pending.clear();
    }

    fn abort(&mut self) {
        let Some(buffer) = self.buffer.as_mut() else {
            self.pending.clear();
            return;
        };
        for offset in self.pending.drain(..) {
            if let Err(err) = buffer.release(offset) {
                warn!(offset, error = %err, "failed to roll back offload chunk");
            }
        }
    }
}
