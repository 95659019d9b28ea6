//! Structured message codecs for a worker stream.
//!
//! A [`MessageCodec`] turns [`Value`] trees into frames of one
//! [`WireFormat`]: newline-terminated JSON or self-framing BSON. Values a
//! format cannot carry natively go through an [`EncodeHook`]; the default
//! [`ArrayOffload`] hook parks array bytes in a shared segment and sends a
//! [`Descriptor`] in their place. Decoding never rebuilds offloaded arrays.
//! The receiver reads the bytes and releases the chunk itself.

mod binary;
mod text;

pub mod array;
pub mod codec;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod offload;
pub mod value;

pub use array::{element_count, DType, Element, MemoryOrder, NdArray};
pub use codec::MessageCodec;
pub use config::{CodecConfig, OffloadConfig, SegmentSource};
pub use descriptor::{Descriptor, InlineCarrier, INLINE_TAG, OFFLOAD_KEY, SHMEM_TAG};
pub use error::{CodecError, Result};
pub use offload::{ArrayOffload, EncodeHook, RejectUnsupported};
pub use value::{Map, Value};

pub use shmwire_frame::{FrameConfig, WireFormat};
