//! Structured worker messaging with shared-memory array offload.
//!
//! shmwire moves structured messages between a host and a long-lived worker
//! over a plain byte stream, and parks large numeric arrays in a shared
//! segment so only a small descriptor crosses the stream.
//!
//! # Crate Structure
//!
//! - [`segment`]: Shared byte segment and its first-fit chunk allocator
//! - [`frame`]: Line and length-prefixed frame boundaries
//! - [`codec`]: JSON/BSON message codecs and the array offload hook

/// Re-export segment types.
pub mod segment {
    pub use shmwire_segment::*;
}

/// Re-export frame types.
pub mod frame {
    pub use shmwire_frame::*;
}

/// Re-export codec types.
pub mod codec {
    pub use shmwire_codec::*;
}

pub use shmwire_codec::{MessageCodec, Value, WireFormat};
