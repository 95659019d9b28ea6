//! Frame boundaries over byte streams.
//!
//! shmwire speaks two wire formats, and each carries its own boundary rule:
//! - **text**: one frame is one line, terminated by `\n`
//! - **binary**: the first 4 bytes are a little-endian `i32` giving the total
//!   frame length, including those 4 bytes
//!
//! Readers return exactly one complete frame per call and never consume bytes
//! that belong to the next frame.

#[cfg(feature = "async")]
pub mod async_codec;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::FrameCodec;
pub use codec::{
    decode_frame, parse_length_prefix, FrameConfig, WireFormat, LENGTH_PREFIX_SIZE,
    LINE_TERMINATOR, READ_INCREMENT,
};
pub use error::{FrameError, Result, UnknownFormat};
pub use reader::{read_frame, FrameReader};
pub use writer::{write_frame, FrameWriter};
