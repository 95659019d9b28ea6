use std::fmt;
use std::io;

use shmwire_codec::CodecError;
use shmwire_frame::FrameError;
use shmwire_segment::SegmentError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const SEGMENT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound | io::ErrorKind::BrokenPipe => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn segment_error(context: &str, err: SegmentError) -> CliError {
    match err {
        SegmentError::Io(source) | SegmentError::Map { source, .. } => io_error(context, source),
        SegmentError::InvalidQuantum(_) | SegmentError::EmptySegment => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        other => CliError::new(SEGMENT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::FrameTooLarge { .. } | FrameError::InvalidLength(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}

pub fn codec_error(context: &str, err: CodecError) -> CliError {
    match err {
        CodecError::Frame(err) => frame_error(context, err),
        CodecError::Segment(err) => segment_error(context, err),
        CodecError::UnknownFormat(_) => CliError::new(USAGE, format!("{context}: {err}")),
        CodecError::UnsupportedType(_)
        | CodecError::Decode(_)
        | CodecError::InvalidArray(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        CodecError::NoOffloadBuffer => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
