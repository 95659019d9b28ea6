use clap::{Args, Subcommand};
use std::path::PathBuf;

use shmwire_codec::{CodecConfig, FrameConfig, MessageCodec, OffloadConfig, WireFormat};
use shmwire_segment::DEFAULT_QUANTUM;

use crate::exit::{codec_error, CliResult};
use crate::output::OutputFormat;

pub mod echo;
pub mod encode;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Act as a worker: decode frames from stdin and send each back on stdout.
    Echo(EchoArgs),
    /// Read JSON lines from stdin and write them as frames on stdout.
    Encode(EncodeArgs),
    /// Decode frames from a file or stdin and print them.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Wire and offload options shared by every codec-driven command.
#[derive(Args, Debug, Clone)]
pub struct CodecArgs {
    /// Wire format: json (text) or bson (binary).
    #[arg(long, value_name = "FORMAT", env = "SHMWIRE_FORMAT", default_value = "json")]
    pub wire: WireFormat,
    /// Shared segment file created by the host. It is mapped at its own length.
    /// Without it, --shmem-size maps an anonymous region.
    #[arg(long, value_name = "PATH", env = "SHMWIRE_SHMEM_PATH")]
    pub shmem_path: Option<PathBuf>,
    /// Create --shmem-path at --shmem-size bytes instead of opening it.
    /// The file is removed on exit.
    #[arg(long, requires = "shmem_path")]
    pub create_segment: bool,
    /// Shared segment size in bytes. 0 disables anonymous array offload.
    #[arg(long, value_name = "BYTES", env = "SHMWIRE_SHMEM_SIZE", default_value_t = 0)]
    pub shmem_size: usize,
    /// Allocation granularity in bytes (power of two).
    #[arg(long, value_name = "BYTES", env = "SHMWIRE_QUANTUM", default_value_t = DEFAULT_QUANTUM)]
    pub quantum: usize,
    /// Reject frames larger than this many bytes.
    #[arg(long, value_name = "BYTES")]
    pub max_frame_size: Option<usize>,
}

impl CodecArgs {
    pub fn config(&self) -> CodecConfig {
        let offload = match &self.shmem_path {
            Some(path) if self.create_segment => {
                Some(OffloadConfig::create_file(path, self.shmem_size))
            }
            Some(path) => Some(OffloadConfig::file(path)),
            None => (self.shmem_size > 0).then(|| OffloadConfig::anonymous(self.shmem_size)),
        }
        .map(|offload| offload.with_quantum(self.quantum));
        CodecConfig {
            format: self.wire,
            offload,
            frame: FrameConfig {
                max_frame_size: self.max_frame_size,
            },
        }
    }

    pub fn build(&self) -> CliResult<MessageCodec> {
        MessageCodec::from_config(&self.config())
            .map_err(|err| codec_error("codec setup failed", err))
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub codec: CodecArgs,
    /// Exit after echoing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub codec: CodecArgs,
    /// Send lists of numbers as float64 arrays.
    #[arg(long)]
    pub arrays: bool,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[command(flatten)]
    pub codec: CodecArgs,
    /// Read frames from this file instead of stdin.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
    /// Stop after N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build information.
    #[arg(long)]
    pub extended: bool,
}
