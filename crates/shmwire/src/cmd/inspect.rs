use std::fs::File;
use std::io::{BufRead, BufReader};

use shmwire_frame::FrameReader;

use crate::cmd::InspectArgs;
use crate::exit::{codec_error, frame_error, io_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let codec = args.codec.build()?;
    let input: Box<dyn BufRead> = match &args.file {
        Some(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("open {}", path.display()), err))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(std::io::stdin().lock()),
    };
    let mut reader = FrameReader::with_config(input, codec.format(), codec.frame_config().clone());

    let mut index = 0usize;
    while args.count.is_none_or(|max| index < max) {
        let Some(frame) = reader
            .read_frame()
            .map_err(|err| frame_error("read frame", err))?
        else {
            break;
        };
        let value = codec
            .decode(&frame)
            .map_err(|err| codec_error(&format!("frame {index}"), err))?;
        print_frame(index, codec.format(), &frame, &value, format);
        index += 1;
    }

    tracing::debug!(frames = index, "inspect finished");
    Ok(SUCCESS)
}
