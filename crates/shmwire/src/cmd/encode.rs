use std::io::BufRead;

use shmwire_codec::{MessageCodec, NdArray, Value, WireFormat};
use tracing::debug;

use crate::cmd::EncodeArgs;
use crate::exit::{codec_error, io_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EncodeArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut codec = args.codec.build()?;
    let parser = MessageCodec::new(WireFormat::Text);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();

    for (index, line) in stdin.lock().lines().enumerate() {
        let line = line.map_err(|err| io_error("read stdin", err))?;
        if line.trim().is_empty() {
            continue;
        }
        let mut value = parser
            .decode(line.as_bytes())
            .map_err(|err| codec_error(&format!("line {}", index + 1), err))?;
        if args.arrays {
            value = lists_to_arrays(value);
        }
        codec
            .send(&value, &mut output)
            .map_err(|err| codec_error(&format!("line {}", index + 1), err))?;
        debug!(line = index + 1, "encoded");
    }

    Ok(SUCCESS)
}

/// Replace every non-empty list of numbers with a float64 array.
fn lists_to_arrays(value: Value) -> Value {
    match value {
        Value::List(items) => match numeric(&items) {
            Some(values) => Value::Array(NdArray::from_vec(&values)),
            None => Value::List(items.into_iter().map(lists_to_arrays).collect()),
        },
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(key, item)| (key, lists_to_arrays(item)))
                .collect(),
        ),
        other => other,
    }
}

fn numeric(items: &[Value]) -> Option<Vec<f64>> {
    if items.is_empty() {
        return None;
    }
    items
        .iter()
        .map(|item| match item {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        })
        .collect()
}
