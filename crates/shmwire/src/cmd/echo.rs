use std::io::Write;

use shmwire_codec::{CodecError, MessageCodec, Value};
use tracing::{info, warn};

use crate::cmd::EchoArgs;
use crate::exit::{codec_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

/// Message type that asks the worker to release an offload chunk.
const RELEASE_TYPE: &str = "release";

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut codec = args.codec.build()?;
    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();

    let mut echoed = 0usize;
    while args.count.is_none_or(|max| echoed < max) {
        let value = match codec.recv(&mut input) {
            Ok(Some(value)) => value,
            Ok(None) => break,
            Err(err @ CodecError::Decode(_)) => {
                warn!(error = %err, "malformed frame");
                reply_error(&mut codec, &err, &mut output)?;
                continue;
            }
            // Anything else, an invalid length prefix included, leaves the
            // input out of step with the frame boundaries.
            Err(err) => return Err(codec_error("receive failed", err)),
        };

        let reply = respond(&mut codec, value);
        info!(kind = reply.kind(), "echoing frame");
        match codec.send(&reply, &mut output) {
            Ok(()) => {}
            Err(err @ CodecError::UnsupportedType(_)) => {
                warn!(error = %err, "reply not encodable");
                reply_error(&mut codec, &err, &mut output)?;
            }
            Err(err) => return Err(codec_error("echo send failed", err)),
        }
        echoed += 1;
    }

    info!(echoed, "input closed");
    Ok(SUCCESS)
}

/// Release requests are answered with an acknowledgement; anything else is
/// echoed with inline arrays unpacked so they can take the offload path.
fn respond(codec: &mut MessageCodec, value: Value) -> Value {
    if value.get("type").and_then(Value::as_str) == Some(RELEASE_TYPE) {
        return match value.get("offset").and_then(Value::as_i64) {
            Some(offset) => release(codec, offset),
            None => error_value("release request without an integer offset"),
        };
    }
    unpack_inline(value)
}

fn release(codec: &mut MessageCodec, offset: i64) -> Value {
    let result = usize::try_from(offset)
        .map_err(|_| format!("invalid offset {offset}"))
        .and_then(|offset| codec.release(offset).map_err(|err| err.to_string()));
    match result {
        Ok(()) => [("released", Value::Int(offset))].into_iter().collect(),
        Err(message) => error_value(&message),
    }
}

fn unpack_inline(value: Value) -> Value {
    match value {
        Value::Map(map) => Value::Map(
            map.into_iter()
                .map(|(key, item)| (key, unpack_nested(item)))
                .collect(),
        ),
        Value::List(items) => Value::List(items.into_iter().map(unpack_nested).collect()),
        other => other,
    }
}

fn unpack_nested(value: Value) -> Value {
    match value {
        Value::Inline(carrier) => match carrier.to_array() {
            Ok(array) => Value::Array(array),
            Err(err) => {
                warn!(error = %err, "keeping inline carrier as received");
                Value::Inline(carrier)
            }
        },
        other => unpack_inline(other),
    }
}

fn error_value(message: &str) -> Value {
    [("error", Value::from(message))].into_iter().collect()
}

fn reply_error<W: Write>(codec: &mut MessageCodec, err: &CodecError, output: &mut W) -> CliResult<()> {
    codec
        .send(&error_value(&err.to_string()), output)
        .map_err(|err| codec_error("error reply failed", err))
}
