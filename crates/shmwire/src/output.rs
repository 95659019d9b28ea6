use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::{json, Value as Json};
use shmwire_codec::{Value, WireFormat};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    index: usize,
    wire_format: &'a str,
    size: usize,
    kind: &'a str,
    descriptors: usize,
    value: Json,
}

/// Print one decoded frame. `Raw` writes the undecoded frame bytes.
pub fn print_frame(index: usize, wire: WireFormat, frame: &[u8], value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = FrameOutput {
                index,
                wire_format: wire.name(),
                size: frame.len(),
                kind: value.kind(),
                descriptors: value.descriptors().len(),
                value: render(value),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FRAME", "FORMAT", "SIZE", "KIND", "VALUE"])
                .add_row(vec![
                    index.to_string(),
                    wire.name().to_string(),
                    frame.len().to_string(),
                    value.kind().to_string(),
                    render(value).to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let body = serde_json::to_string_pretty(&render(value))
                .unwrap_or_else(|_| "null".to_string());
            println!(
                "frame={} format={} size={} kind={}\n{}",
                index,
                wire,
                frame.len(),
                value.kind(),
                body
            );
        }
        OutputFormat::Raw => print_raw(frame),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Render a value as JSON for display.
///
/// Unlike the text wire format this never fails: byte strings become a
/// placeholder and arrays show their metadata.
pub fn render(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(f.to_string())),
        Value::Str(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::String(bytes_placeholder(bytes.len())),
        Value::List(items) => Json::Array(items.iter().map(render).collect()),
        Value::Map(map) => Json::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), render(item)))
                .collect(),
        ),
        Value::Array(array) => json!({
            "ndarray": array.dtype().type_name(),
            "shape": array.shape(),
            "order": array.order().code(),
        }),
        Value::Offloaded(descriptor) => json!({
            "offload": "shmem",
            "offset": descriptor.offset,
            "length": descriptor.length,
            "type_name": descriptor.type_name,
            "item_size": descriptor.item_size,
            "shape": descriptor.shape,
            "order": descriptor.order.code(),
        }),
        Value::Inline(carrier) => json!({
            "offload": "inline",
            "length": carrier.length,
            "type_name": carrier.type_name,
            "item_size": carrier.item_size,
            "shape": carrier.shape,
            "order": carrier.order.code(),
            "bytes": bytes_placeholder(carrier.bytes.len()),
        }),
    }
}

fn bytes_placeholder(len: usize) -> String {
    format!("<binary {len} bytes>")
}
