//! BSON strategy. A document's own length prefix is its frame boundary.

use bson::spec::BinarySubtype;
use bson::{Binary, Bson, Document};
use shmwire_frame::WireFormat;

use crate::descriptor;
use crate::error::{unsupported, CodecError, Result};
use crate::offload::EncodeHook;
use crate::value::{Map, Value};

/// Serialize `value` as one BSON document.
///
/// The top level must be a map (or a carrier, which lowers to one).
pub(crate) fn encode(value: &Value, hook: &mut dyn EncodeHook) -> Result<Vec<u8>> {
    let document = match value {
        Value::Map(map) => to_document(map, Some(hook))?,
        Value::Offloaded(descriptor) => to_document(&descriptor.to_map(), None)?,
        Value::Inline(carrier) => to_document(&carrier.to_map(), None)?,
        other => {
            return Err(CodecError::UnsupportedType(format!(
                "binary frames carry a map at top level, not {}",
                other.kind()
            )))
        }
    };
    let mut out = Vec::new();
    document
        .to_writer(&mut out)
        .map_err(|err| CodecError::UnsupportedType(err.to_string()))?;
    Ok(out)
}

/// Parse exactly one BSON document.
pub(crate) fn decode(frame: &[u8]) -> Result<Value> {
    let mut reader = frame;
    let document =
        Document::from_reader(&mut reader).map_err(|err| CodecError::Decode(err.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::Decode(format!(
            "{} trailing bytes after document",
            reader.len()
        )));
    }
    from_document(document)
}

fn to_document<'h>(map: &Map, mut hook: Option<&mut (dyn EncodeHook + 'h)>) -> Result<Document> {
    let mut document = Document::new();
    for (key, item) in map {
        document.insert(key.clone(), to_bson(item, hook.as_deref_mut())?);
    }
    Ok(document)
}

fn to_bson<'h>(value: &Value, mut hook: Option<&mut (dyn EncodeHook + 'h)>) -> Result<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Int(i) => match i32::try_from(*i) {
            Ok(small) => Bson::Int32(small),
            Err(_) => Bson::Int64(*i),
        },
        Value::Float(f) => Bson::Double(*f),
        Value::Str(s) => Bson::String(s.clone()),
        Value::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        Value::List(items) => Bson::Array(
            items
                .iter()
                .map(|item| to_bson(item, hook.as_deref_mut()))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => Bson::Document(to_document(map, hook)?),
        Value::Offloaded(descriptor) => Bson::Document(to_document(&descriptor.to_map(), None)?),
        Value::Inline(carrier) => Bson::Document(to_document(&carrier.to_map(), None)?),
        Value::Array(_) => {
            let Some(hook) = hook else {
                return Err(unsupported(value.kind(), WireFormat::Binary));
            };
            let replacement = hook.replace(value, WireFormat::Binary)?;
            to_bson(&replacement, None)?
        }
    })
}

fn from_document(document: Document) -> Result<Value> {
    let map = document
        .into_iter()
        .map(|(key, item)| Ok((key, from_bson(item)?)))
        .collect::<Result<Map>>()?;
    Ok(descriptor::recognize(map))
}

fn from_bson(item: Bson) -> Result<Value> {
    Ok(match item {
        Bson::Null => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(i) => Value::Int(i.into()),
        Bson::Int64(i) => Value::Int(i),
        Bson::Double(f) => Value::Float(f),
        Bson::String(s) => Value::Str(s),
        Bson::Binary(binary) => Value::Bytes(binary.bytes),
        Bson::Array(items) => Value::List(
            items
                .into_iter()
                .map(from_bson)
                .collect::<Result<_>>()?,
        ),
        Bson::Document(document) => from_document(document)?,
        other => {
            return Err(CodecError::Decode(format!(
                "unsupported BSON element {:?}",
                other.element_type()
            )))
        }
    })
}
