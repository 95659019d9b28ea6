//! Newline-terminated JSON strategy.

use serde_json::{Number, Value as Json};
use shmwire_frame::{WireFormat, LINE_TERMINATOR};

use crate::descriptor;
use crate::error::{unsupported, CodecError, Result};
use crate::offload::EncodeHook;
use crate::value::{Map, Value};

/// Serialize `value` as one JSON line, terminator included.
pub(crate) fn encode(value: &Value, hook: &mut dyn EncodeHook) -> Result<Vec<u8>> {
    let json = to_json(value, Some(hook))?;
    let mut out =
        serde_json::to_vec(&json).map_err(|err| CodecError::UnsupportedType(err.to_string()))?;
    out.push(LINE_TERMINATOR);
    Ok(out)
}

/// Parse one JSON line. Surrounding whitespace, including the terminator,
/// is ignored.
pub(crate) fn decode(frame: &[u8]) -> Result<Value> {
    let json: Json =
        serde_json::from_slice(frame).map_err(|err| CodecError::Decode(err.to_string()))?;
    from_json(json)
}

// Values produced by the hook are lowered without it, so a replacement can
// never recurse back into the hook.
fn to_json<'h>(value: &Value, mut hook: Option<&mut (dyn EncodeHook + 'h)>) -> Result<Json> {
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => Json::Number(
            Number::from_f64(*f)
                .ok_or_else(|| CodecError::UnsupportedType(format!("float {f} is not finite")))?,
        ),
        Value::Str(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|item| to_json(item, hook.as_deref_mut()))
                .collect::<Result<_>>()?,
        ),
        Value::Map(map) => to_object(map, hook)?,
        Value::Offloaded(descriptor) => to_object(&descriptor.to_map(), None)?,
        Value::Inline(carrier) => to_object(&carrier.to_map(), None)?,
        Value::Bytes(_) | Value::Array(_) => {
            let Some(hook) = hook else {
                return Err(unsupported(value.kind(), WireFormat::Text));
            };
            let replacement = hook.replace(value, WireFormat::Text)?;
            to_json(&replacement, None)?
        }
    })
}

fn to_object<'h>(map: &Map, mut hook: Option<&mut (dyn EncodeHook + 'h)>) -> Result<Json> {
    let mut object = serde_json::Map::with_capacity(map.len());
    for (key, item) in map {
        object.insert(key.clone(), to_json(item, hook.as_deref_mut())?);
    }
    Ok(Json::Object(object))
}

fn from_json(json: Json) -> Result<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Value::Int(i),
            (None, Some(f)) => Value::Float(f),
            (None, None) => return Err(CodecError::Decode(format!("unrepresentable number {n}"))),
        },
        Json::String(s) => Value::Str(s),
        Json::Array(items) => Value::List(
            items
                .into_iter()
                .map(from_json)
                .collect::<Result<_>>()?,
        ),
        Json::Object(object) => {
            let map = object
                .into_iter()
                .map(|(key, item)| Ok((key, from_json(item)?)))
                .collect::<Result<Map>>()?;
            descriptor::recognize(map)
        }
    })
}
