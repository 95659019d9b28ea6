use std::collections::BTreeMap;

use crate::array::NdArray;
use crate::descriptor::{Descriptor, InlineCarrier};

/// String-keyed mapping, ordered by key.
pub type Map = BTreeMap<String, Value>;

/// A message value as seen by callers of the codec.
///
/// `Array` only travels outward: encoding hands it to the extension hook, and
/// decoding yields `Offloaded` or `Inline` in its place.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(Map),
    Array(NdArray),
    Offloaded(Descriptor),
    Inline(InlineCarrier),
}

impl Value {
    /// Short name of the variant, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Array(_) => "ndarray",
            Value::Offloaded(_) => "offload descriptor",
            Value::Inline(_) => "inline array",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_map(&self) -> Option<&Map> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Look up `key` if this is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Collect every offload descriptor in the tree, depth first.
    pub fn descriptors(&self) -> Vec<&Descriptor> {
        let mut out = Vec::new();
        self.collect_descriptors(&mut out);
        out
    }

    fn collect_descriptors<'a>(&'a self, out: &mut Vec<&'a Descriptor>) {
        match self {
            Value::Offloaded(descriptor) => out.push(descriptor),
            Value::List(items) => items.iter().for_each(|item| item.collect_descriptors(out)),
            Value::Map(map) => map.values().for_each(|item| item.collect_descriptors(out)),
            _ => {}
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<Map> for Value {
    fn from(value: Map) -> Self {
        Value::Map(value)
    }
}

impl From<NdArray> for Value {
    fn from(value: NdArray) -> Self {
        Value::Array(value)
    }
}

impl From<Descriptor> for Value {
    fn from(value: Descriptor) -> Self {
        Value::Offloaded(value)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::Map(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{DType, MemoryOrder};

    #[test]
    fn map_from_pairs() {
        let value: Value = [("b", Value::from(2)), ("a", Value::from("x"))]
            .into_iter()
            .collect();

        assert_eq!(value.kind(), "map");
        assert_eq!(value.get("a").and_then(Value::as_str), Some("x"));
        assert_eq!(value.get("b").and_then(Value::as_i64), Some(2));
        assert!(value.get("c").is_none());
        let keys: Vec<_> = value.as_map().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["a", "b"]);
    }

    #[test]
    fn descriptors_are_found_at_any_depth() {
        let descriptor = Descriptor {
            offset: 16,
            length: 8,
            type_name: DType::Float64.type_name().to_string(),
            item_size: 8,
            shape: vec![1],
            order: MemoryOrder::RowMajor,
        };
        let value: Value = [(
            "outer",
            Value::List(vec![Value::Null, Value::Offloaded(descriptor.clone())]),
        )]
        .into_iter()
        .collect();

        assert_eq!(value.descriptors(), vec![&descriptor]);
        assert!(Value::Null.descriptors().is_empty());
    }
}
