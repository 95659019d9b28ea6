//! Array metadata as it travels on the wire.
//!
//! Both carriers lower to ordinary maps tagged by the `offload` key, so any
//! format that can carry a map can carry them:
//!
//! ```text
//! {"offload": "shmem",  "offset": 64, "length": 48, "type_name": "float64",
//!  "item_size": 8, "shape": [2, 3], "order": "C"}
//! {"offload": "inline", "length": 48, ..., "bytes": <binary>}
//! ```
//!
//! The `offload` key is reserved only for maps that match a carrier layout
//! completely. A user map that happens to carry the tag but not the rest of
//! the fields decodes back to the same plain map.

use tracing::debug;

use crate::array::{check_layout, DType, MemoryOrder, NdArray};
use crate::error::{CodecError, Result};
use crate::value::{Map, Value};

/// Map key that marks an array carrier.
pub const OFFLOAD_KEY: &str = "offload";
/// Tag value for bytes parked in the shared segment.
pub const SHMEM_TAG: &str = "shmem";
/// Tag value for bytes embedded in the frame.
pub const INLINE_TAG: &str = "inline";

/// Names array bytes living in the shared segment.
///
/// The chunk at `offset` stays allocated until the consumer releases it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    pub offset: usize,
    pub length: usize,
    pub type_name: String,
    pub item_size: usize,
    pub shape: Vec<usize>,
    pub order: MemoryOrder,
}

impl Descriptor {
    /// Describe `array` stored at `offset`.
    pub fn for_array(array: &NdArray, offset: usize) -> Self {
        Self {
            offset,
            length: array.byte_len(),
            type_name: array.dtype().type_name().to_string(),
            item_size: array.dtype().item_size(),
            shape: array.shape().to_vec(),
            order: array.order(),
        }
    }

    /// Element type, if the type name is one this crate knows.
    pub fn dtype(&self) -> Option<DType> {
        DType::from_type_name(&self.type_name)
    }

    /// Check that `length` matches `item_size * product(shape)`.
    pub fn validate(&self) -> Result<()> {
        check_layout(self.length, self.item_size, &self.shape)
    }

    pub(crate) fn to_map(&self) -> Map {
        let mut map = layout_map(
            SHMEM_TAG,
            self.length,
            &self.type_name,
            self.item_size,
            &self.shape,
            self.order,
        );
        map.insert("offset".into(), wire_int(self.offset));
        map
    }

    fn from_map(map: &Map) -> Result<Self> {
        Ok(Self {
            offset: usize_field(map, "offset")?,
            length: usize_field(map, "length")?,
            type_name: str_field(map, "type_name")?.to_string(),
            item_size: usize_field(map, "item_size")?,
            shape: shape_field(map)?,
            order: order_field(map)?,
        })
    }
}

/// Array bytes embedded directly in a binary frame, used when the segment
/// is absent or full.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InlineCarrier {
    pub length: usize,
    pub type_name: String,
    pub item_size: usize,
    pub shape: Vec<usize>,
    pub order: MemoryOrder,
    pub bytes: Vec<u8>,
}

impl InlineCarrier {
    pub fn from_array(array: &NdArray) -> Self {
        Self {
            length: array.byte_len(),
            type_name: array.dtype().type_name().to_string(),
            item_size: array.dtype().item_size(),
            shape: array.shape().to_vec(),
            order: array.order(),
            bytes: array.data().to_vec(),
        }
    }

    pub fn dtype(&self) -> Option<DType> {
        DType::from_type_name(&self.type_name)
    }

    /// Check the layout and that the embedded bytes match `length`.
    pub fn validate(&self) -> Result<()> {
        check_layout(self.length, self.item_size, &self.shape)?;
        if self.bytes.len() != self.length {
            return Err(CodecError::InvalidArray(format!(
                "inline carrier declares {} bytes but holds {}",
                self.length,
                self.bytes.len()
            )));
        }
        Ok(())
    }

    /// Rebuild the array, if the element type is known.
    pub fn to_array(&self) -> Result<NdArray> {
        let dtype = self.dtype().ok_or_else(|| {
            CodecError::InvalidArray(format!("unknown element type '{}'", self.type_name))
        })?;
        NdArray::new(dtype, self.shape.clone(), self.order, self.bytes.clone())
    }

    pub(crate) fn to_map(&self) -> Map {
        let mut map = layout_map(
            INLINE_TAG,
            self.length,
            &self.type_name,
            self.item_size,
            &self.shape,
            self.order,
        );
        map.insert("bytes".into(), Value::Bytes(self.bytes.clone()));
        map
    }

    fn from_map(map: &Map) -> Result<Self> {
        let bytes = match map.get("bytes") {
            Some(Value::Bytes(bytes)) => bytes.clone(),
            _ => return Err(field_error("bytes")),
        };
        Ok(Self {
            length: usize_field(map, "length")?,
            type_name: str_field(map, "type_name")?.to_string(),
            item_size: usize_field(map, "item_size")?,
            shape: shape_field(map)?,
            order: order_field(map)?,
            bytes,
        })
    }
}

/// Turn a decoded map into a typed carrier if it is tagged as one.
///
/// Maps without the tag, with a tag this crate does not know, or whose
/// fields do not form a valid carrier come back unchanged as `Value::Map`.
pub(crate) fn recognize(map: Map) -> Value {
    let carrier = match map.get(OFFLOAD_KEY) {
        Some(Value::Str(tag)) if tag == SHMEM_TAG => Descriptor::from_map(&map).map(Value::Offloaded),
        Some(Value::Str(tag)) if tag == INLINE_TAG => {
            InlineCarrier::from_map(&map).map(Value::Inline)
        }
        _ => return Value::Map(map),
    };
    carrier.unwrap_or_else(|err| {
        debug!(%err, "tagged map is not a carrier, keeping it as a map");
        Value::Map(map)
    })
}

fn layout_map(
    tag: &str,
    length: usize,
    type_name: &str,
    item_size: usize,
    shape: &[usize],
    order: MemoryOrder,
) -> Map {
    let mut map = Map::new();
    map.insert(OFFLOAD_KEY.into(), Value::Str(tag.into()));
    map.insert("length".into(), wire_int(length));
    map.insert("type_name".into(), Value::Str(type_name.into()));
    map.insert("item_size".into(), wire_int(item_size));
    map.insert(
        "shape".into(),
        Value::List(shape.iter().copied().map(wire_int).collect()),
    );
    map.insert("order".into(), Value::Str(order.code().into()));
    map
}

fn wire_int(n: usize) -> Value {
    Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

fn field_error(field: &str) -> CodecError {
    CodecError::Decode(format!("array carrier has missing or invalid '{field}'"))
}

fn to_usize(value: &Value, field: &str) -> Result<usize> {
    match value {
        Value::Int(n) => usize::try_from(*n).map_err(|_| field_error(field)),
        _ => Err(field_error(field)),
    }
}

fn usize_field(map: &Map, field: &str) -> Result<usize> {
    map.get(field)
        .ok_or_else(|| field_error(field))
        .and_then(|value| to_usize(value, field))
}

fn str_field<'a>(map: &'a Map, field: &str) -> Result<&'a str> {
    map.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| field_error(field))
}

fn shape_field(map: &Map) -> Result<Vec<usize>> {
    match map.get("shape") {
        Some(Value::List(dims)) => dims.iter().map(|dim| to_usize(dim, "shape")).collect(),
        _ => Err(field_error("shape")),
    }
}

fn order_field(map: &Map) -> Result<MemoryOrder> {
    MemoryOrder::from_code(str_field(map, "order")?).ok_or_else(|| field_error("order"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NdArray {
        NdArray::from_elements(&[1.0f32, 2.0, 3.0, 4.0], vec![2, 2], MemoryOrder::ColumnMajor)
            .unwrap()
    }

    #[test]
    fn descriptor_map_is_recognized() {
        let descriptor = Descriptor::for_array(&sample(), 32);
        assert_eq!(descriptor.length, 16);
        assert_eq!(descriptor.item_size, 4);
        assert_eq!(descriptor.dtype(), Some(DType::Float32));
        descriptor.validate().unwrap();

        let map = descriptor.to_map();
        assert_eq!(map.get("order"), Some(&Value::Str("F".into())));
        assert_eq!(recognize(map), Value::Offloaded(descriptor));
    }

    #[test]
    fn inline_map_is_recognized() {
        let carrier = InlineCarrier::from_array(&sample());
        carrier.validate().unwrap();
        assert!(!carrier.to_map().contains_key("offset"));

        let recognized = recognize(carrier.to_map());
        assert_eq!(recognized, Value::Inline(carrier.clone()));
        assert_eq!(carrier.to_array().unwrap(), sample());
    }

    #[test]
    fn untagged_and_unknown_tags_stay_maps() {
        let mut map = Map::new();
        map.insert("offset".into(), Value::Int(3));
        assert_eq!(recognize(map.clone()), Value::Map(map.clone()));

        map.insert(OFFLOAD_KEY.into(), Value::Str("gpu".into()));
        assert_eq!(recognize(map.clone()), Value::Map(map));
    }

    #[test]
    fn malformed_carrier_stays_a_map() {
        let mut map = Descriptor::for_array(&sample(), 0).to_map();
        map.insert("offset".into(), Value::Int(-8));
        assert_eq!(recognize(map.clone()), Value::Map(map));

        let mut map = InlineCarrier::from_array(&sample()).to_map();
        map.remove("shape");
        assert_eq!(recognize(map.clone()), Value::Map(map));

        let map: Map = [
            (OFFLOAD_KEY.to_string(), Value::from(SHMEM_TAG)),
            ("note".to_string(), Value::from("user data")),
        ]
        .into_iter()
        .collect();
        assert_eq!(recognize(map.clone()), Value::Map(map));
    }

    #[test]
    fn from_map_reports_bad_fields() {
        let mut map = Descriptor::for_array(&sample(), 0).to_map();
        map.remove("shape");
        assert!(matches!(
            Descriptor::from_map(&map),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn validate_catches_layout_mismatch() {
        let mut descriptor = Descriptor::for_array(&sample(), 0);
        descriptor.shape = vec![3, 2];
        assert!(matches!(
            descriptor.validate(),
            Err(CodecError::InvalidArray(_))
        ));

        let mut carrier = InlineCarrier::from_array(&sample());
        carrier.bytes.pop();
        assert!(matches!(carrier.validate(), Err(CodecError::InvalidArray(_))));
    }
}
