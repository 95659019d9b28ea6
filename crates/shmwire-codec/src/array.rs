//! Homogeneous numeric arrays as flat bytes plus shape metadata.

use std::fmt;

use bytes::Bytes;

use crate::error::{CodecError, Result};
use crate::value::Value;

/// Element type of an [`NdArray`]. Type names follow numpy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub const ALL: [DType; 11] = [
        DType::Bool,
        DType::Int8,
        DType::UInt8,
        DType::Int16,
        DType::UInt16,
        DType::Int32,
        DType::UInt32,
        DType::Int64,
        DType::UInt64,
        DType::Float32,
        DType::Float64,
    ];

    pub fn type_name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int8 => "int8",
            DType::UInt8 => "uint8",
            DType::Int16 => "int16",
            DType::UInt16 => "uint16",
            DType::Int32 => "int32",
            DType::UInt32 => "uint32",
            DType::Int64 => "int64",
            DType::UInt64 => "uint64",
            DType::Float32 => "float32",
            DType::Float64 => "float64",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|dtype| dtype.type_name() == name)
    }

    /// Size of one element in bytes.
    pub fn item_size(self) -> usize {
        match self {
            DType::Bool | DType::Int8 | DType::UInt8 => 1,
            DType::Int16 | DType::UInt16 => 2,
            DType::Int32 | DType::UInt32 | DType::Float32 => 4,
            DType::Int64 | DType::UInt64 | DType::Float64 => 8,
        }
    }

    /// Decode one native-endian element into a scalar value.
    fn scalar(self, bytes: &[u8]) -> Result<Value> {
        Ok(match self {
            DType::Bool => Value::Bool(bytes.iter().any(|b| *b != 0)),
            DType::Int8 => Value::Int(i8::from_ne_bytes(fixed(bytes)?).into()),
            DType::UInt8 => Value::Int(u8::from_ne_bytes(fixed(bytes)?).into()),
            DType::Int16 => Value::Int(i16::from_ne_bytes(fixed(bytes)?).into()),
            DType::UInt16 => Value::Int(u16::from_ne_bytes(fixed(bytes)?).into()),
            DType::Int32 => Value::Int(i32::from_ne_bytes(fixed(bytes)?).into()),
            DType::UInt32 => Value::Int(u32::from_ne_bytes(fixed(bytes)?).into()),
            DType::Int64 => Value::Int(i64::from_ne_bytes(fixed(bytes)?)),
            DType::UInt64 => {
                let raw = u64::from_ne_bytes(fixed(bytes)?);
                let int = i64::try_from(raw).map_err(|_| {
                    CodecError::UnsupportedType(format!("uint64 element {raw} exceeds int64"))
                })?;
                Value::Int(int)
            }
            DType::Float32 => Value::Float(f32::from_ne_bytes(fixed(bytes)?).into()),
            DType::Float64 => Value::Float(f64::from_ne_bytes(fixed(bytes)?)),
        })
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

fn fixed<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        CodecError::InvalidArray(format!("expected {N} element bytes, got {}", bytes.len()))
    })
}

/// Layout of a multi-dimensional array in its flat byte buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum MemoryOrder {
    /// Last index varies fastest ("C").
    #[default]
    RowMajor,
    /// First index varies fastest ("F").
    ColumnMajor,
}

impl MemoryOrder {
    /// Single-letter wire code.
    pub fn code(self) -> &'static str {
        match self {
            MemoryOrder::RowMajor => "C",
            MemoryOrder::ColumnMajor => "F",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(MemoryOrder::RowMajor),
            "F" => Some(MemoryOrder::ColumnMajor),
            _ => None,
        }
    }
}

/// Number of elements in an array of `shape`, or `None` on overflow.
pub fn element_count(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, dim| acc.checked_mul(*dim))
}

/// Check that `length` bytes hold exactly `shape` elements of `item_size`.
pub(crate) fn check_layout(length: usize, item_size: usize, shape: &[usize]) -> Result<()> {
    let expected = element_count(shape).and_then(|count| count.checked_mul(item_size));
    match expected {
        Some(expected) if expected == length => Ok(()),
        Some(expected) => Err(CodecError::InvalidArray(format!(
            "shape {shape:?} with item size {item_size} needs {expected} bytes, got {length}"
        ))),
        None => Err(CodecError::InvalidArray(format!(
            "shape {shape:?} overflows"
        ))),
    }
}

/// Rust scalar types that can populate an [`NdArray`].
pub trait Element: Copy {
    const DTYPE: DType;

    fn extend_ne(self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;

                fn extend_ne(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_ne_bytes());
                }
            }
        )*
    };
}

impl_element! {
    i8 => Int8,
    u8 => UInt8,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
}

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn extend_ne(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }
}

/// A contiguous homogeneous array.
///
/// `data` holds `product(shape)` native-endian elements laid out in `order`.
/// The codec never reconstructs these on decode; they only travel outward.
#[derive(Debug, Clone, PartialEq)]
pub struct NdArray {
    dtype: DType,
    shape: Vec<usize>,
    order: MemoryOrder,
    data: Bytes,
}

impl NdArray {
    /// Wrap raw element bytes, rejecting a length that does not match `shape`.
    pub fn new(
        dtype: DType,
        shape: Vec<usize>,
        order: MemoryOrder,
        data: impl Into<Bytes>,
    ) -> Result<Self> {
        let data = data.into();
        check_layout(data.len(), dtype.item_size(), &shape)?;
        Ok(Self {
            dtype,
            shape,
            order,
            data,
        })
    }

    /// Build an array from elements already laid out in `order`.
    pub fn from_elements<T: Element>(
        values: &[T],
        shape: Vec<usize>,
        order: MemoryOrder,
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.item_size());
        for value in values {
            value.extend_ne(&mut data);
        }
        Self::new(T::DTYPE, shape, order, data)
    }

    /// One-dimensional row-major array.
    pub fn from_vec<T: Element>(values: &[T]) -> Self {
        let mut data = Vec::with_capacity(values.len() * T::DTYPE.item_size());
        for value in values {
            value.extend_ne(&mut data);
        }
        Self {
            dtype: T::DTYPE,
            shape: vec![values.len()],
            order: MemoryOrder::RowMajor,
            data: data.into(),
        }
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn order(&self) -> MemoryOrder {
        self.order
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.dtype.item_size()
    }

    /// Expand into nested lists of scalars, outermost dimension first.
    ///
    /// Nesting follows the logical index regardless of memory order. A
    /// zero-dimensional array expands to its single scalar.
    pub fn to_nested(&self) -> Result<Value> {
        let strides = self.strides();
        self.nest(0, 0, &strides)
    }

    /// Element strides per dimension, in elements.
    fn strides(&self) -> Vec<usize> {
        let mut strides = vec![1usize; self.shape.len()];
        match self.order {
            MemoryOrder::RowMajor => {
                for dim in (0..self.shape.len().saturating_sub(1)).rev() {
                    strides[dim] = strides[dim + 1] * self.shape[dim + 1];
                }
            }
            MemoryOrder::ColumnMajor => {
                for dim in 1..self.shape.len() {
                    strides[dim] = strides[dim - 1] * self.shape[dim - 1];
                }
            }
        }
        strides
    }

    fn nest(&self, dim: usize, base: usize, strides: &[usize]) -> Result<Value> {
        if dim == self.shape.len() {
            let size = self.dtype.item_size();
            let start = base * size;
            return self.dtype.scalar(&self.data[start..start + size]);
        }
        (0..self.shape[dim])
            .map(|i| self.nest(dim + 1, base + i * strides[dim], strides))
            .collect::<Result<Vec<_>>>()
            .map(Value::List)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Value {
        Value::List(values.iter().copied().map(Value::Int).collect())
    }

    #[test]
    fn type_names_round_trip() {
        for dtype in DType::ALL {
            assert_eq!(DType::from_type_name(dtype.type_name()), Some(dtype));
        }
        assert_eq!(DType::from_type_name("complex128"), None);
        assert_eq!(DType::Float32.item_size(), 4);
        assert_eq!(DType::UInt64.to_string(), "uint64");
    }

    #[test]
    fn new_rejects_mismatched_length() {
        let err = NdArray::new(DType::Int32, vec![2, 3], MemoryOrder::RowMajor, vec![0u8; 20])
            .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArray(_)));

        let err = NdArray::new(
            DType::UInt8,
            vec![usize::MAX, 2],
            MemoryOrder::RowMajor,
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, CodecError::InvalidArray(_)));
    }

    #[test]
    fn from_vec_is_one_dimensional() {
        let array = NdArray::from_vec(&[1.5f64, 2.5]);
        assert_eq!(array.dtype(), DType::Float64);
        assert_eq!(array.shape(), &[2]);
        assert_eq!(array.byte_len(), 16);
        assert_eq!(array.element_count(), 2);
        assert_eq!(
            array.to_nested().unwrap(),
            Value::List(vec![Value::Float(1.5), Value::Float(2.5)])
        );
    }

    #[test]
    fn row_major_expansion() {
        let array =
            NdArray::from_elements(&[1i32, 2, 3, 4, 5, 6], vec![2, 3], MemoryOrder::RowMajor)
                .unwrap();
        assert_eq!(
            array.to_nested().unwrap(),
            Value::List(vec![ints(&[1, 2, 3]), ints(&[4, 5, 6])])
        );
    }

    #[test]
    fn column_major_expansion_follows_logical_index() {
        // Logical [[1, 2, 3], [4, 5, 6]] stored column by column.
        let array =
            NdArray::from_elements(&[1i16, 4, 2, 5, 3, 6], vec![2, 3], MemoryOrder::ColumnMajor)
                .unwrap();
        assert_eq!(
            array.to_nested().unwrap(),
            Value::List(vec![ints(&[1, 2, 3]), ints(&[4, 5, 6])])
        );
    }

    #[test]
    fn scalar_and_empty_arrays() {
        let scalar = NdArray::from_elements(&[true], vec![], MemoryOrder::RowMajor).unwrap();
        assert_eq!(scalar.to_nested().unwrap(), Value::Bool(true));

        let empty = NdArray::from_elements::<u8>(&[], vec![0, 4], MemoryOrder::RowMajor).unwrap();
        assert_eq!(empty.to_nested().unwrap(), Value::List(vec![]));
    }

    #[test]
    fn large_uint64_has_no_scalar_form() {
        let array = NdArray::from_vec(&[1u64, u64::MAX]);
        let err = array.to_nested().unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedType(_)));
    }

    #[test]
    fn memory_order_codes() {
        assert_eq!(MemoryOrder::default().code(), "C");
        assert_eq!(MemoryOrder::from_code("F"), Some(MemoryOrder::ColumnMajor));
        assert_eq!(MemoryOrder::from_code("A"), None);
    }
}
