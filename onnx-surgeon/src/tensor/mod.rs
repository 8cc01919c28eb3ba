//! Constant tensors embedded in a graph and the payloads used to rewrite them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::{
    error::{Result, SurgeryError},
    proto::data_type,
};

/// Element kind of a tensor, numbered as in `TensorProto.DataType`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter,
)]
#[repr(i32)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Float = data_type::FLOAT,
    UInt8 = data_type::UINT8,
    Int8 = data_type::INT8,
    UInt16 = data_type::UINT16,
    Int16 = data_type::INT16,
    Int32 = data_type::INT32,
    Int64 = data_type::INT64,
    String = data_type::STRING,
    Bool = data_type::BOOL,
    Float16 = data_type::FLOAT16,
    Double = data_type::DOUBLE,
    UInt32 = data_type::UINT32,
    UInt64 = data_type::UINT64,
    Complex64 = data_type::COMPLEX64,
    Complex128 = data_type::COMPLEX128,
    BFloat16 = data_type::BFLOAT16,
    Float8E4M3FN = data_type::FLOAT8E4M3FN,
    Float8E4M3FNUZ = data_type::FLOAT8E4M3FNUZ,
    Float8E5M2 = data_type::FLOAT8E5M2,
    Float8E5M2FNUZ = data_type::FLOAT8E5M2FNUZ,
    UInt4 = data_type::UINT4,
    Int4 = data_type::INT4,
    Float4E2M1 = data_type::FLOAT4E2M1,
}

impl ElementKind {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::iter().find(|kind| kind.code() == code)
    }

    /// Encoded width of one element in `raw_data`, `None` for strings and
    /// for the 4-bit kinds, which pack two elements per byte.
    pub fn width(self) -> Option<usize> {
        use ElementKind::*;
        match self {
            UInt8 | Int8 | Bool => Some(1),
            Float8E4M3FN | Float8E4M3FNUZ | Float8E5M2 | Float8E5M2FNUZ => Some(1),
            UInt4 | Int4 | Float4E2M1 => None,
            UInt16 | Int16 | Float16 | BFloat16 => Some(2),
            Float | Int32 | UInt32 => Some(4),
            Int64 | Double | UInt64 | Complex64 => Some(8),
            Complex128 => Some(16),
            String => None,
        }
    }

    /// Little-endian encoding of the value one, `None` for strings.
    pub fn one(self) -> Option<Vec<u8>> {
        use ElementKind::*;
        let bytes = match self {
            Float => 1f32.to_le_bytes().to_vec(),
            Double => 1f64.to_le_bytes().to_vec(),
            UInt8 | Int8 | Bool => vec![1],
            UInt16 | Int16 => 1u16.to_le_bytes().to_vec(),
            Int32 | UInt32 => 1u32.to_le_bytes().to_vec(),
            Int64 | UInt64 => 1u64.to_le_bytes().to_vec(),
            Float16 => 0x3C00u16.to_le_bytes().to_vec(),
            BFloat16 => 0x3F80u16.to_le_bytes().to_vec(),
            Float8E4M3FN => vec![0x38],
            Float8E5M2 => vec![0x3C],
            Float8E4M3FNUZ | Float8E5M2FNUZ => vec![0x40],
            UInt4 | Int4 | Float4E2M1 => return None,
            Complex64 => [1f32.to_le_bytes(), 0f32.to_le_bytes()].concat(),
            Complex128 => [1f64.to_le_bytes(), 0f64.to_le_bytes()].concat(),
            String => return None,
        };
        Some(bytes)
    }

    fn is_complex(self) -> bool {
        matches!(self, ElementKind::Complex64 | ElementKind::Complex128)
    }

    /// 4-bit kinds, stored two elements to a byte.
    pub fn is_packed(self) -> bool {
        matches!(
            self,
            ElementKind::UInt4 | ElementKind::Int4 | ElementKind::Float4E2M1
        )
    }

    /// Length of `raw_data` holding `count` elements, `None` for strings.
    pub fn raw_len(self, count: usize) -> Option<usize> {
        if self.is_packed() {
            return Some(count.div_ceil(2));
        }
        self.width().map(|w| w * count)
    }
}

/// The stored representation of a constant's data.
///
/// Mirrors the mutually exclusive storage fields of `TensorProto`. Exactly one
/// is populated; an empty tensor is stored as an empty `Raw` buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Raw(Vec<u8>),
    /// `float_data`: FLOAT, COMPLEX64 (two entries per element).
    Floats(Vec<f32>),
    /// `int32_data`: every integer kind up to 32 bits, BOOL, FLOAT16, BFLOAT16
    /// and the 8-bit floats, one element per entry; the 4-bit kinds two
    /// elements per entry.
    Int32s(Vec<i32>),
    Int64s(Vec<i64>),
    /// `double_data`: DOUBLE, COMPLEX128 (two entries per element).
    Doubles(Vec<f64>),
    /// `uint64_data`: UINT32, UINT64.
    UInt64s(Vec<u64>),
    Strings(Vec<Vec<u8>>),
}

impl Payload {
    fn label(&self) -> &'static str {
        match self {
            Payload::Raw(_) => "raw_data",
            Payload::Floats(_) => "float_data",
            Payload::Int32s(_) => "int32_data",
            Payload::Int64s(_) => "int64_data",
            Payload::Doubles(_) => "double_data",
            Payload::UInt64s(_) => "uint64_data",
            Payload::Strings(_) => "string_data",
        }
    }

    fn len(&self) -> usize {
        match self {
            Payload::Raw(v) => v.len(),
            Payload::Floats(v) => v.len(),
            Payload::Int32s(v) => v.len(),
            Payload::Int64s(v) => v.len(),
            Payload::Doubles(v) => v.len(),
            Payload::UInt64s(v) => v.len(),
            Payload::Strings(v) => v.len(),
        }
    }

    /// Number of entries this representation needs for `count` elements of
    /// `kind`, or `None` if the representation cannot hold that kind.
    fn expected_len(&self, kind: ElementKind, count: usize) -> Option<usize> {
        use ElementKind::*;
        let per_element = if kind.is_complex() { 2 } else { 1 };
        match self {
            Payload::Raw(_) => kind.raw_len(count),
            Payload::Int32s(_) if kind.is_packed() => Some(count.div_ceil(2)),
            Payload::Floats(_) => matches!(kind, Float | Complex64).then_some(count * per_element),
            Payload::Int32s(_) => matches!(
                kind,
                Int32
                    | Int16
                    | Int8
                    | UInt16
                    | UInt8
                    | Bool
                    | Float16
                    | BFloat16
                    | Float8E4M3FN
                    | Float8E4M3FNUZ
                    | Float8E5M2
                    | Float8E5M2FNUZ
            )
            .then_some(count),
            Payload::Int64s(_) => (kind == Int64).then_some(count),
            Payload::Doubles(_) => {
                matches!(kind, Double | Complex128).then_some(count * per_element)
            }
            Payload::UInt64s(_) => matches!(kind, UInt32 | UInt64).then_some(count),
            Payload::Strings(_) => (kind == String).then_some(count),
        }
    }
}

/// A named tensor whose data is embedded in the graph (an initializer).
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    pub name: String,
    pub kind: ElementKind,
    pub dims: Vec<i64>,
    pub payload: Payload,
    pub doc_string: String,
}

impl Constant {
    /// Builds a constant stored as raw little-endian bytes.
    pub fn from_data(name: impl Into<String>, dims: Vec<i64>, data: TensorData) -> Self {
        Self {
            name: name.into(),
            kind: data.kind(),
            dims,
            payload: Payload::Raw(data.to_le_bytes()),
            doc_string: String::new(),
        }
    }

    pub fn element_count(&self) -> Result<usize> {
        element_count(&self.dims)
    }

    /// The raw byte buffer, if that is the active representation.
    pub fn raw_data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Checks that the payload length agrees with the recorded shape.
    pub fn validate(&self) -> Result<()> {
        let count = self.element_count()?;
        let expected = self.payload.expected_len(self.kind, count).ok_or_else(|| {
            SurgeryError::precondition(format!(
                "constant `{}` of kind {} cannot be stored in {}",
                self.name,
                self.kind,
                self.payload.label()
            ))
        })?;
        let actual = self.payload.len();
        if actual != expected {
            return Err(SurgeryError::precondition(format!(
                "constant `{}` has {actual} {} entries, shape {:?} needs {expected}",
                self.name,
                self.payload.label(),
                self.dims
            )));
        }
        Ok(())
    }
}

/// Element count implied by a dimension list; a scalar has one element.
pub fn element_count(dims: &[i64]) -> Result<usize> {
    dims.iter().try_fold(1usize, |acc, &d| {
        let d = usize::try_from(d)
            .map_err(|_| SurgeryError::precondition(format!("negative dimension in {dims:?}")))?;
        acc.checked_mul(d)
            .ok_or_else(|| SurgeryError::precondition(format!("shape {dims:?} overflows")))
    })
}

/// Typed data supplied by a caller to overwrite a constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum TensorData {
    Float(Vec<f32>),
    Double(Vec<f64>),
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    #[serde(rename = "uint8")]
    UInt8(Vec<u8>),
    #[serde(rename = "uint16")]
    UInt16(Vec<u16>),
    #[serde(rename = "uint32")]
    UInt32(Vec<u32>),
    #[serde(rename = "uint64")]
    UInt64(Vec<u64>),
    Bool(Vec<bool>),
    /// Pre-encoded little-endian elements for kinds without a native Rust
    /// type (FLOAT16, BFLOAT16, complex).
    Encoded { kind: ElementKind, bytes: Vec<u8> },
}

macro_rules! le_bytes {
    ($values:expr) => {
        $values.iter().flat_map(|v| v.to_le_bytes()).collect()
    };
}

impl TensorData {
    pub fn kind(&self) -> ElementKind {
        match self {
            TensorData::Float(_) => ElementKind::Float,
            TensorData::Double(_) => ElementKind::Double,
            TensorData::Int8(_) => ElementKind::Int8,
            TensorData::Int16(_) => ElementKind::Int16,
            TensorData::Int32(_) => ElementKind::Int32,
            TensorData::Int64(_) => ElementKind::Int64,
            TensorData::UInt8(_) => ElementKind::UInt8,
            TensorData::UInt16(_) => ElementKind::UInt16,
            TensorData::UInt32(_) => ElementKind::UInt32,
            TensorData::UInt64(_) => ElementKind::UInt64,
            TensorData::Bool(_) => ElementKind::Bool,
            TensorData::Encoded { kind, .. } => *kind,
        }
    }

    /// Number of elements, or `None` when encoded bytes do not divide evenly.
    pub fn len(&self) -> Option<usize> {
        let len = match self {
            TensorData::Float(v) => v.len(),
            TensorData::Double(v) => v.len(),
            TensorData::Int8(v) => v.len(),
            TensorData::Int16(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::UInt8(v) => v.len(),
            TensorData::UInt16(v) => v.len(),
            TensorData::UInt32(v) => v.len(),
            TensorData::UInt64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
            TensorData::Encoded { kind, bytes } => {
                let width = kind.width()?;
                if bytes.len() % width != 0 {
                    return None;
                }
                bytes.len() / width
            }
        };
        Some(len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            TensorData::Float(v) => le_bytes!(v),
            TensorData::Double(v) => le_bytes!(v),
            TensorData::Int8(v) => le_bytes!(v),
            TensorData::Int16(v) => le_bytes!(v),
            TensorData::Int32(v) => le_bytes!(v),
            TensorData::Int64(v) => le_bytes!(v),
            TensorData::UInt8(v) => v.clone(),
            TensorData::UInt16(v) => le_bytes!(v),
            TensorData::UInt32(v) => le_bytes!(v),
            TensorData::UInt64(v) => le_bytes!(v),
            TensorData::Bool(v) => v.iter().map(|&b| u8::from(b)).collect(),
            TensorData::Encoded { bytes, .. } => bytes.clone(),
        }
    }
}

/// Uniform fill used when no explicit payload is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Ones,
    Zeros,
}
