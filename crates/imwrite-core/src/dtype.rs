//! Element types for compute precision and written output.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric element type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    U8,
    U16,
    I16,
    I32,
    F32,
    F64,
}

impl DType {
    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    /// Size of one element in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::U8 => 1,
            DType::U16 | DType::I16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::F32 => "float32",
            DType::F64 => "float64",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Owned array tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    F64(ArrayD<f64>),
}

/// Apply the same array expression to whichever variant is held.
macro_rules! map_variants {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            TypedArray::U8($arr) => TypedArray::U8($body),
            TypedArray::U16($arr) => TypedArray::U16($body),
            TypedArray::I16($arr) => TypedArray::I16($body),
            TypedArray::I32($arr) => TypedArray::I32($body),
            TypedArray::F32($arr) => TypedArray::F32($body),
            TypedArray::F64($arr) => TypedArray::F64($body),
        }
    };
}

impl TypedArray {
    /// Cast `data` to `dtype`.
    ///
    /// Float to integer casts truncate toward zero and saturate at the
    /// type bounds; NaN becomes zero.
    pub fn from_f64(data: ArrayD<f64>, dtype: DType) -> Self {
        match dtype {
            DType::U8 => Self::U8(data.mapv(|v| v as u8)),
            DType::U16 => Self::U16(data.mapv(|v| v as u16)),
            DType::I16 => Self::I16(data.mapv(|v| v as i16)),
            DType::I32 => Self::I32(data.mapv(|v| v as i32)),
            DType::F32 => Self::F32(data.mapv(|v| v as f32)),
            DType::F64 => Self::F64(data),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Self::U8(_) => DType::U8,
            Self::U16(_) => DType::U16,
            Self::I16(_) => DType::I16,
            Self::I32(_) => DType::I32,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(a) => a.shape(),
            Self::U16(a) => a.shape(),
            Self::I16(a) => a.shape(),
            Self::I32(a) => a.shape(),
            Self::F32(a) => a.shape(),
            Self::F64(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Widen every element to `f64`.
    pub fn to_f64(&self) -> ArrayD<f64> {
        match self {
            Self::U8(a) => a.mapv(f64::from),
            Self::U16(a) => a.mapv(f64::from),
            Self::I16(a) => a.mapv(f64::from),
            Self::I32(a) => a.mapv(f64::from),
            Self::F32(a) => a.mapv(f64::from),
            Self::F64(a) => a.clone(),
        }
    }

    /// Cast to another element type, returning `self` when it already matches.
    pub fn cast(self, dtype: DType) -> Self {
        if self.dtype() == dtype {
            self
        } else {
            Self::from_f64(self.to_f64(), dtype)
        }
    }

    /// Permute axes and return a standard-layout copy.
    pub fn permuted(self, axes: &[usize]) -> Self {
        map_variants!(self, a => a.permuted_axes(IxDyn(axes)).as_standard_layout().into_owned())
    }

    /// Swap two axes and return a standard-layout copy.
    pub fn swapped(self, ax0: usize, ax1: usize) -> Self {
        map_variants!(self, a => {
            let mut a = a;
            a.swap_axes(ax0, ax1);
            a.as_standard_layout().into_owned()
        })
    }

    /// Little-endian bytes in logical (row-major) order.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.shape().iter().product::<usize>() * self.dtype().size_of());
        match self {
            Self::U8(a) => out.extend(a.iter().copied()),
            Self::U16(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::I16(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::I32(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::F32(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
            Self::F64(a) => a.iter().for_each(|v| out.extend_from_slice(&v.to_le_bytes())),
        }
        out
    }
}
