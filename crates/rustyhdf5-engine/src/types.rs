//! Primitive value types exchanged across the engine boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to an open engine resource.
///
/// Engines never issue [`Hid::INVALID`]; passing it to any primitive fails
/// with an invalid-handle error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hid(u64);

impl Hid {
    /// The sentinel "no handle" value.
    pub const INVALID: Hid = Hid(0);

    /// Wrap a raw engine identifier.
    pub const fn from_raw(raw: u64) -> Self {
        Hid(raw)
    }

    /// The raw engine identifier.
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is [`Hid::INVALID`].
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for Hid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hid:{}", self.0)
    }
}

/// Kind of a linked object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A group holding further links.
    Group,
    /// A dataset with a dataspace and a payload.
    Dataset,
    /// A committed datatype.
    NamedType,
    /// Anything the engine cannot classify.
    Other,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Group => write!(f, "group"),
            ObjectKind::Dataset => write!(f, "dataset"),
            ObjectKind::NamedType => write!(f, "named type"),
            ObjectKind::Other => write!(f, "other"),
        }
    }
}

/// Coarse value category of a dataset, independent of bit width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeClass {
    /// Signed integers of any width.
    Integer,
    /// IEEE floating point of any width.
    Float,
    /// Fixed or variable length strings.
    String,
    /// Compound, enum, opaque and every other class.
    Other,
}

impl fmt::Display for TypeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeClass::Integer => write!(f, "integer"),
            TypeClass::Float => write!(f, "float"),
            TypeClass::String => write!(f, "string"),
            TypeClass::Other => write!(f, "other"),
        }
    }
}

/// Access mode for [`Engine::file_open`](crate::Engine::file_open).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OpenMode {
    /// Reads only; mutating primitives fail.
    #[default]
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// Extent description of a dataspace.
///
/// `Scalar` holds exactly one element and has rank 0. `Simple` has rank
/// `extents.len()` (at least 1) and any non-negative extents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// Rank 0, one element.
    Scalar,
    /// Rank `extents.len()`, slowest axis first.
    Simple(Vec<u64>),
}

impl Shape {
    /// Shorthand for a one-dimensional simple shape.
    pub fn vector(len: u64) -> Self {
        Shape::Simple(vec![len])
    }

    /// Returns `true` for the rank-0 scalar dataspace.
    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    /// Number of axes (0 for a scalar dataspace).
    pub fn rank(&self) -> usize {
        self.extents().len()
    }

    /// Per-axis extents, empty for a scalar dataspace.
    pub fn extents(&self) -> &[u64] {
        match self {
            Shape::Scalar => &[],
            Shape::Simple(extents) => extents,
        }
    }

    /// Product of the extents; 1 for a scalar dataspace. `None` when the
    /// product overflows `u64`.
    pub fn element_count(&self) -> Option<u64> {
        self.extents().iter().try_fold(1u64, |acc, &n| acc.checked_mul(n))
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "scalar"),
            Shape::Simple(extents) => write!(f, "{extents:?}"),
        }
    }
}

/// Destination of a [`dataset_read`](crate::Engine::dataset_read).
///
/// Numeric buffers must hold exactly one slot per element. `Text` receives a
/// single NUL-terminated string and must be at least the per-element storage
/// size long. `TextArray` is cleared and filled with every element.
#[derive(Debug)]
pub enum ReadBuffer<'a> {
    Integer(&'a mut [i64]),
    Float(&'a mut [f64]),
    Text(&'a mut [u8]),
    TextArray(&'a mut Vec<String>),
}

impl ReadBuffer<'_> {
    /// Type class this buffer reads.
    pub fn class(&self) -> TypeClass {
        match self {
            ReadBuffer::Integer(_) => TypeClass::Integer,
            ReadBuffer::Float(_) => TypeClass::Float,
            ReadBuffer::Text(_) | ReadBuffer::TextArray(_) => TypeClass::String,
        }
    }
}

/// Source of a [`dataset_write`](crate::Engine::dataset_write), one entry per
/// element in row-major order.
#[derive(Debug, Clone, Copy)]
pub enum WriteBuffer<'a> {
    Integer(&'a [i64]),
    Float(&'a [f64]),
    Text(&'a [&'a str]),
}

impl WriteBuffer<'_> {
    /// Type class this buffer writes.
    pub fn class(&self) -> TypeClass {
        match self {
            WriteBuffer::Integer(_) => TypeClass::Integer,
            WriteBuffer::Float(_) => TypeClass::Float,
            WriteBuffer::Text(_) => TypeClass::String,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            WriteBuffer::Integer(v) => v.len(),
            WriteBuffer::Float(v) => v.len(),
            WriteBuffer::Text(v) => v.len(),
        }
    }

    /// Returns `true` when there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_counts() {
        assert_eq!(Shape::Scalar.element_count(), Some(1));
        assert_eq!(Shape::Scalar.rank(), 0);
        assert_eq!(Shape::Simple(vec![2, 3]).element_count(), Some(6));
        assert_eq!(Shape::Simple(vec![4, 0, 2]).element_count(), Some(0));
        assert_eq!(Shape::vector(5).extents(), &[5]);
    }

    #[test]
    fn overflowing_extents_have_no_count() {
        assert_eq!(Shape::Simple(vec![1 << 32, 1 << 32]).element_count(), None);
        assert_eq!(Shape::Simple(vec![1 << 32, 1 << 31]).element_count(), Some(1 << 63));
        // a zero axis still wins over a huge one
        assert_eq!(Shape::Simple(vec![0, u64::MAX, 2]).element_count(), Some(0));
    }

    #[test]
    fn display_impls() {
        assert_eq!(Shape::Scalar.to_string(), "scalar");
        assert_eq!(Shape::Simple(vec![2, 3]).to_string(), "[2, 3]");
        assert_eq!(TypeClass::Float.to_string(), "float");
        assert_eq!(ObjectKind::Dataset.to_string(), "dataset");
        assert_eq!(Hid::from_raw(7).to_string(), "hid:7");
    }

    #[test]
    fn invalid_hid() {
        assert!(!Hid::INVALID.is_valid());
        assert!(Hid::from_raw(1).is_valid());
    }
}
