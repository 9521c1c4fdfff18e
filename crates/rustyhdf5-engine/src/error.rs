//! Error type reported by engine primitives.

use std::path::PathBuf;

use crate::types::{Hid, ObjectKind, TypeClass};

/// Failure of a single engine primitive.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The handle was never issued or has been released.
    #[error("invalid handle {0}")]
    InvalidHandle(Hid),

    /// The handle belongs to another category than the primitive expects.
    #[error("handle {handle} refers to a {actual}, expected a {expected}")]
    HandleCategory {
        handle: Hid,
        expected: &'static str,
        actual: &'static str,
    },

    /// The handle outlived the object it points to.
    #[error("object behind handle {0} no longer exists")]
    Dangling(Hid),

    /// No file at this path.
    #[error("file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// The file is already open in an incompatible mode.
    #[error("file '{}' is already open", .0.display())]
    FileBusy(PathBuf),

    /// A mutating primitive on a file opened read-only.
    #[error("file '{}' is open read-only", .0.display())]
    ReadOnly(PathBuf),

    /// No link of this name in the group.
    #[error("link '{0}' not found")]
    LinkNotFound(String),

    /// A link of this name is already present.
    #[error("link '{0}' already exists")]
    LinkExists(String),

    /// Empty names, `.` and names containing `/` are rejected.
    #[error("invalid link name '{0}'")]
    InvalidName(String),

    /// Enumeration index past the last link.
    #[error("link index {index} out of range ({count} links)")]
    LinkIndex { index: usize, count: usize },

    /// The linked object is of the wrong kind.
    #[error("'{name}' is a {actual}, not a {expected}")]
    WrongObject {
        name: String,
        expected: ObjectKind,
        actual: ObjectKind,
    },

    /// Malformed extents, or an element count the engine cannot hold.
    #[error("invalid dataspace: {0}")]
    InvalidDataspace(String),

    /// The engine cannot store this type class.
    #[error("unsupported type class {0}")]
    UnsupportedClass(TypeClass),

    /// The buffer class differs from the stored class.
    #[error("dataset holds {stored} values, buffer is {requested}")]
    ClassMismatch {
        stored: TypeClass,
        requested: TypeClass,
    },

    /// The buffer does not match the payload size.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSize { expected: usize, actual: usize },

    /// A persisted image failed validation.
    #[error("corrupt file image: {0}")]
    Corrupt(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bincode image could not be encoded or decoded.
    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// Result of an engine primitive.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
