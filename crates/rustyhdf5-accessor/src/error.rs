//! Error types for the accessor layer.

use std::path::PathBuf;

use rustyhdf5_engine::{EngineError, ObjectKind, Shape, TypeClass};

/// Errors raised by typed reads and writes, listing and session lifecycle.
///
/// Existence checks and navigation (`exists`, `descend`, `delete`,
/// `create_group`) report plain booleans instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The session has no open file.
    #[error("session is not open")]
    NotOpen,

    /// No child with this name in the current group.
    #[error("'{0}' not found in the current group")]
    NotFound(String),

    /// The child exists but is of the wrong kind.
    #[error("'{name}' is a {found}, expected a {expected}")]
    WrongKind {
        name: String,
        expected: ObjectKind,
        found: ObjectKind,
    },

    /// The dataset's type class does not match the requested host type.
    #[error("type mismatch for '{name}': expected {expected}, found {found}")]
    TypeMismatch {
        name: String,
        expected: TypeClass,
        found: TypeClass,
    },

    /// Element count or rank does not match the requested host type.
    #[error("shape mismatch for '{name}': expected {expected}, found {found}")]
    ShapeMismatch {
        name: String,
        expected: String,
        found: Shape,
    },

    /// A stored integer does not fit the requested host integer type.
    #[error("value {value} of '{name}' does not fit in {target}")]
    OutOfRange {
        name: String,
        value: i64,
        target: &'static str,
    },

    /// A flat buffer does not hold the number of elements its extents describe.
    #[error("buffer holds {found} elements, extents describe {expected}")]
    BufferLength { expected: usize, found: usize },

    /// An attribute was set before any dataset was written in this session.
    #[error("no dataset has been written yet")]
    NothingWritten,

    /// Attempt to ascend above the root group.
    #[error("cannot ascend above the root group")]
    AtRoot,

    /// `open` was given a path that does not exist.
    #[error("file '{}' does not exist", .0.display())]
    FileNotFound(PathBuf),

    /// Objects other than the file handle were still open at close.
    #[error("{open} objects still open at close, expected only the file")]
    ResourceLeak { open: usize },

    /// An engine primitive failed.
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
}

/// Result alias used throughout the accessor layer.
pub type Result<T> = std::result::Result<T, Error>;
