//! Primitive interface to a hierarchical storage engine.
//!
//! A storage engine keeps a file of nested *groups* holding typed,
//! N-dimensional *datasets*. Everything the accessor layer needs from it is
//! expressed by the [`Engine`] trait: a flat set of handle-based primitives
//! modelled on the classic HDF5 C API. Handles are plain [`Hid`] values and
//! must be released with the close primitive matching their category.
//!
//! [`MemoryEngine`] is an in-process implementation that keeps open files in
//! memory and persists them either to disk or to a per-engine volatile store.
//!
//! ```no_run
//! use rustyhdf5_engine::{Engine, MemoryEngine, Shape, TypeClass, WriteBuffer};
//!
//! let engine = MemoryEngine::new();
//! let file = engine.file_create("data.rh5".as_ref()).unwrap();
//! let root = engine.group_open_root(file).unwrap();
//! let space = engine.dataspace_create(&Shape::vector(3)).unwrap();
//! let ds = engine.dataset_create(root, "x", TypeClass::Float, space).unwrap();
//! engine.dataset_write(ds, WriteBuffer::Float(&[1.0, 2.0, 3.0])).unwrap();
//! engine.dataset_close(ds).unwrap();
//! engine.dataspace_close(space).unwrap();
//! engine.group_close(root).unwrap();
//! engine.file_close(file).unwrap();
//! ```

use std::path::Path;

pub mod error;
pub mod memory;
pub mod types;

pub use error::{EngineError, EngineResult};
pub use memory::{MemoryEngine, Persistence};
pub use types::{Hid, ObjectKind, OpenMode, ReadBuffer, Shape, TypeClass, WriteBuffer};

/// Handle-based primitives of a hierarchical storage engine.
///
/// All methods take `&self`: an engine behaves like a process-wide library
/// with its own internal bookkeeping, and callers share it freely within one
/// thread. Every primitive either completes or fails before returning.
pub trait Engine {
    // -- files ---------------------------------------------------------------

    /// Create `path`, truncating any existing file, and open it read-write.
    fn file_create(&self, path: &Path) -> EngineResult<Hid>;

    /// Open an existing file.
    fn file_open(&self, path: &Path, mode: OpenMode) -> EngineResult<Hid>;

    /// Release a file handle.
    fn file_close(&self, file: Hid) -> EngineResult<()>;

    /// Number of open file, group and dataset handles into the file behind
    /// `file`, including `file` itself.
    fn file_object_count(&self, file: Hid) -> EngineResult<usize>;

    // -- groups --------------------------------------------------------------

    /// Open the root group of the file behind `file`.
    fn group_open_root(&self, file: Hid) -> EngineResult<Hid>;

    /// Create and open a new child group. Fails if `name` is already linked.
    fn group_create(&self, parent: Hid, name: &str) -> EngineResult<Hid>;

    /// Open the child group linked as `name`. Fails if it is not a group.
    fn group_open(&self, parent: Hid, name: &str) -> EngineResult<Hid>;

    /// Release a group handle.
    fn group_close(&self, group: Hid) -> EngineResult<()>;

    // -- links ---------------------------------------------------------------

    /// Number of links directly under `group`.
    fn link_count(&self, group: Hid) -> EngineResult<usize>;

    /// Name of the link at `index` in the engine's enumeration order.
    fn link_name(&self, group: Hid, index: usize) -> EngineResult<String>;

    /// Returns `true` if `name` is linked directly under `group`.
    fn link_exists(&self, group: Hid, name: &str) -> EngineResult<bool>;

    /// Unlink `name`; the object behind it is dropped with its subtree.
    fn link_delete(&self, group: Hid, name: &str) -> EngineResult<()>;

    // -- objects -------------------------------------------------------------

    /// Open the object linked as `name`, whatever its kind.
    fn object_open(&self, group: Hid, name: &str) -> EngineResult<Hid>;

    /// Kind of the object behind an open group or dataset handle.
    fn object_kind(&self, object: Hid) -> EngineResult<ObjectKind>;

    /// Release a handle from `object_open`, whatever its kind.
    fn object_close(&self, object: Hid) -> EngineResult<()>;

    // -- dataspaces ----------------------------------------------------------

    /// Open a dataspace handle describing `shape`.
    fn dataspace_create(&self, shape: &Shape) -> EngineResult<Hid>;

    /// Extents held by a dataspace handle.
    fn dataspace_shape(&self, space: Hid) -> EngineResult<Shape>;

    /// Release a dataspace handle.
    fn dataspace_close(&self, space: Hid) -> EngineResult<()>;

    // -- datasets ------------------------------------------------------------

    /// Create and open a dataset whose extents are taken from `space`. Fails
    /// with `InvalidDataspace` when the element count overflows or exceeds
    /// what the engine can hold.
    fn dataset_create(
        &self,
        parent: Hid,
        name: &str,
        class: TypeClass,
        space: Hid,
    ) -> EngineResult<Hid>;

    /// Open a new dataspace handle describing the dataset's extents.
    fn dataset_space(&self, dataset: Hid) -> EngineResult<Hid>;

    /// Type class of the stored elements.
    fn dataset_type_class(&self, dataset: Hid) -> EngineResult<TypeClass>;

    /// Bytes of storage the payload occupies. Text elements count their
    /// NUL terminator.
    fn dataset_storage_size(&self, dataset: Hid) -> EngineResult<u64>;

    /// Read the whole payload into `buffer`.
    fn dataset_read(&self, dataset: Hid, buffer: ReadBuffer<'_>) -> EngineResult<()>;

    /// Overwrite the whole payload from `buffer`.
    fn dataset_write(&self, dataset: Hid, buffer: WriteBuffer<'_>) -> EngineResult<()>;

    /// Release a dataset handle.
    fn dataset_close(&self, dataset: Hid) -> EngineResult<()>;

    // -- attributes ----------------------------------------------------------

    /// Attach (or replace) a string attribute on a group or dataset.
    fn attr_write_string(&self, object: Hid, key: &str, value: &str) -> EngineResult<()>;

    /// Value of a string attribute, `None` if `key` is unset.
    fn attr_read_string(&self, object: Hid, key: &str) -> EngineResult<Option<String>>;

    // -- diagnostics ---------------------------------------------------------

    /// Text of the most recent primitive failure, empty if none occurred.
    fn last_error_message(&self) -> String;
}
