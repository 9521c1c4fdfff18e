//! Session facade over one open file.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use ndarray::{Array, Array2, Dimension};
use rustyhdf5_engine::{Engine, EngineError, Hid, MemoryEngine, ObjectKind, OpenMode, TypeClass};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::navigator::GroupNavigator;
use crate::options::SessionOptions;
use crate::probe::DatasetDescriptor;
use crate::typed_io::{StoreValue, TypedIo};

/// One node found by [`Session::walk`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    /// Absolute path of the node.
    pub path: String,
    /// Group, dataset or another object kind.
    pub kind: ObjectKind,
    /// Set for datasets.
    pub dataset: Option<DatasetDescriptor>,
}

/// An open file plus a navigation stack and typed accessors.
///
/// The session owns the file handle. Creating or opening another file closes
/// the current one first. Dropping an open session closes it; failures at
/// that point are only logged.
pub struct Session<E: Engine = MemoryEngine> {
    engine: Rc<E>,
    path: Option<PathBuf>,
    io: TypedIo<E>,
    nav: GroupNavigator<E>,
    file: HandleGuard<E>,
}

impl Default for Session<MemoryEngine> {
    fn default() -> Self {
        Self::new(Rc::new(MemoryEngine::new()))
    }
}

impl<E: Engine> Session<E> {
    /// A closed session with default options.
    pub fn new(engine: Rc<E>) -> Self {
        Self::with_options(engine, SessionOptions::default())
    }

    /// A closed session applying `options` to every transfer.
    pub fn with_options(engine: Rc<E>, options: SessionOptions) -> Self {
        Self {
            io: TypedIo::new(Rc::clone(&engine), options),
            nav: GroupNavigator::new(Rc::clone(&engine)),
            file: HandleGuard::empty(Rc::clone(&engine), E::file_close),
            path: None,
            engine,
        }
    }

    /// The shared engine.
    pub fn engine(&self) -> &Rc<E> {
        &self.engine
    }

    /// Options applied to every transfer.
    pub fn options(&self) -> &SessionOptions {
        self.io.options()
    }

    /// Path of the open file.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // -- lifecycle -----------------------------------------------------------

    /// Create `path`, truncating any existing file, and enter its root group.
    pub fn create(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.close()?;
        let raw = self.engine.file_create(path)?;
        self.attach(path, raw)?;
        debug!(path = %path.display(), "created store");
        Ok(())
    }

    /// Open an existing file and enter its root group.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        let path = path.as_ref();
        self.close()?;
        let raw = self.engine.file_open(path, mode).map_err(|e| match e {
            EngineError::FileNotFound(p) => Error::FileNotFound(p),
            other => Error::Engine(other),
        })?;
        self.attach(path, raw)?;
        debug!(path = %path.display(), ?mode, "opened store");
        Ok(())
    }

    fn attach(&mut self, path: &Path, raw: Hid) -> Result<()> {
        self.file.reset(raw)?;
        if let Err(e) = self.nav.push_root(raw) {
            self.file.release()?;
            return Err(e);
        }
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Returns `true` while a file is open.
    pub fn is_open(&self) -> bool {
        self.file.is_valid() && !self.nav.is_empty()
    }

    /// Release every handle of the session, innermost first.
    ///
    /// Only the file handle may remain open into the file once the
    /// navigation stack and the last written dataset are released. If
    /// anything else is still open, `ResourceLeak` is returned and the file
    /// handle is kept, so `close` can be retried after the other holder has
    /// released its handles. Closing a closed session is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if !self.file.is_valid() {
            return Ok(());
        }
        self.io.release_last_written()?;
        self.nav.clear()?;
        let open = self.engine.file_object_count(self.file.raw())?;
        if open != 1 {
            if self.options().check_leaks {
                return Err(Error::ResourceLeak { open });
            }
            warn!(open, "closing store with objects still open");
        }
        self.file.release()?;
        if let Some(path) = self.path.take() {
            debug!(path = %path.display(), "closed store");
        }
        Ok(())
    }

    fn file(&self) -> Result<Hid> {
        if !self.file.is_valid() {
            return Err(Error::NotOpen);
        }
        Ok(self.file.raw())
    }

    /// Open file, group and dataset handles into the session's file,
    /// including the file handle itself.
    pub fn open_object_count(&self) -> Result<usize> {
        Ok(self.engine.file_object_count(self.file()?)?)
    }

    /// Diagnostic text of the engine's most recent failure.
    pub fn last_error(&self) -> String {
        self.engine.last_error_message()
    }

    // -- navigation ----------------------------------------------------------

    /// Absolute path of the current group.
    pub fn current_path(&self) -> String {
        self.nav.current_path()
    }

    /// Number of groups on the navigation stack, root included.
    pub fn depth(&self) -> usize {
        self.nav.depth()
    }

    /// Enter the child group `name`. Returns `false` if it is not a group.
    pub fn descend(&mut self, name: &str) -> bool {
        self.nav.descend(name)
    }

    /// Return to the parent group.
    pub fn ascend(&mut self) -> Result<()> {
        self.nav.ascend()
    }

    /// Create the child group `name`, entering it when `also_descend` is set.
    pub fn create_group(&mut self, name: &str, also_descend: bool) -> bool {
        self.nav.create_group(name, also_descend)
    }

    /// Names of the current group's children of the selected kinds.
    pub fn list(&self, groups: bool, datasets: bool) -> Result<Vec<String>> {
        self.nav.list(groups, datasets)
    }

    /// Names of every child group and dataset.
    pub fn list_all(&self) -> Result<Vec<String>> {
        self.nav.list(true, true)
    }

    /// Names of the child groups.
    pub fn list_groups(&self) -> Result<Vec<String>> {
        self.nav.list(true, false)
    }

    /// Names of the child datasets.
    pub fn list_datasets(&self) -> Result<Vec<String>> {
        self.nav.list(false, true)
    }

    /// Returns `true` if `name` is a child of the given kind.
    pub fn exists(&self, name: &str, kind: ObjectKind) -> bool {
        self.nav.exists(name, kind)
    }

    /// Returns `true` if `name` is a child group.
    pub fn exists_group(&self, name: &str) -> bool {
        self.nav.exists(name, ObjectKind::Group)
    }

    /// Returns `true` if `name` is a child dataset.
    pub fn exists_dataset(&self, name: &str) -> bool {
        self.nav.exists(name, ObjectKind::Dataset)
    }

    /// Unlink the child `name`. Returns `false` if it does not exist.
    pub fn delete(&mut self, name: &str) -> bool {
        self.nav.delete(name)
    }

    /// Depth-first listing of everything below the current group. The
    /// session is back in the starting group when this returns.
    pub fn walk(&mut self) -> Result<Vec<TreeEntry>> {
        let mut out = Vec::new();
        self.walk_into(&mut out)?;
        Ok(out)
    }

    fn walk_into(&mut self, out: &mut Vec<TreeEntry>) -> Result<()> {
        let here = self.nav.current_path();
        for name in self.nav.list(true, true)? {
            let path = if here == "/" {
                format!("/{name}")
            } else {
                format!("{here}/{name}")
            };
            let kind = self.nav.probe()?.kind_of(&name)?;
            match kind {
                ObjectKind::Dataset => {
                    let dataset = self.nav.probe()?.describe(&name)?;
                    out.push(TreeEntry {
                        path,
                        kind,
                        dataset: Some(dataset),
                    });
                }
                ObjectKind::Group => {
                    out.push(TreeEntry {
                        path,
                        kind,
                        dataset: None,
                    });
                    if self.nav.descend(&name) {
                        let inner = self.walk_into(out);
                        self.nav.ascend()?;
                        inner?;
                    }
                }
                _ => out.push(TreeEntry {
                    path,
                    kind,
                    dataset: None,
                }),
            }
        }
        Ok(())
    }

    // -- typed access --------------------------------------------------------

    /// Read a one-element integer dataset.
    pub fn get_int(&self, name: &str) -> Result<i32> {
        self.io.get_int(self.nav.current()?, name)
    }

    /// Read a one-element float dataset.
    pub fn get_double(&self, name: &str) -> Result<f64> {
        self.io.get_double(self.nav.current()?, name)
    }

    /// Read a one-element string dataset.
    pub fn get_string(&self, name: &str) -> Result<String> {
        self.io.get_string(self.nav.current()?, name)
    }

    /// Read every element of a string dataset.
    pub fn get_strings(&self, name: &str) -> Result<Vec<String>> {
        self.io.get_strings(self.nav.current()?, name)
    }

    /// Read element 0 of a non-empty string dataset.
    pub fn get_string_first(&self, name: &str) -> Result<String> {
        self.io.get_string_first(self.nav.current()?, name)
    }

    /// Read a rank-1 float dataset.
    pub fn get_vector(&self, name: &str) -> Result<Vec<f64>> {
        self.io.get_vector(self.nav.current()?, name)
    }

    /// Read a rank-2 float dataset in the configured host order.
    pub fn get_matrix(&self, name: &str) -> Result<Array2<f64>> {
        self.io.get_matrix(self.nav.current()?, name)
    }

    /// Read a float tensor in the configured host order.
    pub fn get_array<D: Dimension>(&self, name: &str) -> Result<Array<f64, D>> {
        self.io.get_array(self.nav.current()?, name)
    }

    /// Store `value` as `name` in the current group, replacing any existing child.
    pub fn set<V: StoreValue>(&mut self, name: &str, value: V) -> Result<()> {
        let group = self.nav.current()?;
        self.io.set(group, name, value)
    }

    /// Attach a `description` attribute to the most recently written
    /// dataset. `None` does nothing.
    pub fn set_description(&self, description: Option<&str>) -> Result<()> {
        self.io.set_description(description)
    }

    /// Attach a `units` attribute to the most recently written dataset.
    pub fn set_units(&self, units: Option<&str>) -> Result<()> {
        self.io.set_units(units)
    }

    /// String attribute `key` of the dataset `name`, `None` if unset.
    pub fn attribute(&self, name: &str, key: &str) -> Result<Option<String>> {
        self.io.attribute(self.nav.current()?, name, key)
    }

    /// Type class of the dataset `name`.
    pub fn type_class(&self, name: &str) -> Result<TypeClass> {
        self.io.type_class(self.nav.current()?, name)
    }

    /// Kind, type class and shape of the dataset `name`.
    pub fn describe(&self, name: &str) -> Result<DatasetDescriptor> {
        self.io.describe(self.nav.current()?, name)
    }
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close store on drop");
        }
    }
}
