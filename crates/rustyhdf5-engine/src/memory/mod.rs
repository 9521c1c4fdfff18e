//! In-process storage engine.
//!
//! Open files live in memory as a node tree. When the last handle into a
//! file is released the tree is flushed: written to disk as a bincode image
//! ([`Persistence::Disk`]) or parked in a map owned by the engine
//! ([`Persistence::Volatile`]) from which a later `file_open` picks it up.

mod image;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{EngineError, EngineResult};
use crate::types::{Hid, ObjectKind, OpenMode, ReadBuffer, Shape, TypeClass, WriteBuffer};
use crate::Engine;

use image::{DatasetNode, GroupNode, Image, Node, NodeId, Payload, MAX_ELEMENTS, ROOT};

/// Where [`MemoryEngine`] keeps closed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Persistence {
    /// Images are written to the given paths on the filesystem.
    #[default]
    Disk,
    /// Images stay in memory for the lifetime of the engine.
    Volatile,
}

/// Engine keeping open files in memory.
///
/// A dataset holds at most 2^28 elements; larger dataspaces are rejected by
/// `dataset_create` with `InvalidDataspace`.
pub struct MemoryEngine {
    state: RefCell<State>,
    last_error: RefCell<String>,
}

struct State {
    persistence: Persistence,
    files: HashMap<PathBuf, OpenFile>,
    parked: HashMap<PathBuf, Image>,
    handles: BTreeMap<Hid, Entry>,
    next_hid: u64,
}

struct OpenFile {
    image: Image,
    writable: bool,
    dirty: bool,
}

struct Entry {
    /// File the handle points into; `None` for dataspaces.
    file: Option<PathBuf>,
    target: Target,
}

enum Target {
    File,
    Group(NodeId),
    Dataset(NodeId),
    Dataspace(Shape),
}

impl Target {
    fn category(&self) -> &'static str {
        match self {
            Target::File => "file",
            Target::Group(_) => "group",
            Target::Dataset(_) => "dataset",
            Target::Dataspace(_) => "dataspace",
        }
    }
}

impl MemoryEngine {
    /// Engine persisting files to disk.
    pub fn new() -> Self {
        Self::with_persistence(Persistence::Disk)
    }

    /// Engine keeping closed files in memory only.
    pub fn volatile() -> Self {
        Self::with_persistence(Persistence::Volatile)
    }

    /// Engine keeping closed files as `persistence` says.
    pub fn with_persistence(persistence: Persistence) -> Self {
        Self {
            state: RefCell::new(State {
                persistence,
                files: HashMap::new(),
                parked: HashMap::new(),
                handles: BTreeMap::new(),
                next_hid: 1,
            }),
            last_error: RefCell::new(String::new()),
        }
    }

    /// Where closed files are kept.
    pub fn persistence(&self) -> Persistence {
        self.state.borrow().persistence
    }

    /// Number of handles of every category currently open.
    pub fn open_handle_count(&self) -> usize {
        self.state.borrow().handles.len()
    }

    /// Returns `true` while at least one handle points into `path`.
    pub fn is_file_open(&self, path: &Path) -> bool {
        self.state.borrow().files.contains_key(path)
    }

    fn record<T>(&self, op: impl FnOnce(&mut State) -> EngineResult<T>) -> EngineResult<T> {
        let result = op(&mut self.state.borrow_mut());
        if let Err(e) = &result {
            *self.last_error.borrow_mut() = e.to_string();
        }
        result
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryEngine")
            .field("persistence", &state.persistence)
            .field("open_files", &state.files.len())
            .field("open_handles", &state.handles.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// State helpers
// ---------------------------------------------------------------------------

impl State {
    fn issue(&mut self, file: Option<PathBuf>, target: Target) -> Hid {
        let hid = Hid::from_raw(self.next_hid);
        self.next_hid += 1;
        trace!(%hid, category = target.category(), "issued handle");
        self.handles.insert(hid, Entry { file, target });
        hid
    }

    fn entry(&self, hid: Hid) -> EngineResult<&Entry> {
        self.handles.get(&hid).ok_or(EngineError::InvalidHandle(hid))
    }

    fn wrong_category(&self, hid: Hid, expected: &'static str) -> EngineError {
        match self.handles.get(&hid) {
            Some(entry) => EngineError::HandleCategory {
                handle: hid,
                expected,
                actual: entry.target.category(),
            },
            None => EngineError::InvalidHandle(hid),
        }
    }

    fn file_path(&self, hid: Hid) -> EngineResult<PathBuf> {
        match self.entry(hid)? {
            Entry {
                file: Some(path),
                target: Target::File,
            } => Ok(path.clone()),
            _ => Err(self.wrong_category(hid, "file")),
        }
    }

    fn image(&self, path: &Path) -> EngineResult<&Image> {
        self.files
            .get(path)
            .map(|f| &f.image)
            .ok_or_else(|| EngineError::FileNotFound(path.to_path_buf()))
    }

    fn image_mut(&mut self, path: &Path) -> EngineResult<&mut Image> {
        let file = self
            .files
            .get_mut(path)
            .ok_or_else(|| EngineError::FileNotFound(path.to_path_buf()))?;
        if !file.writable {
            return Err(EngineError::ReadOnly(path.to_path_buf()));
        }
        file.dirty = true;
        Ok(&mut file.image)
    }

    /// File and node behind a group handle.
    fn group_target(&self, hid: Hid) -> EngineResult<(PathBuf, NodeId)> {
        match self.entry(hid)? {
            Entry {
                file: Some(path),
                target: Target::Group(id),
            } => {
                if self.image(path)?.group(*id).is_none() {
                    return Err(EngineError::Dangling(hid));
                }
                Ok((path.clone(), *id))
            }
            _ => Err(self.wrong_category(hid, "group")),
        }
    }

    fn dataset_target(&self, hid: Hid) -> EngineResult<(PathBuf, NodeId)> {
        match self.entry(hid)? {
            Entry {
                file: Some(path),
                target: Target::Dataset(id),
            } => {
                if self.image(path)?.dataset(*id).is_none() {
                    return Err(EngineError::Dangling(hid));
                }
                Ok((path.clone(), *id))
            }
            _ => Err(self.wrong_category(hid, "dataset")),
        }
    }

    fn object_target(&self, hid: Hid) -> EngineResult<(PathBuf, NodeId)> {
        match self.entry(hid)? {
            Entry {
                file: Some(path),
                target: Target::Group(id) | Target::Dataset(id),
            } => {
                if self.image(path)?.node(*id).is_none() {
                    return Err(EngineError::Dangling(hid));
                }
                Ok((path.clone(), *id))
            }
            _ => Err(self.wrong_category(hid, "group or dataset")),
        }
    }

    fn dataset_node(&self, hid: Hid) -> EngineResult<&DatasetNode> {
        let (path, id) = self.dataset_target(hid)?;
        self.image(&path)?
            .dataset(id)
            .ok_or(EngineError::Dangling(hid))
    }

    fn issue_node(&mut self, path: PathBuf, id: NodeId, kind: ObjectKind) -> Hid {
        let target = match kind {
            ObjectKind::Group => Target::Group(id),
            _ => Target::Dataset(id),
        };
        self.issue(Some(path), target)
    }

    /// Drop `hid` if `accept` admits its target, then flush its file when
    /// no other handle points into it.
    fn release(
        &mut self,
        hid: Hid,
        expected: &'static str,
        accept: fn(&Target) -> bool,
    ) -> EngineResult<()> {
        if !accept(&self.entry(hid)?.target) {
            return Err(self.wrong_category(hid, expected));
        }
        let entry = self
            .handles
            .remove(&hid)
            .ok_or(EngineError::InvalidHandle(hid))?;
        trace!(%hid, category = entry.target.category(), "released handle");
        match entry.file {
            Some(path) => self.flush_if_unused(&path),
            None => Ok(()),
        }
    }

    fn flush_if_unused(&mut self, path: &Path) -> EngineResult<()> {
        let in_use = self
            .handles
            .values()
            .any(|e| e.file.as_deref() == Some(path));
        if in_use {
            return Ok(());
        }
        let Some(file) = self.files.remove(path) else {
            return Ok(());
        };
        if !file.writable {
            return Ok(());
        }
        debug!(path = %path.display(), dirty = file.dirty, "flushing file image");
        match self.persistence {
            Persistence::Disk => {
                if file.dirty {
                    file.image.save(path)?;
                }
            }
            Persistence::Volatile => {
                self.parked.insert(path.to_path_buf(), file.image);
            }
        }
        Ok(())
    }
}

fn cut_at_nul(s: &str) -> &str {
    match s.find('\0') {
        Some(pos) => &s[..pos],
        None => s,
    }
}

// ---------------------------------------------------------------------------
// Engine implementation
// ---------------------------------------------------------------------------

impl Engine for MemoryEngine {
    fn file_create(&self, path: &Path) -> EngineResult<Hid> {
        self.record(|st| {
            if st.files.contains_key(path) {
                return Err(EngineError::FileBusy(path.to_path_buf()));
            }
            let image = Image::default();
            match st.persistence {
                Persistence::Disk => image.save(path)?,
                Persistence::Volatile => {
                    st.parked.insert(path.to_path_buf(), image.clone());
                }
            }
            debug!(path = %path.display(), "created file");
            st.files.insert(
                path.to_path_buf(),
                OpenFile {
                    image,
                    writable: true,
                    dirty: false,
                },
            );
            Ok(st.issue(Some(path.to_path_buf()), Target::File))
        })
    }

    fn file_open(&self, path: &Path, mode: OpenMode) -> EngineResult<Hid> {
        self.record(|st| {
            let writable = mode == OpenMode::ReadWrite;
            if let Some(open) = st.files.get(path) {
                if writable && !open.writable {
                    return Err(EngineError::FileBusy(path.to_path_buf()));
                }
                return Ok(st.issue(Some(path.to_path_buf()), Target::File));
            }
            let image = match st.persistence {
                Persistence::Disk => {
                    if !path.exists() {
                        return Err(EngineError::FileNotFound(path.to_path_buf()));
                    }
                    Image::load(path)?
                }
                Persistence::Volatile => st
                    .parked
                    .get(path)
                    .cloned()
                    .ok_or_else(|| EngineError::FileNotFound(path.to_path_buf()))?,
            };
            debug!(path = %path.display(), ?mode, "opened file");
            st.files.insert(
                path.to_path_buf(),
                OpenFile {
                    image,
                    writable,
                    dirty: false,
                },
            );
            Ok(st.issue(Some(path.to_path_buf()), Target::File))
        })
    }

    fn file_close(&self, file: Hid) -> EngineResult<()> {
        self.record(|st| st.release(file, "file", |t| matches!(t, Target::File)))
    }

    fn file_object_count(&self, file: Hid) -> EngineResult<usize> {
        self.record(|st| {
            let path = st.file_path(file)?;
            Ok(st
                .handles
                .values()
                .filter(|e| e.file.as_deref() == Some(path.as_path()))
                .count())
        })
    }

    fn group_open_root(&self, file: Hid) -> EngineResult<Hid> {
        self.record(|st| {
            let path = st.file_path(file)?;
            Ok(st.issue(Some(path), Target::Group(ROOT)))
        })
    }

    fn group_create(&self, parent: Hid, name: &str) -> EngineResult<Hid> {
        self.record(|st| {
            let (path, node) = st.group_target(parent)?;
            let id = st
                .image_mut(&path)?
                .insert(node, name, Node::Group(GroupNode::default()))?;
            Ok(st.issue(Some(path), Target::Group(id)))
        })
    }

    fn group_open(&self, parent: Hid, name: &str) -> EngineResult<Hid> {
        self.record(|st| {
            let (path, node) = st.group_target(parent)?;
            let image = st.image(&path)?;
            let id = image
                .child(node, name)
                .ok_or_else(|| EngineError::LinkNotFound(name.to_string()))?;
            let kind = image
                .node(id)
                .map(Node::kind)
                .ok_or_else(|| EngineError::LinkNotFound(name.to_string()))?;
            if kind != ObjectKind::Group {
                return Err(EngineError::WrongObject {
                    name: name.to_string(),
                    expected: ObjectKind::Group,
                    actual: kind,
                });
            }
            Ok(st.issue(Some(path), Target::Group(id)))
        })
    }

    fn group_close(&self, group: Hid) -> EngineResult<()> {
        self.record(|st| st.release(group, "group", |t| matches!(t, Target::Group(_))))
    }

    fn link_count(&self, group: Hid) -> EngineResult<usize> {
        self.record(|st| {
            let (path, node) = st.group_target(group)?;
            let g = st.image(&path)?.group(node).ok_or(EngineError::Dangling(group))?;
            Ok(g.links.len())
        })
    }

    fn link_name(&self, group: Hid, index: usize) -> EngineResult<String> {
        self.record(|st| {
            let (path, node) = st.group_target(group)?;
            let g = st.image(&path)?.group(node).ok_or(EngineError::Dangling(group))?;
            g.links
                .name_at(index)
                .map(str::to_string)
                .ok_or(EngineError::LinkIndex {
                    index,
                    count: g.links.len(),
                })
        })
    }

    fn link_exists(&self, group: Hid, name: &str) -> EngineResult<bool> {
        self.record(|st| {
            let (path, node) = st.group_target(group)?;
            Ok(st.image(&path)?.child(node, name).is_some())
        })
    }

    fn link_delete(&self, group: Hid, name: &str) -> EngineResult<()> {
        self.record(|st| {
            let (path, node) = st.group_target(group)?;
            st.image_mut(&path)?.unlink(node, name)
        })
    }

    fn object_open(&self, group: Hid, name: &str) -> EngineResult<Hid> {
        self.record(|st| {
            let (path, node) = st.group_target(group)?;
            let image = st.image(&path)?;
            let id = image
                .child(node, name)
                .ok_or_else(|| EngineError::LinkNotFound(name.to_string()))?;
            let kind = image
                .node(id)
                .map(Node::kind)
                .ok_or_else(|| EngineError::LinkNotFound(name.to_string()))?;
            Ok(st.issue_node(path, id, kind))
        })
    }

    fn object_kind(&self, object: Hid) -> EngineResult<ObjectKind> {
        self.record(|st| {
            let (path, id) = st.object_target(object)?;
            st.image(&path)?
                .node(id)
                .map(Node::kind)
                .ok_or(EngineError::Dangling(object))
        })
    }

    fn object_close(&self, object: Hid) -> EngineResult<()> {
        self.record(|st| {
            st.release(object, "group or dataset", |t| {
                matches!(t, Target::Group(_) | Target::Dataset(_))
            })
        })
    }

    fn dataspace_create(&self, shape: &Shape) -> EngineResult<Hid> {
        self.record(|st| {
            if let Shape::Simple(extents) = shape {
                if extents.is_empty() {
                    return Err(EngineError::InvalidDataspace(
                        "simple dataspace needs at least one axis".into(),
                    ));
                }
            }
            Ok(st.issue(None, Target::Dataspace(shape.clone())))
        })
    }

    fn dataspace_shape(&self, space: Hid) -> EngineResult<Shape> {
        self.record(|st| match &st.entry(space)?.target {
            Target::Dataspace(shape) => Ok(shape.clone()),
            _ => Err(st.wrong_category(space, "dataspace")),
        })
    }

    fn dataspace_close(&self, space: Hid) -> EngineResult<()> {
        self.record(|st| {
            st.release(space, "dataspace", |t| matches!(t, Target::Dataspace(_)))
        })
    }

    fn dataset_create(
        &self,
        parent: Hid,
        name: &str,
        class: TypeClass,
        space: Hid,
    ) -> EngineResult<Hid> {
        self.record(|st| {
            let shape = match &st.entry(space)?.target {
                Target::Dataspace(shape) => shape.clone(),
                _ => return Err(st.wrong_category(space, "dataspace")),
            };
            let count = shape
                .element_count()
                .filter(|&n| n <= MAX_ELEMENTS)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| {
                    EngineError::InvalidDataspace(format!(
                        "{shape} exceeds {MAX_ELEMENTS} elements"
                    ))
                })?;
            let payload = Payload::filled(class, count)?;
            let (path, node) = st.group_target(parent)?;
            let id = st.image_mut(&path)?.insert(
                node,
                name,
                Node::Dataset(DatasetNode {
                    shape,
                    payload,
                    attrs: BTreeMap::new(),
                }),
            )?;
            Ok(st.issue(Some(path), Target::Dataset(id)))
        })
    }

    fn dataset_space(&self, dataset: Hid) -> EngineResult<Hid> {
        self.record(|st| {
            let shape = st.dataset_node(dataset)?.shape.clone();
            Ok(st.issue(None, Target::Dataspace(shape)))
        })
    }

    fn dataset_type_class(&self, dataset: Hid) -> EngineResult<TypeClass> {
        self.record(|st| Ok(st.dataset_node(dataset)?.payload.class()))
    }

    fn dataset_storage_size(&self, dataset: Hid) -> EngineResult<u64> {
        self.record(|st| Ok(st.dataset_node(dataset)?.payload.storage_size()))
    }

    fn dataset_read(&self, dataset: Hid, buffer: ReadBuffer<'_>) -> EngineResult<()> {
        self.record(|st| {
            let node = st.dataset_node(dataset)?;
            let requested = buffer.class();
            match (&node.payload, buffer) {
                (Payload::Integer(src), ReadBuffer::Integer(dst)) => {
                    copy_exact(src, dst)
                }
                (Payload::Float(src), ReadBuffer::Float(dst)) => copy_exact(src, dst),
                (Payload::Text(src), ReadBuffer::Text(dst)) => {
                    if src.len() != 1 {
                        return Err(EngineError::BufferSize {
                            expected: src.len(),
                            actual: 1,
                        });
                    }
                    let bytes = src[0].as_bytes();
                    if dst.len() < bytes.len() + 1 {
                        return Err(EngineError::BufferSize {
                            expected: bytes.len() + 1,
                            actual: dst.len(),
                        });
                    }
                    dst[..bytes.len()].copy_from_slice(bytes);
                    dst[bytes.len()] = 0;
                    Ok(())
                }
                (Payload::Text(src), ReadBuffer::TextArray(dst)) => {
                    dst.clear();
                    dst.extend(src.iter().cloned());
                    Ok(())
                }
                (payload, _) => Err(EngineError::ClassMismatch {
                    stored: payload.class(),
                    requested,
                }),
            }
        })
    }

    fn dataset_write(&self, dataset: Hid, buffer: WriteBuffer<'_>) -> EngineResult<()> {
        self.record(|st| {
            let (path, id) = st.dataset_target(dataset)?;
            let node = st
                .image_mut(&path)?
                .dataset_mut(id)
                .ok_or(EngineError::Dangling(dataset))?;
            match (&mut node.payload, buffer) {
                (Payload::Integer(dst), WriteBuffer::Integer(src)) => copy_exact(src, dst),
                (Payload::Float(dst), WriteBuffer::Float(src)) => copy_exact(src, dst),
                (Payload::Text(dst), WriteBuffer::Text(src)) => {
                    if src.len() != dst.len() {
                        return Err(EngineError::BufferSize {
                            expected: dst.len(),
                            actual: src.len(),
                        });
                    }
                    for (d, s) in dst.iter_mut().zip(src) {
                        *d = cut_at_nul(s).to_string();
                    }
                    Ok(())
                }
                (payload, buffer) => Err(EngineError::ClassMismatch {
                    stored: payload.class(),
                    requested: buffer.class(),
                }),
            }
        })
    }

    fn dataset_close(&self, dataset: Hid) -> EngineResult<()> {
        self.record(|st| st.release(dataset, "dataset", |t| matches!(t, Target::Dataset(_))))
    }

    fn attr_write_string(&self, object: Hid, key: &str, value: &str) -> EngineResult<()> {
        self.record(|st| {
            let (path, id) = st.object_target(object)?;
            let node = st
                .image_mut(&path)?
                .node_mut(id)
                .ok_or(EngineError::Dangling(object))?;
            node.attrs_mut()
                .insert(key.to_string(), cut_at_nul(value).to_string());
            Ok(())
        })
    }

    fn attr_read_string(&self, object: Hid, key: &str) -> EngineResult<Option<String>> {
        self.record(|st| {
            let (path, id) = st.object_target(object)?;
            let node = st.image(&path)?.node(id).ok_or(EngineError::Dangling(object))?;
            Ok(node.attrs().get(key).cloned())
        })
    }

    fn last_error_message(&self) -> String {
        self.last_error.borrow().clone()
    }
}

fn copy_exact<T: Copy>(src: &[T], dst: &mut [T]) -> EngineResult<()> {
    if src.len() != dst.len() {
        return Err(EngineError::BufferSize {
            expected: src.len(),
            actual: dst.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}
