//! Stack of open groups from the root to the current working group.

use std::rc::Rc;

use rustyhdf5_engine::{Engine, Hid, ObjectKind};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::handle::HandleGuard;
use crate::probe::TypeProbe;

struct Level<E: Engine> {
    name: String,
    group: HandleGuard<E>,
}

/// Tracks the current working group.
///
/// `stack[0]` is the root group; every deeper entry is a child of the one
/// below it. Each entry exclusively owns its group handle.
pub struct GroupNavigator<E: Engine> {
    engine: Rc<E>,
    stack: Vec<Level<E>>,
}

impl<E: Engine> GroupNavigator<E> {
    /// An empty stack; `push_root` enters a file.
    pub fn new(engine: Rc<E>) -> Self {
        Self {
            engine,
            stack: Vec::new(),
        }
    }

    /// Reset the stack to the root group of `file`.
    pub fn push_root(&mut self, file: Hid) -> Result<()> {
        self.clear()?;
        let root = self.engine.group_open_root(file)?;
        self.stack.push(Level {
            name: String::new(),
            group: HandleGuard::group(&self.engine, root),
        });
        Ok(())
    }

    /// Returns `true` when no file has been entered.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Number of groups on the stack, root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Handle of the current working group.
    pub fn current(&self) -> Result<Hid> {
        self.stack
            .last()
            .map(|level| level.group.raw())
            .ok_or(Error::NotOpen)
    }

    /// Absolute path of the current group, `/` at the root.
    pub fn current_path(&self) -> String {
        if self.stack.len() <= 1 {
            return "/".to_string();
        }
        self.stack[1..]
            .iter()
            .fold(String::new(), |mut path, level| {
                path.push('/');
                path.push_str(&level.name);
                path
            })
    }

    /// Metadata probe over the current group.
    pub fn probe(&self) -> Result<TypeProbe<'_, E>> {
        Ok(TypeProbe::new(&self.engine, self.current()?))
    }

    fn link_names(&self, group: Hid) -> Result<Vec<String>> {
        let count = self.engine.link_count(group)?;
        (0..count)
            .map(|i| Ok(self.engine.link_name(group, i)?))
            .collect()
    }

    /// Enter the child group `name`. Returns `false`, leaving the stack
    /// unchanged, if there is no such child or it is not a group.
    pub fn descend(&mut self, name: &str) -> bool {
        match self.try_descend(name) {
            Ok(entered) => entered,
            Err(e) => {
                debug!(name, error = %e, "descend failed");
                false
            }
        }
    }

    fn try_descend(&mut self, name: &str) -> Result<bool> {
        if !self.exists(name, ObjectKind::Group) {
            return Ok(false);
        }
        let raw = self.engine.group_open(self.current()?, name)?;
        self.stack.push(Level {
            name: name.to_string(),
            group: HandleGuard::group(&self.engine, raw),
        });
        debug!(path = %self.current_path(), "descended");
        Ok(true)
    }

    /// Create the child group `name`, entering it when `also_descend` is set.
    /// Returns `false` if the engine refuses, e.g. because `name` is taken.
    pub fn create_group(&mut self, name: &str, also_descend: bool) -> bool {
        let created = self
            .current()
            .and_then(|parent| Ok(self.engine.group_create(parent, name)?));
        let raw = match created {
            Ok(raw) => raw,
            Err(e) => {
                debug!(name, error = %e, "group creation refused");
                return false;
            }
        };
        let group = HandleGuard::group(&self.engine, raw);
        if also_descend {
            self.stack.push(Level {
                name: name.to_string(),
                group,
            });
            debug!(path = %self.current_path(), "created and entered group");
        }
        true
    }

    /// Leave the current group. Fails with [`Error::AtRoot`] at the root.
    pub fn ascend(&mut self) -> Result<()> {
        match self.stack.len() {
            0 => Err(Error::NotOpen),
            1 => Err(Error::AtRoot),
            _ => {
                let mut level = self.stack.pop().ok_or(Error::NotOpen)?;
                level.group.release()?;
                debug!(path = %self.current_path(), "ascended");
                Ok(())
            }
        }
    }

    /// Names of the children of the current group, filtered by kind.
    ///
    /// With both flags set every link is returned without probing it.
    pub fn list(&self, groups: bool, datasets: bool) -> Result<Vec<String>> {
        let names = self.link_names(self.current()?)?;
        if groups && datasets {
            return Ok(names);
        }
        if !groups && !datasets {
            return Ok(Vec::new());
        }
        let probe = self.probe()?;
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let keep = match probe.kind_of(&name)? {
                ObjectKind::Group => groups,
                ObjectKind::Dataset => datasets,
                _ => false,
            };
            if keep {
                out.push(name);
            }
        }
        Ok(out)
    }

    /// Returns `true` only if a child named `name` exists and is a `kind`.
    pub fn exists(&self, name: &str, kind: ObjectKind) -> bool {
        let found = self.current().and_then(|group| {
            if !self.link_names(group)?.iter().any(|n| n == name) {
                return Ok(false);
            }
            Ok(self.probe()?.kind_of(name)? == kind)
        });
        found.unwrap_or(false)
    }

    /// Unlink the child `name` of the current group.
    pub fn delete(&mut self, name: &str) -> bool {
        let deleted = self
            .current()
            .and_then(|group| Ok(self.engine.link_delete(group, name)?));
        match deleted {
            Ok(()) => true,
            Err(e) => {
                debug!(name, error = %e, "delete failed");
                false
            }
        }
    }

    /// Release every group, innermost first. All releases are attempted;
    /// the first failure is returned.
    pub fn clear(&mut self) -> Result<()> {
        let mut first = Ok(());
        while let Some(mut level) = self.stack.pop() {
            if let Err(e) = level.group.release() {
                if first.is_ok() {
                    first = Err(e.into());
                }
            }
        }
        first
    }
}

impl<E: Engine> Drop for GroupNavigator<E> {
    fn drop(&mut self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "failed to release navigation stack");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rustyhdf5_engine::{MemoryEngine, Shape, TypeClass};

    use super::*;

    fn setup() -> (Rc<MemoryEngine>, HandleGuard<MemoryEngine>, GroupNavigator<MemoryEngine>) {
        let engine = Rc::new(MemoryEngine::volatile());
        let file = HandleGuard::file(&engine, engine.file_create(Path::new("nav.rh5")).unwrap());
        let mut nav = GroupNavigator::new(Rc::clone(&engine));
        nav.push_root(file.raw()).unwrap();
        (engine, file, nav)
    }

    fn add_dataset(engine: &MemoryEngine, group: Hid, name: &str) {
        let space = engine.dataspace_create(&Shape::vector(0)).unwrap();
        let ds = engine
            .dataset_create(group, name, TypeClass::Float, space)
            .unwrap();
        engine.dataset_close(ds).unwrap();
        engine.dataspace_close(space).unwrap();
    }

    // -----------------------------------------------------------------------
    // Descend / ascend
    // -----------------------------------------------------------------------

    #[test]
    fn create_descend_ascend() {
        let (_engine, file, mut nav) = setup();
        assert!(nav.create_group("a", true));
        assert_eq!(nav.depth(), 2);
        assert!(nav.create_group("b", true));
        assert_eq!(nav.current_path(), "/a/b");
        nav.ascend().unwrap();
        nav.ascend().unwrap();
        assert_eq!(nav.current_path(), "/");
        assert!(matches!(nav.ascend(), Err(Error::AtRoot)));
        assert!(nav.descend("a"));
        assert!(nav.descend("b"));
        assert_eq!(nav.current_path(), "/a/b");
        drop(nav);
        drop(file);
    }

    #[test]
    fn descend_rejects_missing_and_datasets() {
        let (engine, _file, mut nav) = setup();
        add_dataset(&engine, nav.current().unwrap(), "x");
        assert!(!nav.descend("x"));
        assert!(!nav.descend("missing"));
        // case-sensitive
        assert!(nav.create_group("Params", false));
        assert!(!nav.descend("params"));
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn create_group_without_descend_leaves_no_handle() {
        let (engine, _file, mut nav) = setup();
        let before = engine.open_handle_count();
        assert!(nav.create_group("g", false));
        assert_eq!(engine.open_handle_count(), before);
        assert_eq!(nav.depth(), 1);
        assert!(!nav.create_group("g", false));
    }

    // -----------------------------------------------------------------------
    // Listing / existence / deletion
    // -----------------------------------------------------------------------

    #[test]
    fn list_filters_by_kind() {
        let (engine, _file, mut nav) = setup();
        assert!(nav.create_group("g1", false));
        assert!(nav.create_group("g2", false));
        add_dataset(&engine, nav.current().unwrap(), "d1");

        let mut all = nav.list(true, true).unwrap();
        all.sort();
        assert_eq!(all, vec!["d1", "g1", "g2"]);
        let mut groups = nav.list(true, false).unwrap();
        groups.sort();
        assert_eq!(groups, vec!["g1", "g2"]);
        assert_eq!(nav.list(false, true).unwrap(), vec!["d1"]);
        assert!(nav.list(false, false).unwrap().is_empty());
    }

    #[test]
    fn exists_requires_matching_kind() {
        let (engine, _file, mut nav) = setup();
        assert!(nav.create_group("g", false));
        add_dataset(&engine, nav.current().unwrap(), "d");
        assert!(nav.exists("g", ObjectKind::Group));
        assert!(!nav.exists("g", ObjectKind::Dataset));
        assert!(nav.exists("d", ObjectKind::Dataset));
        assert!(!nav.exists("nothing", ObjectKind::Group));
    }

    #[test]
    fn delete_reports_outcome() {
        let (_engine, _file, mut nav) = setup();
        assert!(nav.create_group("g", false));
        assert!(nav.delete("g"));
        assert!(!nav.delete("g"));
        assert!(nav.list(true, true).unwrap().is_empty());
    }

    #[test]
    fn clear_releases_everything() {
        let (engine, file, mut nav) = setup();
        assert!(nav.create_group("a", true));
        assert!(nav.create_group("b", true));
        nav.clear().unwrap();
        assert!(nav.is_empty());
        assert!(matches!(nav.current(), Err(Error::NotOpen)));
        assert_eq!(engine.file_object_count(file.raw()).unwrap(), 1);
    }
}
