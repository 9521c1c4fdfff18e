//! Metadata queries on the children of one group.

use std::fmt;
use std::rc::Rc;

use rustyhdf5_engine::{Engine, Hid, ObjectKind, Shape, TypeClass};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::handle::HandleGuard;

/// Kind, type class and shape of a named dataset.
///
/// Built fresh on every query and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// Link name in the parent group.
    pub name: String,
    /// Always [`ObjectKind::Dataset`].
    pub kind: ObjectKind,
    /// Class of the stored elements.
    pub type_class: TypeClass,
    /// Extents of the dataspace.
    pub shape: Shape,
}

impl DatasetDescriptor {
    /// Per-axis extents, empty for a scalar dataspace.
    pub fn extents(&self) -> &[u64] {
        self.shape.extents()
    }

    /// Number of axes.
    pub fn rank(&self) -> usize {
        self.shape.rank()
    }

    /// Product of the extents, `None` if it overflows `u64`.
    pub fn element_count(&self) -> Option<u64> {
        self.shape.element_count()
    }
}

impl fmt::Display for DatasetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.type_class, self.shape)
    }
}

/// Probes children of `group` without reading any payload.
pub struct TypeProbe<'a, E: Engine> {
    engine: &'a Rc<E>,
    group: Hid,
}

impl<'a, E: Engine> TypeProbe<'a, E> {
    /// Probe the children of the open group `group`.
    pub fn new(engine: &'a Rc<E>, group: Hid) -> Self {
        Self { engine, group }
    }

    fn open(&self, name: &str) -> Result<HandleGuard<E>> {
        if !self.engine.link_exists(self.group, name)? {
            return Err(Error::NotFound(name.to_string()));
        }
        let raw = self.engine.object_open(self.group, name)?;
        Ok(HandleGuard::object(self.engine, raw))
    }

    /// Kind of the child `name`.
    pub fn kind_of(&self, name: &str) -> Result<ObjectKind> {
        let object = self.open(name)?;
        Ok(self.engine.object_kind(object.raw())?)
    }

    /// Open `name`, which must be a dataset.
    pub fn open_dataset(&self, name: &str) -> Result<HandleGuard<E>> {
        let object = self.open(name)?;
        let kind = self.engine.object_kind(object.raw())?;
        if kind != ObjectKind::Dataset {
            return Err(Error::WrongKind {
                name: name.to_string(),
                expected: ObjectKind::Dataset,
                found: kind,
            });
        }
        Ok(object)
    }

    /// Shape of an open dataset.
    pub fn shape_of(&self, dataset: &HandleGuard<E>) -> Result<Shape> {
        let space = HandleGuard::dataspace(self.engine, self.engine.dataset_space(dataset.raw())?);
        Ok(self.engine.dataspace_shape(space.raw())?)
    }

    /// Descriptor of the dataset `name`.
    pub fn describe(&self, name: &str) -> Result<DatasetDescriptor> {
        let dataset = self.open_dataset(name)?;
        let type_class = self.engine.dataset_type_class(dataset.raw())?;
        let shape = self.shape_of(&dataset)?;
        Ok(DatasetDescriptor {
            name: name.to_string(),
            kind: ObjectKind::Dataset,
            type_class,
            shape,
        })
    }
}
