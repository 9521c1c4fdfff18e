//! Scoped ownership of engine handles.
//!
//! [`HandleGuard`] owns one raw [`Hid`] and the engine primitive that
//! releases it. The handle is released when the guard is dropped or
//! reassigned, on every exit path.

use std::fmt;
use std::rc::Rc;

use rustyhdf5_engine::{Engine, EngineResult, Hid};
use tracing::warn;

/// Engine primitive releasing one handle category.
pub type Release<E> = fn(&E, Hid) -> EngineResult<()>;

/// Move-only owner of a single engine handle.
pub struct HandleGuard<E: Engine> {
    engine: Rc<E>,
    raw: Option<Hid>,
    release: Release<E>,
}

impl<E: Engine> HandleGuard<E> {
    /// Take ownership of `raw`, to be released with `release`.
    pub fn new(engine: Rc<E>, raw: Hid, release: Release<E>) -> Self {
        Self {
            engine,
            raw: raw.is_valid().then_some(raw),
            release,
        }
    }

    /// A guard owning nothing yet.
    pub fn empty(engine: Rc<E>, release: Release<E>) -> Self {
        Self {
            engine,
            raw: None,
            release,
        }
    }

    /// Guard for a handle from `object_open`.
    pub fn object(engine: &Rc<E>, raw: Hid) -> Self {
        Self::new(Rc::clone(engine), raw, E::object_close)
    }

    /// Guard for a dataspace handle.
    pub fn dataspace(engine: &Rc<E>, raw: Hid) -> Self {
        Self::new(Rc::clone(engine), raw, E::dataspace_close)
    }

    /// Guard for a dataset handle.
    pub fn dataset(engine: &Rc<E>, raw: Hid) -> Self {
        Self::new(Rc::clone(engine), raw, E::dataset_close)
    }

    /// Guard for a group handle.
    pub fn group(engine: &Rc<E>, raw: Hid) -> Self {
        Self::new(Rc::clone(engine), raw, E::group_close)
    }

    /// Guard for a file handle.
    pub fn file(engine: &Rc<E>, raw: Hid) -> Self {
        Self::new(Rc::clone(engine), raw, E::file_close)
    }

    /// The owned handle, or [`Hid::INVALID`] when empty.
    pub fn raw(&self) -> Hid {
        self.raw.unwrap_or(Hid::INVALID)
    }

    /// Returns `true` while a handle is owned.
    pub fn is_valid(&self) -> bool {
        self.raw.is_some()
    }

    /// Release the current handle, then take ownership of `raw`.
    ///
    /// `raw` is adopted even when releasing the old handle fails; the
    /// release error is returned.
    pub fn reset(&mut self, raw: Hid) -> EngineResult<()> {
        let released = self.release();
        self.raw = raw.is_valid().then_some(raw);
        released
    }

    /// Release the owned handle now. Releasing an empty guard is a no-op.
    pub fn release(&mut self) -> EngineResult<()> {
        match self.raw.take() {
            Some(raw) => (self.release)(&self.engine, raw),
            None => Ok(()),
        }
    }

    /// Give up ownership without releasing.
    pub fn into_raw(mut self) -> Hid {
        self.raw.take().unwrap_or(Hid::INVALID)
    }
}

impl<E: Engine> Drop for HandleGuard<E> {
    fn drop(&mut self) {
        let raw = self.raw;
        if let Err(e) = self.release() {
            warn!(handle = ?raw, error = %e, "failed to release engine handle");
        }
    }
}

impl<E: Engine> fmt::Debug for HandleGuard<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleGuard").field("raw", &self.raw).finish()
    }
}
