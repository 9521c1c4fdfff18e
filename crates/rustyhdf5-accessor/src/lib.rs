//! Typed, resource-safe access to a hierarchical storage engine.
//!
//! A [`Session`] owns one open file and a stack of open groups from the
//! root down to the current working group. Values are read and written by
//! name relative to that group:
//!
//! ```
//! use std::rc::Rc;
//!
//! use ndarray::array;
//! use rustyhdf5_accessor::{MemoryEngine, OpenMode, Session};
//!
//! let mut session = Session::new(Rc::new(MemoryEngine::volatile()));
//! session.create("params.rh5")?;
//! assert!(session.create_group("params", true));
//! session.set("n", 23)?;
//! session.set("m", array![[1.0, 2.0, 3.0], [11.0, 22.0, 33.0]])?;
//! session.close()?;
//!
//! session.open("params.rh5", OpenMode::ReadOnly)?;
//! assert!(session.descend("params"));
//! assert_eq!(session.get_int("n")?, 23);
//! assert_eq!(session.get_matrix("m")?[[1, 2]], 33.0);
//! # Ok::<(), rustyhdf5_accessor::Error>(())
//! ```
//!
//! Every engine handle is owned by a [`HandleGuard`] and released on all exit
//! paths. Only the most recently written dataset outlives the call that
//! opened it, so that `set_description` and `set_units` can annotate it.
//! `close` checks that nothing but the file handle is left open.
//!
//! The engine stores tensors in row-major order; tensor getters return
//! arrays in the configured [`HostOrder`] (column-major by default).

pub mod error;
pub mod handle;
pub mod layout;
pub mod navigator;
pub mod options;
pub mod probe;
pub mod session;
pub mod typed_io;

pub use error::{Error, Result};
pub use handle::HandleGuard;
pub use layout::{HostOrder, LayoutConverter};
pub use navigator::GroupNavigator;
pub use options::{ScalarLayout, SessionOptions};
pub use probe::{DatasetDescriptor, TypeProbe};
pub use session::{Session, TreeEntry};
pub use typed_io::{StoreValue, TypedIo, DESCRIPTION_KEY, UNITS_KEY};

pub use rustyhdf5_engine::{
    Engine, EngineError, Hid, MemoryEngine, ObjectKind, OpenMode, Persistence, Shape, TypeClass,
};
