//! Session configuration.

use serde::{Deserialize, Serialize};

use crate::layout::HostOrder;

/// Dataspace used when writing single values (`i32`, `f64`, strings).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalarLayout {
    /// One-element simple dataspace with extents `[1]`.
    #[default]
    Rank1,
    /// Rank-0 scalar dataspace.
    Scalar,
}

/// Options applied by a [`Session`](crate::Session) to every transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Memory order of arrays returned by tensor getters.
    pub host_order: HostOrder,
    /// Dataspace used for single `i32`, `f64` and string values.
    pub scalar_layout: ScalarLayout,
    /// Fail `close` with `ResourceLeak` when objects other than the file
    /// handle are still open. When disabled the leak is logged and the file
    /// closed anyway.
    pub check_leaks: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            host_order: HostOrder::ColumnMajor,
            scalar_layout: ScalarLayout::Rank1,
            check_leaks: true,
        }
    }
}

impl SessionOptions {
    /// Set the memory order of arrays returned by tensor getters.
    pub fn with_host_order(mut self, order: HostOrder) -> Self {
        self.host_order = order;
        self
    }

    /// Set the dataspace used for single values.
    pub fn with_scalar_layout(mut self, layout: ScalarLayout) -> Self {
        self.scalar_layout = layout;
        self
    }

    /// Enable or disable the leak check at close.
    pub fn with_check_leaks(mut self, check: bool) -> Self {
        self.check_leaks = check;
        self
    }
}
