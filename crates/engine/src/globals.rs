//! Global host state storage
//!
//! Host state is acquired once during plugin load and stored here.
//! Access is thread-safe via OnceLock.

use std::sync::OnceLock;

use parking_lot::RwLock;

use crate::error::HostError;
use crate::loader::{HostModule, ObjectTable};

/// Global host state
pub struct HostGlobals {
    /// Host executable code region (required)
    pub module: HostModule,

    /// Object table - set later by the loader once the client state exists
    object_table: RwLock<Option<ObjectTable>>,
}

/// Global host state storage
static HOST: OnceLock<HostGlobals> = OnceLock::new();

/// Initialize host globals
///
/// Called once during plugin load. Returns error if already initialized.
pub fn init_host(globals: HostGlobals) -> Result<(), HostError> {
    HOST.set(globals).map_err(|_| HostError::AlreadyInitialized)
}

/// Get host globals, `None` before `init_host`
pub fn try_host() -> Option<&'static HostGlobals> {
    HOST.get()
}

impl HostGlobals {
    pub fn new(module: HostModule) -> Self {
        Self {
            module,
            object_table: RwLock::new(None),
        }
    }

    /// Get the object table (None until the loader provides it)
    pub fn object_table(&self) -> Option<ObjectTable> {
        *self.object_table.read()
    }

    /// Set the object table
    pub fn set_object_table(&self, table: ObjectTable) {
        tracing::info!("Object table set: {:?}", table);
        *self.object_table.write() = Some(table);
    }

    /// Clear the object table, e.g. on logout
    pub fn clear_object_table(&self) {
        *self.object_table.write() = None;
        tracing::debug!("Object table cleared");
    }
}
