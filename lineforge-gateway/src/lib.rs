//! The gateway seam between lineforge and a remote ad server.
//!
//! The [`AdServer`] port is the only way the rest of the workspace touches
//! remote state. lineforge owns no wire protocol of its own; a transport
//! adapter (SOAP, REST, whatever the platform speaks) implements the trait on
//! the outside. The crate ships [`InMemoryAdServer`], an equality-filter
//! object store that backs tests, demos, and inventory-snapshot runs.

mod memory;
mod port;
mod snapshot;

pub use memory::InMemoryAdServer;
pub use port::{AdServer, ArchiveOutcome};
pub use snapshot::{InventorySnapshot, load_snapshot};
