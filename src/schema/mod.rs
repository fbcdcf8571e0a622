//! Tenant schema model and storage
//!
//! Tables are owned by one tenant and only ever grow:
//!
//! - Tables and columns are never dropped by this crate
//! - A column's storage type never changes once it exists
//! - String sizes only increase; unbounded is terminal
//!
//! The engine reaches storage exclusively through [`SchemaStore`] and
//! [`SchemaTransaction`]. [`CatalogSchemaStore`] is the bundled
//! implementation, in memory or persisted to a JSON catalog file.

mod catalog;
mod errors;
mod store;
mod types;

pub use catalog::{CatalogSchemaStore, CatalogTransaction};
pub use errors::{StoreError, StoreResult};
pub use store::{SchemaStore, SchemaTransaction};
pub(crate) use types::fold_name;
pub use types::{ColumnSpec, SchemaTable, StorageType, UNBOUNDED_SIZE};
