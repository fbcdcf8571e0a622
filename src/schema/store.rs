//! Schema store façade
//!
//! The engine only ever talks to storage through these traits. A store
//! hands out tenant-scoped transactions; nothing a transaction does is
//! visible to [`SchemaStore::get_table`] or other transactions until
//! [`SchemaTransaction::commit`] succeeds.

use crate::design::TenantId;

use super::errors::StoreResult;
use super::types::{ColumnSpec, SchemaTable};

/// A store of tenant-owned tables.
pub trait SchemaStore: Send + Sync {
    /// Opens a transaction scoped to one tenant.
    fn begin(&self, tenant: &TenantId) -> StoreResult<Box<dyn SchemaTransaction + '_>>;

    /// Reads the committed state of a table.
    fn get_table(&self, tenant: &TenantId, name: &str) -> StoreResult<Option<SchemaTable>>;

    /// Reads the committed state of all of a tenant's tables, by name.
    fn list_tables(&self, tenant: &TenantId) -> StoreResult<Vec<SchemaTable>>;
}

/// One unit of atomic schema change.
///
/// Every mutating call is reversible until commit. Reads see the
/// transaction's own writes.
pub trait SchemaTransaction {
    fn tenant(&self) -> &TenantId;

    fn get_table(&mut self, name: &str) -> StoreResult<Option<SchemaTable>>;

    /// Returns the table, creating it with `primary_key` if absent.
    ///
    /// Fails if an existing table is keyed differently.
    fn get_or_create_table(&mut self, name: &str, primary_key: &ColumnSpec) -> StoreResult<SchemaTable>;

    fn get_column(&mut self, table: &str, name: &str) -> StoreResult<Option<ColumnSpec>>;

    /// Adds a column. Fails if the name is taken.
    fn add_column(&mut self, table: &str, column: &ColumnSpec) -> StoreResult<()>;

    /// Grows a string column. Fails on a request to shrink.
    fn resize_column(&mut self, table: &str, name: &str, size: u32) -> StoreResult<()>;

    fn commit(self: Box<Self>) -> StoreResult<()>;

    fn rollback(self: Box<Self>) -> StoreResult<()>;
}
