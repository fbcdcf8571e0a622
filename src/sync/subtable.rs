//! Sub-table resolution
//!
//! Choice, grouped and multi-valued fields store their values in an
//! auxiliary table named `<parent table><field key>`. Every sub-table is
//! keyed by an integer `Key` and carries two linking columns before any
//! value column is attached:
//!
//! - `<parent table>Id`: the owning row, typed like the parent's key
//! - `ParticipantId`: the participant whose response produced the row

use crate::design::FieldSpec;
use crate::schema::{ColumnSpec, SchemaTable, StorageType};

use super::errors::{SyncError, SyncResult};
use super::plan::{SchemaOp, SchemaWorkspace};

/// Primary key of every sub-table and of survey root tables
pub const ROW_KEY_COLUMN: &str = "Key";

/// Linking column naming the participant
pub const PARTICIPANT_COLUMN: &str = "ParticipantId";

/// Deterministic name of the sub-table of `field_key` under `parent`.
pub fn sub_table_name(parent: &str, field_key: &str) -> String {
    format!("{}{}", parent, field_key)
}

/// Name of the column linking a sub-table row to its owning row.
pub fn parent_link_column(parent: &str) -> String {
    format!("{}Id", parent)
}

/// Resolves or creates sub-tables and their linking columns.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubTableResolver;

impl SubTableResolver {
    pub fn new() -> Self {
        Self
    }

    /// Returns the sub-table of `field` under `parent`, with linking columns in place.
    pub fn resolve(
        &self,
        workspace: &mut SchemaWorkspace<'_>,
        parent: &SchemaTable,
        field: &FieldSpec,
    ) -> SyncResult<SchemaTable> {
        let name = sub_table_name(&parent.name, &field.key);

        if workspace.exists(&name)? {
            let table = workspace
                .table(&name)
                .ok_or_else(|| SyncError::invalid_sub_table(&name, &field.key, "table vanished while planning"))?;
            let key = &table.primary_key;
            if !key.name.eq_ignore_ascii_case(ROW_KEY_COLUMN) || key.storage_type != StorageType::Integer {
                return Err(SyncError::invalid_sub_table(
                    &name,
                    &field.key,
                    format!("keyed by {} {}, expected {} integer", key.name, key.storage_type, ROW_KEY_COLUMN),
                ));
            }
        } else {
            workspace.create_table(&name, ColumnSpec::new(ROW_KEY_COLUMN, StorageType::Integer));
        }

        for link in linking_columns(parent) {
            self.ensure_link(workspace, &name, &field.key, link)?;
        }

        workspace
            .table(&name)
            .cloned()
            .ok_or_else(|| SyncError::invalid_sub_table(&name, &field.key, "table vanished while planning"))
    }

    fn ensure_link(
        &self,
        workspace: &mut SchemaWorkspace<'_>,
        table_name: &str,
        field_key: &str,
        link: ColumnSpec,
    ) -> SyncResult<()> {
        let table = workspace
            .table_mut(table_name)
            .ok_or_else(|| SyncError::invalid_sub_table(table_name, field_key, "table vanished while planning"))?;

        if let Some(existing) = table.column(&link.name) {
            if existing.storage_type != link.storage_type {
                return Err(SyncError::invalid_sub_table(
                    table_name,
                    field_key,
                    format!(
                        "linking column {} is {}, expected {}",
                        existing.name, existing.storage_type, link.storage_type
                    ),
                ));
            }
            return Ok(());
        }

        table.insert_column(link.clone());
        workspace.record(SchemaOp::AddColumn {
            table: table_name.to_string(),
            column: link,
        });
        Ok(())
    }
}

fn linking_columns(parent: &SchemaTable) -> [ColumnSpec; 2] {
    let mut owner = ColumnSpec::new(parent_link_column(&parent.name), parent.primary_key.storage_type);
    owner.size = parent.primary_key.size;
    [owner, ColumnSpec::new(PARTICIPANT_COLUMN, StorageType::Integer)]
}
