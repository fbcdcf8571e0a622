//! Schema change plans
//!
//! Reconciliation never mutates the store directly. It works on private
//! copies of the tables in a [`SchemaWorkspace`] and records every change
//! as a [`SchemaOp`]. The resulting [`SchemaPlan`] is then applied through
//! one store transaction and committed or rolled back as a whole.
//!
//! Applying a plan is idempotent: creating an existing table, adding an
//! existing column or growing a column that is already large enough are
//! no-ops.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::schema::{fold_name, ColumnSpec, SchemaTable, SchemaTransaction, StoreResult};

use super::errors::{SyncError, SyncResult};

/// One additive schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
    CreateTable {
        table: String,
        primary_key: ColumnSpec,
    },
    AddColumn {
        table: String,
        column: ColumnSpec,
    },
    ResizeColumn {
        table: String,
        column: String,
        from: u32,
        to: u32,
    },
}

impl SchemaOp {
    pub fn table(&self) -> &str {
        match self {
            SchemaOp::CreateTable { table, .. }
            | SchemaOp::AddColumn { table, .. }
            | SchemaOp::ResizeColumn { table, .. } => table,
        }
    }

    fn apply(&self, tx: &mut dyn SchemaTransaction) -> StoreResult<()> {
        match self {
            SchemaOp::CreateTable { table, primary_key } => {
                tx.get_or_create_table(table, primary_key)?;
            }
            SchemaOp::AddColumn { table, column } => {
                if tx.get_column(table, &column.name)?.is_none() {
                    tx.add_column(table, column)?;
                }
            }
            SchemaOp::ResizeColumn {
                table, column, to, ..
            } => {
                let current = tx.get_column(table, column)?.and_then(|c| c.size);
                if current.map_or(true, |size| size < *to) {
                    tx.resize_column(table, column, *to)?;
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaOp::CreateTable { table, primary_key } => {
                write!(f, "create table {} ({} {})", table, primary_key.name, primary_key.storage_type)
            }
            SchemaOp::AddColumn { table, column } => match column.size {
                Some(size) => write!(f, "add column {}.{} {}({})", table, column.name, column.storage_type, size),
                None => write!(f, "add column {}.{} {}", table, column.name, column.storage_type),
            },
            SchemaOp::ResizeColumn {
                table,
                column,
                from,
                to,
            } => write!(f, "resize column {}.{} {} -> {}", table, column, from, to),
        }
    }
}

/// Ordered list of schema changes for one design.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SchemaPlan {
    ops: Vec<SchemaOp>,
}

impl SchemaPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: SchemaOp) {
        self.ops.push(op);
    }

    pub fn ops(&self) -> &[SchemaOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn tables_created(&self) -> usize {
        self.count(|op| matches!(op, SchemaOp::CreateTable { .. }))
    }

    pub fn columns_added(&self) -> usize {
        self.count(|op| matches!(op, SchemaOp::AddColumn { .. }))
    }

    pub fn columns_resized(&self) -> usize {
        self.count(|op| matches!(op, SchemaOp::ResizeColumn { .. }))
    }

    fn count(&self, predicate: impl Fn(&SchemaOp) -> bool) -> usize {
        self.ops.iter().filter(|op| predicate(op)).count()
    }

    /// Applies every operation in order, stopping at the first failure.
    pub fn apply(&self, tx: &mut dyn SchemaTransaction) -> StoreResult<()> {
        for op in &self.ops {
            op.apply(tx)?;
        }
        Ok(())
    }
}

/// Working copies of the tables one synchronization touches, keyed by
/// folded name.
///
/// Reads go through the transaction once per table; every change after
/// that is made to the copy and recorded in the plan.
pub struct SchemaWorkspace<'a> {
    tx: &'a mut dyn SchemaTransaction,
    tables: BTreeMap<String, Option<SchemaTable>>,
    plan: SchemaPlan,
}

impl<'a> SchemaWorkspace<'a> {
    pub fn new(tx: &'a mut dyn SchemaTransaction) -> Self {
        Self {
            tx,
            tables: BTreeMap::new(),
            plan: SchemaPlan::new(),
        }
    }

    /// Whether the table exists, counting tables planned for creation.
    pub fn exists(&mut self, name: &str) -> SyncResult<bool> {
        let key = fold_name(name);
        if !self.tables.contains_key(&key) {
            let table = self
                .tx
                .get_table(name)
                .map_err(|e| SyncError::store_failed(&format!("Unable to read table '{}'", name), e))?;
            self.tables.insert(key.clone(), table);
        }
        Ok(matches!(self.tables.get(&key), Some(Some(_))))
    }

    /// Returns a table previously seen by [`SchemaWorkspace::exists`] or created here.
    pub fn table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.get(&fold_name(name)).and_then(|t| t.as_ref())
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut SchemaTable> {
        self.tables.get_mut(&fold_name(name)).and_then(|t| t.as_mut())
    }

    /// Plans creation of a table. The caller checks it does not exist.
    pub fn create_table(&mut self, name: &str, primary_key: ColumnSpec) -> &mut SchemaTable {
        let table = SchemaTable::new(self.tx.tenant().clone(), name, primary_key);
        self.plan.push(SchemaOp::CreateTable {
            table: name.to_string(),
            primary_key: table.primary_key.clone(),
        });
        self.tables.entry(fold_name(name)).or_default().insert(table)
    }

    pub fn record(&mut self, op: SchemaOp) {
        self.plan.push(op);
    }

    pub fn into_plan(self) -> SchemaPlan {
        self.plan
    }
}
