//! Catalog-backed schema store
//!
//! Keeps every tenant's tables in one in-memory catalog. When opened on a
//! path, the catalog is persisted as JSON on each commit:
//!
//! 1. Take an exclusive lock on `<path>.lock`
//! 2. Re-load the catalog from `<path>` and merge in the changed tables
//! 3. Write to `<path>.tmp` and fsync it
//! 4. Rename over `<path>` (atomic on POSIX)
//!
//! Several stores, in one process or many, may share a catalog file. Each
//! commit only replaces the tables it changed. A failed write leaves both
//! the file and the in-memory catalog untouched.
//!
//! Table names compare case-insensitively; the stored table keeps the
//! spelling it was created with.
//!
//! Transactions stage private copies of the tables they touch. Commit is
//! optimistic: if a table this transaction changed no longer matches what
//! it first read here, the commit fails with a conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fd_lock::RwLock;
use serde::{Deserialize, Serialize};

use crate::design::TenantId;

use super::errors::{StoreError, StoreResult};
use super::store::{SchemaStore, SchemaTransaction};
use super::types::{fold_name, ColumnSpec, SchemaTable};

/// On-disk catalog layout version
const CATALOG_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    format_version: u32,
    tables: Vec<SchemaTable>,
}

/// Tables keyed by owner and folded name
#[derive(Debug, Clone, Default)]
struct CatalogState {
    tables: BTreeMap<(TenantId, String), SchemaTable>,
}

/// Schema store over a single catalog, optionally persisted to a JSON file.
pub struct CatalogSchemaStore {
    path: Option<PathBuf>,
    state: Mutex<CatalogState>,
}

impl CatalogSchemaStore {
    /// Creates an empty store that lives only in memory.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(CatalogState::default()),
        }
    }

    /// Opens a file-backed store, loading the catalog if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let state = read_catalog(&path)?;

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Returns the catalog file, if persisted.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of tables across all tenants.
    pub fn table_count(&self) -> usize {
        self.lock().tables.len()
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Picks up commits made through other stores on the same file.
    fn refresh(&self) -> StoreResult<MutexGuard<'_, CatalogState>> {
        let mut state = self.lock();
        if let Some(path) = &self.path {
            if path.exists() {
                *state = load_catalog(path)?;
            }
        }
        Ok(state)
    }
}

impl SchemaStore for CatalogSchemaStore {
    fn begin(&self, tenant: &TenantId) -> StoreResult<Box<dyn SchemaTransaction + '_>> {
        drop(self.refresh()?);
        Ok(Box::new(CatalogTransaction {
            store: self,
            tenant: tenant.clone(),
            observed: BTreeMap::new(),
            staged: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }))
    }

    fn get_table(&self, tenant: &TenantId, name: &str) -> StoreResult<Option<SchemaTable>> {
        let state = self.refresh()?;
        Ok(state.tables.get(&(tenant.clone(), fold_name(name))).cloned())
    }

    fn list_tables(&self, tenant: &TenantId) -> StoreResult<Vec<SchemaTable>> {
        let state = self.refresh()?;
        Ok(state
            .tables
            .iter()
            .filter(|((owner, _), _)| owner == tenant)
            .map(|(_, table)| table.clone())
            .collect())
    }
}

/// A transaction over [`CatalogSchemaStore`].
///
/// Every map is keyed by folded table name.
pub struct CatalogTransaction<'a> {
    store: &'a CatalogSchemaStore,
    tenant: TenantId,
    /// Committed table when first read here (`None` = absent)
    observed: BTreeMap<String, Option<SchemaTable>>,
    /// Working copies, including tables observed absent
    staged: BTreeMap<String, Option<SchemaTable>>,
    /// Tables changed by this transaction
    dirty: BTreeSet<String>,
}

impl CatalogTransaction<'_> {
    fn load(&mut self, name: &str) -> Option<&mut SchemaTable> {
        let key = fold_name(name);
        if !self.staged.contains_key(&key) {
            let committed = {
                let state = self.store.lock();
                state.tables.get(&(self.tenant.clone(), key.clone())).cloned()
            };
            self.observed.insert(key.clone(), committed.clone());
            self.staged.insert(key.clone(), committed);
        }
        self.staged.get_mut(&key).and_then(|table| table.as_mut())
    }

    fn require(&mut self, name: &str) -> StoreResult<&mut SchemaTable> {
        let tenant = self.tenant.to_string();
        self.load(name).ok_or_else(|| StoreError::TableNotFound {
            tenant,
            table: name.to_string(),
        })
    }

    fn mark_dirty(&mut self, name: &str) {
        self.dirty.insert(fold_name(name));
    }

    /// Applies the changed tables on top of `base`, failing if any of them
    /// moved since this transaction read it.
    fn merge_into(&self, mut base: CatalogState) -> StoreResult<CatalogState> {
        for key in &self.dirty {
            let staged = self.staged.get(key).and_then(|table| table.as_ref());
            let observed = self.observed.get(key).and_then(|table| table.as_ref());
            let entry = (self.tenant.clone(), key.clone());
            if base.tables.get(&entry) != observed {
                let table = staged.map_or_else(|| key.clone(), |table| table.name.clone());
                return Err(StoreError::Conflict { table });
            }
            if let Some(table) = staged {
                base.tables.insert(entry, table.clone());
            }
        }
        Ok(base)
    }
}

impl SchemaTransaction for CatalogTransaction<'_> {
    fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    fn get_table(&mut self, name: &str) -> StoreResult<Option<SchemaTable>> {
        Ok(self.load(name).map(|table| table.clone()))
    }

    fn get_or_create_table(&mut self, name: &str, primary_key: &ColumnSpec) -> StoreResult<SchemaTable> {
        if let Some(table) = self.load(name) {
            let existing = &table.primary_key;
            if existing.folded_name() != primary_key.folded_name()
                || existing.storage_type != primary_key.storage_type
            {
                return Err(StoreError::PrimaryKeyMismatch {
                    table: name.to_string(),
                    existing: existing.name.clone(),
                    requested: primary_key.name.clone(),
                });
            }
            return Ok(table.clone());
        }

        let table = SchemaTable::new(self.tenant.clone(), name, primary_key.clone());
        self.staged.insert(fold_name(name), Some(table.clone()));
        self.mark_dirty(name);
        Ok(table)
    }

    fn get_column(&mut self, table: &str, name: &str) -> StoreResult<Option<ColumnSpec>> {
        Ok(self.require(table)?.column(name).cloned())
    }

    fn add_column(&mut self, table: &str, column: &ColumnSpec) -> StoreResult<()> {
        let staged = self.require(table)?;
        if !staged.insert_column(column.clone()) {
            return Err(StoreError::ColumnExists {
                table: table.to_string(),
                column: column.name.clone(),
            });
        }
        self.mark_dirty(table);
        Ok(())
    }

    fn resize_column(&mut self, table: &str, name: &str, size: u32) -> StoreResult<()> {
        let staged = self.require(table)?;
        let current = staged
            .column(name)
            .ok_or_else(|| StoreError::ColumnNotFound {
                table: table.to_string(),
                column: name.to_string(),
            })?
            .size
            .unwrap_or(0);

        if size < current {
            return Err(StoreError::Shrink {
                table: table.to_string(),
                column: name.to_string(),
                current,
                requested: size,
            });
        }

        staged.set_column_size(name, size);
        self.mark_dirty(table);
        Ok(())
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }

        let mut state = self.store.lock();

        let next = match &self.store.path {
            Some(path) => {
                let mut file_lock = open_lock(path)?;
                let _guard = file_lock.write().map_err(|source| StoreError::Io {
                    path: lock_path(path),
                    source,
                })?;
                let next = self.merge_into(read_catalog(path)?)?;
                persist_catalog(path, &next)?;
                next
            }
            None => self.merge_into(state.clone())?,
        };

        *state = next;
        Ok(())
    }

    fn rollback(self: Box<Self>) -> StoreResult<()> {
        // Staged copies are simply dropped
        Ok(())
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

fn open_lock(path: &Path) -> StoreResult<RwLock<File>> {
    let lock_path = lock_path(path);
    let io_error = |source| StoreError::Io {
        path: lock_path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)
        .map_err(io_error)?;
    Ok(RwLock::new(file))
}

fn read_catalog(path: &Path) -> StoreResult<CatalogState> {
    if path.exists() {
        load_catalog(path)
    } else {
        Ok(CatalogState::default())
    }
}

fn load_catalog(path: &Path) -> StoreResult<CatalogState> {
    let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let file: CatalogFile = serde_json::from_str(&content).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("invalid JSON: {}", e),
    })?;

    if file.format_version != CATALOG_FORMAT_VERSION {
        return Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("unsupported format version {}", file.format_version),
        });
    }

    let mut state = CatalogState::default();
    for table in file.tables {
        let key = (table.tenant.clone(), fold_name(&table.name));
        if state.tables.contains_key(&key) {
            return Err(StoreError::Corrupt {
                path: path.to_path_buf(),
                reason: format!("table '{}' listed twice for tenant '{}'", table.name, key.0),
            });
        }
        state.tables.insert(key, table);
    }

    Ok(state)
}

fn persist_catalog(path: &Path, state: &CatalogState) -> StoreResult<()> {
    let io_error = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let file = CatalogFile {
        format_version: CATALOG_FORMAT_VERSION,
        tables: state.tables.values().cloned().collect(),
    };
    let content = serde_json::to_string_pretty(&file).map_err(|e| StoreError::Corrupt {
        path: path.to_path_buf(),
        reason: format!("failed to serialize catalog: {}", e),
    })?;

    let temp_path = path.with_extension("json.tmp");
    let mut temp = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(io_error)?;
    temp.write_all(content.as_bytes()).map_err(io_error)?;
    temp.sync_all().map_err(io_error)?;

    fs::rename(&temp_path, path).map_err(io_error)?;

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }

    Ok(())
}
