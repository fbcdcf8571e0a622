//! Design synchronizer
//!
//! Drives one design document through the state machine
//!
//! ```text
//! Idle -> Validating -> Reconciling -> Committing -> Applied
//!             |              |              |
//!             +-> (skipped)  +--------------+-> RolledBack
//! ```
//!
//! Validation is pure. Reconciliation plans every change against working
//! copies of the tables, applies the plan inside one store transaction and
//! commits it. The version marker is written only after the commit; if that
//! write fails the caller gets a retryable partial-apply error.
//!
//! Synchronizations of one design scope are serialized. The applied version
//! is read again just before commit so a marker written by another process
//! in the meantime still turns this attempt into a skip.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::design::{
    DesignDocument, DesignKind, DesignProvider, DesignRequest, DesignScope, FieldSpec, TenantId,
};
use crate::observability::{log_event, Event, Logger, ObservationScope, SyncMetrics};
use crate::schema::{ColumnSpec, SchemaStore, SchemaTransaction, StorageType};
use crate::version::DesignVersion;
use crate::versions::{VersionMarker, VersionStore};

use super::errors::{SyncError, SyncResult};
use super::plan::{SchemaOp, SchemaPlan, SchemaWorkspace};
use super::reconciler::{ColumnChange, ColumnReconciler};
use super::resolver::{FieldLayout, FieldTypeResolver};
use super::subtable::{SubTableResolver, PARTICIPANT_COLUMN, ROW_KEY_COLUMN};
use super::{SyncLocks, SyncSettings};

/// Primary key of participant properties root tables
pub const ENROLLMENT_TOKEN_COLUMN: &str = "EnrollmentToken";

/// Description of the free-text column of a choice with an other option
pub const OTHER_OPTION_DESCRIPTION: &str = "Optional text provided by respondent";

/// Name of the free-text column of a choice with an other option
pub fn other_option_column(field_key: &str) -> String {
    format!("{}_other", field_key)
}

/// States of one synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Validating,
    Reconciling,
    Committing,
    Applied,
    RolledBack,
}

impl SyncPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Idle => "IDLE",
            SyncPhase::Validating => "VALIDATING",
            SyncPhase::Reconciling => "RECONCILING",
            SyncPhase::Committing => "COMMITTING",
            SyncPhase::Applied => "APPLIED",
            SyncPhase::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a synchronization that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The design was applied and its version recorded
    Applied {
        version: DesignVersion,
        plan: SchemaPlan,
    },
    /// The design is not newer than the applied version; nothing changed
    Skipped {
        requested: DesignVersion,
        current: DesignVersion,
    },
}

impl SyncOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, SyncOutcome::Applied { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped { .. })
    }

    /// Version in effect for the scope after the call
    pub fn version(&self) -> &DesignVersion {
        match self {
            SyncOutcome::Applied { version, .. } => version,
            SyncOutcome::Skipped { current, .. } => current,
        }
    }
}

/// Log context and phase of one attempt
struct Attempt {
    sync_id: Uuid,
    fields: Vec<(&'static str, String)>,
    phase: SyncPhase,
}

impl Attempt {
    fn new(sync_id: Uuid, document: &DesignDocument) -> Self {
        Self {
            sync_id,
            fields: vec![
                ("sync_id", sync_id.to_string()),
                ("tenant", document.tenant.to_string()),
                ("kind", document.kind.as_str().to_string()),
                ("design", document.name.clone()),
                ("version", document.version.clone()),
            ],
            phase: SyncPhase::Idle,
        }
    }

    fn fields(&self) -> Vec<(&str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect()
    }

    fn log(&self, event: Event, extra: &[(&str, &str)]) {
        let mut fields = self.fields();
        fields.extend_from_slice(extra);
        log_event(event, &fields);
    }

    fn enter(&mut self, next: SyncPhase) {
        let from = self.phase;
        self.phase = next;
        self.log(
            Event::SyncPhaseChanged,
            &[("from", from.as_str()), ("to", next.as_str())],
        );
    }
}

/// Reconciles design documents into the schema store.
pub struct DesignSynchronizer {
    schema: Arc<dyn SchemaStore>,
    versions: Arc<dyn VersionStore>,
    settings: SyncSettings,
    resolver: FieldTypeResolver,
    columns: ColumnReconciler,
    sub_tables: SubTableResolver,
    locks: SyncLocks,
    metrics: SyncMetrics,
}

impl DesignSynchronizer {
    pub fn new(schema: Arc<dyn SchemaStore>, versions: Arc<dyn VersionStore>) -> Self {
        Self::with_settings(schema, versions, SyncSettings::default())
    }

    pub fn with_settings(
        schema: Arc<dyn SchemaStore>,
        versions: Arc<dyn VersionStore>,
        settings: SyncSettings,
    ) -> Self {
        let resolver = FieldTypeResolver::new();
        Self {
            schema,
            versions,
            columns: ColumnReconciler::new(resolver, &settings),
            settings,
            resolver,
            sub_tables: SubTableResolver::new(),
            locks: SyncLocks::new(),
            metrics: SyncMetrics::new(),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn metrics(&self) -> &SyncMetrics {
        &self.metrics
    }

    /// Fetches a design from `provider` and synchronizes it.
    ///
    /// Provider failures surface as invalid-design errors.
    pub fn synchronize_from(
        &self,
        provider: &dyn DesignProvider,
        request: &DesignRequest,
    ) -> SyncResult<SyncOutcome> {
        let document = match provider.fetch(request) {
            Ok(document) => document,
            Err(e) => {
                self.metrics.increment_rejected();
                return Err(SyncError::provider_failed(e));
            }
        };

        log_event(
            Event::DesignLoaded,
            &[
                ("tenant", request.tenant.as_str()),
                ("kind", request.kind.as_str()),
                ("design", document.name.as_str()),
                ("version", document.version.as_str()),
            ],
        );

        if document.kind != request.kind {
            self.metrics.increment_rejected();
            return Err(SyncError::invalid_design(format!(
                "Requested a {} design but the provider returned a {} design",
                request.kind, document.kind
            )));
        }

        self.synchronize(&document, &request.tenant)
    }

    /// Applies `document` to `tenant`'s schema if it is newer than the applied version.
    pub fn synchronize(&self, document: &DesignDocument, tenant: &TenantId) -> SyncResult<SyncOutcome> {
        let mut attempt = Attempt::new(Uuid::new_v4(), document);
        let observation = ObservationScope::with_fields("SYNC", &attempt.fields());

        let result = self.run(document, tenant, &mut attempt);

        match &result {
            Ok(SyncOutcome::Applied { plan, .. }) => {
                let operations = plan.len().to_string();
                observation.complete_with_fields(&[("outcome", "applied"), ("operations", operations.as_str())]);
            }
            Ok(SyncOutcome::Skipped { .. }) => {
                observation.complete_with_fields(&[("outcome", "skipped")]);
            }
            Err(e) => observation.fail(&e.to_string()),
        }

        result
    }

    fn run(
        &self,
        document: &DesignDocument,
        tenant: &TenantId,
        attempt: &mut Attempt,
    ) -> SyncResult<SyncOutcome> {
        attempt.enter(SyncPhase::Validating);

        let version = match self.validate(document, tenant) {
            Ok(version) => version,
            Err(e) => {
                self.metrics.increment_rejected();
                return Err(e);
            }
        };
        let field_count = document.fields.len().to_string();
        attempt.log(Event::SyncValidated, &[("fields", field_count.as_str())]);

        let scope = document.scope();
        let lock = self.locks.lock_for(&scope);
        let _serialized = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(current) = self.applied_version(&scope)? {
            if !version.is_newer_than(Some(&current)) {
                return Ok(self.skipped(attempt, version, current));
            }
        }

        attempt.enter(SyncPhase::Reconciling);

        let mut tx = self
            .schema
            .begin(tenant)
            .map_err(|e| SyncError::store_failed("Unable to open schema transaction", e))?;

        let plan = match self.plan(tx.as_mut(), document) {
            Ok(plan) => plan,
            Err(e) => return Err(self.roll_back(tx, attempt, e)),
        };

        if let Err(e) = plan.apply(tx.as_mut()) {
            let err = SyncError::store_failed("Unable to apply schema changes", e);
            return Err(self.roll_back(tx, attempt, err));
        }

        attempt.enter(SyncPhase::Committing);

        match self.applied_version(&scope) {
            Ok(Some(current)) if !version.is_newer_than(Some(&current)) => {
                if let Err(e) = tx.rollback() {
                    Logger::warn("SYNC_ROLLBACK_FAILED", &[("reason", e.to_string().as_str())]);
                }
                return Ok(self.skipped(attempt, version, current));
            }
            Ok(_) => {}
            Err(e) => return Err(self.roll_back(tx, attempt, e)),
        }

        if let Err(e) = tx.commit() {
            self.metrics.increment_rolled_back();
            attempt.enter(SyncPhase::RolledBack);
            let err = SyncError::store_failed("Unable to commit schema changes", e);
            attempt.log(Event::SyncRolledBack, &[("reason", err.to_string().as_str())]);
            return Err(err);
        }

        self.metrics.add_changes(
            plan.tables_created() as u64,
            plan.columns_added() as u64,
            plan.columns_resized() as u64,
        );
        attempt.log(Event::SyncCommitted, &[("operations", plan.len().to_string().as_str())]);
        self.log_plan(attempt, &plan);

        let marker = VersionMarker::new(scope.clone(), version.clone(), attempt.sync_id);
        if let Err(e) = self.versions.set_version(&marker) {
            self.metrics.increment_partial_applies();
            let err = SyncError::partial_apply(&scope, &version, e);
            attempt.log(Event::SyncPartialApply, &[("reason", err.to_string().as_str())]);
            return Err(err);
        }
        attempt.log(Event::VersionRecorded, &[]);

        attempt.enter(SyncPhase::Applied);
        self.metrics.increment_applied();
        Ok(SyncOutcome::Applied { version, plan })
    }

    fn validate(&self, document: &DesignDocument, tenant: &TenantId) -> SyncResult<DesignVersion> {
        let version = document.validate().map_err(SyncError::from_violation)?;

        if document.tenant != *tenant {
            return Err(SyncError::invalid_design(format!(
                "Design document belongs to tenant '{}', not '{}'",
                document.tenant, tenant
            )));
        }

        Ok(version)
    }

    fn applied_version(&self, scope: &DesignScope) -> SyncResult<Option<DesignVersion>> {
        let marker = self
            .versions
            .get_version(scope)
            .map_err(|e| SyncError::version_store_failed(scope, e))?;
        Ok(marker.map(|m| m.version))
    }

    fn skipped(&self, attempt: &Attempt, requested: DesignVersion, current: DesignVersion) -> SyncOutcome {
        self.metrics.increment_skipped();
        attempt.log(Event::SyncSkipped, &[("applied_version", current.as_str())]);
        SyncOutcome::Skipped { requested, current }
    }

    fn roll_back(
        &self,
        tx: Box<dyn SchemaTransaction + '_>,
        attempt: &mut Attempt,
        err: SyncError,
    ) -> SyncError {
        if let Err(e) = tx.rollback() {
            Logger::warn("SYNC_ROLLBACK_FAILED", &[("reason", e.to_string().as_str())]);
        }
        self.metrics.increment_rolled_back();
        attempt.enter(SyncPhase::RolledBack);
        let reason = err.to_string();
        let mut extra = vec![("reason", reason.as_str())];
        if let Some(field) = err.field() {
            extra.push(("field", field));
        }
        attempt.log(Event::SyncRolledBack, &extra);
        err
    }

    /// Plans every change `document` needs, reading through `tx` without writing.
    fn plan(&self, tx: &mut dyn SchemaTransaction, document: &DesignDocument) -> SyncResult<SchemaPlan> {
        let mut workspace = SchemaWorkspace::new(tx);
        self.ensure_root_table(&mut workspace, document)?;
        self.reconcile_fields(&mut workspace, &document.name, &document.fields)?;
        Ok(workspace.into_plan())
    }

    fn ensure_root_table(&self, workspace: &mut SchemaWorkspace<'_>, document: &DesignDocument) -> SyncResult<()> {
        let name = document.name.as_str();
        let primary_key = match document.kind {
            DesignKind::Survey => ColumnSpec::new(ROW_KEY_COLUMN, StorageType::Integer),
            DesignKind::ParticipantProperties => {
                ColumnSpec::varchar(ENROLLMENT_TOKEN_COLUMN, self.settings.enrollment_token_size)
            }
        };

        if workspace.exists(name)? {
            let table = self.table_mut(workspace, name, &primary_key.name)?;
            let existing = &table.primary_key;
            if !existing.name.eq_ignore_ascii_case(&primary_key.name)
                || existing.storage_type != primary_key.storage_type
            {
                return Err(SyncError::type_mismatch(
                    name,
                    &primary_key.name,
                    existing.storage_type,
                    primary_key.storage_type,
                ));
            }
        } else {
            workspace.create_table(name, primary_key);
        }

        if document.kind == DesignKind::Survey {
            let participant = ColumnSpec::new(PARTICIPANT_COLUMN, StorageType::Integer);
            let table = self.table_mut(workspace, name, PARTICIPANT_COLUMN)?;
            let change = self.columns.ensure_column(table, &participant, PARTICIPANT_COLUMN)?;
            record(workspace, name, &change);
        }

        Ok(())
    }

    fn reconcile_fields(
        &self,
        workspace: &mut SchemaWorkspace<'_>,
        table_name: &str,
        fields: &[FieldSpec],
    ) -> SyncResult<()> {
        for field in fields {
            match self.resolver.layout(field) {
                FieldLayout::Column => {
                    self.reconcile_value(workspace, table_name, field)?;
                }
                FieldLayout::Choice { other_option } => {
                    let sub_table = self.sub_table(workspace, table_name, field)?;
                    self.reconcile_value(workspace, &sub_table, field)?;
                    if other_option {
                        let other = ColumnSpec::varchar(
                            other_option_column(&field.key),
                            self.settings.other_option_size,
                        )
                        .with_description(Some(OTHER_OPTION_DESCRIPTION.to_string()));
                        let table = self.table_mut(workspace, &sub_table, &field.key)?;
                        let change = self.columns.ensure_column(table, &other, &field.key)?;
                        record(workspace, &sub_table, &change);
                    }
                }
                FieldLayout::Repeated => {
                    let sub_table = self.sub_table(workspace, table_name, field)?;
                    self.reconcile_value(workspace, &sub_table, field)?;
                }
                FieldLayout::Group(nested) => {
                    let sub_table = self.sub_table(workspace, table_name, field)?;
                    self.reconcile_fields(workspace, &sub_table, nested)?;
                }
            }
        }
        Ok(())
    }

    fn reconcile_value(
        &self,
        workspace: &mut SchemaWorkspace<'_>,
        table_name: &str,
        field: &FieldSpec,
    ) -> SyncResult<()> {
        let table = self.table_mut(workspace, table_name, &field.key)?;
        let change = self.columns.reconcile(table, field)?;
        record(workspace, table_name, &change);
        Ok(())
    }

    /// Resolves the sub-table of `field` and returns its name.
    fn sub_table(
        &self,
        workspace: &mut SchemaWorkspace<'_>,
        parent_name: &str,
        field: &FieldSpec,
    ) -> SyncResult<String> {
        let parent = workspace
            .table(parent_name)
            .cloned()
            .ok_or_else(|| missing_table(parent_name, &field.key))?;
        let sub_table = self.sub_tables.resolve(workspace, &parent, field)?;
        Ok(sub_table.name)
    }

    fn table_mut<'w>(
        &self,
        workspace: &'w mut SchemaWorkspace<'_>,
        name: &str,
        field_key: &str,
    ) -> SyncResult<&'w mut crate::schema::SchemaTable> {
        workspace
            .table_mut(name)
            .ok_or_else(|| missing_table(name, field_key))
    }

    fn log_plan(&self, attempt: &Attempt, plan: &SchemaPlan) {
        for op in plan.ops() {
            match op {
                SchemaOp::CreateTable { table, .. } => {
                    attempt.log(Event::TableCreated, &[("table", table.as_str())]);
                }
                SchemaOp::AddColumn { table, column } => {
                    attempt.log(
                        Event::ColumnAdded,
                        &[
                            ("table", table.as_str()),
                            ("column", column.name.as_str()),
                            ("type", column.storage_type.type_name()),
                        ],
                    );
                }
                SchemaOp::ResizeColumn {
                    table,
                    column,
                    from,
                    to,
                } => {
                    attempt.log(
                        Event::ColumnResized,
                        &[
                            ("table", table.as_str()),
                            ("column", column.as_str()),
                            ("from", from.to_string().as_str()),
                            ("to", to.to_string().as_str()),
                        ],
                    );
                }
            }
        }
    }
}

fn record(workspace: &mut SchemaWorkspace<'_>, table: &str, change: &ColumnChange) {
    if let Some(op) = change.to_op(table) {
        workspace.record(op);
    }
}

fn missing_table(table: &str, field_key: &str) -> SyncError {
    SyncError::invalid_sub_table(table, field_key, "table is not part of the plan")
}
