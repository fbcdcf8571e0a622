//! Durable Synchronization Tests
//!
//! Designs read from a drop directory, applied to the file-backed catalog
//! and recorded in marker files, then checked after reopening every store:
//! - Committed tables survive a restart
//! - Markers survive a restart, so old versions keep skipping
//! - Wire-level structure (choices, forms, repeats) maps to sub-tables

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use designsync::design::{DesignKind, DesignRequest, DesignScope, FileDesignProvider, KindCatalog, TenantId};
use designsync::schema::{CatalogSchemaStore, SchemaStore, StorageType};
use designsync::sync::{DesignSynchronizer, SyncErrorCode, SyncOutcome, OTHER_OPTION_DESCRIPTION};
use designsync::versions::{FileVersionStore, VersionStore};
use serde_json::{json, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

struct Env {
    _tmp: TempDir,
    designs: PathBuf,
    catalog: PathBuf,
    markers: PathBuf,
}

impl Env {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let designs = tmp.path().join("designs");
        fs::create_dir_all(&designs).unwrap();
        Self {
            designs,
            catalog: tmp.path().join("schema").join("catalog.json"),
            markers: tmp.path().join("versions"),
            _tmp: tmp,
        }
    }

    /// A synchronizer over freshly opened stores, as after a restart.
    fn open(&self) -> (Arc<CatalogSchemaStore>, DesignSynchronizer) {
        let schema = Arc::new(CatalogSchemaStore::open(&self.catalog).unwrap());
        let versions = Arc::new(FileVersionStore::new(&self.markers));
        let synchronizer = DesignSynchronizer::new(schema.clone(), versions);
        (schema, synchronizer)
    }

    fn provider(&self) -> FileDesignProvider {
        FileDesignProvider::new(&self.designs, KindCatalog::standard())
    }

    fn drop_survey(&self, version: &str, steps: Value) {
        let doc = json!({"activity": {
            "metadata": {"studyId": "S1", "activityId": "Daily", "version": version},
            "steps": steps
        }});
        write(&self.designs.join(format!("S1_Daily_{}.json", version)), &doc);
    }
}

fn write(path: &Path, doc: &Value) {
    fs::write(path, serde_json::to_string_pretty(doc).unwrap()).unwrap();
}

fn s1() -> TenantId {
    TenantId::new("S1")
}

fn daily_steps() -> Value {
    json!([
        {"type": "instruction", "key": "Welcome", "title": "Welcome"},
        {"type": "question", "resultType": "scale", "key": "Mood", "title": "Mood today"},
        {"type": "question", "resultType": "text", "key": "Note", "format": {"maxLength": 40}},
        {"type": "question", "resultType": "textChoice", "key": "Meal",
         "format": {"textChoices": [{"text": "Toast"}, {"text": "Other", "other": true}]}},
        {"type": "question", "resultType": "text", "key": "Symptom", "repeatable": true},
        {"type": "form", "key": "Meds", "steps": [
            {"type": "question", "resultType": "text", "key": "Name"},
            {"type": "question", "resultType": "numeric", "key": "Dose", "format": {"style": "Decimal"}}
        ]}
    ])
}

// =============================================================================
// Wire-To-Schema Tests
// =============================================================================

/// One survey file produces the root table and every sub-table.
#[test]
fn test_survey_file_materializes_tables() {
    let env = Env::new();
    env.drop_survey("1.0", daily_steps());
    let (schema, synchronizer) = env.open();

    let outcome = synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1.0"))
        .unwrap();
    assert!(outcome.is_applied());

    let names: Vec<String> = schema
        .list_tables(&s1())
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["Daily", "DailyMeal", "DailyMeds", "DailySymptom"]);

    let root = schema.get_table(&s1(), "Daily").unwrap().unwrap();
    assert_eq!(root.column_names(), vec!["Key", "Mood", "Note", "ParticipantId"]);
    assert_eq!(root.column("Note").unwrap().size, Some(40));
    assert_eq!(root.column("Mood").unwrap().label.as_deref(), Some("Mood today"));

    let meal = schema.get_table(&s1(), "DailyMeal").unwrap().unwrap();
    let other = meal.column("Meal_other").unwrap();
    assert_eq!(other.storage_type, StorageType::Varchar);
    assert_eq!(other.size, Some(4000));
    assert_eq!(other.description.as_deref(), Some(OTHER_OPTION_DESCRIPTION));
    assert!(meal.has_column("DailyId"));

    let meds = schema.get_table(&s1(), "DailyMeds").unwrap().unwrap();
    assert_eq!(meds.column("Dose").unwrap().storage_type, StorageType::Double);
    assert!(meds.has_column("Name"));

    let symptom = schema.get_table(&s1(), "DailySymptom").unwrap().unwrap();
    assert_eq!(symptom.column_names(), vec!["Key", "DailyId", "ParticipantId", "Symptom"]);
}

/// Participant properties are keyed by enrollment token.
#[test]
fn test_participant_properties_file() {
    let env = Env::new();
    let doc = json!({
        "metadata": {"studyId": "S1", "studyVersion": "3"},
        "participantProperties": [
            {"propertyId": "Site", "propertyName": "Site", "propertyType": "preEnrollment",
             "propertyDataType": "string"},
            {"propertyId": "Enrolled", "propertyDataType": "date"}
        ]
    });
    write(&env.designs.join("S1_ParticipantProperties.json"), &doc);
    let (schema, synchronizer) = env.open();

    synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::participant_properties("S1"))
        .unwrap();

    let table = schema.get_table(&s1(), "ParticipantProperties").unwrap().unwrap();
    assert_eq!(table.primary_key.name, "EnrollmentToken");
    assert_eq!(table.primary_key.storage_type, StorageType::Varchar);
    assert_eq!(table.column("Site").unwrap().storage_type, StorageType::Varchar);
    assert_eq!(
        table.column("Site").unwrap().description.as_deref(),
        Some("Pre-enrollment participant property")
    );
    assert_eq!(table.column("Enrolled").unwrap().storage_type, StorageType::DateTime);
    assert!(!table.has_column("ParticipantId"));
}

/// A missing file is an invalid design, not a crash.
#[test]
fn test_missing_design_file() {
    let env = Env::new();
    let (_schema, synchronizer) = env.open();
    let err = synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "7"))
        .unwrap_err();
    assert_eq!(err.code(), SyncErrorCode::InvalidDesign);
}

/// A step with an unmapped result type aborts the design.
#[test]
fn test_unknown_result_type_is_rejected() {
    let env = Env::new();
    env.drop_survey(
        "1",
        json!([{"type": "question", "resultType": "hologram", "key": "Odd"}]),
    );
    let (schema, synchronizer) = env.open();

    let err = synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1"))
        .unwrap_err();
    assert_eq!(err.code(), SyncErrorCode::InvalidDesign);
    assert_eq!(err.field(), Some("Odd"));
    assert!(schema.list_tables(&s1()).unwrap().is_empty());
}

// =============================================================================
// Restart Tests
// =============================================================================

/// Tables and markers survive reopening; old versions keep skipping.
#[test]
fn test_state_survives_restart() {
    let env = Env::new();
    env.drop_survey("1.1", daily_steps());
    env.drop_survey("1.0", daily_steps());

    {
        let (_schema, synchronizer) = env.open();
        synchronizer
            .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1.1"))
            .unwrap();
    }

    let (schema, synchronizer) = env.open();
    assert_eq!(schema.list_tables(&s1()).unwrap().len(), 4);

    let markers = FileVersionStore::new(&env.markers);
    let marker = markers
        .get_version(&DesignScope::new("S1", DesignKind::Survey, "Daily"))
        .unwrap()
        .unwrap();
    assert_eq!(marker.version.as_str(), "1.1");

    let outcome = synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1.0"))
        .unwrap();
    assert!(outcome.is_skipped());
}

/// A newer version after restart adds only what changed.
#[test]
fn test_evolution_after_restart() {
    let env = Env::new();
    env.drop_survey(
        "1",
        json!([{"type": "question", "resultType": "text", "key": "Note", "format": {"maxLength": 10}}]),
    );
    env.drop_survey(
        "2",
        json!([
            {"type": "question", "resultType": "text", "key": "Note", "format": {"maxLength": 80}},
            {"type": "question", "resultType": "boolean", "key": "Slept"}
        ]),
    );

    {
        let (_schema, synchronizer) = env.open();
        synchronizer
            .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1"))
            .unwrap();
    }

    let (schema, synchronizer) = env.open();
    let outcome = synchronizer
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "2"))
        .unwrap();

    match outcome {
        SyncOutcome::Applied { plan, .. } => {
            assert_eq!(plan.tables_created(), 0);
            assert_eq!(plan.columns_added(), 1);
            assert_eq!(plan.columns_resized(), 1);
        }
        other => panic!("expected apply, got {:?}", other),
    }

    let root = schema.get_table(&s1(), "Daily").unwrap().unwrap();
    assert_eq!(root.column("Note").unwrap().size, Some(80));
    assert!(root.has_column("Slept"));
}

/// Two engines sharing one catalog file each keep the other's tables.
#[test]
fn test_engines_sharing_a_catalog_keep_each_others_tables() {
    let env = Env::new();
    env.drop_survey("1", daily_steps());
    let doc = json!({"activity": {
        "metadata": {"studyId": "S2", "activityId": "Daily", "version": "1"},
        "steps": daily_steps()
    }});
    write(&env.designs.join("S2_Daily_1.json"), &doc);

    let (_first_schema, first) = env.open();
    let (_second_schema, second) = env.open();

    assert!(first
        .synchronize_from(&env.provider(), &DesignRequest::survey("S1", "Daily", "1"))
        .unwrap()
        .is_applied());
    assert!(second
        .synchronize_from(&env.provider(), &DesignRequest::survey("S2", "Daily", "1"))
        .unwrap()
        .is_applied());

    let (schema, _synchronizer) = env.open();
    for tenant in [s1(), TenantId::new("S2")] {
        let tables = schema.list_tables(&tenant).unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Daily", "DailyMeal", "DailyMeds", "DailySymptom"]);
    }
}
