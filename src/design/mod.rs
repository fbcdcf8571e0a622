//! Design documents
//!
//! A design document is an externally authored, versioned list of fields to
//! materialize into a tenant's schema. Documents are immutable once parsed.
//!
//! # Structure rules
//!
//! - The document names a tenant and a root table
//! - The version is a well-formed dotted numeric string
//! - Field keys are unique (case-insensitive) within each field list
//! - Every field has a known kind
//! - Grouped results carry at least one nested field

pub mod catalog;
pub mod provider;
pub mod wire;

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::DesignVersion;

pub use catalog::KindCatalog;
pub use provider::{DesignProvider, DesignRequest, FileDesignProvider, MemoryDesignProvider, ProviderError};

/// Identifier of an isolated owner of schema and data (one study).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// The two families of design document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesignKind {
    /// A survey questionnaire (one activity)
    Survey,
    /// The study's participant property declarations
    ParticipantProperties,
}

impl DesignKind {
    /// Stable identifier used in logs, file names and marker keys
    pub fn as_str(&self) -> &'static str {
        match self {
            DesignKind::Survey => "survey",
            DesignKind::ParticipantProperties => "participant_properties",
        }
    }

    /// Root table name used when a document carries no name of its own
    pub fn default_table_name(&self) -> &'static str {
        match self {
            DesignKind::Survey => "Survey",
            DesignKind::ParticipantProperties => "ParticipantProperties",
        }
    }

    /// Parses the identifier accepted on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "survey" => Some(DesignKind::Survey),
            "participant_properties" | "participantproperties" | "participant-properties" => {
                Some(DesignKind::ParticipantProperties)
            }
            _ => None,
        }
    }
}

impl fmt::Display for DesignKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How many values a field holds per owning row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Single,
    Multiple,
}

/// Semantic kind of a field as declared by the design document.
///
/// `Unknown` keeps the unrecognized declaration so the failure can name it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scale,
    ContinuousScale,
    TextScale,
    ValuePicker,
    ImageChoice,
    Choice,
    GroupedResult,
    Boolean,
    Numeric,
    TimeOfDay,
    Date,
    Text,
    Email,
    TimeInterval,
    Height,
    Location,
    Unknown(String),
}

impl FieldKind {
    pub fn name(&self) -> &str {
        match self {
            FieldKind::Scale => "scale",
            FieldKind::ContinuousScale => "continuousScale",
            FieldKind::TextScale => "textScale",
            FieldKind::ValuePicker => "valuePicker",
            FieldKind::ImageChoice => "imageChoice",
            FieldKind::Choice => "textChoice",
            FieldKind::GroupedResult => "grouped",
            FieldKind::Boolean => "boolean",
            FieldKind::Numeric => "numeric",
            FieldKind::TimeOfDay => "timeOfDay",
            FieldKind::Date => "date",
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::TimeInterval => "timeInterval",
            FieldKind::Height => "height",
            FieldKind::Location => "location",
            FieldKind::Unknown(raw) => raw,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, FieldKind::Unknown(_))
    }
}

/// One field of a design document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    /// Column name; unique within its field list
    pub key: String,
    pub kind: FieldKind,
    /// Declared max length for text values; `Some(0)` means unbounded
    pub max_length: Option<u32>,
    /// Sub-format discriminator for numeric and date kinds
    pub style: Option<String>,
    pub label: Option<String>,
    pub description: Option<String>,
    pub cardinality: Cardinality,
    /// Choice fields only: respondents may type a free-text answer
    pub other_option: bool,
    /// Grouped results only: the nested fields
    pub fields: Vec<FieldSpec>,
}

impl FieldSpec {
    pub fn new(key: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            kind,
            max_length: None,
            style: None,
            label: None,
            description: None,
            cardinality: Cardinality::Single,
            other_option: false,
            fields: Vec::new(),
        }
    }

    pub fn with_max_length(mut self, max_length: u32) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn multi_valued(mut self) -> Self {
        self.cardinality = Cardinality::Multiple;
        self
    }

    pub fn with_other_option(mut self) -> Self {
        self.other_option = true;
        self
    }

    pub fn with_fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = fields;
        self
    }

    pub fn is_multi_valued(&self) -> bool {
        self.cardinality == Cardinality::Multiple
    }
}

/// A structural defect found before any schema change is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct DesignViolation {
    /// Offending field key, if the defect is attributable to one
    pub field: Option<String>,
    pub reason: String,
}

impl DesignViolation {
    fn document(reason: impl Into<String>) -> Self {
        Self {
            field: None,
            reason: reason.into(),
        }
    }

    fn field(key: &str, reason: impl Into<String>) -> Self {
        Self {
            field: Some(key.to_string()),
            reason: reason.into(),
        }
    }
}

/// A versioned design to materialize into one root table and its sub-tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignDocument {
    pub tenant: TenantId,
    pub kind: DesignKind,
    /// Root table name (survey activity id)
    pub name: String,
    /// Version as written in the document; checked by [`DesignDocument::validate`]
    pub version: String,
    pub fields: Vec<FieldSpec>,
}

impl DesignDocument {
    /// Creates a document whose root table takes the design kind's default name.
    pub fn new(
        tenant: impl Into<TenantId>,
        kind: DesignKind,
        version: impl Into<String>,
        fields: Vec<FieldSpec>,
    ) -> Self {
        Self {
            tenant: tenant.into(),
            kind,
            name: kind.default_table_name().to_string(),
            version: version.into(),
            fields,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Returns the scope that version markers and sync locks are keyed by.
    pub fn scope(&self) -> DesignScope {
        DesignScope {
            tenant: self.tenant.clone(),
            kind: self.kind,
            design: self.name.clone(),
        }
    }

    /// Checks the document structure and returns its parsed version.
    ///
    /// Pure: looks only at the document.
    pub fn validate(&self) -> Result<DesignVersion, DesignViolation> {
        if self.tenant.is_empty() {
            return Err(DesignViolation::document("Design document does not name a tenant"));
        }
        if self.name.trim().is_empty() {
            return Err(DesignViolation::document("Design document does not name a root table"));
        }

        let version = DesignVersion::parse(&self.version).map_err(|e| {
            DesignViolation::document(format!("Malformed design version: {}", e))
        })?;

        validate_fields(&self.fields)?;

        Ok(version)
    }
}

fn validate_fields(fields: &[FieldSpec]) -> Result<(), DesignViolation> {
    let mut seen = HashSet::new();

    for field in fields {
        if field.key.trim().is_empty() {
            return Err(DesignViolation::document("Design contains a field with an empty key"));
        }

        if !seen.insert(field.key.to_ascii_lowercase()) {
            return Err(DesignViolation::field(
                &field.key,
                format!("Design schema contains duplicate field keys: {}", field.key),
            ));
        }

        match &field.kind {
            FieldKind::Unknown(raw) => {
                return Err(DesignViolation::field(
                    &field.key,
                    format!("Unknown field kind '{}' for key: {}", raw, field.key),
                ));
            }
            FieldKind::GroupedResult => {
                if field.fields.is_empty() {
                    return Err(DesignViolation::field(
                        &field.key,
                        format!("Grouped field contains no nested fields: {}", field.key),
                    ));
                }
                // Nested keys may overlap the outer list
                validate_fields(&field.fields)?;
            }
            _ => {}
        }
    }

    Ok(())
}

/// Key of everything that is tracked per design: version markers and locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DesignScope {
    pub tenant: TenantId,
    pub kind: DesignKind,
    /// Root table name
    pub design: String,
}

impl DesignScope {
    pub fn new(tenant: impl Into<TenantId>, kind: DesignKind, design: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            kind,
            design: design.into(),
        }
    }
}

impl fmt::Display for DesignScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.kind, self.design)
    }
}
