//! JSON wire formats for design documents
//!
//! Survey activities:
//!
//! ```json
//! {"activity": {"metadata": {"studyId": "S", "activityId": "Daily", "version": "1.1"},
//!               "steps": [{"type": "question", "resultType": "scale", "key": "Mood"}]}}
//! ```
//!
//! Participant properties:
//!
//! ```json
//! {"metadata": {"studyId": "S", "studyVersion": "2"},
//!  "participantProperties": [{"propertyId": "Site", "propertyDataType": "string"}]}
//! ```
//!
//! Unknown JSON properties are ignored. Kind strings go through a
//! [`KindCatalog`]; unrecognized kinds survive parsing as
//! [`FieldKind::Unknown`] and are rejected by document validation.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use super::catalog::KindCatalog;
use super::{DesignDocument, DesignKind, FieldKind, FieldSpec, TenantId};

/// Step type whose steps are content only and hold no result
const INSTRUCTION_STEP: &str = "instruction";
/// Step type of a form; a form without a result type is a grouped result
const FORM_STEP: &str = "form";

/// Failures turning wire JSON into a [`DesignDocument`].
#[derive(Debug, Error)]
pub enum WireError {
    #[error("Unable to parse design json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Design document does not contain required fields ({0})")]
    MissingMetadata(&'static str),

    #[error("Step is missing its key (title: {0})")]
    MissingStepKey(String),

    #[error("Invalid format for key {key}: {reason}")]
    InvalidFormat { key: String, reason: String },
}

#[derive(Debug, Deserialize)]
struct ActivityEnvelope {
    activity: Option<Activity>,
}

#[derive(Debug, Deserialize)]
struct Activity {
    metadata: Option<ActivityMetadata>,
    steps: Option<Vec<Step>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityMetadata {
    study_id: Option<String>,
    activity_id: Option<String>,
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Step {
    #[serde(rename = "type")]
    step_type: Option<String>,
    result_type: Option<String>,
    key: Option<String>,
    title: Option<String>,
    text: Option<String>,
    #[serde(default)]
    repeatable: bool,
    format: Option<StepFormat>,
    steps: Option<Vec<Step>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StepFormat {
    max_length: Option<Value>,
    style: Option<Value>,
    text_choices: Option<Vec<TextChoice>>,
}

#[derive(Debug, Deserialize)]
struct TextChoice {
    #[serde(default)]
    other: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantEnvelope {
    metadata: Option<StudyMetadata>,
    participant_properties: Option<Vec<ParticipantPropertyWire>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyMetadata {
    study_id: Option<String>,
    study_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParticipantPropertyWire {
    property_id: Option<String>,
    property_name: Option<String>,
    property_type: Option<String>,
    property_data_type: Option<String>,
}

/// Parses a survey activity design.
pub fn parse_survey(json: &str, catalog: &KindCatalog) -> Result<DesignDocument, WireError> {
    let envelope: ActivityEnvelope = serde_json::from_str(json)?;
    let activity = envelope
        .activity
        .ok_or(WireError::MissingMetadata("activity"))?;
    let metadata = activity
        .metadata
        .ok_or(WireError::MissingMetadata("activity metadata"))?;
    let steps = activity.steps.ok_or(WireError::MissingMetadata("steps"))?;

    let study_id = metadata.study_id.ok_or(WireError::MissingMetadata("studyId"))?;
    let activity_id = metadata
        .activity_id
        .ok_or(WireError::MissingMetadata("activityId"))?;
    let version = metadata.version.ok_or(WireError::MissingMetadata("version"))?;

    let fields = convert_steps(steps, catalog)?;

    Ok(DesignDocument::new(TenantId::new(study_id), DesignKind::Survey, version, fields)
        .with_name(activity_id))
}

fn convert_steps(steps: Vec<Step>, catalog: &KindCatalog) -> Result<Vec<FieldSpec>, WireError> {
    let mut fields = Vec::with_capacity(steps.len());
    for step in steps {
        if let Some(field) = convert_step(step, catalog)? {
            fields.push(field);
        }
    }
    Ok(fields)
}

fn convert_step(step: Step, catalog: &KindCatalog) -> Result<Option<FieldSpec>, WireError> {
    let step_type = step.step_type.as_deref().unwrap_or_default();
    if step_type.eq_ignore_ascii_case(INSTRUCTION_STEP) {
        return Ok(None);
    }

    let key = step
        .key
        .ok_or_else(|| WireError::MissingStepKey(step.title.clone().unwrap_or_default()))?;

    let kind = match step.result_type.as_deref() {
        Some(result_type) => catalog.survey_kind(result_type),
        None if step_type.eq_ignore_ascii_case(FORM_STEP) => FieldKind::GroupedResult,
        None => FieldKind::Unknown(String::new()),
    };

    let mut field = FieldSpec::new(key, kind);
    field.label = step.title;
    field.description = step.text;

    if let Some(format) = step.format {
        field.max_length = parse_max_length(&field.key, format.max_length.as_ref())?;
        field.style = format.style.as_ref().and_then(style_text);
        field.other_option = format
            .text_choices
            .map(|choices| choices.iter().any(|c| c.other))
            .unwrap_or(false);
    }

    if step.repeatable && field.kind != FieldKind::GroupedResult {
        field = field.multi_valued();
    }

    if let Some(nested) = step.steps {
        field.fields = convert_steps(nested, catalog)?;
    }

    Ok(Some(field))
}

fn parse_max_length(key: &str, value: Option<&Value>) -> Result<Option<u32>, WireError> {
    let invalid = |reason: String| WireError::InvalidFormat {
        key: key.to_string(),
        reason,
    };

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(format!("maxLength {} is not a valid length", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| invalid(format!("maxLength '{}' is not a valid length", s))),
        Some(other) => Err(invalid(format!("maxLength {} is not a valid length", other))),
    }
}

fn style_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

/// Parses a participant properties design.
pub fn parse_participant_properties(
    json: &str,
    catalog: &KindCatalog,
) -> Result<DesignDocument, WireError> {
    let envelope: ParticipantEnvelope = serde_json::from_str(json)?;
    let (metadata, properties) = match (envelope.metadata, envelope.participant_properties) {
        (Some(metadata), Some(properties)) => (metadata, properties),
        _ => return Err(WireError::MissingMetadata("study metadata and properties")),
    };

    let study_id = metadata.study_id.ok_or(WireError::MissingMetadata("studyId"))?;
    let version = metadata
        .study_version
        .ok_or(WireError::MissingMetadata("studyVersion"))?;

    let mut fields = Vec::with_capacity(properties.len());
    for property in properties {
        let key = property
            .property_id
            .ok_or_else(|| WireError::MissingStepKey(property.property_name.clone().unwrap_or_default()))?;
        let kind = catalog.participant_kind(property.property_data_type.as_deref().unwrap_or_default());

        let mut field = FieldSpec::new(key, kind);
        field.label = property.property_name;
        field.description = property_timing(&field.key, property.property_type.as_deref())?;
        fields.push(field);
    }

    Ok(DesignDocument::new(
        TenantId::new(study_id),
        DesignKind::ParticipantProperties,
        version,
        fields,
    ))
}

fn property_timing(key: &str, property_type: Option<&str>) -> Result<Option<String>, WireError> {
    match property_type.map(str::to_ascii_lowercase).as_deref() {
        None => Ok(None),
        Some("preenrollment") => Ok(Some("Pre-enrollment participant property".into())),
        Some("postenrollment") => Ok(Some("Post-enrollment participant property".into())),
        Some(other) => Err(WireError::InvalidFormat {
            key: key.to_string(),
            reason: format!("unknown propertyType '{}'", other),
        }),
    }
}
