//! Lookup tables from design-document kind strings to [`FieldKind`]
//!
//! Built once by the caller and passed by reference to the wire parsers.
//! Tables are never mutated after construction.

use std::collections::HashMap;

use super::FieldKind;

/// Immutable kind lookup tables for both design families.
#[derive(Debug, Clone)]
pub struct KindCatalog {
    /// Survey `resultType` strings, matched exactly
    survey: HashMap<&'static str, FieldKind>,
    /// Participant `propertyDataType` strings, matched case-insensitively
    participant: HashMap<&'static str, FieldKind>,
}

impl KindCatalog {
    /// The catalog of all kinds this engine can materialize.
    pub fn standard() -> Self {
        let survey = [
            FieldKind::Scale,
            FieldKind::ContinuousScale,
            FieldKind::TextScale,
            FieldKind::ValuePicker,
            FieldKind::ImageChoice,
            FieldKind::Choice,
            FieldKind::GroupedResult,
            FieldKind::Boolean,
            FieldKind::Numeric,
            FieldKind::TimeOfDay,
            FieldKind::Date,
            FieldKind::Text,
            FieldKind::Email,
            FieldKind::TimeInterval,
            FieldKind::Height,
            FieldKind::Location,
        ]
        .into_iter()
        .map(|kind| (static_name(&kind), kind))
        .collect();

        // Participant times are kept as text
        let participant = HashMap::from([
            ("boolean", FieldKind::Boolean),
            ("date", FieldKind::Date),
            ("numeric", FieldKind::Numeric),
            ("string", FieldKind::Text),
            ("time", FieldKind::Text),
        ]);

        Self { survey, participant }
    }

    /// Looks up a survey step result type.
    pub fn survey_kind(&self, result_type: &str) -> FieldKind {
        self.survey
            .get(result_type)
            .cloned()
            .unwrap_or_else(|| FieldKind::Unknown(result_type.to_string()))
    }

    /// Looks up a participant property data type.
    pub fn participant_kind(&self, data_type: &str) -> FieldKind {
        self.participant
            .get(data_type.to_ascii_lowercase().as_str())
            .cloned()
            .unwrap_or_else(|| FieldKind::Unknown(data_type.to_string()))
    }

    /// Number of survey result types known.
    pub fn survey_kind_count(&self) -> usize {
        self.survey.len()
    }
}

impl Default for KindCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn static_name(kind: &FieldKind) -> &'static str {
    match kind {
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
        FieldKind::Unknown(_) => "Unknown",
    }
}
