//! Field type resolution
//!
//! Maps a field's semantic kind (and, for numeric and date kinds, its
//! style) to a storage type, and decides where the field's values live.

use crate::design::{FieldKind, FieldSpec};
use crate::schema::{StorageType, UNBOUNDED_SIZE};

use super::errors::{SyncError, SyncResult};

/// Storage type and declared size of a field's value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedType {
    pub storage_type: StorageType,
    /// Declared text size; `None` when the design declares none
    pub size: Option<u32>,
}

impl ResolvedType {
    fn of(storage_type: StorageType) -> Self {
        Self {
            storage_type,
            size: None,
        }
    }
}

/// Where a field's values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLayout<'a> {
    /// One column on the owning table
    Column,
    /// A sub-table holding the chosen values
    Choice { other_option: bool },
    /// A sub-table holding one row per value
    Repeated,
    /// A sub-table holding the nested fields
    Group(&'a [FieldSpec]),
}

impl FieldLayout<'_> {
    pub fn needs_sub_table(&self) -> bool {
        !matches!(self, FieldLayout::Column)
    }
}

/// Sub-format of style-dependent kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    First,
    Second,
}

/// Resolves fields to storage types.
///
/// Stateless; every kind is matched exhaustively so a new kind cannot be
/// added without deciding its storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldTypeResolver;

impl FieldTypeResolver {
    pub fn new() -> Self {
        Self
    }

    /// Returns the storage type and declared size of a field's values.
    pub fn resolve(&self, field: &FieldSpec) -> SyncResult<ResolvedType> {
        let resolved = match &field.kind {
            FieldKind::Scale => {
                let style = self.style(field, &["integer"], &["decimal", "double"], Style::First)?;
                ResolvedType::of(match style {
                    Style::First => StorageType::Integer,
                    Style::Second => StorageType::Double,
                })
            }
            FieldKind::Numeric => {
                let style = self.style(field, &["integer"], &["decimal", "double"], Style::Second)?;
                ResolvedType::of(match style {
                    Style::First => StorageType::Integer,
                    Style::Second => StorageType::Double,
                })
            }
            FieldKind::Date => {
                let style = self.style(field, &["date"], &["date-time", "datetime"], Style::Second)?;
                ResolvedType::of(match style {
                    Style::First => StorageType::Date,
                    Style::Second => StorageType::DateTime,
                })
            }
            FieldKind::ContinuousScale | FieldKind::TimeInterval | FieldKind::Height => {
                ResolvedType::of(StorageType::Double)
            }
            FieldKind::TimeOfDay => ResolvedType::of(StorageType::Time),
            FieldKind::Boolean => ResolvedType::of(StorageType::Boolean),
            FieldKind::TextScale
            | FieldKind::ValuePicker
            | FieldKind::ImageChoice
            | FieldKind::Choice
            | FieldKind::Text
            | FieldKind::Email
            | FieldKind::Location => ResolvedType {
                storage_type: StorageType::Varchar,
                size: field.max_length.map(declared_size),
            },
            FieldKind::GroupedResult | FieldKind::Unknown(_) => {
                return Err(SyncError::unknown_field_kind(&field.key, field.kind.name()));
            }
        };

        Ok(resolved)
    }

    /// Decides where a field's values are stored.
    pub fn layout<'a>(&self, field: &'a FieldSpec) -> FieldLayout<'a> {
        match field.kind {
            FieldKind::GroupedResult => FieldLayout::Group(&field.fields),
            FieldKind::Choice => FieldLayout::Choice {
                other_option: field.other_option,
            },
            _ if field.is_multi_valued() => FieldLayout::Repeated,
            _ => FieldLayout::Column,
        }
    }

    /// Styles are `0`/`1` or one of the given names, case-insensitively.
    fn style(
        &self,
        field: &FieldSpec,
        first: &[&str],
        second: &[&str],
        default: Style,
    ) -> SyncResult<Style> {
        let raw = match field.style.as_deref().map(str::trim) {
            None | Some("") => return Ok(default),
            Some(raw) => raw,
        };

        let lowered = raw.to_ascii_lowercase();
        if lowered == "0" || first.contains(&lowered.as_str()) {
            Ok(Style::First)
        } else if lowered == "1" || second.contains(&lowered.as_str()) {
            Ok(Style::Second)
        } else {
            Err(SyncError::unknown_field_format(&field.key, field.kind.name(), raw))
        }
    }
}

/// `0` declares an unbounded text.
fn declared_size(max_length: u32) -> u32 {
    if max_length == 0 {
        UNBOUNDED_SIZE
    } else {
        max_length
    }
}
