//! Begin/complete bracketing of one unit of work
//!
//! - `{NAME}_BEGIN` on creation
//! - `{NAME}_COMPLETE` or `{NAME}_FAILED` when closed, with `elapsed_ms`
//! - `{NAME}_INCOMPLETE` if dropped without being closed

use std::time::Instant;

use super::logger::Logger;

/// A scope that logs begin and end events around a unit of work.
///
/// ```ignore
/// let scope = ObservationScope::with_fields("SYNC", &[("tenant", "T1")]);
/// // ... do work ...
/// scope.complete_with_fields(&[("outcome", "applied")]);
/// ```
pub struct ObservationScope {
    name: String,
    fields: Vec<(String, String)>,
    started: Instant,
    closed: bool,
}

impl ObservationScope {
    /// Logs `{name}_BEGIN` immediately.
    pub fn new(name: &str) -> Self {
        Self::with_fields(name, &[])
    }

    /// Like [`ObservationScope::new`]; `fields` are repeated on every event of the scope.
    pub fn with_fields(name: &str, fields: &[(&str, &str)]) -> Self {
        Logger::info(&format!("{}_BEGIN", name), fields);

        Self {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            started: Instant::now(),
            closed: false,
        }
    }

    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Logs `{name}_COMPLETE` at INFO level.
    pub fn complete_with_fields(mut self, extra_fields: &[(&str, &str)]) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs();
        fields.extend(extra_fields.iter().copied());
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::info(&format!("{}_COMPLETE", self.name), &fields);
    }

    /// Logs `{name}_FAILED` at ERROR level.
    pub fn fail(mut self, reason: &str) {
        self.closed = true;
        let elapsed = self.elapsed_ms();
        let mut fields = self.field_refs();
        fields.push(("reason", reason));
        fields.push(("elapsed_ms", elapsed.as_str()));
        Logger::error(&format!("{}_FAILED", self.name), &fields);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    fn field_refs(&self) -> Vec<(&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.closed {
            let mut fields = self.field_refs();
            fields.push(("reason", "scope dropped without completion"));
            Logger::warn(&format!("{}_INCOMPLETE", self.name), &fields);
        }
    }
}
