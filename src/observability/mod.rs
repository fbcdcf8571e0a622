//! Observability
//!
//! - Structured logging (JSON, one line per event)
//! - Typed events
//! - Monotonic counters
//!
//! Observability is read-only: nothing here influences the outcome of a
//! synchronization, and a failed log write is ignored.
//!
//! ```ignore
//! use designsync::observability::{Event, ObservationScope, log_event};
//!
//! log_event(Event::DesignLoaded, &[("design", "Daily")]);
//!
//! let scope = ObservationScope::new("SYNC");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{SyncMetrics, SyncMetricsSnapshot};
pub use scope::ObservationScope;

/// Log an event at its own severity
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::ConfigLoaded, &[("data_dir", "/tmp/test")]);
        log_event(Event::SyncPartialApply, &[("tenant", "T1")]);
    }
}
