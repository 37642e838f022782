//! Observability subsystem
//!
//! - Structured logging (JSON lines)
//! - Atomic counters
//! - Typed lifecycle events
//!
//! Observability never feeds back into execution: nothing here returns an
//! error, and logging failures are swallowed.
//!
//! # Usage
//!
//! ```ignore
//! use clusterq::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::FetchComplete, &[("rows", "42")]);
//! MetricsRegistry::global().increment_queries_executed();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event with fields
///
/// Failure events go to stderr at ERROR, everything else to stdout at INFO.
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    if event.is_failure() {
        Logger::error(event.as_str(), fields);
    } else {
        Logger::info(event.as_str(), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::FetchFailed, &[("code", "4000")]);
    }
}
