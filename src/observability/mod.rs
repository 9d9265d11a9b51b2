//! Observability for the adapter
//!
//! - Structured logging (JSON lines)
//! - Counters for push-down decisions and streaming
//! - Typed lifecycle events
//!
//! Observability is read-only: nothing here changes planning or streaming
//! behaviour, and a failed log write is ignored.

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{AdapterMetrics, MetricsSnapshot};

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::CatalogFetched, &[("collection", "test")]);
    }
}
