//! Observable adapter events
//!
//! Events are explicit and typed. Each maps to a stable string used as the
//! `event` key of a log line.

use std::fmt;

use super::logger::Severity;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Catalog
    /// Field catalog fetched from remote metadata
    CatalogFetched,
    /// Remote metadata could not be read
    CatalogUnavailable,

    // Planning
    /// A plan fragment was planned
    PlanCreated,
    /// Filter could not be translated and runs locally
    ResidualFilter,
    /// Aggregation could not be pushed and runs locally
    ResidualAggregation,
    /// Sort/limit runs locally
    ResidualSortLimit,

    // Cursor lifecycle
    /// Remote stream opened
    CursorOpened,
    /// Remote store rejected the request
    CursorRejected,
    /// Stream reached its end
    CursorExhausted,
    /// Stream failed mid-read
    CursorFailed,
    /// Cursor closed by its consumer
    CursorClosed,
    /// Cursor closed before the stream was exhausted
    CursorAborted,
}

impl Event {
    /// Returns the event string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::CatalogFetched => "CATALOG_FETCHED",
            Event::CatalogUnavailable => "CATALOG_UNAVAILABLE",
            Event::PlanCreated => "PLAN_CREATED",
            Event::ResidualFilter => "RESIDUAL_FILTER",
            Event::ResidualAggregation => "RESIDUAL_AGGREGATION",
            Event::ResidualSortLimit => "RESIDUAL_SORT_LIMIT",
            Event::CursorOpened => "CURSOR_OPENED",
            Event::CursorRejected => "CURSOR_REJECTED",
            Event::CursorExhausted => "CURSOR_EXHAUSTED",
            Event::CursorFailed => "CURSOR_FAILED",
            Event::CursorClosed => "CURSOR_CLOSED",
            Event::CursorAborted => "CURSOR_ABORTED",
        }
    }

    /// Severity an event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::CatalogUnavailable | Event::CursorRejected | Event::CursorFailed => {
                Severity::Error
            }
            Event::ResidualFilter | Event::ResidualAggregation | Event::ResidualSortLimit => {
                Severity::Warn
            }
            Event::CatalogFetched | Event::PlanCreated | Event::CursorOpened => Severity::Info,
            Event::CursorExhausted | Event::CursorClosed | Event::CursorAborted => {
                Severity::Trace
            }
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_events_are_errors() {
        assert_eq!(Event::CursorFailed.severity(), Severity::Error);
        assert_eq!(Event::CatalogUnavailable.severity(), Severity::Error);
        assert_eq!(Event::ResidualFilter.severity(), Severity::Warn);
    }

    #[test]
    fn test_event_strings_unique() {
        let all = [
            Event::CatalogFetched,
            Event::CatalogUnavailable,
            Event::PlanCreated,
            Event::ResidualFilter,
            Event::ResidualAggregation,
            Event::ResidualSortLimit,
            Event::CursorOpened,
            Event::CursorRejected,
            Event::CursorExhausted,
            Event::CursorFailed,
            Event::CursorClosed,
            Event::CursorAborted,
        ];
        let mut names: Vec<_> = all.iter().map(Event::as_str).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }
}
