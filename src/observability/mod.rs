//! # Observability
//!
//! Structured JSON logging and counters. Observability never changes the
//! outcome of a request; failures to write a log line are ignored.
//!
//! ```ignore
//! use geoquery::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::TileCacheMiss, &[("tile", "public.states/WebMercatorQuad/3/2/1")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_cache_misses();
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};

/// Log an event at its own severity
pub fn log_event(event: Event) {
    Logger::log(event.severity(), event.as_str(), &[]);
}

pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_does_not_panic() {
        log_event(Event::ConfigLoaded);
        log_event_with_fields(Event::TileCacheError, &[("detail", "disk full")]);
    }
}
