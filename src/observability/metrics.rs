//! Metrics collection.
//!
//! # Metrics
//! - `config_reloads_total` (counter): reload passes by `outcome`
//!   (`applied`, `unchanged`, `failed`)
//! - `event_dispatches_total` (counter): handlers fired by `source`
//!   (`internal`, `user`)

use crate::events::EventHandlerSource;

pub fn record_reload(outcome: &'static str) {
    ::metrics::counter!("config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_dispatch(source: EventHandlerSource) {
    let source = match source {
        EventHandlerSource::Internal => "internal",
        EventHandlerSource::User => "user",
    };
    ::metrics::counter!("event_dispatches_total", "source" => source).increment(1);
}
