//! Side-channel for failures that must never reach a producer.
//!
//! Appender failures and events lost to a closed queue are reported here
//! with a plain stderr write, keeping the runtime's own diagnostics out of
//! the pipeline they describe.

use crate::error::TelemetryError;

pub(crate) fn append_failure(domain: &str, appender: &str, err: &TelemetryError) {
    eprintln!("skald: {domain} appender '{appender}' failed: {err}");
}

pub(crate) fn sink_failure(appender: &str, err: &TelemetryError) {
    eprintln!("skald: appender '{appender}' sink failed: {err}");
}

pub(crate) fn event_dropped(domain: &str) {
    eprintln!("skald: {domain} event dropped: dispatch queue is closed");
}

pub(crate) fn flood_notice(dropped: u64, total_dropped: u64) {
    eprintln!("skald: dropped {dropped} events due to flooding (total dropped: {total_dropped})");
}

pub(crate) fn series_type_mismatch(name: &str) {
    eprintln!("skald: metric series '{name}' received a value of mismatched numeric type; measurement rejected");
}
