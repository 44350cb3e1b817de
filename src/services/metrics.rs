//! Prometheus metrics for sync runs, exposed through `GET /metrics`

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::time::Duration;

lazy_static! {
    static ref SYNC_RUNS: IntCounterVec = register_int_counter_vec!(
        "playlist_sync_runs_total",
        "Finished sync runs by outcome",
        &["outcome"]
    )
    .expect("register playlist_sync_runs_total");
    static ref CHANNELS_UPSERTED: IntCounter = register_int_counter!(
        "playlist_sync_channels_upserted_total",
        "Channels written by sync runs"
    )
    .expect("register playlist_sync_channels_upserted_total");
    static ref CHANNELS_DELETED: IntCounter = register_int_counter!(
        "playlist_sync_channels_deleted_total",
        "Stale channels removed by sync runs"
    )
    .expect("register playlist_sync_channels_deleted_total");
    static ref ENTRIES_DROPPED: IntCounter = register_int_counter!(
        "playlist_sync_entries_dropped_total",
        "Parsed entries dropped before persistence"
    )
    .expect("register playlist_sync_entries_dropped_total");
    static ref SYNC_DURATION: Histogram = register_histogram!(
        "playlist_sync_duration_seconds",
        "Wall time of sync runs",
        vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    )
    .expect("register playlist_sync_duration_seconds");
    static ref SYNCS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "playlist_sync_in_flight",
        "Sync runs currently executing"
    )
    .expect("register playlist_sync_in_flight");
}

/// Terminal state of a run, used as the `outcome` label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure,
    Cancelled,
}

impl Outcome {
    fn label(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Cancelled => "cancelled",
        }
    }
}

pub fn sync_started() {
    SYNCS_IN_FLIGHT.inc();
}

pub fn sync_finished(outcome: Outcome, elapsed: Duration) {
    SYNCS_IN_FLIGHT.dec();
    SYNC_RUNS.with_label_values(&[outcome.label()]).inc();
    SYNC_DURATION.observe(elapsed.as_secs_f64());
}

pub fn channels_upserted(count: usize) {
    CHANNELS_UPSERTED.inc_by(count as u64);
}

pub fn channels_deleted(count: u64) {
    CHANNELS_DELETED.inc_by(count);
}

pub fn entries_dropped(count: usize) {
    ENTRIES_DROPPED.inc_by(count as u64);
}
