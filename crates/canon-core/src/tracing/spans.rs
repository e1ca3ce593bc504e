//! Span definitions per operation: scan, learn, refactor run, refactor unit, metrics.

/// Create a scan span.
#[macro_export]
macro_rules! scan_span {
    ($unit_count:expr) => {
        tracing::info_span!("canon.scan", unit_count = $unit_count)
    };
}

/// Create a learning span.
#[macro_export]
macro_rules! learn_span {
    ($profile_count:expr) => {
        tracing::info_span!("canon.learn", profile_count = $profile_count)
    };
}

/// Create a refactor run span.
#[macro_export]
macro_rules! refactor_run_span {
    ($run_id:expr, $mode:expr) => {
        tracing::info_span!("canon.refactor_run", run_id = %$run_id, mode = %$mode)
    };
}

/// Create a span around one unit's refactor protocol.
#[macro_export]
macro_rules! refactor_unit_span {
    ($unit:expr, $rule:expr) => {
        tracing::info_span!("canon.refactor_unit", unit = %$unit, rule = %$rule)
    };
}

/// Create a metrics collection span.
#[macro_export]
macro_rules! metrics_span {
    ($unit_count:expr) => {
        tracing::info_span!("canon.metrics", unit_count = $unit_count)
    };
}
