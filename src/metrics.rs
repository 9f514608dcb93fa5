use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Registry, opts,
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_gauge_with_registry,
};
use std::sync::LazyLock;

pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

trait ResultExt<T> {
    fn or_exit(self, context: &str) -> T;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn or_exit(self, context: &str) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                eprintln!("failed to initialize metric ({context}): {err}");
                std::process::exit(1);
            }
        }
    }
}

pub static CASES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "tlsinterop_cases_total",
            "Total cases by scenario and outcome (passed, failed, skipped)"
        ),
        &["scenario", "outcome"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CASE_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "tlsinterop_case_errors_total",
            "Total failed cases by error kind"
        ),
        &["kind"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static CASE_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        HistogramOpts::new(
            "tlsinterop_case_duration_seconds",
            "Wall-clock duration of executed cases in seconds"
        ),
        &["scenario"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROCESSES_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "tlsinterop_processes_active",
        "Endpoint processes currently alive",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROCESSES_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "tlsinterop_processes_started_total",
            "Endpoint processes launched, by endpoint"
        ),
        &["endpoint"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROCESS_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec_with_registry!(
        opts!(
            "tlsinterop_process_outcomes_total",
            "Terminated endpoint processes by endpoint and status"
        ),
        &["endpoint", "status"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PROCESS_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        HistogramOpts::new(
            "tlsinterop_process_duration_seconds",
            "Endpoint process lifetime in seconds"
        ),
        &["endpoint"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static STARTUP_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec_with_registry!(
        HistogramOpts::new(
            "tlsinterop_startup_duration_seconds",
            "Time from launch until a server signalled readiness"
        )
        .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
        &["endpoint"],
        &REGISTRY
    )
    .or_exit("metric can be created")
});

pub static PORTS_LEASED: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge_with_registry!(
        "tlsinterop_ports_leased",
        "Ports currently leased from the pool",
        &REGISTRY
    )
    .or_exit("metric can be created")
});

/// Encode metrics in the Prometheus text format
///
/// # Errors
///
/// Returns an error if the registry cannot be encoded
pub fn encode_metrics() -> Result<Vec<u8>, String> {
    let mut buffer = Vec::new();
    let encoder = prometheus::TextEncoder::new();

    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| format!("could not encode custom metrics: {e}"))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_counter_metrics() {
        CASES_TOTAL.with_label_values(&["sni-match", "passed"]).inc();
        CASES_TOTAL.with_label_values(&["sni-match", "skipped"]).inc();
        CASE_ERRORS.with_label_values(&["startup_timeout"]).inc();
        PROCESSES_STARTED.with_label_values(&["s2n-server"]).inc();
        PROCESS_OUTCOMES
            .with_label_values(&["s2n-server", "success"])
            .inc();
    }

    #[test]
    fn test_histogram_metrics() {
        CASE_DURATION.with_label_values(&["handshake"]).observe(0.4);
        PROCESS_DURATION
            .with_label_values(&["openssl-client"])
            .observe(0.2);
        STARTUP_DURATION
            .with_label_values(&["s2n-server"])
            .observe(0.05);
    }

    #[test]
    fn test_encode_metrics() {
        CASE_ERRORS.with_label_values(&["launch"]).inc();

        let buffer = encode_metrics().unwrap();
        assert!(!buffer.is_empty());

        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("tlsinterop"));
    }

    #[test]
    fn test_registry() {
        let _ = &*PROCESSES_ACTIVE;
        let _ = &*PORTS_LEASED;
        CASES_TOTAL.with_label_values(&["test", "test"]).inc();
        STARTUP_DURATION.with_label_values(&["test"]).observe(0.1);

        let metrics = REGISTRY.gather();
        let metric_names: Vec<String> = metrics.iter().map(|m| m.name().to_string()).collect();

        assert!(metric_names.contains(&"tlsinterop_processes_active".to_string()));
        assert!(metric_names.contains(&"tlsinterop_ports_leased".to_string()));
        assert!(metric_names.contains(&"tlsinterop_cases_total".to_string()));
        assert!(metric_names.contains(&"tlsinterop_startup_duration_seconds".to_string()));
    }
}
