use std::sync::OnceLock;
use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
static FIELDS_HIDDEN_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static MODIFY_RESULTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

fn register_collector<T>(collector: T) -> T
where
    T: prometheus::core::Collector + Clone + 'static,
{
    let _ = registry().register(Box::new(collector.clone()));
    collector
}

fn http_requests_total() -> &'static IntCounterVec {
    HTTP_REQUESTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "arena_gateway_http_requests_total",
                    "Gateway HTTP request count.",
                ),
                &["route", "method", "status"],
            )
            .expect("create arena_gateway_http_requests_total"),
        )
    })
}

fn http_request_duration_seconds() -> &'static HistogramVec {
    HTTP_REQUEST_DURATION_SECONDS.get_or_init(|| {
        register_collector(
            HistogramVec::new(
                HistogramOpts::new(
                    "arena_gateway_http_request_duration_seconds",
                    "Gateway HTTP request duration in seconds.",
                )
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ]),
                &["route", "method", "outcome"],
            )
            .expect("create arena_gateway_http_request_duration_seconds"),
        )
    })
}

fn fields_hidden_total() -> &'static IntCounterVec {
    FIELDS_HIDDEN_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "arena_gateway_fields_hidden_total",
                    "Contract fields withheld by field-level security.",
                ),
                &["entity"],
            )
            .expect("create arena_gateway_fields_hidden_total"),
        )
    })
}

fn modify_results_total() -> &'static IntCounterVec {
    MODIFY_RESULTS_TOTAL.get_or_init(|| {
        register_collector(
            IntCounterVec::new(
                Opts::new(
                    "arena_gateway_modify_results_total",
                    "Write-path results by operation and outcome.",
                ),
                &["operation", "outcome"],
            )
            .expect("create arena_gateway_modify_results_total"),
        )
    })
}

/// `route` is the matched template, never the raw path, to keep label
/// cardinality bounded.
pub fn observe_http_request(route: &str, method: &str, status: u16, duration: Duration) {
    let status_str = status.to_string();
    http_requests_total()
        .with_label_values(&[route, method, status_str.as_str()])
        .inc();

    let outcome = if (200..400).contains(&status) {
        "success"
    } else {
        "error"
    };
    http_request_duration_seconds()
        .with_label_values(&[route, method, outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_fields_hidden(entity: &str, count: u32) {
    if count == 0 {
        return;
    }
    fields_hidden_total()
        .with_label_values(&[entity])
        .inc_by(u64::from(count));
}

pub fn observe_modify_result(operation: &str, outcome: &str) {
    modify_results_total()
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn render() -> Result<(Vec<u8>, String), prometheus::Error> {
    let _ = fields_hidden_total();
    let _ = modify_results_total();

    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok((buffer, encoder.format_type().to_string()))
}
