use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

#[derive(Debug, Default)]
pub struct Metrics {
    request_total: AtomicU64,
    request_success: AtomicU64,
    request_error: AtomicU64,
    checks_allowed: AtomicU64,
    checks_denied: AtomicU64,
    lookups: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.request_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.request_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.request_error.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_check(&self, allowed: bool) {
        if allowed {
            self.checks_allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.checks_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn request_total(&self) -> u64 {
        self.request_total.load(Ordering::Relaxed)
    }

    pub fn request_success(&self) -> u64 {
        self.request_success.load(Ordering::Relaxed)
    }

    pub fn request_error(&self) -> u64 {
        self.request_error.load(Ordering::Relaxed)
    }

    pub fn checks_allowed(&self) -> u64 {
        self.checks_allowed.load(Ordering::Relaxed)
    }

    pub fn checks_denied(&self) -> u64 {
        self.checks_denied.load(Ordering::Relaxed)
    }

    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::Relaxed)
    }

    pub fn render_prometheus(&self) -> String {
        let counters = [
            (
                "farmgate_requests_total",
                "Total number of requests.",
                self.request_total(),
            ),
            (
                "farmgate_requests_success_total",
                "Total successful requests.",
                self.request_success(),
            ),
            (
                "farmgate_requests_error_total",
                "Total failed requests.",
                self.request_error(),
            ),
            (
                "farmgate_checks_allowed_total",
                "Permission checks that allowed access.",
                self.checks_allowed(),
            ),
            (
                "farmgate_checks_denied_total",
                "Permission checks that denied access.",
                self.checks_denied(),
            ),
            (
                "farmgate_lookups_total",
                "Resource lookups served.",
                self.lookups(),
            ),
        ];

        let mut output = String::new();
        for (name, help, value) in counters {
            // Writing into a String cannot fail.
            let _ = writeln!(output, "# HELP {name} {help}");
            let _ = writeln!(output, "# TYPE {name} counter");
            let _ = writeln!(output, "{name} {value}");
        }
        output
    }
}

pub async fn metrics_handler(State(metrics): State<Arc<Metrics>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics.render_prometheus(),
    )
}
