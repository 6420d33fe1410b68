//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Relay outcomes
//! - Account refreshes and the cached sequence
//! - Fee quotes
//! - Worker latency

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, CounterVec, Encoder, Gauge,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Relay metrics
    pub static ref RELAY_OUTCOMES: CounterVec = register_counter_vec!(
        "feepayer_relay_outcomes_total",
        "Relayed transactions by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref RELAY_LATENCY: Histogram = register_histogram!(
        "feepayer_relay_latency_seconds",
        "Time from enqueue to reply",
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    // Account metrics
    pub static ref ACCOUNT_REFRESHES: CounterVec = register_counter_vec!(
        "feepayer_account_refreshes_total",
        "Account number/sequence queries by result",
        &["result"]
    ).unwrap();

    pub static ref ACCOUNT_SEQUENCE: Gauge = register_gauge!(
        "feepayer_account_sequence",
        "Next sequence the relay will sign with"
    ).unwrap();

    // Fee metrics
    pub static ref FEE_PER_GAS: Gauge = register_gauge!(
        "feepayer_fee_per_gas",
        "Last quoted fee per unit of gas"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> std::io::Result<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app).await
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_relay_outcome(outcome: &str) {
    RELAY_OUTCOMES.with_label_values(&[outcome]).inc();
}

pub fn record_relay_latency(latency_secs: f64) {
    RELAY_LATENCY.observe(latency_secs);
}

pub fn record_account_refresh(success: bool) {
    ACCOUNT_REFRESHES
        .with_label_values(&[if success { "success" } else { "failure" }])
        .inc();
}

pub fn record_account_sequence(sequence: u64) {
    ACCOUNT_SEQUENCE.set(sequence as f64);
}

pub fn record_fee_quote(fee_per_gas: &BigUint) {
    FEE_PER_GAS.set(fee_per_gas.to_f64().unwrap_or(f64::MAX));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_metrics_exposed() {
        record_relay_outcome("success");
        record_account_refresh(true);
        record_fee_quote(&BigUint::from(155u32));

        let body = metrics_handler().await.unwrap();
        assert!(body.contains("feepayer_relay_outcomes_total"));
        assert!(body.contains("feepayer_account_refreshes_total"));
        assert!(body.contains("feepayer_fee_per_gas"));
    }
}
