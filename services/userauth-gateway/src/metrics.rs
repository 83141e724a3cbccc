//! Prometheus metrics exposition
//!
//! - `userauth_connections_active` (gauge)
//! - `userauth_challenges_total` (counter): label `outcome`, recorded by the
//!   session coordinator
//! - `userauth_challenge_duration_seconds` (histogram): label `outcome`
//! - `userauth_service_credentials_total` (counter)

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const CHALLENGE_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("userauth_challenge_duration_seconds".to_string()),
        CHALLENGE_DURATION_BUCKETS,
    )
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The challenge duration histogram gets explicit buckets so it renders
/// `_bucket` lines instead of a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

pub fn connection_opened() {
    metrics::gauge!("userauth_connections_active").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("userauth_connections_active").decrement(1.0);
}

/// Record a credential served by the REST endpoint.
pub fn record_service_credential() {
    metrics::counter!("userauth_service_credentials_total").increment(1);
}
