//! # Prometheus Metrics
//!
//! Operational metrics for the vault host, scraped at `/metrics` on the
//! metrics port. Everything lives in a dedicated registry with the
//! `bridgepool` prefix.

use alloy_primitives::U256;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use bridgepool_vault::{Bank, Vault};

/// One unit of the underlying, in base units.
const WHOLE_UNIT: u128 = 1_000_000_000_000_000_000;

/// Metric handles for the node. Handles are internally reference counted,
/// so clones share the same series.
#[derive(Clone)]
pub struct VaultMetrics {
    registry: Registry,
    /// RPC calls by method name.
    pub calls_total: IntCounterVec,
    /// Rejected calls by error kind.
    pub rejections_total: IntCounterVec,
    /// Liquid balance in whole units.
    pub liquid_balance: IntGauge,
    /// Pending debt in whole units.
    pub pending_debt: IntGauge,
    /// Shares outstanding in whole units.
    pub total_shares: IntGauge,
    /// Next settlement nonce.
    pub settled_nonce: IntGauge,
    /// L2 block watermark.
    pub processed_block: IntGauge,
    /// Time spent executing a call, lock wait included.
    pub call_latency_seconds: Histogram,
}

impl VaultMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("bridgepool".into()), None)?;

        let calls_total = IntCounterVec::new(
            Opts::new("rpc_calls_total", "JSON-RPC calls received, by method"),
            &["method"],
        )?;
        registry.register(Box::new(calls_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("rpc_rejections_total", "Rejected vault calls, by error kind"),
            &["kind"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let liquid_balance = IntGauge::new("liquid_balance", "Liquid balance in whole units")?;
        registry.register(Box::new(liquid_balance.clone()))?;

        let pending_debt = IntGauge::new("pending_debt", "Pending debt in whole units")?;
        registry.register(Box::new(pending_debt.clone()))?;

        let total_shares = IntGauge::new("total_shares", "Shares outstanding in whole units")?;
        registry.register(Box::new(total_shares.clone()))?;

        let settled_nonce = IntGauge::new("settled_nonce", "Next settlement nonce accepted")?;
        registry.register(Box::new(settled_nonce.clone()))?;

        let processed_block =
            IntGauge::new("processed_block", "Highest L2 block whose debts were accepted")?;
        registry.register(Box::new(processed_block.clone()))?;

        let call_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("call_latency_seconds", "Vault call latency in seconds").buckets(
                vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0],
            ),
        )?;
        registry.register(Box::new(call_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            calls_total,
            rejections_total,
            liquid_balance,
            pending_debt,
            total_shares,
            settled_nonce,
            processed_block,
            call_latency_seconds,
        })
    }

    /// Refreshes the gauges from the vault's current state.
    pub fn observe<B: Bank>(&self, vault: &Vault<B>) {
        self.liquid_balance.set(whole_units(vault.liquid_balance()));
        self.pending_debt.set(whole_units(vault.pending_debt()));
        self.total_shares.set(whole_units(vault.total_shares()));
        self.settled_nonce
            .set(i64::try_from(vault.last_settled_nonce()).unwrap_or(i64::MAX));
        self.processed_block
            .set(i64::try_from(vault.last_processed_block()).unwrap_or(i64::MAX));
    }

    /// Encodes every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Truncates a base-unit amount to whole units, saturating at `i64::MAX`.
fn whole_units(amount: U256) -> i64 {
    let whole = amount / U256::from(WHOLE_UNIT);
    i64::try_from(whole).unwrap_or(i64::MAX)
}

pub type SharedMetrics = Arc<VaultMetrics>;

/// Renders `/metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_reported_in_whole_units() {
        assert_eq!(whole_units(U256::from(WHOLE_UNIT) * U256::from(3u8)), 3);
        assert_eq!(whole_units(U256::from(WHOLE_UNIT - 1)), 0);
        assert_eq!(whole_units(U256::MAX), i64::MAX);
    }

    #[test]
    fn registry_uses_prefix() {
        let metrics = VaultMetrics::new().unwrap();
        metrics.calls_total.with_label_values(&["vault_deposit"]).inc();
        let text = metrics.encode().unwrap();
        assert!(text.contains("bridgepool_rpc_calls_total"));
    }
}
