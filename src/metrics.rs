// Prometheus counters for allocation and claim activity.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::chain::ChainError;

pub struct Metrics {
    registry: Registry,
    pub allocations_set: IntCounter,
    pub claims: IntCounterVec,
    pub transfers: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let allocations_set = IntCounter::new(
            "claim_allocations_set_total",
            "Allocations written by admin distribution",
        )?;
        let claims = IntCounterVec::new(
            Opts::new("claim_claims_total", "Claim attempts by outcome"),
            &["outcome"],
        )?;
        let transfers = IntCounterVec::new(
            Opts::new("claim_transfers_total", "Admin token transfers by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(allocations_set.clone()))?;
        registry.register(Box::new(claims.clone()))?;
        registry.register(Box::new(transfers.clone()))?;
        Ok(Self {
            registry,
            allocations_set,
            claims,
            transfers,
        })
    }

    pub fn claim(&self, outcome: &str) {
        self.claims.with_label_values(&[outcome]).inc();
    }

    pub fn transfer<T>(&self, result: &Result<T, ChainError>) {
        let outcome = match result {
            Ok(_) => "sent",
            Err(e) if e.unconfirmed_tx().is_some() => "unconfirmed",
            Err(_) => "failed",
        };
        self.transfers.with_label_values(&[outcome]).inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
