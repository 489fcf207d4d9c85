use prometheus::{
    opts, register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry, Encoder,
    IntCounterVec, IntGaugeVec, Registry,
};

const METRICS_NAMESPACE: &str = "tx_lifecycle";

fn namespaced(name: &str) -> String {
    format!("{}_{}", METRICS_NAMESPACE, name)
}

/// Metrics of the transaction controller
#[derive(Clone)]
pub struct ControllerMetrics {
    registry: Registry,
    /// transitions into each status
    pub status_transitions: IntCounterVec,
    /// with an outcome label: "submitted" or the error kind
    pub broadcasts: IntCounterVec,
    pub replacements: IntCounterVec,
    pub reconciliation_errors: IntCounterVec,
    /// records not yet verified on chain
    pub pending_transactions: IntGaugeVec,
}

impl ControllerMetrics {
    pub fn new(registry: Registry) -> eyre::Result<Self> {
        let status_transitions = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("status_transitions"),
                "The number of transactions that transitioned into a status",
            ),
            &["chain", "status"],
            registry.clone()
        )?;
        let broadcasts = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("broadcasts"),
                "The number of raw transaction broadcasts, by outcome",
            ),
            &["chain", "outcome"],
            registry.clone()
        )?;
        let replacements = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("replacements"),
                "The number of cancel and speed-up attempts, by outcome",
            ),
            &["chain", "kind", "outcome"],
            registry.clone()
        )?;
        let reconciliation_errors = register_int_counter_vec_with_registry!(
            opts!(
                namespaced("reconciliation_errors"),
                "The number of per-transaction reconciliation failures",
            ),
            &["chain"],
            registry.clone()
        )?;
        let pending_transactions = register_int_gauge_vec_with_registry!(
            opts!(
                namespaced("pending_transactions"),
                "The number of transactions not yet verified on chain",
            ),
            &["chain"],
            registry.clone()
        )?;
        Ok(Self {
            registry,
            status_transitions,
            broadcasts,
            replacements,
            reconciliation_errors,
            pending_transactions,
        })
    }

    pub fn update_status_transition_metric(&self, chain_id: u64, status: &str) {
        self.status_transitions
            .with_label_values(&[&chain_id.to_string(), status])
            .inc();
    }

    pub fn update_broadcast_metric(&self, chain_id: u64, outcome: &str) {
        self.broadcasts
            .with_label_values(&[&chain_id.to_string(), outcome])
            .inc();
    }

    pub fn update_replacement_metric(&self, chain_id: u64, kind: &str, outcome: &str) {
        self.replacements
            .with_label_values(&[&chain_id.to_string(), kind, outcome])
            .inc();
    }

    pub fn update_reconciliation_error_metric(&self, chain_id: u64) {
        self.reconciliation_errors
            .with_label_values(&[&chain_id.to_string()])
            .inc();
    }

    pub fn set_pending_transactions_metric(&self, chain_id: u64, count: usize) {
        self.pending_transactions
            .with_label_values(&[&chain_id.to_string()])
            .set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn gather(&self) -> prometheus::Result<Vec<u8>> {
        let collected_metrics = self.registry.gather();
        let mut out_buf = Vec::with_capacity(1024 * 64);
        let encoder = prometheus::TextEncoder::new();
        encoder.encode(&collected_metrics, &mut out_buf)?;
        Ok(out_buf)
    }

    #[cfg(test)]
    pub fn dummy_instance() -> Self {
        let registry = Registry::new();
        let instance = Self::new(registry);
        instance.unwrap()
    }
}
