use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_score::config::ScoringConfig;
use talent_score::workflows::scoring::{MonthYear, Repositories, ScoringService};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Scoring service over fresh in-memory stores.
pub(crate) fn in_memory_service(config: &ScoringConfig) -> Arc<ScoringService> {
    Arc::new(ScoringService::new(Repositories::in_memory(), config))
}

pub(crate) fn parse_month(raw: &str) -> Result<MonthYear, String> {
    MonthYear::parse(raw).ok_or_else(|| format!("failed to parse '{raw}' as MM/YYYY"))
}
