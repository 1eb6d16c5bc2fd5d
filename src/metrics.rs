use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub const ITEMS_SCANNED: &str = "responder_items_scanned_total";
pub const ITEMS_ATTEMPTED: &str = "responder_items_attempted_total";
pub const REPLIES_POSTED: &str = "responder_replies_posted_total";
pub const FETCH_ERRORS: &str = "responder_fetch_errors_total";
pub const GENERATION_ERRORS: &str = "responder_generation_errors_total";
pub const PUBLISH_ERRORS: &str = "responder_publish_errors_total";
pub const STORAGE_ERRORS: &str = "responder_storage_errors_total";
pub const CYCLE_MS: &str = "responder_cycle_ms";
pub const LAST_CYCLE_TS: &str = "responder_last_cycle_ts";

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(ITEMS_SCANNED, "Items fetched from channels.");
        describe_counter!(
            ITEMS_ATTEMPTED,
            "Items that reached the generation step (one record each)."
        );
        describe_counter!(REPLIES_POSTED, "Replies generated and published.");
        describe_counter!(FETCH_ERRORS, "Channel fetches that failed.");
        describe_counter!(GENERATION_ERRORS, "Generation calls that failed or came back empty.");
        describe_counter!(PUBLISH_ERRORS, "Publish calls that failed.");
        describe_counter!(STORAGE_ERRORS, "Interaction log writes that failed.");
        describe_histogram!(CYCLE_MS, "Scan cycle duration in milliseconds.");
        describe_gauge!(LAST_CYCLE_TS, "Unix ts when the last scan cycle finished.");
    });
}

#[derive(Clone)]
pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder once; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
        let handle = HANDLE.get_or_try_init(|| PrometheusBuilder::new().install_recorder())?;
        ensure_metrics_described();
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
