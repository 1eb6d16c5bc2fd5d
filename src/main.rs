//! Reddit responder binary entrypoint.
//! Loads config, wires the collaborators into a `Scheduler`, and serves the
//! HTTP control surface until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use reddit_responder::api::{self, AppState};
use reddit_responder::config::AppConfig;
use reddit_responder::generate::build_generator;
use reddit_responder::metrics::Metrics;
use reddit_responder::source::reddit::RedditClient;
use reddit_responder::source::{DryRunPublisher, PublishClient, SourceClient};
use reddit_responder::store::{LogStore, SqliteLogStore};
use reddit_responder::{init_tracing, ScanCycle, Scheduler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::load_default().context("loading responder config")?;
    let metrics = match Metrics::init() {
        Ok(m) => Some(m),
        Err(e) => {
            warn!(error = %e, "prometheus recorder not installed; /metrics disabled");
            None
        }
    };

    let reddit = Arc::new(RedditClient::from_env(&cfg.reddit.user_agent)?);
    let source: Arc<dyn SourceClient> = reddit.clone();
    let publisher: Arc<dyn PublishClient> = if cfg.reddit.dry_run {
        info!("dry-run mode: replies are logged, not posted");
        Arc::new(DryRunPublisher::new())
    } else {
        reddit
    };
    let generator = build_generator(&cfg.generation.clone().resolved())?;
    let store: Arc<dyn LogStore> = Arc::new(
        SqliteLogStore::open(&cfg.store.path)
            .with_context(|| format!("opening {}", cfg.store.path.display()))?,
    );

    let cycle = ScanCycle::new(source, generator, publisher, store)
        .with_rate_gate(cfg.rate_limits.to_gate())
        .with_planner(cfg.rate_limits.to_planner())
        .with_seen(Arc::new(cfg.dedup.to_seen_set()));
    let scheduler = Arc::new(Scheduler::new(cycle));

    if cfg.server.autostart {
        if let Err(e) = scheduler.start(cfg.schedule.clone()) {
            warn!(error = %e, "autostart failed");
        }
    }

    let app = api::router(AppState::new(scheduler.clone(), cfg.schedule.clone()), metrics.as_ref());
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    info!(bind = %cfg.server.bind, "control surface listening");

    let sched = scheduler.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            sched.stop();
        })
        .await?;

    scheduler.wait_until_idle().await;
    Ok(())
}
