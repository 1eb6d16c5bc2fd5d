// src/cycle.rs
//! One scan pass: fetch → filter → plan → delay → generate → publish → log.
//!
//! Every item that reaches the generation step yields exactly one
//! `InteractionRecord`, whatever happens downstream. Items filtered out
//! earlier are not logged.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge, histogram};
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{RateLimits, ScheduleConfig};
use crate::error::{Cancelled, GenerationError, StorageError};
use crate::events::{self, SchedulerEvent};
use crate::generate::{build_prompt, GenerationClient};
use crate::metrics as m;
use crate::planner::ResponsePlanner;
use crate::rate_gate::{RateGate, ResourceClass};
use crate::relevance;
use crate::seen::SeenSet;
use crate::source::{PublishClient, SourceClient};
use crate::store::LogStore;
use crate::types::{excerpt, CycleMetrics, InteractionRecord, Item};
use crate::wait::sleep_cancellable;

/// Outcome of one channel pass.
#[derive(Debug, Clone, Default)]
pub struct ChannelReport {
    pub channel: String,
    pub scanned: usize,
    pub skipped_seen: usize,
    pub skipped_irrelevant: usize,
    pub skipped_by_selectivity: usize,
    /// Items dropped because a stop arrived before generation started.
    pub abandoned: usize,
    pub records: Vec<InteractionRecord>,
    pub fetch_error: Option<String>,
    /// Sum over attempted items of delay-start → publish-done, in seconds.
    pub total_response_secs: f64,
    pub cancelled: bool,
}

impl ChannelReport {
    fn new(channel: &str) -> Self {
        Self {
            channel: channel.to_string(),
            ..Default::default()
        }
    }

    pub fn attempted(&self) -> usize {
        self.records.len()
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.success).count()
    }
}

/// Outcome of a full pass over all configured channels.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub channels: Vec<ChannelReport>,
    pub metrics: CycleMetrics,
    pub cancelled: bool,
}

impl CycleReport {
    pub fn records(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.channels.iter().flat_map(|c| c.records.iter())
    }

    pub fn attempted(&self) -> usize {
        self.channels.iter().map(ChannelReport::attempted).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.channels.iter().map(ChannelReport::succeeded).sum()
    }
}

pub struct ScanCycle {
    source: Arc<dyn SourceClient>,
    generator: Arc<dyn GenerationClient>,
    publisher: Arc<dyn PublishClient>,
    store: Arc<dyn LogStore>,
    gate: Arc<RateGate>,
    seen: Arc<SeenSet>,
    planner: Arc<ResponsePlanner>,
    events: broadcast::Sender<SchedulerEvent>,
}

impl ScanCycle {
    /// Default rate limits and delays, unbounded seen-set, entropy-seeded planner.
    pub fn new(
        source: Arc<dyn SourceClient>,
        generator: Arc<dyn GenerationClient>,
        publisher: Arc<dyn PublishClient>,
        store: Arc<dyn LogStore>,
    ) -> Self {
        let limits = RateLimits::default();
        let (events, _) = events::channel();
        m::ensure_metrics_described();
        Self {
            source,
            generator,
            publisher,
            store,
            gate: Arc::new(limits.to_gate()),
            seen: Arc::new(SeenSet::new()),
            planner: Arc::new(limits.to_planner()),
            events,
        }
    }

    pub fn with_rate_gate(mut self, gate: RateGate) -> Self {
        self.gate = Arc::new(gate);
        self
    }

    pub fn with_seen(mut self, seen: Arc<SeenSet>) -> Self {
        self.seen = seen;
        self
    }

    pub fn with_planner(mut self, planner: ResponsePlanner) -> Self {
        self.planner = Arc::new(planner);
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<SchedulerEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &broadcast::Sender<SchedulerEvent> {
        &self.events
    }

    pub fn seen(&self) -> &Arc<SeenSet> {
        &self.seen
    }

    pub fn store(&self) -> &Arc<dyn LogStore> {
        &self.store
    }

    /// Scan every configured channel in order.
    pub async fn run_cycle(&self, config: &ScheduleConfig, cancel: &CancellationToken) -> CycleReport {
        let t0 = Instant::now();
        let mut channels = Vec::with_capacity(config.channels.len());
        let mut cancelled = false;

        for channel in &config.channels {
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }
            let report = self.run(channel, config, cancel).await;
            cancelled |= report.cancelled;
            channels.push(report);
            if cancelled {
                break;
            }
        }

        let evicted = self
            .seen
            .evict_expired(Utc::now(), Duration::from_secs(config.max_item_age_secs));
        if evicted > 0 {
            debug!(evicted, "seen-set entries expired");
        }

        let metrics = cycle_metrics(&channels);
        if let Err(e) = self.store.append_metrics(&metrics).await {
            self.storage_warning(&e);
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!(m::CYCLE_MS).record(ms);
        gauge!(m::LAST_CYCLE_TS).set(Utc::now().timestamp() as f64);

        CycleReport {
            channels,
            metrics,
            cancelled,
        }
    }

    /// Scan one channel.
    pub async fn run(
        &self,
        channel: &str,
        config: &ScheduleConfig,
        cancel: &CancellationToken,
    ) -> ChannelReport {
        let mut report = ChannelReport::new(channel);

        if self.gate.acquire(ResourceClass::Source, cancel).await.is_err() {
            report.cancelled = true;
            return report;
        }

        info!(channel, source = self.source.name(), "scanning channel");
        let items = match self.source.fetch_recent(channel, config.fetch_limit).await {
            Ok(v) => v,
            Err(e) => {
                warn!(channel, error = %e, "fetch failed; skipping channel this cycle");
                counter!(m::FETCH_ERRORS).increment(1);
                report.fetch_error = Some(e.to_string());
                self.emit_scanned(&report);
                return report;
            }
        };
        report.scanned = items.len();
        counter!(m::ITEMS_SCANNED).increment(items.len() as u64);

        for item in items {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !self.seen.mark_if_new_at(&item.id, item.created_at) {
                report.skipped_seen += 1;
                continue;
            }
            let rel = relevance::evaluate(
                &item,
                &config.keywords,
                config.max_item_age_secs,
                Utc::now(),
            );
            if !rel.relevant {
                report.skipped_irrelevant += 1;
                continue;
            }
            if !self.planner.should_respond(&item, config.selectivity) {
                report.skipped_by_selectivity += 1;
                continue;
            }

            info!(
                channel,
                item_id = %item.id,
                title = %excerpt(&item.title, 50),
                matched = ?rel.matched,
                "relevant item selected"
            );
            let started = Instant::now();
            match self.attempt(&item, rel.matched, cancel).await {
                Ok(record) => {
                    report.total_response_secs += started.elapsed().as_secs_f64();
                    self.persist(&record).await;
                    report.records.push(record);
                }
                Err(Cancelled) => {
                    // Nothing was sent; let a later run consider the item again.
                    self.seen.forget(&item.id);
                    report.abandoned += 1;
                    report.cancelled = true;
                    break;
                }
            }
        }

        info!(
            channel,
            scanned = report.scanned,
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            "channel scan finished"
        );
        self.emit_scanned(&report);
        report
    }

    /// Delay, generate, publish. `Err(Cancelled)` only before generation starts;
    /// after that every outcome is a record.
    async fn attempt(
        &self,
        item: &Item,
        matched: Vec<String>,
        cancel: &CancellationToken,
    ) -> Result<InteractionRecord, Cancelled> {
        let delay = self.planner.compute_delay_secs();
        info!(item_id = %item.id, delay_secs = delay, "waiting before reply");
        sleep_cancellable(Duration::from_secs(delay), cancel).await?;
        self.gate.acquire(ResourceClass::Generation, cancel).await?;

        counter!(m::ITEMS_ATTEMPTED).increment(1);
        let prompt = build_prompt(item, &matched);
        let text = match self.generator.generate(&prompt).await {
            Ok(t) if !t.trim().is_empty() => t.trim().to_string(),
            Ok(_) => return Ok(self.generation_failed(item, matched, GenerationError::Empty)),
            Err(e) => return Ok(self.generation_failed(item, matched, e)),
        };

        // Publishing hits the same API as fetching and shares its spacing.
        // The reply already exists, so a stop here is recorded as a failure.
        if self.gate.acquire(ResourceClass::Source, cancel).await.is_err() {
            warn!(item_id = %item.id, "stopped before publishing; reply discarded");
            return Ok(InteractionRecord::new(item, matched, text, false));
        }
        let success = match self.publisher.publish(item, &text).await {
            Ok(true) => {
                info!(item_id = %item.id, publisher = self.publisher.name(), "reply posted");
                counter!(m::REPLIES_POSTED).increment(1);
                true
            }
            Ok(false) => {
                warn!(item_id = %item.id, "publisher reported no reply created");
                counter!(m::PUBLISH_ERRORS).increment(1);
                false
            }
            Err(e) => {
                warn!(item_id = %item.id, error = %e, "publish failed");
                counter!(m::PUBLISH_ERRORS).increment(1);
                false
            }
        };
        Ok(InteractionRecord::new(item, matched, text, success))
    }

    fn generation_failed(
        &self,
        item: &Item,
        matched: Vec<String>,
        e: GenerationError,
    ) -> InteractionRecord {
        warn!(
            item_id = %item.id,
            provider = self.generator.provider_name(),
            error = %e,
            "generation failed"
        );
        counter!(m::GENERATION_ERRORS).increment(1);
        InteractionRecord::new(item, matched, String::new(), false)
    }

    async fn persist(&self, record: &InteractionRecord) {
        if let Err(e) = self.store.append(record).await {
            self.storage_warning(&e);
        }
        events::emit(
            &self.events,
            SchedulerEvent::Interaction {
                channel: record.source_channel.clone(),
                item_id: record.item_id.clone(),
                success: record.success,
            },
        );
    }

    fn storage_warning(&self, e: &StorageError) {
        warn!(error = %e, "interaction log write failed");
        counter!(m::STORAGE_ERRORS).increment(1);
        events::emit(
            &self.events,
            SchedulerEvent::StorageWarning {
                message: e.to_string(),
            },
        );
    }

    fn emit_scanned(&self, report: &ChannelReport) {
        events::emit(
            &self.events,
            SchedulerEvent::ChannelScanned {
                channel: report.channel.clone(),
                scanned: report.scanned,
                attempted: report.attempted(),
                fetch_error: report.fetch_error.clone(),
            },
        );
    }
}

fn cycle_metrics(channels: &[ChannelReport]) -> CycleMetrics {
    let scanned: u64 = channels.iter().map(|c| c.scanned as u64).sum();
    let attempted: u64 = channels.iter().map(|c| c.attempted() as u64).sum();
    let responded: u64 = channels.iter().map(|c| c.succeeded() as u64).sum();
    let total_secs: f64 = channels.iter().map(|c| c.total_response_secs).sum();
    CycleMetrics {
        timestamp: Utc::now(),
        total_posts_scanned: scanned,
        posts_responded_to: responded,
        response_rate: if scanned == 0 {
            0.0
        } else {
            responded as f64 / scanned as f64
        },
        average_response_time_secs: if attempted == 0 {
            0.0
        } else {
            total_secs / attempted as f64
        },
    }
}
