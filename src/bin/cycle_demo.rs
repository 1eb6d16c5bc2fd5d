//! Runs a single scan cycle over canned posts (no network, replies logged only).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reddit_responder::config::{RateLimits, ScheduleConfig};
use reddit_responder::generate::FixedGenerator;
use reddit_responder::planner::ResponsePlanner;
use reddit_responder::source::{DryRunPublisher, FixtureSource};
use reddit_responder::store::{LogStore, MemoryLogStore};
use reddit_responder::{init_tracing, Item, ScanCycle};
use tokio_util::sync::CancellationToken;

fn post(id: &str, channel: &str, title: &str, body: &str, age_mins: i64) -> Item {
    Item {
        id: id.into(),
        title: title.into(),
        body: body.into(),
        created_at: Utc::now() - chrono::Duration::minutes(age_mins),
        score: 1,
        source_channel: channel.into(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let source = FixtureSource::new()
        .with_items(
            "india",
            vec![
                post("d1", "india", "Need advice on switching careers", "", 5),
                post("d2", "india", "Monsoon photos", "Look at this view", 10),
                post("d3", "india", "Visa question", "I am stuck with paperwork", 20),
                post("d4", "india", "Old thread: any help?", "", 180),
            ],
        )
        .with_items(
            "AskReddit",
            vec![post("d5", "AskReddit", "What are your thoughts on remote work?", "", 2)],
        );
    let publisher = Arc::new(DryRunPublisher::new());
    let store = Arc::new(MemoryLogStore::new());

    // Demo pacing: every relevant post is answered, with no waiting.
    let limits = RateLimits {
        source_delay_secs: 0,
        generation_delay_secs: 0,
        response_delay_secs: [0, 0],
    };
    let cycle = ScanCycle::new(
        Arc::new(source),
        Arc::new(FixedGenerator::new(
            "What have you already tried, and what is holding you back?",
        )),
        publisher.clone(),
        store.clone(),
    )
    .with_rate_gate(limits.to_gate())
    .with_planner(ResponsePlanner::seeded(7).with_delay_range(0, 0));

    let config = ScheduleConfig {
        selectivity: 1.0,
        ..Default::default()
    };
    let cancel = CancellationToken::new();
    let report = tokio::time::timeout(Duration::from_secs(30), cycle.run_cycle(&config, &cancel)).await?;

    for ch in &report.channels {
        println!(
            "r/{:<10} scanned={} attempted={} succeeded={} skipped(irrelevant)={}",
            ch.channel,
            ch.scanned,
            ch.attempted(),
            ch.succeeded(),
            ch.skipped_irrelevant
        );
    }
    for rec in store.query_all().await? {
        println!(
            "  {} [{}] matched={:?} -> {} chars",
            rec.item_id,
            rec.source_channel,
            rec.matched_keywords,
            rec.response_length
        );
    }
    println!(
        "cycle-demo done: {} replies (dry-run), response rate {:.2}",
        publisher.published().len(),
        report.metrics.response_rate
    );
    Ok(())
}
