// tests/scan_cycle.rs
//
// End-to-end behaviour of one scan pass with scripted collaborators.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use reddit_responder::planner::ResponsePlanner;
use reddit_responder::store::{LogStore, MemoryLogStore};
use reddit_responder::SchedulerEvent;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn every_attempt_yields_exactly_one_record() {
    let source = ScriptedSource::new().page(
        "india",
        vec![
            help_post("ok1", "india"),
            item("gen-fail", "india", "help: generator breaks", "", 30, 1),
            item("empty", "india", "advice: empty reply", "", 30, 1),
            help_post("pub-fail", "india"),
            item("skip", "india", "holiday pictures", "", 30, 1),
            item("stale", "india", "old help thread", "", 90_000, 1),
        ],
    );
    let generator = ScriptedGenerator::new(GenMode::Reply)
        .when_title_contains("generator breaks", GenMode::Fail)
        .when_title_contains("empty reply", GenMode::Empty);
    let publisher = Arc::new(RecordingPublisher::new().failing_for("pub-fail"));
    let store = Arc::new(MemoryLogStore::new());
    let generator = Arc::new(generator);

    let cycle = quick_cycle(
        Arc::new(source),
        generator.clone(),
        publisher.clone(),
        store.clone(),
    );
    let report = cycle
        .run("india", &schedule(&["india"]), &CancellationToken::new())
        .await;

    assert_eq!(report.scanned, 6);
    assert_eq!(report.skipped_irrelevant, 2);
    assert_eq!(generator.call_count(), 4);
    assert_eq!(report.attempted(), 4, "records == attempts");
    assert_eq!(report.succeeded(), 1);

    let logged = store.query_all().await.unwrap();
    assert_eq!(logged.len(), 4);
    let by_id = |id: &str| logged.iter().find(|r| r.item_id == id).unwrap().clone();
    assert!(by_id("ok1").success);
    assert!(!by_id("gen-fail").success);
    assert_eq!(by_id("gen-fail").generated_response, "");
    assert!(!by_id("empty").success);
    assert!(!by_id("pub-fail").success);
    assert_eq!(by_id("pub-fail").response_length, "What have you tried so far?".len());
    assert_eq!(publisher.posted(), vec!["ok1".to_string()]);
}

#[tokio::test]
async fn fetch_failure_only_skips_that_channel() {
    let source = ScriptedSource::new()
        .failing("banned", 403)
        .page("india", vec![help_post("p1", "india")]);
    let store = Arc::new(MemoryLogStore::new());
    let cycle = quick_cycle(
        Arc::new(source),
        Arc::new(ScriptedGenerator::new(GenMode::Reply)),
        Arc::new(RecordingPublisher::new()),
        store.clone(),
    );

    let report = cycle
        .run_cycle(&schedule(&["banned", "india"]), &CancellationToken::new())
        .await;
    assert!(!report.cancelled);
    assert_eq!(report.channels.len(), 2);
    assert!(report.channels[0].fetch_error.as_deref().unwrap().contains("403"));
    assert_eq!(report.channels[1].attempted(), 1);
    assert_eq!(store.query_all().await.unwrap().len(), 1);

    let metrics = store.query_metrics().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].total_posts_scanned, 1);
    assert_eq!(metrics[0].posts_responded_to, 1);
}

#[tokio::test]
async fn items_are_handled_once_across_cycles() {
    let source = ScriptedSource::new().page(
        "india",
        vec![help_post("p1", "india"), help_post("p2", "india")],
    );
    let generator = Arc::new(ScriptedGenerator::new(GenMode::Reply));
    let cycle = quick_cycle(
        Arc::new(source),
        generator.clone(),
        Arc::new(RecordingPublisher::new()),
        Arc::new(MemoryLogStore::new()),
    );
    let cfg = schedule(&["india"]);
    let cancel = CancellationToken::new();

    let first = cycle.run("india", &cfg, &cancel).await;
    let second = cycle.run("india", &cfg, &cancel).await;
    assert_eq!(first.attempted(), 2);
    assert_eq!(second.attempted(), 0);
    assert_eq!(second.skipped_seen, 2);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn storage_failure_is_reported_not_fatal() {
    let source = ScriptedSource::new().page(
        "india",
        vec![help_post("p1", "india"), help_post("p2", "india")],
    );
    let cycle = quick_cycle(
        Arc::new(source),
        Arc::new(ScriptedGenerator::new(GenMode::Reply)),
        Arc::new(RecordingPublisher::new()),
        Arc::new(BrokenStore),
    );
    let mut events = cycle.events().subscribe();

    let report = cycle
        .run("india", &schedule(&["india"]), &CancellationToken::new())
        .await;
    assert_eq!(report.attempted(), 2);

    let mut warnings = 0;
    while let Ok(ev) = events.try_recv() {
        if matches!(ev, SchedulerEvent::StorageWarning { .. }) {
            warnings += 1;
        }
    }
    assert_eq!(warnings, 2);
}

#[tokio::test]
async fn stop_during_reply_delay_abandons_item_without_record() {
    let source = ScriptedSource::new().page("india", vec![help_post("slow", "india")]);
    let generator = Arc::new(ScriptedGenerator::new(GenMode::Reply));
    let store = Arc::new(MemoryLogStore::new());
    let cycle = Arc::new(
        quick_cycle(
            Arc::new(source),
            generator.clone(),
            Arc::new(RecordingPublisher::new()),
            store.clone(),
        )
        .with_planner(ResponsePlanner::seeded(1).with_delay_range(60, 60)),
    );

    let cancel = CancellationToken::new();
    let c2 = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        c2.cancel();
    });

    let t0 = Instant::now();
    let report = cycle.run("india", &schedule(&["india"]), &cancel).await;
    assert!(t0.elapsed() < Duration::from_secs(2));
    assert!(report.cancelled);
    assert_eq!(report.abandoned, 1);
    assert_eq!(report.attempted(), 0);
    assert_eq!(generator.call_count(), 0);
    assert!(store.query_all().await.unwrap().is_empty());
    assert!(!cycle.seen().contains("slow"), "abandoned id is released");
}

#[tokio::test(start_paused = true)]
async fn generation_calls_are_spaced_by_the_rate_gate() {
    let source = ScriptedSource::new().page(
        "india",
        vec![help_post("a", "india"), help_post("b", "india"), help_post("c", "india")],
    );
    let mut limits = no_limits();
    limits.generation_delay_secs = 12;
    let cycle = quick_cycle(
        Arc::new(source),
        Arc::new(ScriptedGenerator::new(GenMode::Reply)),
        Arc::new(RecordingPublisher::new()),
        Arc::new(MemoryLogStore::new()),
    )
    .with_rate_gate(limits.to_gate());

    let t0 = tokio::time::Instant::now();
    let report = cycle
        .run("india", &schedule(&["india"]), &CancellationToken::new())
        .await;
    assert_eq!(report.attempted(), 3);
    // first call immediate, then two 12s gaps
    assert!(tokio::time::Instant::now() - t0 >= Duration::from_secs(24));
}

#[tokio::test(start_paused = true)]
async fn publishes_share_the_source_spacing() {
    let source = ScriptedSource::new().page(
        "india",
        vec![help_post("a", "india"), help_post("b", "india")],
    );
    let mut limits = no_limits();
    limits.source_delay_secs = 2;
    let publisher = Arc::new(RecordingPublisher::new());
    let cycle = quick_cycle(
        Arc::new(source),
        Arc::new(ScriptedGenerator::new(GenMode::Reply)),
        publisher.clone(),
        Arc::new(MemoryLogStore::new()),
    )
    .with_rate_gate(limits.to_gate());

    let t0 = tokio::time::Instant::now();
    let report = cycle
        .run("india", &schedule(&["india"]), &CancellationToken::new())
        .await;
    assert_eq!(report.succeeded(), 2);

    // fetch at 0s, first publish at 2s, second at 4s
    let at = publisher.posted_at();
    assert_eq!(at.len(), 2);
    assert!(at[0] - t0 >= Duration::from_secs(2));
    assert!(at[1] - at[0] >= Duration::from_secs(2));
}

#[tokio::test]
async fn short_retention_never_causes_a_second_reply() {
    use reddit_responder::seen::SeenSet;

    // Two minutes old: past a 60s retention, well inside the 3600s age bound.
    let source = ScriptedSource::new().page(
        "india",
        vec![item("p1", "india", "need help", "", 120, 1)],
    );
    let publisher = Arc::new(RecordingPublisher::new());
    let cycle = quick_cycle(
        Arc::new(source),
        Arc::new(ScriptedGenerator::new(GenMode::Reply)),
        publisher.clone(),
        Arc::new(MemoryLogStore::new()),
    )
    .with_seen(Arc::new(SeenSet::with_retention(Duration::from_secs(60))));
    let cfg = schedule(&["india"]);
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        cycle.run_cycle(&cfg, &cancel).await;
    }
    assert_eq!(publisher.posted(), vec!["p1".to_string()]);
    assert!(cycle.seen().contains("p1"));
}
