mod common;

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use status_monitor::metrics::{RequestOutcome, SpanConfig, SpanRegistry, StatusClass};
use tokio_util::sync::CancellationToken;

use common::{outcome, CollectingSink, JitterySource, ScriptedSource, SteppingSource, T0};

fn registry(
    spans: &[SpanConfig],
) -> (SpanRegistry, Arc<ScriptedSource>, Arc<CollectingSink>) {
    let source = Arc::new(ScriptedSource::default());
    let sink = Arc::new(CollectingSink::default());
    let registry = SpanRegistry::new(spans, source.clone(), sink.clone()).unwrap();
    (registry, source, sink)
}

#[tokio::test]
async fn end_to_end_single_span() {
    let (registry, source, _sink) = registry(&[SpanConfig::new(1, 3)]);

    assert!(registry.record(outcome(0, 10, 200)));
    assert!(registry.record(outcome(200, 30, 500)));
    assert!(registry.record(outcome(1_200, 8, 404)));

    let history = registry.history(0).unwrap();
    assert_eq!(history.responses.len(), 2);

    let first = &history.responses[0];
    assert_eq!(first.count_of(StatusClass::Success), 1);
    assert_eq!(first.count_of(StatusClass::ServerError), 1);
    assert_eq!(first.count(), 2);
    assert!((first.mean() - 20.0).abs() < 1e-9);

    let second = &history.responses[1];
    assert_eq!(second.count_of(StatusClass::ClientError), 1);
    assert_eq!(second.count(), 1);
    assert_eq!(second.timestamp(), T0 + 1_200);

    for offset in [2_300, 3_300, 4_300, 5_300] {
        source.push_ok(offset);
        registry.tick_at(0, T0 + offset).await.unwrap();
    }

    let history = registry.history(0).unwrap();
    assert_eq!(history.os.len(), 3);
    assert_eq!(history.os[0].timestamp, T0 + 3_300);
    assert_eq!(history.responses.len(), 3);
    assert!(history.responses.iter().all(|b| b.count() == 0));
}

#[tokio::test]
async fn snapshot_lags_one_tick() {
    let (registry, source, sink) = registry(&[SpanConfig::new(1, 10)]);

    source.push_ok(1_000);
    registry.tick_at(0, T0 + 1_000).await.unwrap();
    assert!(sink.take().is_empty(), "nothing closed after the first tick");

    registry.record(outcome(1_400, 12, 200));
    registry.record(outcome(1_900, 4, 302));

    source.push_ok(2_000);
    registry.tick_at(0, T0 + 2_000).await.unwrap();
    let published = sink.take();
    assert_eq!(published.len(), 1);
    let (span, snapshot) = &published[0];
    assert_eq!(*span, 0);
    assert_eq!(snapshot.os.timestamp, T0 + 1_000);
    let bucket = snapshot.responses.as_ref().unwrap();
    assert_eq!(bucket.timestamp(), T0 + 1_000);
    assert_eq!(bucket.count(), 2);
    assert!((bucket.mean() - 8.0).abs() < 1e-9);

    source.push_ok(3_000);
    registry.tick_at(0, T0 + 3_000).await.unwrap();
    let published = sink.take();
    let bucket = published[0].1.responses.as_ref().unwrap();
    assert_eq!(bucket.timestamp(), T0 + 2_000);
    assert_eq!(bucket.count(), 0);
}

#[tokio::test]
async fn silent_interval_gets_placeholder() {
    let (registry, source, _sink) = registry(&[SpanConfig::new(5, 10)]);

    source.push_ok(0);
    registry.tick_at(0, T0).await.unwrap();
    source.push_ok(5_000);
    registry.tick_at(0, T0 + 5_000).await.unwrap();

    let history = registry.history(0).unwrap();
    assert_eq!(history.responses.len(), 2);
    assert_eq!(history.responses[1].count(), 0);
    assert_eq!(history.responses[1].timestamp(), T0 + 5_000);
}

#[tokio::test]
async fn slow_sample_reads_do_not_swallow_silent_intervals() {
    let (registry, source, sink) = registry(&[SpanConfig::new(1, 10)]);

    // Each reading lands a few milliseconds after its tick, by varying amounts.
    for (tick, read) in [(1_000, 1_003), (2_000, 2_001), (3_000, 3_002), (4_000, 4_000)] {
        source.push_ok(read);
        registry.tick_at(0, T0 + tick).await.unwrap();
    }

    let history = registry.history(0).unwrap();
    let starts: Vec<i64> = history.responses.iter().map(|b| b.timestamp() - T0).collect();
    assert_eq!(starts, vec![1_000, 2_000, 3_000, 4_000]);

    let published: Vec<i64> = sink
        .take()
        .iter()
        .map(|(_, snap)| snap.responses.as_ref().unwrap().timestamp() - T0)
        .collect();
    assert_eq!(published, vec![1_000, 2_000, 3_000]);
}

#[tokio::test]
async fn failed_sample_leaves_span_untouched() {
    let (registry, source, sink) = registry(&[SpanConfig::new(1, 10)]);

    source.push_ok(1_000);
    registry.tick_at(0, T0 + 1_000).await.unwrap();
    source.push_ok(2_000);
    registry.tick_at(0, T0 + 2_000).await.unwrap();
    sink.take();
    let before = registry.history(0).unwrap();

    source.push_err("permission denied");
    registry.tick_at(0, T0 + 3_000).await.unwrap();

    let after = registry.history(0).unwrap();
    assert_eq!(after.os, before.os);
    assert_eq!(after.responses, before.responses);
    assert!(sink.take().is_empty());
}

#[tokio::test]
async fn every_span_counts_a_request_once() {
    let (registry, _source, _sink) = registry(&[
        SpanConfig::new(1, 60),
        SpanConfig::new(5, 60),
        SpanConfig::new(15, 60),
    ]);

    registry.record(outcome(100, 25, 201));

    for history in registry.histories() {
        let total: u64 = history.responses.iter().map(|b| b.count()).sum();
        assert_eq!(total, 1, "span {}s", history.interval);
        assert_eq!(history.responses[0].count_of(StatusClass::Success), 1);
    }
}

#[test]
fn timed_out_request_is_a_single_server_error() {
    let (registry, _source, _sink) = registry(&[SpanConfig::new(1, 60)]);

    let timed_out = RequestOutcome {
        timed_out: true,
        ..outcome(500, 3_000, 200)
    };
    assert!(registry.record(timed_out));

    let bucket = registry.history(0).unwrap().responses[0].clone();
    assert_eq!(bucket.count(), 1);
    assert_eq!(bucket.count_of(StatusClass::ServerError), 1);
    assert_eq!(bucket.count_of(StatusClass::Success), 0);
}

#[tokio::test]
async fn retention_holds_for_random_interleavings() {
    let spans = [SpanConfig::new(1, 4), SpanConfig::new(3, 2), SpanConfig::new(2, 1)];
    let (registry, source, _sink) = registry(&spans);
    let mut rng = StdRng::seed_from_u64(99);
    let mut now = 0;

    for _ in 0..500 {
        now += rng.gen_range(0..900);
        if rng.gen_bool(0.3) {
            let span = rng.gen_range(0..spans.len());
            source.push_ok(now);
            registry.tick_at(span, T0 + now).await.unwrap();
        } else {
            let status = [200, 204, 301, 404, 500, 503][rng.gen_range(0..6)];
            registry.record(outcome(now, rng.gen_range(0..50), status));
        }

        for (config, history) in spans.iter().zip(registry.histories()) {
            assert!(history.os.len() <= config.retention);
            assert!(history.responses.len() <= config.retention);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn samplers_tick_until_cancelled() {
    let sink = Arc::new(CollectingSink::default());
    let registry = Arc::new(
        SpanRegistry::new(
            &[SpanConfig::new(1, 10)],
            Arc::new(SteppingSource::default()),
            sink.clone(),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let handles = registry.spawn_samplers(shutdown.clone());
    assert_eq!(handles.len(), 1);

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    let history = registry.history(0).unwrap();
    assert_eq!(history.os.len(), 3);
    assert_eq!(sink.take().len(), 2);

    // no more ticks after cancellation
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(registry.history(0).unwrap().os.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn sampler_placeholders_follow_the_schedule() {
    let sink = Arc::new(CollectingSink::default());
    let registry = Arc::new(
        SpanRegistry::new(
            &[SpanConfig::new(1, 10)],
            Arc::new(JitterySource::default()),
            sink.clone(),
        )
        .unwrap(),
    );

    let shutdown = CancellationToken::new();
    let handles = registry.spawn_samplers(shutdown.clone());
    tokio::time::sleep(Duration::from_millis(4_500)).await;
    shutdown.cancel();
    for handle in handles {
        handle.await.unwrap();
    }

    let history = registry.history(0).unwrap();
    assert_eq!(history.os.len(), 4);
    assert_eq!(history.responses.len(), 4);
    for pair in history.responses.windows(2) {
        assert_eq!(pair[1].timestamp() - pair[0].timestamp(), 1_000);
    }

    let published: Vec<i64> = sink
        .take()
        .iter()
        .map(|(_, snap)| snap.responses.as_ref().unwrap().timestamp())
        .collect();
    assert_eq!(published.len(), 3);
    assert!(published.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_records_across_a_boundary_open_one_bucket() {
    const WRITERS: usize = 16;

    let (registry, source, _sink) = registry(&[SpanConfig::new(1, 10)]);
    let registry = Arc::new(registry);
    registry.record(outcome(100, 5, 200));

    source.push_ok(1_200);
    let barrier = Arc::new(tokio::sync::Barrier::new(WRITERS + 1));
    let mut tasks = Vec::new();
    for i in 0..WRITERS {
        let registry = registry.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            registry.record(outcome(1_500 + i as i64, 3, 200))
        }));
    }
    {
        let registry = registry.clone();
        let barrier = barrier.clone();
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            registry.tick_at(0, T0 + 1_200).await.is_ok()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap());
    }

    let history = registry.history(0).unwrap();
    assert_eq!(history.responses.len(), 2);
    assert_eq!(history.responses[0].count(), 1);
    assert_eq!(history.responses[1].count(), WRITERS as u64);
}
