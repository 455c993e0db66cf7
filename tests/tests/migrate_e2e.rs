//! End-to-end tests for the migration pipeline.
//!
//! These tests run discovery, rule matching, extraction, batching and retries
//! against whisper files in a temporary directory:
//! whisper tree → Migration → BatchingSink → MockWriter
//!
//! The MockWriter implements the same PointWriter trait as the InfluxDB
//! client, so only the HTTP transport is left out.

use integration_tests::fixtures::{self, minute_samples, tag, BASE_TIMESTAMP};
use integration_tests::setup::{fast_retry, test_sink_config, TestContext};
use migrate_core::{ConversionRule, Error, RuleSet, Tag};
use migrate_pipeline::{Migration, MigrationConfig, SinkConfig};
use whisper_archive::Sample;

#[tokio::test]
async fn test_every_point_is_written() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 10);
    ctx.tree.add_series("servers/web02/memory.wsp", 7);
    ctx.tree.add(
        "servers/db01/disk.wsp",
        &[(60, 8), (3600, 4)],
        &[minute_samples(5), minute_samples(3)],
    );

    let summary = ctx.migrate().await;

    assert!(summary.errors.is_empty(), "unexpected errors: {:?}", summary.errors);
    assert_eq!(summary.files_discovered, 3);
    assert_eq!(summary.files_completed(), 3);
    assert_eq!(summary.points_written, 25);
    assert_eq!(ctx.writer.point_count(), 25);
    assert!(ctx.writer.captured_points().iter().all(|p| p.timestamp != 0));
}

#[tokio::test]
async fn test_servers_web01_cpu() {
    let rules = RuleSet::new(vec![ConversionRule::new(
        r"servers\.(?P<host>[^.]+)\.cpu",
        "cpu",
        vec![tag("host", "?host")],
        "value",
    )]);
    let ctx = TestContext::new().with_rules(rules);
    ctx.tree.add(
        "servers/web01/cpu.wsp",
        &[(60, 1440)],
        &[vec![Sample::new(BASE_TIMESTAMP, 0.5)]],
    );

    let sink = ctx.sink(test_sink_config().with_policies(vec!["1d".into()], ""));
    let summary = ctx.run(&sink).await.unwrap();
    assert_eq!(summary.points_written, 1);

    let writes = ctx.writer.captured_writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].policy, "1d");

    let point = &writes[0].points[0];
    assert_eq!(&*point.measurement, "cpu");
    assert_eq!(&*point.retention_policy, "1d");
    assert_eq!(&point.tags[..], &[Tag::new("host", "web01")]);
    assert_eq!(&*point.field.key, "value");
    assert_eq!(point.field.value, 0.5);
    assert_eq!(point.timestamp, i64::from(BASE_TIMESTAMP));
}

#[tokio::test]
async fn test_unmatched_series_are_skipped() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 4);
    ctx.tree.add_series("load.wsp", 6);

    let summary = ctx.migrate().await;

    assert_eq!(summary.points_written, 4);
    assert_eq!(summary.files_skipped(), 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(matches!(&summary.errors[0], Error::NoMatch { key } if key == "load"));
}

#[tokio::test]
async fn test_invalid_rule_falls_through_to_next_rule() {
    let rules = RuleSet::new(vec![
        ConversionRule::new("servers.(", "broken", vec![], "value"),
        fixtures::server_rule(),
    ]);
    let ctx = TestContext::new().with_rules(rules);
    ctx.tree.add_series("servers/web01/cpu.wsp", 3);
    ctx.tree.add_series("servers/web02/cpu.wsp", 2);

    let summary = ctx.migrate().await;

    assert_eq!(summary.points_written, 5);
    assert_eq!(summary.files_completed(), 2);
    assert_eq!(summary.errors.len(), 2);
    assert!(summary
        .errors
        .iter()
        .all(|e| matches!(e, Error::InvalidRule { pattern, .. } if pattern == "servers.(")));
}

#[tokio::test]
async fn test_unreadable_file_does_not_stop_migration() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 5);
    let broken = ctx.tree.add_raw("servers/web02/cpu.wsp", b"not a whisper file");

    let summary = ctx.migrate().await;

    assert_eq!(summary.points_written, 5);
    assert_eq!(summary.files_failed(), 1);
    match &summary.errors[..] {
        [Error::Extraction { path, .. }] => assert_eq!(path, &broken),
        other => panic!("unexpected errors: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_root_is_empty_run() {
    let ctx = TestContext::new();
    let sink = ctx.sink(test_sink_config());
    let migration = Migration::new(
        ctx.rules.clone(),
        ctx.tree.root().join("absent"),
        &MigrationConfig::default(),
    );

    let summary = migration.run(&sink).await.unwrap();

    assert_eq!(summary.files_discovered, 0);
    assert_eq!(summary.points_written, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(ctx.writer.attempt_count(), 0);
}

#[tokio::test]
async fn test_disabled_sink_writes_nothing() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 12);

    let sink = ctx.sink(SinkConfig {
        enabled: false,
        ..test_sink_config()
    });
    let summary = ctx.run(&sink).await.unwrap();

    assert_eq!(summary.points_written, 0);
    assert_eq!(summary.batches_written, 0);
    assert!(summary.errors.is_empty());
    assert_eq!(ctx.writer.attempt_count(), 0);
}

#[tokio::test]
async fn test_terminal_write_failure_is_reported() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 3);
    ctx.writer.set_should_fail(true);

    let sink = ctx.sink(SinkConfig {
        retry: fast_retry(1),
        ..test_sink_config()
    });
    let summary = ctx.run(&sink).await.unwrap();

    assert!(summary.has_write_failures());
    assert_eq!(summary.points_written, 0);
    assert_eq!(summary.points_failed, 3);
    assert_eq!(ctx.writer.attempt_count(), 2);
    assert!(matches!(
        &summary.errors[..],
        [Error::Write { attempts: 2, points: 3, .. }]
    ));
}

#[tokio::test]
async fn test_many_files_with_small_batches() {
    let mut ctx = TestContext::new();
    ctx.migration.max_concurrent_files = 2;
    for host in 0..12 {
        ctx.tree.add_series(&format!("servers/host{:02}/cpu.wsp", host), 9);
    }

    let sink = ctx.sink(SinkConfig {
        batch_size: 7,
        write_concurrency: 2,
        ..test_sink_config()
    });
    let summary = ctx.run(&sink).await.unwrap();

    assert!(summary.errors.is_empty());
    assert_eq!(summary.points_written, 108);
    assert_eq!(ctx.writer.point_count(), 108);
    assert!(ctx.writer.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_file_fan_out_respects_limit() {
    for limit in [1, 3] {
        let mut ctx = TestContext::new();
        ctx.migration.max_concurrent_files = limit;
        for host in 0..10 {
            ctx.tree.add_series(&format!("servers/host{:02}/disk.wsp", host), 40);
        }
        ctx.writer.set_delay(std::time::Duration::from_millis(2));

        let sink = ctx.sink(SinkConfig {
            batch_size: 5,
            write_concurrency: 1,
            ..test_sink_config()
        });
        let summary = ctx.run(&sink).await.unwrap();

        assert!(summary.errors.is_empty());
        assert_eq!(summary.points_written, 400);
        assert!(summary.peak_concurrent_files >= 1);
        assert!(
            summary.peak_concurrent_files <= limit,
            "{} files in flight with a limit of {}",
            summary.peak_concurrent_files,
            limit
        );
    }
}

#[tokio::test]
async fn test_corrupt_archive_count_fails_only_that_file() {
    let ctx = TestContext::new();
    ctx.tree.add_series("servers/web01/cpu.wsp", 6);
    let mut garbage = vec![0u8; 80];
    garbage[12..16].copy_from_slice(&0x7fff_ffffu32.to_be_bytes());
    let broken = ctx.tree.add_raw("servers/web02/cpu.wsp", &garbage);

    let summary = ctx.migrate().await;

    assert_eq!(summary.points_written, 6);
    assert_eq!(summary.files_failed(), 1);
    match &summary.errors[..] {
        [Error::Extraction { path, .. }] => assert_eq!(path, &broken),
        other => panic!("unexpected errors: {:?}", other),
    }
}
