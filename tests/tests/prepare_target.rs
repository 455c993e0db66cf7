//! Target preparation tests: database, retention policies and confirmations.

use integration_tests::fixtures::WhisperTree;
use integration_tests::mocks::MockAdmin;
use migrate_core::Error;
use migrate_pipeline::{prepare_target, MigrationConfig};

fn config() -> MigrationConfig {
    MigrationConfig {
        create_database_and_policies: true,
        database: "graphite".into(),
        replication_factor: 2,
        ..Default::default()
    }
}

/// Two retention layouts sharing the one-day archive.
fn tree() -> WhisperTree {
    let tree = WhisperTree::new();
    tree.add("servers/web01/cpu.wsp", &[(60, 1440), (3600, 720)], &[vec![], vec![]]);
    tree.add("servers/web02/cpu.wsp", &[(60, 1440), (600, 9)], &[vec![], vec![]]);
    tree.add_raw("servers/web03/cpu.wsp", b"garbage");
    tree
}

#[tokio::test]
async fn test_one_policy_per_distinct_retention() {
    let tree = tree();
    let admin = MockAdmin::new();

    let created = prepare_target(&config(), &admin, tree.root(), |_| true)
        .await
        .unwrap();

    assert_eq!(created, vec!["1h30m", "1d", "30d"]);
    assert_eq!(
        admin.statements(),
        vec![
            r#"CREATE DATABASE "graphite""#,
            r#"CREATE RETENTION POLICY "1h30m" ON "graphite" DURATION 1h30m REPLICATION 2"#,
            r#"CREATE RETENTION POLICY "1d" ON "graphite" DURATION 1d REPLICATION 2"#,
            r#"CREATE RETENTION POLICY "30d" ON "graphite" DURATION 30d REPLICATION 2"#,
        ]
    );
}

#[tokio::test]
async fn test_existing_policy_made_default() {
    let tree = tree();
    let admin = MockAdmin::new();
    let config = MigrationConfig {
        default_retention_policy: "30d".into(),
        ..config()
    };

    let created = prepare_target(&config, &admin, tree.root(), |_| true)
        .await
        .unwrap();

    assert_eq!(created.len(), 3);
    assert_eq!(
        admin.statements().last().unwrap(),
        r#"ALTER RETENTION POLICY "30d" ON "graphite" DEFAULT"#
    );
}

#[tokio::test]
async fn test_default_policy_requires_duration_when_missing() {
    let tree = WhisperTree::new();
    let admin = MockAdmin::new();
    let config = MigrationConfig {
        default_retention_policy: "archive".into(),
        ..config()
    };

    let err = prepare_target(&config, &admin, tree.root(), |_| true)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn test_confirmations_are_asked_in_order() {
    let tree = tree();
    let admin = MockAdmin::new();
    let config = MigrationConfig {
        interactive_confirm: true,
        ..config()
    };

    let mut questions = Vec::new();
    prepare_target(&config, &admin, tree.root(), |q| {
        questions.push(q.to_string());
        true
    })
    .await
    .unwrap();

    assert_eq!(questions.len(), 2);
    assert!(questions[0].contains("database"));
    assert!(questions[1].contains("1h30m, 1d, 30d"));
}

#[tokio::test]
async fn test_declining_policies_aborts_after_database() {
    let tree = tree();
    let admin = MockAdmin::new();
    let config = MigrationConfig {
        interactive_confirm: true,
        ..config()
    };

    let mut answers = vec![true, false].into_iter();
    let err = prepare_target(&config, &admin, tree.root(), |_| answers.next().unwrap_or(false))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Aborted(_)));
    assert!(err.is_fatal());
    assert_eq!(admin.statements(), vec![r#"CREATE DATABASE "graphite""#]);
}

#[tokio::test]
async fn test_admin_failure_propagates() {
    let tree = tree();
    let admin = MockAdmin::new();
    admin.fail_on("CREATE RETENTION POLICY");

    let err = prepare_target(&config(), &admin, tree.root(), |_| true)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "SINK");
    assert_eq!(admin.statements().len(), 1);
}
