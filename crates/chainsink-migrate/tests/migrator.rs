use chainsink_core::RetryConfig;
use chainsink_migrate::{
    Changeset, FeatureFlags, MemoryExecutor, MemoryVersionStore, MigrateError, MigrationSet,
    Migrator, StatementError, VersionStore,
};

fn three_changesets() -> MigrationSet {
    let mut set = MigrationSet::new();
    for (v, name) in [(1, "blocks"), (2, "txns"), (3, "stats")] {
        set.register(
            Changeset::new(v, name)
                .up(format!("CREATE TABLE {name} (id INT)"))
                .down(format!("DROP TABLE {name}")),
        )
        .unwrap();
    }
    set
}

fn migrator(set: MigrationSet, flags: FeatureFlags, retries: u32) -> Migrator {
    Migrator::new(set, flags).with_retry(RetryConfig::immediate(retries))
}

#[tokio::test]
async fn up_applies_in_order_and_is_idempotent() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    let m = migrator(three_changesets(), FeatureFlags::new(), 0);

    let first = m.up(&exec, &store).await.unwrap();
    assert_eq!(first.executed, vec![1, 2, 3]);
    assert_eq!(
        exec.executed(),
        vec!["CREATE TABLE blocks (id INT)", "CREATE TABLE txns (id INT)", "CREATE TABLE stats (id INT)"]
    );

    let second = m.up(&exec, &store).await.unwrap();
    assert!(second.executed.is_empty());
    assert_eq!(exec.attempts(), 3);
    assert_eq!(store.applied().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    exec.fail_next(StatementError::with_sqlstate("55P03", "lock timeout"));
    exec.fail_next(StatementError::with_sqlstate("40P01", "deadlock detected"));

    let m = migrator(three_changesets(), FeatureFlags::new(), 5);
    let report = m.up(&exec, &store).await.unwrap();

    assert_eq!(report.executed, vec![1, 2, 3]);
    assert_eq!(report.retries, 2);
    assert_eq!(exec.attempts(), 5);
}

#[tokio::test]
async fn transient_failures_exhaust_the_policy() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    for _ in 0..3 {
        exec.fail_next(StatementError::with_sqlstate("40001", "could not serialize access"));
    }

    let m = migrator(three_changesets(), FeatureFlags::new(), 2);
    let err = m.up(&exec, &store).await.unwrap_err();

    assert!(matches!(err, MigrateError::Statement { version: 1, attempts: 3, .. }));
    assert!(err.is_transient());
    assert!(store.applied().await.unwrap().is_empty());
}

#[tokio::test]
async fn permanent_failure_stops_immediately() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    exec.fail_next(StatementError::with_sqlstate("42601", "syntax error"));

    let m = migrator(three_changesets(), FeatureFlags::new(), 5);
    let err = m.up(&exec, &store).await.unwrap_err();

    assert!(matches!(err, MigrateError::Statement { version: 1, attempts: 1, .. }));
    assert!(!err.is_transient());
    assert_eq!(exec.attempts(), 1);
    assert!(exec.executed().is_empty());
}

#[tokio::test]
async fn down_reverts_newest_first() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    let m = migrator(three_changesets(), FeatureFlags::new(), 0);
    m.up(&exec, &store).await.unwrap();

    let report = m.down(2, &exec, &store).await.unwrap();
    assert_eq!(report.executed, vec![3, 2]);
    assert_eq!(store.applied().await.unwrap(), vec![1]);
    assert_eq!(&exec.executed()[3..], ["DROP TABLE stats", "DROP TABLE txns"]);
}

#[tokio::test]
async fn gate_off_skips_both_directions() {
    let mut set = three_changesets();
    set.register(
        Changeset::new(4, "explorer")
            .gated_by("explorer_statistics")
            .up("CREATE MATERIALIZED VIEW explorer AS SELECT 1")
            .down("DROP MATERIALIZED VIEW explorer"),
    )
    .unwrap();

    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    let off = migrator(set.clone(), FeatureFlags::new(), 0);

    let up = off.up(&exec, &store).await.unwrap();
    assert_eq!(up.executed, vec![1, 2, 3]);
    assert_eq!(up.gated, vec![4]);
    assert_eq!(store.applied().await.unwrap(), vec![1, 2, 3]);

    // enabling the flag later picks it up, since it was never recorded
    let on = migrator(set.clone(), FeatureFlags::new().with("explorer_statistics", true), 0);
    assert_eq!(on.up(&exec, &store).await.unwrap().executed, vec![4]);

    // with the flag off again, down leaves it in place and reverts the next one
    let down = off.down(1, &exec, &store).await.unwrap();
    assert_eq!(down.gated, vec![4]);
    assert_eq!(down.executed, vec![3]);
    assert_eq!(store.applied().await.unwrap(), vec![1, 2, 4]);
    assert!(!exec.executed().iter().any(|s| s.starts_with("DROP MATERIALIZED")));
}

#[tokio::test]
async fn unknown_applied_version_is_an_error() {
    let exec = MemoryExecutor::new();
    let store = MemoryVersionStore::new();
    store.record(99, "from elsewhere").await.unwrap();

    let m = migrator(three_changesets(), FeatureFlags::new(), 0);
    let err = m.down(1, &exec, &store).await.unwrap_err();
    assert!(matches!(err, MigrateError::UnknownVersion(99)));
}
