//! Transaction behavior against a real SQLite database.

use sqlbridge::backend::sqlite::SqliteBackend;
use sqlbridge::{params, Connection, ConnectionParams, Error, ParameterSet, TransactionError};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> Connection<SqliteBackend> {
    init_tracing();
    let mut conn = Connection::new(SqliteBackend, ConnectionParams::sqlite_memory());
    conn.execute(
        "CREATE TABLE entries (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
        &params![],
    )
    .await
    .unwrap();
    conn
}

async fn count(conn: &mut Connection<SqliteBackend>) -> i64 {
    conn.query_one("SELECT COUNT(*) AS n FROM entries", &ParameterSet::new())
        .await
        .unwrap()
        .unwrap()
        .get("n")
        .unwrap()
}

#[tokio::test]
async fn inner_rollback_keeps_outer_work() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["outer"])
        .await
        .unwrap();

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["inner"])
        .await
        .unwrap();
    assert_eq!(count(&mut conn).await, 2);

    conn.rollback().await.unwrap();
    assert_eq!(count(&mut conn).await, 1);
    assert_eq!(conn.transaction_nesting_level(), 1);

    conn.commit().await.unwrap();
    assert_eq!(count(&mut conn).await, 1);
    assert!(!conn.is_transaction_active());
}

#[tokio::test]
async fn three_levels_deep() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.begin().await.unwrap();
    conn.begin().await.unwrap();
    assert_eq!(conn.transaction_nesting_level(), 3);

    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["deep"])
        .await
        .unwrap();
    conn.commit().await.unwrap();
    conn.commit().await.unwrap();
    conn.commit().await.unwrap();

    assert_eq!(count(&mut conn).await, 1);
}

#[tokio::test]
async fn rollback_only_dooms_the_whole_cycle() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["doomed"])
        .await
        .unwrap();
    conn.set_rollback_only().unwrap();

    let err = conn.commit().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::RollbackOnly)
    ));
    // Still inside the transaction; the refusal changed nothing.
    assert_eq!(conn.transaction_nesting_level(), 1);

    conn.rollback().await.unwrap();
    assert!(!conn.is_rollback_only());
    assert_eq!(count(&mut conn).await, 0);
}

#[tokio::test]
async fn rollback_only_survives_inner_rollback() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.begin().await.unwrap();
    conn.set_rollback_only().unwrap();
    conn.rollback().await.unwrap();

    assert!(conn.is_rollback_only());
    assert!(conn.commit().await.is_err());
    conn.rollback().await.unwrap();
}

#[tokio::test]
async fn verbs_refused_without_transaction() {
    let mut conn = setup().await;

    let err = conn.commit().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::NoActiveTransaction)
    ));
    let err = conn.rollback().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Transaction(TransactionError::NoActiveTransaction)
    ));
}

#[tokio::test]
async fn close_discards_open_transaction() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["lost"])
        .await
        .unwrap();
    conn.close().await;

    assert!(!conn.is_connected());
    assert_eq!(conn.transaction_nesting_level(), 0);
}

#[tokio::test]
async fn run_scoped_commits_on_success() {
    let mut conn = setup().await;

    conn.run_scoped(|c| {
        Box::pin(async move {
            c.execute("INSERT INTO entries (label) VALUES (?)", &params!["kept"])
                .await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    assert_eq!(count(&mut conn).await, 1);
    assert!(!conn.is_transaction_active());
}

#[tokio::test]
async fn run_scoped_rolls_back_on_error() {
    let mut conn = setup().await;

    let err = conn
        .run_scoped::<(), _>(|c| {
            Box::pin(async move {
                c.execute("INSERT INTO entries (label) VALUES (?)", &params!["gone"])
                    .await?;
                Err(Error::configuration("abort"))
            })
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration(_)));
    assert_eq!(count(&mut conn).await, 0);
}

#[tokio::test]
async fn run_scoped_nests_inside_explicit_transaction() {
    let mut conn = setup().await;

    conn.begin().await.unwrap();
    conn.execute("INSERT INTO entries (label) VALUES (?)", &params!["outer"])
        .await
        .unwrap();

    let _ = conn
        .run_scoped::<(), _>(|c| {
            Box::pin(async move {
                c.execute("INSERT INTO entries (label) VALUES (?)", &params!["inner"])
                    .await?;
                Err(Error::configuration("abort inner"))
            })
        })
        .await
        .unwrap_err();

    // Only the scoped level rolled back.
    assert_eq!(conn.transaction_nesting_level(), 1);
    assert_eq!(count(&mut conn).await, 1);
    conn.commit().await.unwrap();
    assert_eq!(count(&mut conn).await, 1);
}
