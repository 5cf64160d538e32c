use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement, TransactionTrait};

use engine::{
    Engine, EngineError, IncurrenceConfig, ManualClock, NewRecurringTransaction, RecurrenceRule,
};
use migration::MigratorTrait;
use uuid::Uuid;

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + TimeDelta::days(n)
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, h, m, 0).unwrap()
}

async fn engine_at(
    now: DateTime<Utc>,
    config: IncurrenceConfig,
) -> (Engine, DatabaseConnection, Arc<ManualClock>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let engine = Engine::builder()
        .database(db.clone())
        .clock(clock.clone())
        .config(config)
        .build()
        .await
        .unwrap();
    (engine, db, clock)
}

async fn execute(db: &DatabaseConnection, sql: &str) {
    db.execute(Statement::from_string(db.get_database_backend(), sql))
        .await
        .unwrap();
}

async fn ledger_rows(db: &DatabaseConnection) -> i64 {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            "SELECT COUNT(*) AS n FROM transactions",
        ))
        .await
        .unwrap()
        .unwrap();
    row.try_get("", "n").unwrap()
}

async fn daily_from_day0(engine: &Engine, category: &str) -> Uuid {
    engine
        .create_recurring_transaction(
            NewRecurringTransaction::new(-1500, category, day(0), RecurrenceRule::daily())
                .description("monthly plan"),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn interval_rule_catches_up_from_start_date() {
    let end_of_day3 = day(3) + TimeDelta::hours(23) + TimeDelta::minutes(59);
    let (engine, _db, _clock) = engine_at(end_of_day3, IncurrenceConfig::default()).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let incurrence = engine.incur(id).await.unwrap();
    assert_eq!(incurrence.count, 3);
    assert_eq!(incurrence.last_charged, Some(day(3)));
    assert!(!incurrence.more_remaining);

    let ledger = engine.incurred_transactions(id).await.unwrap();
    let dates: Vec<_> = ledger.iter().map(|tx| tx.occurred_at).collect();
    assert_eq!(dates, vec![day(1), day(2), day(3)]);
    for tx in &ledger {
        assert_eq!(tx.amount_minor, -1500);
        assert_eq!(tx.category, "Gym");
        assert_eq!(tx.description.as_deref(), Some("monthly plan"));
        assert_eq!(tx.recurring_transaction_id, Some(id));
        assert!(!tx.verified);
    }

    let record = engine.recurring_transaction(id).await.unwrap();
    assert_eq!(record.last_charged, Some(day(3)));
}

#[tokio::test]
async fn calendar_rule_resumes_from_last_charged() {
    let (engine, db, _clock) = engine_at(at(13, 2), IncurrenceConfig::default()).await;
    let id = engine
        .create_recurring_transaction(NewRecurringTransaction::new(
            -300,
            "Parking",
            at(8, 0),
            RecurrenceRule::calendar("0 * * * *").unwrap(),
        ))
        .await
        .unwrap();
    db.execute(Statement::from_sql_and_values(
        db.get_database_backend(),
        "UPDATE recurring_transactions SET last_charged = ?",
        vec![at(10, 5).into()],
    ))
    .await
    .unwrap();

    let incurrence = engine.incur(id).await.unwrap();
    assert_eq!(incurrence.count, 3);
    assert_eq!(incurrence.last_charged, Some(at(13, 0)));

    let dates: Vec<_> = engine
        .incurred_transactions(id)
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.occurred_at)
        .collect();
    assert_eq!(dates, vec![at(11, 0), at(12, 0), at(13, 0)]);
}

#[tokio::test]
async fn watermark_at_now_is_a_no_op() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let id = daily_from_day0(&engine, "Gym").await;

    assert_eq!(engine.incur(id).await.unwrap().count, 3);
    let before = engine.recurring_transaction(id).await.unwrap();
    assert_eq!(before.last_charged, Some(day(3)));

    let again = engine.incur(id).await.unwrap();
    assert_eq!(again.count, 0);
    assert_eq!(again.last_charged, Some(day(3)));
    assert_eq!(ledger_rows(&db).await, 3);
    assert_eq!(engine.recurring_transaction(id).await.unwrap(), before);
}

#[tokio::test]
async fn watermark_only_moves_forward() {
    let (engine, _db, clock) = engine_at(day(0), IncurrenceConfig::default()).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let mut previous = engine.recurring_transaction(id).await.unwrap().watermark();
    for hours in [5, 30, 0, 49, 12, 100] {
        clock.advance(TimeDelta::hours(hours));
        let incurrence = engine.incur(id).await.unwrap();
        let record = engine.recurring_transaction(id).await.unwrap();
        assert!(record.watermark() >= previous);
        if incurrence.count > 0 {
            let latest = engine
                .incurred_transactions(id)
                .await
                .unwrap()
                .last()
                .map(|tx| tx.occurred_at);
            assert_eq!(record.last_charged, latest);
        }
        previous = record.watermark();
    }

    // 196 hours after day 0: eight full days.
    let ledger = engine.incurred_transactions(id).await.unwrap();
    assert_eq!(ledger.len(), 8);
    let dates: Vec<_> = ledger.iter().map(|tx| tx.occurred_at).collect();
    assert_eq!(dates, (1..=8).map(day).collect::<Vec<_>>());
}

#[tokio::test]
async fn concurrent_incur_materializes_each_occurrence_once() {
    let (engine, db, _clock) = engine_at(day(5), IncurrenceConfig::default()).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..8 {
        let engine = engine.clone();
        tasks.spawn(async move { engine.incur(id).await });
    }

    let mut total = 0;
    while let Some(joined) = tasks.join_next().await {
        total += joined.unwrap().unwrap().count;
    }
    assert_eq!(total, 5);
    assert_eq!(ledger_rows(&db).await, 5);
    assert_eq!(
        engine.recurring_transaction(id).await.unwrap().last_charged,
        Some(day(5))
    );
}

#[tokio::test]
async fn failed_watermark_update_rolls_back_the_ledger() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let id = daily_from_day0(&engine, "Gym").await;
    execute(
        &db,
        "CREATE TRIGGER reject_watermark BEFORE UPDATE OF last_charged ON recurring_transactions \
         BEGIN SELECT RAISE(ABORT, 'watermark update rejected'); END",
    )
    .await;

    let err = engine.incur(id).await.unwrap_err();
    assert!(matches!(err, EngineError::IncurrenceFailed { id: failed, .. } if failed == id));
    assert!(err.is_retryable());
    assert_eq!(ledger_rows(&db).await, 0);
    assert_eq!(
        engine.recurring_transaction(id).await.unwrap().last_charged,
        None
    );

    execute(&db, "DROP TRIGGER reject_watermark").await;
    assert_eq!(engine.incur(id).await.unwrap().count, 3);
    assert_eq!(ledger_rows(&db).await, 3);
}

#[tokio::test]
async fn long_backlog_is_worked_off_across_calls() {
    let config = IncurrenceConfig {
        max_occurrences_per_call: 2,
        ..IncurrenceConfig::default()
    };
    let (engine, _db, _clock) = engine_at(day(5), config).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let first = engine.incur(id).await.unwrap();
    assert_eq!((first.count, first.more_remaining), (2, true));
    assert_eq!(first.last_charged, Some(day(2)));

    let second = engine.incur(id).await.unwrap();
    assert_eq!((second.count, second.more_remaining), (2, true));

    let third = engine.incur(id).await.unwrap();
    assert_eq!((third.count, third.more_remaining), (1, false));
    assert_eq!(third.last_charged, Some(day(5)));

    let dates: Vec<_> = engine
        .incurred_transactions(id)
        .await
        .unwrap()
        .into_iter()
        .map(|tx| tx.occurred_at)
        .collect();
    assert_eq!(dates, (1..=5).map(day).collect::<Vec<_>>());
}

#[tokio::test]
async fn exactly_cap_occurrences_leaves_nothing_remaining() {
    let config = IncurrenceConfig {
        max_occurrences_per_call: 3,
        ..IncurrenceConfig::default()
    };
    let (engine, _db, _clock) = engine_at(day(3), config).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let incurrence = engine.incur(id).await.unwrap();
    assert_eq!((incurrence.count, incurrence.more_remaining), (3, false));
}

#[tokio::test]
async fn unbounded_cap_incurs_the_whole_backlog() {
    let config = IncurrenceConfig {
        max_occurrences_per_call: usize::MAX,
        ..IncurrenceConfig::default()
    };
    let (engine, _db, _clock) = engine_at(day(3), config).await;
    let id = daily_from_day0(&engine, "Gym").await;

    let incurrence = engine.incur(id).await.unwrap();
    assert_eq!((incurrence.count, incurrence.more_remaining), (3, false));
    assert_eq!(incurrence.last_charged, Some(day(3)));
}

#[tokio::test]
async fn interval_beyond_the_calendar_is_never_due() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let id = engine
        .create_recurring_transaction(NewRecurringTransaction::new(
            -1,
            "Someday",
            day(0),
            RecurrenceRule::interval_ms(i64::MAX).unwrap(),
        ))
        .await
        .unwrap();

    let incurrence = engine.incur(id).await.unwrap();
    assert_eq!((incurrence.count, incurrence.last_charged), (0, None));
    assert_eq!(engine.next_due(id).await.unwrap(), None);

    let report = engine.incur_all().await.unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.succeeded.len(), 1);
    assert_eq!(ledger_rows(&db).await, 0);
}

#[tokio::test]
async fn unknown_record_is_not_found() {
    let (engine, _db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let err = engine.incur(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn batch_isolates_a_failing_record() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let rent = daily_from_day0(&engine, "Rent").await;
    let broken = daily_from_day0(&engine, "Broken").await;
    let salary = engine
        .create_recurring_transaction(NewRecurringTransaction::new(
            250_000,
            "Salary",
            day(1),
            RecurrenceRule::daily(),
        ))
        .await
        .unwrap();
    execute(
        &db,
        "CREATE TRIGGER reject_broken BEFORE INSERT ON transactions \
         WHEN NEW.category = 'Broken' \
         BEGIN SELECT RAISE(ABORT, 'ledger insert rejected'); END",
    )
    .await;

    let report = engine.incur_all().await.unwrap();
    assert_eq!(report.total, 5);
    assert_eq!(report.processed(), 3);
    assert!(report.has_failures());

    let counts: Vec<_> = report
        .succeeded
        .iter()
        .map(|incurrence| (incurrence.id, incurrence.count))
        .collect();
    assert!(counts.contains(&(rent, 3)));
    assert!(counts.contains(&(salary, 2)));

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].id, broken);
    assert!(report.failed[0].retryable);
    assert!(engine.incurred_transactions(broken).await.unwrap().is_empty());
    assert_eq!(
        engine.recurring_transaction(broken).await.unwrap().last_charged,
        None
    );

    match report.into_result() {
        Err(EngineError::PartialFailure { total, failures }) => {
            assert_eq!(total, 5);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, broken);
        }
        other => panic!("expected a partial failure, got {other:?}"),
    }
}

#[tokio::test]
async fn batch_is_idempotent() {
    let (engine, db, clock) = engine_at(day(2), IncurrenceConfig::default()).await;
    daily_from_day0(&engine, "Rent").await;
    daily_from_day0(&engine, "Gym").await;

    let first = engine.incur_all().await.unwrap();
    assert_eq!(first.total, 4);
    let second = engine.incur_all().await.unwrap();
    assert_eq!(second.total, 0);
    assert_eq!(second.into_result(), Ok(0));
    assert_eq!(ledger_rows(&db).await, 4);

    clock.set(day(3));
    assert_eq!(engine.incur_all().await.unwrap().total, 2);
}

#[tokio::test]
async fn incur_within_rolls_back_only_its_savepoint() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let gym = daily_from_day0(&engine, "Gym").await;
    let broken = daily_from_day0(&engine, "Broken").await;
    execute(
        &db,
        "CREATE TRIGGER reject_broken BEFORE INSERT ON transactions \
         WHEN NEW.category = 'Broken' \
         BEGIN SELECT RAISE(ABORT, 'ledger insert rejected'); END",
    )
    .await;

    let outer = db.begin().await.unwrap();
    assert!(engine.incur_within(&outer, broken).await.is_err());
    assert_eq!(engine.incur_within(&outer, gym).await.unwrap().count, 3);
    outer.commit().await.unwrap();

    assert_eq!(engine.incurred_transactions(gym).await.unwrap().len(), 3);
    assert!(engine.incurred_transactions(broken).await.unwrap().is_empty());
    assert_eq!(ledger_rows(&db).await, 3);
}

#[tokio::test]
async fn outer_rollback_discards_inner_incurrence() {
    let (engine, db, _clock) = engine_at(day(3), IncurrenceConfig::default()).await;
    let gym = daily_from_day0(&engine, "Gym").await;

    let outer = db.begin().await.unwrap();
    assert_eq!(engine.incur_within(&outer, gym).await.unwrap().count, 3);
    outer.rollback().await.unwrap();

    assert_eq!(ledger_rows(&db).await, 0);
    assert_eq!(
        engine.recurring_transaction(gym).await.unwrap().last_charged,
        None
    );
    assert_eq!(engine.incur(gym).await.unwrap().count, 3);
}

async fn index_names(db: &DatabaseConnection) -> Vec<String> {
    db.query_all(Statement::from_string(
        db.get_database_backend(),
        "SELECT name FROM sqlite_master WHERE type = 'index' AND name LIKE 'idx-%' ORDER BY name",
    ))
    .await
    .unwrap()
    .iter()
    .map(|row| row.try_get("", "name").unwrap())
    .collect()
}

#[tokio::test]
async fn schema_indexes_ledger_lookups() {
    let (_engine, db, _clock) = engine_at(day(0), IncurrenceConfig::default()).await;
    assert_eq!(
        index_names(&db).await,
        vec![
            "idx-recurring_transactions-category",
            "idx-recurring_transactions-last_charged",
            "idx-recurring_transactions-start_date",
            "idx-transactions-category",
            "idx-transactions-occurred_at",
            "idx-transactions-recurring_transaction_id",
            "idx-transactions-verified",
        ]
    );

    migration::Migrator::down(&db, None).await.unwrap();
    assert!(index_names(&db).await.is_empty());
    migration::Migrator::up(&db, None).await.unwrap();
    assert_eq!(index_names(&db).await.len(), 7);
}
