use chrono::{DateTime, Utc};
use engine::{Engine, EngineError, NewRecurringTransaction, RecurrenceRule};
use migration::{Migrator, MigratorTrait};
use settings::{Command, Database};

use crate::error::{AppError, Result};

mod error;
mod settings;

#[tokio::main]
async fn main() -> Result<()> {
    let (settings, command) = settings::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgerd={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = connect(&settings.database).await?;
    let engine = Engine::builder()
        .database(db)
        .config(settings.incurrence)
        .build()
        .await?;

    match command.unwrap_or(Command::Run) {
        Command::Run => run(&engine).await,
        Command::Incur { id } => {
            let incurrence = engine.incur(id).await?;
            tracing::info!(
                %id,
                count = incurrence.count,
                more_remaining = incurrence.more_remaining,
                "incurred recurring transaction"
            );
            Ok(())
        }
        Command::List => list(&engine).await,
        Command::Add {
            amount,
            category,
            start,
            kind,
            rule,
            description,
        } => {
            let start_date = DateTime::parse_from_rfc3339(&start)
                .map_err(|err| AppError::Argument(format!("start date {start:?}: {err}")))?
                .with_timezone(&Utc);
            let mut cmd = NewRecurringTransaction::new(
                amount,
                category,
                start_date,
                RecurrenceRule::parse(&kind, &rule)?,
            );
            if let Some(description) = description {
                cmd = cmd.description(description);
            }
            let id = engine.create_recurring_transaction(cmd).await?;
            println!("{id}");
            Ok(())
        }
    }
}

async fn connect(config: &Database) -> Result<sea_orm::DatabaseConnection> {
    let database = sea_orm::Database::connect(config.url()).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}

/// A batch with failed records is reported, not fatal: the next run retries.
async fn run(engine: &Engine) -> Result<()> {
    let report = engine.incur_all().await?;
    for id in report.more_remaining() {
        tracing::warn!(%id, "backlog left after this run");
    }
    match report.into_result() {
        Ok(total) => tracing::info!("materialized {total} ledger transactions"),
        Err(EngineError::PartialFailure { total, failures }) => {
            for failure in &failures {
                tracing::error!(
                    id = %failure.id,
                    retryable = failure.retryable,
                    "{}",
                    failure.reason
                );
            }
            tracing::warn!(
                "materialized {total} ledger transactions, {} records failed",
                failures.len()
            );
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

async fn list(engine: &Engine) -> Result<()> {
    for record in engine.recurring_transactions().await? {
        let next = match engine.next_due(record.id).await? {
            Some(next) => next.to_rfc3339(),
            None => "never".to_string(),
        };
        println!(
            "{}\t{}\t{}\t{}\tnext {}",
            record.id, record.amount_minor, record.category, record.rule, next
        );
    }
    Ok(())
}
