use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseTransaction, TransactionTrait, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    BatchReport, EngineError, Incurrence, LedgerTransaction, RecordFailure, ResultEngine,
    occurrences::expand, recurring_transactions,
};

use super::{Engine, ledger::batch_create_ledger_entries, recurring::load_recurring, with_tx};

/// Compare-and-set the watermark: the update only lands if nobody moved it
/// since `previous` was read.
async fn advance_watermark(
    db_tx: &DatabaseTransaction,
    id: Uuid,
    previous: Option<DateTime<Utc>>,
    latest: DateTime<Utc>,
) -> Result<(), DbErr> {
    use recurring_transactions::Column;

    let update = recurring_transactions::Entity::update_many()
        .col_expr(Column::LastCharged, Expr::value(latest))
        .filter(Column::Id.eq(id));
    let update = match previous {
        Some(previous) => update.filter(Column::LastCharged.eq(previous)),
        None => update.filter(Column::LastCharged.is_null()),
    };

    if update.exec(db_tx).await?.rows_affected == 0 {
        return Err(DbErr::RecordNotUpdated);
    }
    Ok(())
}

impl Engine {
    /// Materialize every occurrence of `id` due up to now and advance its
    /// watermark, all in one transaction.
    ///
    /// Calling it again without time passing is a no-op. Concurrent calls for
    /// the same record are serialized, and the second one sees the advanced
    /// watermark.
    pub async fn incur(&self, id: Uuid) -> ResultEngine<Incurrence> {
        self.incur_on(&self.database, id).await
    }

    /// Like [`Engine::incur`], but inside a savepoint of a caller-owned
    /// transaction. A failure rolls back the savepoint only; committing the
    /// outer transaction is up to the caller.
    pub async fn incur_within(
        &self,
        db_tx: &DatabaseTransaction,
        id: Uuid,
    ) -> ResultEngine<Incurrence> {
        self.incur_on(db_tx, id).await
    }

    async fn incur_on<C>(&self, conn: &C, id: Uuid) -> ResultEngine<Incurrence>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let _guard = self.locks.acquire(id).await;
        // Read once: every occurrence of this call is bounded by the same now.
        let now = self.clock.now();

        let incurrence = match self.incur_scope(conn, id, now).await {
            Ok(incurrence) => incurrence,
            Err(EngineError::Database(source)) => {
                return Err(EngineError::IncurrenceFailed { id, source });
            }
            Err(err @ EngineError::NotFound(_)) => {
                self.locks.forget(id);
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        if incurrence.count > 0 {
            tracing::info!(
                %id,
                count = incurrence.count,
                more_remaining = incurrence.more_remaining,
                "incurred recurring transaction"
            );
        }
        Ok(incurrence)
    }

    async fn incur_scope<C>(
        &self,
        conn: &C,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> ResultEngine<Incurrence>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let cap = self.config.max_occurrences_per_call;

        with_tx!(conn, |db_tx| {
            let record = load_recurring(&db_tx, id).await?;

            let mut due = expand(&record.rule, record.watermark(), now)
                .take(cap.saturating_add(1))
                .collect::<ResultEngine<Vec<_>>>()?;
            let more_remaining = due.len() > cap;
            due.truncate(cap);

            let Some(&latest) = due.last() else {
                tracing::debug!(%id, watermark = %record.watermark(), "nothing due");
                return Ok(Incurrence {
                    id,
                    count: 0,
                    last_charged: record.last_charged,
                    more_remaining: false,
                });
            };

            let rows: Vec<LedgerTransaction> = due
                .iter()
                .map(|occurred_at| LedgerTransaction::occurrence_of(&record, *occurred_at, now))
                .collect();
            batch_create_ledger_entries(&db_tx, &rows).await?;
            advance_watermark(&db_tx, id, record.last_charged, latest).await?;

            Ok(Incurrence {
                id,
                count: rows.len() as u64,
                last_charged: Some(latest),
                more_remaining,
            })
        })
    }

    /// Incur every recurring transaction.
    ///
    /// Records are independent: each runs in its own transaction under the
    /// configured timeout, and a failing or stalled record is reported in the
    /// [`BatchReport`] without stopping the others. Only listing the records
    /// can fail the whole call.
    pub async fn incur_all(&self) -> ResultEngine<BatchReport> {
        let ids = self.recurring_ids().await?;
        let timeout = self.config.timeout();
        tracing::info!(records = ids.len(), "incurring due recurring transactions");

        let mut report = BatchReport::default();
        for id in ids {
            match tokio::time::timeout(timeout, self.incur(id)).await {
                Ok(Ok(incurrence)) => {
                    report.total += incurrence.count;
                    report.succeeded.push(incurrence);
                }
                Ok(Err(EngineError::NotFound(_))) => {
                    tracing::warn!(%id, "recurring transaction vanished, skipping");
                    report.skipped.push(id);
                }
                Ok(Err(err)) => {
                    tracing::error!(%id, "failed to incur recurring transaction: {err}");
                    report.failed.push(RecordFailure::new(id, &err));
                }
                Err(_) => {
                    let err = EngineError::Timeout(id);
                    tracing::error!(%id, ?timeout, "{err}");
                    report.failed.push(RecordFailure::new(id, &err));
                }
            }
        }

        tracing::info!(
            total = report.total,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "processed {} of {} recurring transactions successfully",
            report.succeeded.len(),
            report.processed(),
        );
        Ok(report)
    }
}
