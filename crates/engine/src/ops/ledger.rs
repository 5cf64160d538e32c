use sea_orm::{DatabaseTransaction, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{LedgerTransaction, ResultEngine, ledger};

use super::{Engine, with_tx};

/// Rows per `INSERT` statement; keeps bound parameters well below SQLite's
/// limit.
const INSERT_CHUNK: usize = 300;

/// Insert `rows` as one unit inside a savepoint of `db_tx`.
pub(super) async fn batch_create_ledger_entries(
    db_tx: &DatabaseTransaction,
    rows: &[LedgerTransaction],
) -> ResultEngine<()> {
    if rows.is_empty() {
        return Ok(());
    }
    with_tx!(db_tx, |savepoint| {
        for chunk in rows.chunks(INSERT_CHUNK) {
            ledger::Entity::insert_many(chunk.iter().map(ledger::ActiveModel::from))
                .exec(&savepoint)
                .await?;
        }
        tracing::debug!(rows = rows.len(), "inserted ledger rows");
        Ok(())
    })
}

impl Engine {
    /// Ledger rows materialized from a recurring transaction, oldest first.
    /// Still answers after the recurring transaction was deleted.
    pub async fn incurred_transactions(
        &self,
        recurring_id: Uuid,
    ) -> ResultEngine<Vec<LedgerTransaction>> {
        Ok(ledger::Entity::find()
            .filter(ledger::Column::RecurringTransactionId.eq(recurring_id))
            .order_by_asc(ledger::Column::OccurredAt)
            .all(&self.database)
            .await?
            .into_iter()
            .map(LedgerTransaction::from)
            .collect())
    }
}
