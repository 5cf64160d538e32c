use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, ConnectionTrait, QueryOrder, QuerySelect, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, NewRecurringTransaction, RecurringTransaction, RecurringTransactionUpdate,
    ResultEngine, occurrences::expand, recurring_transactions,
    util::{normalize_category, normalize_optional_text},
};

use super::{Engine, with_tx};

/// Load a recurring transaction, mapping absence to `NotFound`.
pub(super) async fn load_recurring<C: ConnectionTrait>(
    conn: &C,
    id: Uuid,
) -> ResultEngine<RecurringTransaction> {
    let model = recurring_transactions::Entity::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("recurring transaction {id}")))?;
    RecurringTransaction::try_from(model)
}

impl Engine {
    /// Create a recurring transaction. The rule and template are validated
    /// here so incurrence never meets an invalid record.
    pub async fn create_recurring_transaction(
        &self,
        cmd: NewRecurringTransaction,
    ) -> ResultEngine<Uuid> {
        cmd.rule.validate()?;
        let category = normalize_category(&cmd.category)?;
        let now = self.clock.now();

        let record = RecurringTransaction {
            id: Uuid::new_v4(),
            amount_minor: cmd.amount_minor,
            category,
            description: normalize_optional_text(cmd.description.as_deref()),
            start_date: cmd.start_date,
            last_charged: None,
            rule: cmd.rule,
            created_at: now,
            updated_at: now,
        };
        recurring_transactions::ActiveModel::from(&record)
            .insert(&self.database)
            .await?;

        tracing::info!(id = %record.id, rule = %record.rule, "created recurring transaction");
        Ok(record.id)
    }

    pub async fn recurring_transaction(&self, id: Uuid) -> ResultEngine<RecurringTransaction> {
        load_recurring(&self.database, id).await
    }

    /// Every recurring transaction, oldest start date first.
    pub async fn recurring_transactions(&self) -> ResultEngine<Vec<RecurringTransaction>> {
        recurring_transactions::Entity::find()
            .order_by_asc(recurring_transactions::Column::StartDate)
            .all(&self.database)
            .await?
            .into_iter()
            .map(RecurringTransaction::try_from)
            .collect()
    }

    pub(super) async fn recurring_ids(&self) -> ResultEngine<Vec<Uuid>> {
        Ok(recurring_transactions::Entity::find()
            .select_only()
            .column(recurring_transactions::Column::Id)
            .order_by_asc(recurring_transactions::Column::CreatedAt)
            .into_tuple::<Uuid>()
            .all(&self.database)
            .await?)
    }

    /// Edit the template or rule of a recurring transaction.
    ///
    /// Waits for any in-flight incurrence of the same record. The watermark
    /// is left alone: changing the rule only affects occurrences after it.
    pub async fn update_recurring_transaction(
        &self,
        id: Uuid,
        update: RecurringTransactionUpdate,
    ) -> ResultEngine<RecurringTransaction> {
        let _guard = self.locks.acquire(id).await;
        let now = self.clock.now();

        let updated = with_tx!(&self.database, |db_tx| {
            let mut record = load_recurring(&db_tx, id).await?;

            if let Some(amount_minor) = update.amount_minor {
                record.amount_minor = amount_minor;
            }
            if let Some(category) = update.category.as_deref() {
                record.category = normalize_category(category)?;
            }
            if let Some(description) = update.description.as_ref() {
                record.description = normalize_optional_text(description.as_deref());
            }
            if let Some(start_date) = update.start_date {
                record.start_date = start_date;
            }
            if let Some(rule) = update.rule.clone() {
                rule.validate()?;
                record.rule = rule;
            }
            record.updated_at = now;

            let model = recurring_transactions::ActiveModel {
                id: ActiveValue::Unchanged(record.id),
                amount_minor: ActiveValue::Set(record.amount_minor),
                category: ActiveValue::Set(record.category.clone()),
                description: ActiveValue::Set(record.description.clone()),
                start_date: ActiveValue::Set(record.start_date),
                recurrence_kind: ActiveValue::Set(record.rule.kind().to_string()),
                recurrence_value: ActiveValue::Set(record.rule.value()),
                updated_at: ActiveValue::Set(record.updated_at),
                ..Default::default()
            };
            model.update(&db_tx).await?;
            Ok(record)
        });
        if let Err(EngineError::NotFound(_)) = updated {
            self.locks.forget(id);
        }
        updated
    }

    /// Delete a recurring transaction. Ledger rows it already materialized
    /// are kept.
    pub async fn delete_recurring_transaction(&self, id: Uuid) -> ResultEngine<()> {
        let _guard = self.locks.acquire(id).await;
        let result = recurring_transactions::Entity::delete_by_id(id)
            .exec(&self.database)
            .await?;
        self.locks.forget(id);
        if result.rows_affected == 0 {
            return Err(EngineError::NotFound(format!("recurring transaction {id}")));
        }
        tracing::info!(%id, "deleted recurring transaction");
        Ok(())
    }

    /// The next occurrence after the current watermark, due or not. `None`
    /// when the rule has no occurrence left before the end of the calendar.
    pub async fn next_due(&self, id: Uuid) -> ResultEngine<Option<DateTime<Utc>>> {
        let record = load_recurring(&self.database, id).await?;
        expand(&record.rule, record.watermark(), DateTime::<Utc>::MAX_UTC)
            .next()
            .transpose()
    }
}
