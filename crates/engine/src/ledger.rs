//! Ledger rows materialized from recurring transactions.
//!
//! The ledger is append-only from the engine's point of view. The link back
//! to the recurring transaction is informational: there is no foreign key,
//! so deleting the template leaves its history untouched.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::RecurringTransaction;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerTransaction {
    pub id: Uuid,
    pub amount_minor: i64,
    pub category: String,
    pub description: Option<String>,
    pub occurred_at: DateTime<Utc>,
    pub recurring_transaction_id: Option<Uuid>,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerTransaction {
    /// The ledger row for one occurrence of `template`.
    pub fn occurrence_of(
        template: &RecurringTransaction,
        occurred_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            amount_minor: template.amount_minor,
            category: template.category.clone(),
            description: template.description.clone(),
            occurred_at,
            recurring_transaction_id: Some(template.id),
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub amount_minor: i64,
    pub category: String,
    pub description: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub recurring_transaction_id: Option<Uuid>,
    pub verified: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&LedgerTransaction> for ActiveModel {
    fn from(tx: &LedgerTransaction) -> Self {
        Self {
            id: ActiveValue::Set(tx.id),
            amount_minor: ActiveValue::Set(tx.amount_minor),
            category: ActiveValue::Set(tx.category.clone()),
            description: ActiveValue::Set(tx.description.clone()),
            occurred_at: ActiveValue::Set(tx.occurred_at),
            recurring_transaction_id: ActiveValue::Set(tx.recurring_transaction_id),
            verified: ActiveValue::Set(tx.verified),
            created_at: ActiveValue::Set(tx.created_at),
            updated_at: ActiveValue::Set(tx.updated_at),
        }
    }
}

impl From<Model> for LedgerTransaction {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            amount_minor: model.amount_minor,
            category: model.category,
            description: model.description,
            occurred_at: model.occurred_at,
            recurring_transaction_id: model.recurring_transaction_id,
            verified: model.verified,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
