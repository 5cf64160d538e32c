//! Recurring transactions: templates that materialize ledger rows on a
//! schedule.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use uuid::Uuid;

use crate::{EngineError, RecurrenceRule};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecurringTransaction {
    pub id: Uuid,
    /// Signed amount in minor units, copied to every occurrence.
    pub amount_minor: i64,
    pub category: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    /// Latest materialized occurrence, `None` before the first one.
    pub last_charged: Option<DateTime<Utc>>,
    pub rule: RecurrenceRule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurringTransaction {
    /// Instant after which occurrences are still due.
    pub fn watermark(&self) -> DateTime<Utc> {
        self.last_charged.unwrap_or(self.start_date)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub amount_minor: i64,
    pub category: String,
    pub description: Option<String>,
    pub start_date: DateTimeUtc,
    pub last_charged: Option<DateTimeUtc>,
    pub recurrence_kind: String,
    pub recurrence_value: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&RecurringTransaction> for ActiveModel {
    fn from(rt: &RecurringTransaction) -> Self {
        Self {
            id: ActiveValue::Set(rt.id),
            amount_minor: ActiveValue::Set(rt.amount_minor),
            category: ActiveValue::Set(rt.category.clone()),
            description: ActiveValue::Set(rt.description.clone()),
            start_date: ActiveValue::Set(rt.start_date),
            last_charged: ActiveValue::Set(rt.last_charged),
            recurrence_kind: ActiveValue::Set(rt.rule.kind().to_string()),
            recurrence_value: ActiveValue::Set(rt.rule.value()),
            created_at: ActiveValue::Set(rt.created_at),
            updated_at: ActiveValue::Set(rt.updated_at),
        }
    }
}

impl TryFrom<Model> for RecurringTransaction {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let rule = RecurrenceRule::parse(&model.recurrence_kind, &model.recurrence_value)?;
        Ok(Self {
            id: model.id,
            amount_minor: model.amount_minor,
            category: model.category,
            description: model.description,
            start_date: model.start_date,
            last_charged: model.last_charged,
            rule,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
