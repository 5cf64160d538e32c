//! Command structs for recurring-transaction writes.
//!
//! These types group parameters for create/update operations, keeping call
//! sites readable and avoiding long argument lists.

use chrono::{DateTime, Utc};

use crate::RecurrenceRule;

/// Create a recurring transaction.
#[derive(Clone, Debug)]
pub struct NewRecurringTransaction {
    pub amount_minor: i64,
    pub category: String,
    pub description: Option<String>,
    pub start_date: DateTime<Utc>,
    pub rule: RecurrenceRule,
}

impl NewRecurringTransaction {
    #[must_use]
    pub fn new(
        amount_minor: i64,
        category: impl Into<String>,
        start_date: DateTime<Utc>,
        rule: RecurrenceRule,
    ) -> Self {
        Self {
            amount_minor,
            category: category.into(),
            description: None,
            start_date,
            rule,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Edit a recurring transaction. Unset fields are left as they are; the
/// watermark is never touched by an edit.
#[derive(Clone, Debug, Default)]
pub struct RecurringTransactionUpdate {
    pub amount_minor: Option<i64>,
    pub category: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub start_date: Option<DateTime<Utc>>,
    pub rule: Option<RecurrenceRule>,
}

impl RecurringTransactionUpdate {
    #[must_use]
    pub fn amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_minor = Some(amount_minor);
        self
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: Option<String>) -> Self {
        self.description = Some(description);
        self
    }

    #[must_use]
    pub fn start_date(mut self, start_date: DateTime<Utc>) -> Self {
        self.start_date = Some(start_date);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: RecurrenceRule) -> Self {
        self.rule = Some(rule);
        self
    }
}
