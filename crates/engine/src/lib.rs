//! Recurring transactions and their incurrence into the ledger.
//!
//! A [`RecurringTransaction`] is a template plus a [`RecurrenceRule`]. The
//! [`Engine`] turns every occurrence that fell due since the template's
//! watermark into a [`LedgerTransaction`] and moves the watermark forward,
//! atomically and exactly once per occurrence.
//!
//! The pure parts are usable on their own: [`RecurrenceRule::next`] evaluates
//! one step of a schedule and [`expand`] lists the occurrences in a window.

pub use clock::{Clock, ManualClock, SystemClock};
pub use commands::{NewRecurringTransaction, RecurringTransactionUpdate};
pub use config::IncurrenceConfig;
pub use cron::CronExpr;
pub use error::EngineError;
pub use incurrence::{BatchReport, Incurrence, RecordFailure};
pub use ledger::LedgerTransaction;
pub use occurrences::{Occurrences, expand};
pub use ops::{Engine, EngineBuilder};
pub use recurring_transactions::RecurringTransaction;
pub use schedule::RecurrenceRule;

mod clock;
mod commands;
mod config;
mod cron;
mod error;
mod incurrence;
mod ledger;
mod occurrences;
mod ops;
mod recurring_transactions;
mod schedule;
mod util;

type ResultEngine<T> = Result<T, EngineError>;
