//! Recurrence rules and the schedule evaluator.
//!
//! A [`RecurrenceRule`] is either a fixed [`Interval`] or a [`Calendar`]
//! (cron) expression. [`RecurrenceRule::next`] is pure: it only looks at the
//! rule and the reference instant.
//!
//!  [`Interval`]: RecurrenceRule::Interval
//!  [`Calendar`]: RecurrenceRule::Calendar

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{EngineError, ResultEngine, cron::CronExpr};

const KIND_INTERVAL: &str = "interval";
const KIND_CALENDAR: &str = "calendar";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecurrenceRule {
    /// Fixed duration between occurrences, no calendar semantics.
    Interval(TimeDelta),
    /// Calendar instants matching a cron expression.
    Calendar(CronExpr),
}

impl RecurrenceRule {
    /// Interval rule from milliseconds; the interval must be positive.
    pub fn interval_ms(millis: i64) -> ResultEngine<Self> {
        if millis <= 0 {
            return Err(EngineError::InvalidRule(format!(
                "interval must be > 0 ms, got {millis}"
            )));
        }
        Ok(Self::Interval(TimeDelta::milliseconds(millis)))
    }

    pub fn calendar(expression: &str) -> ResultEngine<Self> {
        Ok(Self::Calendar(CronExpr::parse(expression)?))
    }

    pub fn hourly() -> Self {
        Self::Interval(TimeDelta::hours(1))
    }

    pub fn daily() -> Self {
        Self::Interval(TimeDelta::days(1))
    }

    pub fn weekly() -> Self {
        Self::Interval(TimeDelta::weeks(1))
    }

    /// Rebuild a rule from its persisted `(kind, value)` pair.
    pub fn parse(kind: &str, value: &str) -> ResultEngine<Self> {
        match kind {
            KIND_INTERVAL => {
                let millis = value.trim().parse::<i64>().map_err(|_| {
                    EngineError::InvalidRule(format!("invalid interval '{value}'"))
                })?;
                Self::interval_ms(millis)
            }
            KIND_CALENDAR => Self::calendar(value),
            other => Err(EngineError::InvalidRule(format!(
                "unknown recurrence kind '{other}'"
            ))),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Interval(_) => KIND_INTERVAL,
            Self::Calendar(_) => KIND_CALENDAR,
        }
    }

    /// Persisted form of the rule payload.
    pub fn value(&self) -> String {
        match self {
            Self::Interval(interval) => interval.num_milliseconds().to_string(),
            Self::Calendar(expr) => expr.as_str().to_string(),
        }
    }

    /// Check the write-time invariants. Variants built by hand can bypass the
    /// constructors, so stores call this before persisting.
    pub fn validate(&self) -> ResultEngine<()> {
        match self {
            Self::Interval(interval) if *interval <= TimeDelta::zero() => {
                Err(EngineError::InvalidRule(format!(
                    "interval must be > 0 ms, got {}",
                    interval.num_milliseconds()
                )))
            }
            Self::Interval(_) | Self::Calendar(_) => Ok(()),
        }
    }

    /// The next occurrence strictly after `after`.
    pub fn next(&self, after: DateTime<Utc>) -> ResultEngine<DateTime<Utc>> {
        match self {
            Self::Interval(interval) => {
                self.validate()?;
                after.checked_add_signed(*interval).ok_or_else(|| {
                    EngineError::InvalidRule("interval overflows the calendar".to_string())
                })
            }
            Self::Calendar(expr) => expr.next_after(after).ok_or_else(|| {
                EngineError::InvalidRule(format!("'{expr}' has no upcoming occurrence"))
            }),
        }
    }
}

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(interval) => write!(f, "every {} ms", interval.num_milliseconds()),
            Self::Calendar(expr) => write!(f, "cron '{expr}'"),
        }
    }
}
