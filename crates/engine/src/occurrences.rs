//! Occurrence expansion.
//!
//! [`expand`] walks a rule from a watermark up to a bound and yields every
//! occurrence in `(watermark, bound]`, in increasing order. The iterator is
//! lazy and cheap to clone, so a clone restarts from where the original was.

use chrono::{DateTime, Utc};

use crate::{EngineError, RecurrenceRule, ResultEngine};

#[derive(Clone, Debug)]
pub struct Occurrences<'a> {
    rule: &'a RecurrenceRule,
    cursor: DateTime<Utc>,
    bound: DateTime<Utc>,
    done: bool,
}

/// Occurrences of `rule` strictly after `watermark` and at or before `bound`.
pub fn expand(
    rule: &RecurrenceRule,
    watermark: DateTime<Utc>,
    bound: DateTime<Utc>,
) -> Occurrences<'_> {
    Occurrences {
        rule,
        cursor: watermark,
        bound,
        done: watermark >= bound || rule.validate().is_err(),
    }
}

impl Iterator for Occurrences<'_> {
    type Item = ResultEngine<DateTime<Utc>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        // The rule was validated up front, so a failed step only means the
        // next occurrence lies past the representable calendar, hence past
        // any bound.
        let Ok(next) = self.rule.next(self.cursor) else {
            self.done = true;
            return None;
        };

        if next <= self.cursor {
            self.done = true;
            return Some(Err(EngineError::InvalidRule(format!(
                "{} did not advance past {}",
                self.rule, self.cursor
            ))));
        }
        if next > self.bound {
            self.done = true;
            return None;
        }

        self.cursor = next;
        Some(Ok(next))
    }
}
