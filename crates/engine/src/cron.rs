//! Five-field cron expressions.
//!
//! `minute hour day-of-month month day-of-week`, evaluated in UTC. Each field
//! accepts `*`, single values, ranges (`a-b`), steps (`*/n`, `a-b/n`, `a/n`)
//! and comma separated lists. Months and weekdays also accept three letter
//! names; weekday `7` is Sunday. The usual `@hourly`, `@daily`, `@weekly`,
//! `@monthly` and `@yearly` shortcuts expand to their five-field form.
//!
//! When both day fields are restricted a day matches if *either* matches,
//! otherwise both have to match (a field starting with `*` is unrestricted).

use std::{fmt, str::FromStr};

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};

use crate::{EngineError, ResultEngine};

/// How far ahead `next_after` looks before giving up. Long enough to reach a
/// Feb 29 that also has to fall on a given weekday.
const SEARCH_YEARS: i32 = 28;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
/// Longest length of each month.
const MONTH_LENGTHS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

#[derive(Clone, Copy, Debug)]
enum FieldKind {
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
}

impl FieldKind {
    fn label(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::DayOfMonth => "day-of-month",
            Self::Month => "month",
            Self::DayOfWeek => "day-of-week",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            Self::Minute => (0, 59),
            Self::Hour => (0, 23),
            Self::DayOfMonth => (1, 31),
            Self::Month => (1, 12),
            // 7 is accepted as an alias of Sunday.
            Self::DayOfWeek => (0, 7),
        }
    }

    fn names(self) -> &'static [&'static str] {
        match self {
            Self::Month => &MONTH_NAMES,
            Self::DayOfWeek => &WEEKDAY_NAMES,
            _ => &[],
        }
    }

    /// Offset of the first name: months are 1-based, weekdays 0-based.
    fn name_base(self) -> u32 {
        match self {
            Self::Month => 1,
            _ => 0,
        }
    }
}

/// Set of allowed values for one field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CronField {
    bits: u64,
    restricted: bool,
}

impl CronField {
    fn contains(self, value: u32) -> bool {
        value < 64 && self.bits & (1 << value) != 0
    }

    fn parse(raw: &str, kind: FieldKind) -> ResultEngine<Self> {
        let (min, max) = kind.bounds();
        let mut bits = 0u64;

        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => (range, Some(parse_step(step, kind)?)),
                None => (part, None),
            };

            let (start, end) = if range == "*" {
                (min, max)
            } else if let Some((a, b)) = range.split_once('-') {
                (parse_value(a, kind)?, parse_value(b, kind)?)
            } else {
                let value = parse_value(range, kind)?;
                // `a/n` means "from a to the end of the range, every n".
                if step.is_some() {
                    (value, max)
                } else {
                    (value, value)
                }
            };

            if start > end {
                return Err(invalid(kind, format!("range {start}-{end} is reversed")));
            }

            let step = step.unwrap_or(1) as usize;
            for value in (start..=end).step_by(step) {
                let value = match kind {
                    FieldKind::DayOfWeek if value == 7 => 0,
                    _ => value,
                };
                bits |= 1 << value;
            }
        }

        Ok(Self {
            bits,
            restricted: !raw.starts_with('*'),
        })
    }
}

fn invalid(kind: FieldKind, reason: String) -> EngineError {
    EngineError::InvalidRule(format!("{} field: {reason}", kind.label()))
}

fn parse_step(raw: &str, kind: FieldKind) -> ResultEngine<u32> {
    match raw.parse::<u32>() {
        Ok(step) if step > 0 => Ok(step),
        _ => Err(invalid(kind, format!("invalid step '{raw}'"))),
    }
}

fn parse_value(raw: &str, kind: FieldKind) -> ResultEngine<u32> {
    let (min, max) = kind.bounds();
    let value = match raw.parse::<u32>() {
        Ok(value) => value,
        Err(_) => {
            let lower = raw.to_ascii_lowercase();
            let index = kind
                .names()
                .iter()
                .position(|name| *name == lower)
                .ok_or_else(|| invalid(kind, format!("invalid value '{raw}'")))?;
            index as u32 + kind.name_base()
        }
    };
    if value < min || value > max {
        return Err(invalid(
            kind,
            format!("value {value} out of range {min}-{max}"),
        ));
    }
    Ok(value)
}

/// A parsed cron expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: CronField,
    hours: CronField,
    days_of_month: CronField,
    months: CronField,
    days_of_week: CronField,
}

impl CronExpr {
    /// Parse an expression, see the module docs for the accepted syntax.
    pub fn parse(expression: &str) -> ResultEngine<Self> {
        let source = expression.trim();
        let expanded = match source {
            "@yearly" | "@annually" => "0 0 1 1 *",
            "@monthly" => "0 0 1 * *",
            "@weekly" => "0 0 * * 0",
            "@daily" | "@midnight" => "0 0 * * *",
            "@hourly" => "0 * * * *",
            other => other,
        };

        let fields: Vec<&str> = expanded.split_whitespace().collect();
        let [minute, hour, dom, month, dow] = fields.as_slice() else {
            return Err(EngineError::InvalidRule(format!(
                "expected 5 fields, got {} in '{source}'",
                fields.len()
            )));
        };

        let expr = Self {
            source: source.to_string(),
            minutes: CronField::parse(minute, FieldKind::Minute)?,
            hours: CronField::parse(hour, FieldKind::Hour)?,
            days_of_month: CronField::parse(dom, FieldKind::DayOfMonth)?,
            months: CronField::parse(month, FieldKind::Month)?,
            days_of_week: CronField::parse(dow, FieldKind::DayOfWeek)?,
        };
        if !expr.day_is_reachable() {
            return Err(EngineError::InvalidRule(format!(
                "no selected month has the day of month in '{source}'"
            )));
        }
        Ok(expr)
    }

    /// An explicit day of month must fit at least one selected month (Feb
    /// counts 29 days). A restricted weekday always matches some day.
    fn day_is_reachable(&self) -> bool {
        if !self.days_of_month.restricted || self.days_of_week.restricted {
            return true;
        }
        (1..=12u32)
            .filter(|month| self.months.contains(*month))
            .any(|month| {
                (1..=MONTH_LENGTHS[month as usize - 1]).any(|day| self.days_of_month.contains(day))
            })
    }

    /// The expression as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Earliest matching minute strictly after `after`, or `None` when no
    /// match exists before the end of the representable calendar.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let after = after.naive_utc();
        let mut candidate = after
            .date()
            .and_hms_opt(after.hour(), after.minute(), 0)?
            .checked_add_signed(TimeDelta::minutes(1))?;
        let last_year = candidate.year() + SEARCH_YEARS;

        while candidate.year() <= last_year {
            let date = candidate.date();
            if !self.months.contains(date.month()) {
                candidate = first_of_next_month(date)?.and_time(NaiveTime::MIN);
                continue;
            }
            if !self.day_matches(date) {
                candidate = date.succ_opt()?.and_time(NaiveTime::MIN);
                continue;
            }
            if !self.hours.contains(candidate.hour()) {
                candidate = start_of_next_hour(candidate)?;
                continue;
            }
            if !self.minutes.contains(candidate.minute()) {
                candidate = candidate.checked_add_signed(TimeDelta::minutes(1))?;
                continue;
            }
            return Some(candidate.and_utc());
        }
        None
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.days_of_month.contains(date.day());
        let dow = self
            .days_of_week
            .contains(date.weekday().num_days_from_sunday());
        if self.days_of_month.restricted && self.days_of_week.restricted {
            dom || dow
        } else {
            dom && dow
        }
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

fn start_of_next_hour(at: NaiveDateTime) -> Option<NaiveDateTime> {
    at.date()
        .and_hms_opt(at.hour(), 0, 0)?
        .checked_add_signed(TimeDelta::hours(1))
}

impl FromStr for CronExpr {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}
