//! Mainland A-share trading calendar.

use anyhow::Context;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::collections::BTreeSet;

const UTC_OFFSET_HOURS: i32 = 8;
const HOLIDAYS_ENV: &str = "CN_MARKET_HOLIDAYS";

fn exchange_offset() -> anyhow::Result<FixedOffset> {
    FixedOffset::east_opt(UTC_OFFSET_HOURS * 3600).context("invalid exchange UTC offset")
}

/// Wall-clock time on the exchange, used to stamp reports.
pub fn market_now(now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDateTime> {
    Ok(now_utc.with_timezone(&exchange_offset()?).naive_local())
}

/// Weekends plus a set of closure days.
///
/// Built-in closures cover the fixed-date ones (New Year, Labour Day, the National Day
/// week). Spring Festival and other lunar closures move every year and come from
/// `CN_MARKET_HOLIDAYS`, a comma list of `YYYY-MM-DD` days or `YYYY-MM-DD..YYYY-MM-DD`
/// inclusive ranges.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    closed: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn with_closures(days: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            closed: days.into_iter().collect(),
        }
    }

    pub fn from_env() -> Self {
        let mut cal = Self::with_closures(fixed_closures(2024..=2030));
        if let Ok(spec) = std::env::var(HOLIDAYS_ENV) {
            for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                match parse_closure(entry) {
                    Some(days) => cal.closed.extend(days),
                    None => tracing::warn!(entry, "ignoring unparseable {HOLIDAYS_ENV} entry"),
                }
            }
        }
        cal
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        date.weekday().number_from_monday() <= 5 && !self.closed.contains(&date)
    }

    /// `date` itself when it is a session, otherwise the nearest earlier session.
    pub fn session_on_or_before(&self, date: NaiveDate) -> NaiveDate {
        let mut d = date;
        while !self.is_trading_day(d) {
            match d.pred_opt() {
                Some(prev) => d = prev,
                None => break,
            }
        }
        d
    }

    /// The latest session whose close has passed at `now_utc` (15:00 exchange time).
    pub fn last_closed_session(&self, now_utc: DateTime<Utc>) -> anyhow::Result<NaiveDate> {
        let local = market_now(now_utc)?;
        let close = NaiveTime::from_hms_opt(15, 0, 0).context("invalid close time")?;

        let today = local.date();
        let candidate = if local.time() >= close {
            today
        } else {
            today.pred_opt().context("date underflow")?
        };
        Ok(self.session_on_or_before(candidate))
    }
}

fn fixed_closures(years: std::ops::RangeInclusive<i32>) -> Vec<NaiveDate> {
    years
        .flat_map(|y| {
            let national_day = (1..=7).map(move |d| (10, d));
            [(1, 1), (5, 1)]
                .into_iter()
                .chain(national_day)
                .filter_map(move |(m, d)| NaiveDate::from_ymd_opt(y, m, d))
        })
        .collect()
}

fn parse_closure(entry: &str) -> Option<Vec<NaiveDate>> {
    let day = |s: &str| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok();
    match entry.split_once("..") {
        Some((from, to)) => {
            let (from, to) = (day(from)?, day(to)?);
            (from <= to).then(|| from.iter_days().take_while(|d| *d <= to).collect())
        }
        None => day(entry).map(|d| vec![d]),
    }
}

/// The trading date a run ends on: an explicit `YYYY-MM-DD`, or the last closed session
/// on the calendar from `CN_MARKET_HOLIDAYS`.
pub fn resolve_trade_date(
    date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    match date_arg {
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD")),
        None => TradingCalendar::from_env().last_closed_session(now_utc),
    }
}
