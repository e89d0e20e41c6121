//! Named field-alias tables for provider schemas that drift between versions.
//!
//! Lookups are ordered: the first entry that matches wins.

use crate::ingest::types::Record;
use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Column names of one known price-history layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSchema {
    pub name: &'static str,
    pub date: &'static str,
    pub close: &'static str,
}

pub const SERIES_SCHEMAS: &[SeriesSchema] = &[
    SeriesSchema {
        name: "em_hist_zh",
        date: "日期",
        close: "收盘",
    },
    SeriesSchema {
        name: "sina_daily",
        date: "date",
        close: "close",
    },
    SeriesSchema {
        name: "csindex_hist",
        date: "trade_date",
        close: "close_price",
    },
    SeriesSchema {
        name: "titlecase",
        date: "Date",
        close: "Close",
    },
];

pub fn resolve_series_schema(records: &[Record]) -> Option<&'static SeriesSchema> {
    let first = records.first()?;
    SERIES_SCHEMAS
        .iter()
        .find(|s| first.contains_key(s.date) && first.contains_key(s.close))
}

/// How a matched column's numbers are expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Used as provided (growth in percentage points, flows, ratios).
    Raw,
    /// 0-100; `to_fraction` divides by 100.
    Percent,
    /// Already in [0, 1].
    Fraction,
}

/// Keyword match on column names for wide macro/valuation tables.
///
/// A column matches when it carries every `all_of` keyword and none of the `none_of`
/// keywords. ASCII keywords must equal a whole ASCII word of the lowercased column name
/// (so `pe` does not hit `open`); other keywords match as substrings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub all_of: &'static [&'static str],
    pub none_of: &'static [&'static str],
    pub unit: Unit,
}

impl FieldRule {
    pub const fn new(
        name: &'static str,
        all_of: &'static [&'static str],
        none_of: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            all_of,
            none_of,
            unit: Unit::Raw,
        }
    }

    pub const fn percent(mut self) -> Self {
        self.unit = Unit::Percent;
        self
    }

    pub const fn fraction(mut self) -> Self {
        self.unit = Unit::Fraction;
        self
    }

    fn matches(&self, column: &str) -> bool {
        let lower = column.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has = |k: &&str| {
            if k.is_ascii() {
                words.contains(k)
            } else {
                lower.contains(*k)
            }
        };
        self.all_of.iter().all(has) && !self.none_of.iter().any(has)
    }
}

pub const DATE_RULES: &[FieldRule] = &[
    FieldRule::new("date_en", &["date"], &[]),
    FieldRule::new("date_zh", &["日期"], &[]),
    FieldRule::new("month_zh", &["月份"], &[]),
    FieldRule::new("month_en", &["month"], &[]),
    FieldRule::new("period", &["period"], &[]),
];

pub const MONEY_SUPPLY_GROWTH_RULES: &[FieldRule] = &[
    FieldRule::new("m2_yoy_zh", &["m2", "同比"], &[]),
    FieldRule::new("m2_yoy", &["m2", "yoy"], &[]),
    FieldRule::new("m2_growth", &["m2", "growth"], &["mom"]),
];

pub const SOCIAL_FINANCING_GROWTH_RULES: &[FieldRule] = &[
    FieldRule::new("shrz_yoy_zh", &["社会融资", "同比"], &[]),
    FieldRule::new("shrz_short_yoy_zh", &["社融", "同比"], &[]),
    FieldRule::new("tsf_yoy", &["social", "financing", "yoy"], &[]),
    FieldRule::new("tsf_growth", &["social", "financing", "growth"], &[]),
];

pub const NET_FLOW_RULES: &[FieldRule] = &[
    FieldRule::new("net_buy_zh", &["净买额"], &["累计", "历史"]),
    FieldRule::new("net_inflow_zh", &["净流入"], &["累计", "历史"]),
    FieldRule::new("net_inflow", &["net", "inflow"], &["cumulative"]),
    FieldRule::new("net_flow", &["net", "flow"], &["cumulative"]),
];

pub const PE_RULES: &[FieldRule] = &[
    FieldRule::new("pe_ttm", &["pe", "ttm"], &["percentile", "quantile", "分位"]),
    FieldRule::new("pe_ttm_zh", &["滚动市盈率"], &["分位"]),
    FieldRule::new("pe_zh", &["市盈率"], &["分位"]),
    FieldRule::new("pe", &["pe"], &["percentile", "quantile", "分位"]),
];

pub const PB_RULES: &[FieldRule] = &[
    FieldRule::new("pb_zh", &["市净率"], &["分位"]),
    FieldRule::new("pb", &["pb"], &["percentile", "quantile", "分位"]),
];

// The gateway reports percentiles on a 0-100 scale; `quantile` columns are fractions.
pub const PE_PERCENTILE_RULES: &[FieldRule] = &[
    FieldRule::new("pe_percentile", &["pe", "percentile"], &[]).percent(),
    FieldRule::new("pe_percentile_zh", &["市盈率", "分位"], &[]).percent(),
    FieldRule::new("pe_pct_zh", &["pe", "分位"], &[]).percent(),
    FieldRule::new("pe_quantile", &["pe", "quantile"], &[]).fraction(),
];

pub const PB_PERCENTILE_RULES: &[FieldRule] = &[
    FieldRule::new("pb_percentile", &["pb", "percentile"], &[]).percent(),
    FieldRule::new("pb_percentile_zh", &["市净率", "分位"], &[]).percent(),
    FieldRule::new("pb_pct_zh", &["pb", "分位"], &[]).percent(),
    FieldRule::new("pb_quantile", &["pb", "quantile"], &[]).fraction(),
];

/// First column of `record` matched by the first rule that matches anything, with that
/// rule.
pub fn find_field<'a, 'r>(
    record: &'a Record,
    rules: &'r [FieldRule],
) -> Option<(&'r FieldRule, &'a str)> {
    rules.iter().find_map(|rule| {
        record
            .keys()
            .find(|k| rule.matches(k))
            .map(|k| (rule, k.as_str()))
    })
}

pub fn find_column<'a>(record: &'a Record, rules: &[FieldRule]) -> Option<&'a str> {
    find_field(record, rules).map(|(_, col)| col)
}

/// A share in [0, 1]. A trailing `%` on a string always means percent; otherwise the
/// column's declared unit decides. Negative and non-finite readings are rejected.
pub fn to_fraction(v: &Value, unit: Unit) -> Option<f64> {
    let percent_sign = v.as_str().is_some_and(|s| s.trim().ends_with('%'));
    let n = coerce_f64(v)?;
    if n < 0.0 {
        return None;
    }
    let frac = if percent_sign || unit == Unit::Percent {
        n / 100.0
    } else {
        n
    };
    Some(frac.clamp(0.0, 1.0))
}

/// Numeric coercion: numbers pass through, strings are trimmed and may carry thousands
/// separators or a trailing `%`. Placeholders such as `-` and non-finite values fail.
pub fn coerce_f64(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let t = s.trim().trim_end_matches('%').replace(',', "");
            if t.is_empty() || t == "-" || t == "--" {
                return None;
            }
            t.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

pub fn parse_date(v: &Value) -> Option<NaiveDate> {
    match v {
        Value::String(s) => {
            let t = s.trim();
            for fmt in ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"] {
                if let Ok(d) = NaiveDate::parse_from_str(t, fmt) {
                    return Some(d);
                }
            }
            // Datetime strings such as "2025-03-04T00:00:00.000" or "2025-03-04 00:00:00".
            t.get(..10)
                .and_then(|head| NaiveDate::parse_from_str(head, "%Y-%m-%d").ok())
        }
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if (19_000_101..=29_991_231).contains(&raw) {
                let (y, md) = (raw / 10_000, raw % 10_000);
                NaiveDate::from_ymd_opt(y as i32, (md / 100) as u32, (md % 100) as u32)
            } else {
                // Epoch milliseconds.
                DateTime::from_timestamp_millis(raw).map(|dt| dt.date_naive())
            }
        }
        _ => None,
    }
}

/// Sortable (year, month, day) key for period labels, including forms such as
/// "2025年3月份" that are not full dates.
pub fn period_key(v: &Value) -> Option<(i32, u32, u32)> {
    use chrono::Datelike;

    if let Some(key) = year_month(v) {
        return Some(key);
    }
    if let Some(d) = parse_date(v) {
        return Some((d.year(), d.month(), d.day()));
    }

    let s = v.as_str()?;
    let mut groups = s
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .map(|g| g.parse::<u32>().ok());
    let year = groups.next()??;
    if !(1900..=2999).contains(&year) {
        return None;
    }
    let month = groups.next().flatten().unwrap_or(1);
    let day = groups.next().flatten().unwrap_or(1);
    Some((year as i32, month, day))
}

/// Compact `YYYYMM` month labels, as a string or an integer.
fn year_month(v: &Value) -> Option<(i32, u32, u32)> {
    let raw = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.as_u64()?.to_string(),
        _ => return None,
    };
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = raw[..4].parse().ok()?;
    let month: u32 = raw[4..].parse().ok()?;
    ((1900..=2999).contains(&year) && (1..=12).contains(&month)).then_some((year, month, 1))
}

/// The `n` most recent rows, newest first. Rows are ordered by their period column when
/// one is recognized, otherwise the provider's row order is taken as oldest-to-newest.
pub fn latest_records(records: &[Record], n: usize) -> Vec<&Record> {
    let date_col = records.first().and_then(|r| find_column(r, DATE_RULES));

    let mut rows: Vec<&Record> = records.iter().collect();
    if let Some(col) = date_col {
        let keyed = rows
            .iter()
            .all(|r| r.get(col).and_then(period_key).is_some());
        if keyed {
            rows.sort_by_key(|r| r.get(col).and_then(period_key));
        }
    }

    rows.into_iter().rev().take(n).collect()
}

/// First usable number in the newest row that has the column matched by `rules`.
pub fn latest_value(records: &[Record], rules: &[FieldRule]) -> Option<f64> {
    latest_records(records, records.len())
        .into_iter()
        .find_map(|r| find_column(r, rules).and_then(|col| r.get(col)).and_then(coerce_f64))
}

/// Like `latest_value`, converted to a fraction by `to_fraction` with the matching rule's
/// unit.
pub fn latest_fraction(records: &[Record], rules: &[FieldRule]) -> Option<f64> {
    latest_records(records, records.len())
        .into_iter()
        .find_map(|r| {
            let (rule, col) = find_field(r, rules)?;
            r.get(col).and_then(|v| to_fraction(v, rule.unit))
        })
}

pub fn column_names(records: &[Record]) -> Vec<String> {
    records
        .first()
        .map(|r| r.keys().cloned().collect())
        .unwrap_or_default()
}
