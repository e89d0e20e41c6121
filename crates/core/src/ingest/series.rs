use crate::config::SeriesEndpoint;
use crate::domain::{PricePoint, PriceSeries};
use crate::ingest::error::FetchError;
use crate::ingest::provider::RecordSource;
use crate::ingest::retry::RetryPolicy;
use crate::ingest::schema::{coerce_f64, column_names, parse_date, resolve_series_schema};
use crate::ingest::types::Record;
use chrono::{Duration, NaiveDate};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exchange {
    Shanghai,
    Shenzhen,
    Beijing,
}

impl Exchange {
    pub const ALL: [Exchange; 3] = [Exchange::Shanghai, Exchange::Shenzhen, Exchange::Beijing];

    pub fn prefix(self) -> &'static str {
        match self {
            Exchange::Shanghai => "sh",
            Exchange::Shenzhen => "sz",
            Exchange::Beijing => "bj",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "SH" | "SS" | "SSE" => Some(Exchange::Shanghai),
            "SZ" | "SZSE" => Some(Exchange::Shenzhen),
            "BJ" | "BSE" => Some(Exchange::Beijing),
            _ => None,
        }
    }
}

/// Splits a logical symbol into its bare code and the exchange it names, if any.
/// Accepts `300502`, `300502.SZ` and `sz300502`.
pub fn normalize_symbol(symbol: &str) -> (String, Option<Exchange>) {
    let s = symbol.trim();

    if let Some((code, suffix)) = s.rsplit_once('.') {
        if let Some(ex) = Exchange::from_code(suffix) {
            return (code.trim().to_string(), Some(ex));
        }
    }

    if s.len() > 2 && s.is_char_boundary(2) {
        let (head, rest) = s.split_at(2);
        if let Some(ex) = Exchange::from_code(head) {
            if rest.chars().all(|c| c.is_ascii_digit()) {
                return (rest.to_string(), Some(ex));
            }
        }
    }

    (s.to_string(), None)
}

/// Provider spellings to try, in order: the bare code, then the code prefixed for the
/// named exchange, then for every other known exchange.
pub fn candidate_symbols(symbol: &str) -> Vec<String> {
    let (bare, hint) = normalize_symbol(symbol);

    let mut exchanges: Vec<Exchange> = hint.into_iter().collect();
    exchanges.extend(Exchange::ALL.iter().copied().filter(|e| Some(*e) != hint));

    let mut out = vec![bare.clone()];
    out.extend(exchanges.into_iter().map(|e| format!("{}{}", e.prefix(), bare)));
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn trailing(end: NaiveDate, days: i64) -> Self {
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        self.start <= d && d <= self.end
    }
}

/// Price-history retrieval over an ordered endpoint chain and symbol candidates.
#[derive(Clone)]
pub struct SeriesFetcher {
    source: Arc<dyn RecordSource>,
    retry: RetryPolicy,
}

impl SeriesFetcher {
    pub fn new(source: Arc<dyn RecordSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// First non-empty series over `endpoints` x candidate spellings, or `None` once every
    /// combination has used up its retries.
    pub async fn fetch(
        &self,
        symbol: &str,
        endpoints: &[SeriesEndpoint],
        range: DateRange,
    ) -> Option<PriceSeries> {
        let candidates = candidate_symbols(symbol);

        for endpoint in endpoints {
            for candidate in &candidates {
                let what = format!("{}({candidate})", endpoint.path);
                let series = self
                    .retry
                    .run(&what, |_| self.fetch_once(symbol, endpoint, candidate, range))
                    .await;

                if let Some(series) = series {
                    tracing::info!(
                        symbol,
                        candidate = %candidate,
                        endpoint = %endpoint.path,
                        rows = series.len(),
                        "price series fetched"
                    );
                    return Some(series);
                }
            }
        }

        tracing::warn!(
            symbol,
            provider = self.source.provider_name(),
            "no price data after all endpoints and symbol candidates"
        );
        None
    }

    async fn fetch_once(
        &self,
        symbol: &str,
        endpoint: &SeriesEndpoint,
        candidate: &str,
        range: DateRange,
    ) -> anyhow::Result<PriceSeries> {
        let mut params = vec![("symbol".to_string(), candidate.to_string())];
        if endpoint.ranged {
            params.push(("start_date".to_string(), range.start.format("%Y%m%d").to_string()));
            params.push(("end_date".to_string(), range.end.format("%Y%m%d").to_string()));
        }
        params.extend(endpoint.extra_params.iter().cloned());

        let records = self.source.fetch_records(&endpoint.path, &params).await?;
        Ok(parse_series(symbol, &endpoint.path, &records, range)?)
    }
}

/// Normalizes provider rows to (date, close). Rows whose date or close cannot be read are
/// dropped; an empty result is a failure.
pub fn parse_series(
    symbol: &str,
    endpoint: &str,
    records: &[Record],
    range: DateRange,
) -> Result<PriceSeries, FetchError> {
    if records.is_empty() {
        return Err(FetchError::Empty {
            endpoint: endpoint.to_string(),
        });
    }

    let schema = resolve_series_schema(records).ok_or_else(|| FetchError::SchemaMismatch {
        endpoint: endpoint.to_string(),
        columns: column_names(records),
    })?;

    let points: Vec<PricePoint> = records
        .iter()
        .filter_map(|r| {
            let date = r.get(schema.date).and_then(parse_date)?;
            let close = r.get(schema.close).and_then(coerce_f64)?;
            Some(PricePoint { date, close })
        })
        .filter(|p| range.contains(p.date))
        .collect();

    let dropped = records.len() - points.len();
    if dropped > 0 {
        tracing::debug!(symbol, endpoint, dropped, schema = schema.name, "rows dropped");
    }

    let series = PriceSeries::new(symbol, points);
    if series.is_empty() {
        return Err(FetchError::Empty {
            endpoint: endpoint.to_string(),
        });
    }
    Ok(series)
}


#[cfg(test)]
mod tests {
    use super::stub::{zh_rows, StubSource};
    use super::*;
    use serde_json::json;

    fn range() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        }
    }

    fn hist() -> Vec<SeriesEndpoint> {
        vec![SeriesEndpoint::new("stock_zh_a_hist", true, &[("adjust", "qfq")])]
    }

    #[test]
    fn normalizes_suffixes_and_prefixes() {
        assert_eq!(
            normalize_symbol("300502.SZ"),
            ("300502".to_string(), Some(Exchange::Shenzhen))
        );
        assert_eq!(
            normalize_symbol("sh000905"),
            ("000905".to_string(), Some(Exchange::Shanghai))
        );
        assert_eq!(normalize_symbol("600519"), ("600519".to_string(), None));
    }

    #[test]
    fn candidates_put_named_exchange_first() {
        assert_eq!(
            candidate_symbols("000905.SH"),
            vec!["000905", "sh000905", "sz000905", "bj000905"]
        );
        assert_eq!(
            candidate_symbols("300502.SZ"),
            vec!["300502", "sz300502", "sh300502", "bj300502"]
        );
    }

    #[test]
    fn parse_drops_unparseable_closes_and_out_of_range_rows() {
        let records = crate::ingest::types::records_from_json(
            "e",
            json!([
                {"date": "2025-01-02", "close": "10.5"},
                {"date": "2025-01-03", "close": "n/a"},
                {"date": "2025-01-01", "close": 10.0},
                {"date": "2023-01-01", "close": 1.0}
            ]),
        )
        .unwrap();
        let series = parse_series("X", "e", &records, range()).unwrap();
        let closes: Vec<f64> = series.closes().collect();
        assert_eq!(closes, vec![10.0, 10.5]);
    }

    #[test]
    fn parse_reports_schema_mismatch_and_empty() {
        let records =
            crate::ingest::types::records_from_json("e", json!([{"day": "2025-01-02", "px": 1}]))
                .unwrap();
        assert!(matches!(
            parse_series("X", "e", &records, range()),
            Err(FetchError::SchemaMismatch { .. })
        ));

        let records = crate::ingest::types::records_from_json(
            "e",
            json!([{"date": "2025-01-02", "close": "-"}]),
        )
        .unwrap();
        assert!(matches!(
            parse_series("X", "e", &records, range()),
            Err(FetchError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn falls_through_candidates_until_one_answers() {
        let source = Arc::new(
            StubSource::default().with("stock_zh_a_hist:sz300502", zh_rows(&[1.0, 2.0, 3.0])),
        );
        let fetcher = SeriesFetcher::new(source.clone(), RetryPolicy::immediate(2));

        let series = fetcher.fetch("300502.SZ", &hist(), range()).await.unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.symbol(), "300502.SZ");
        // Bare spelling retried twice, then the exchange-prefixed one succeeds.
        assert_eq!(
            source.calls(),
            vec![
                "stock_zh_a_hist:300502",
                "stock_zh_a_hist:300502",
                "stock_zh_a_hist:sz300502"
            ]
        );
    }

    #[tokio::test]
    async fn falls_back_to_second_endpoint() {
        let source = Arc::new(
            StubSource::default()
                .with("stock_zh_index_daily", json!([{"unexpected": 1}]))
                .with("index_zh_a_hist:000905", zh_rows(&[5.0, 6.0])),
        );
        let fetcher = SeriesFetcher::new(source, RetryPolicy::immediate(1));
        let endpoints = vec![
            SeriesEndpoint::new("stock_zh_index_daily", false, &[]),
            SeriesEndpoint::new("index_zh_a_hist", true, &[]),
        ];

        let series = fetcher.fetch("000905.SH", &endpoints, range()).await.unwrap();
        assert_eq!(series.last().unwrap().close, 6.0);
    }

    #[tokio::test]
    async fn exhausted_fetch_is_none_not_error() {
        let source = Arc::new(StubSource::default());
        let fetcher = SeriesFetcher::new(source.clone(), RetryPolicy::immediate(3));

        assert!(fetcher.fetch("002463.SZ", &hist(), range()).await.is_none());
        // 4 spellings x 3 attempts.
        assert_eq!(source.calls().len(), 12);
    }
}
