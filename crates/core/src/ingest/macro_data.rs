use crate::config::{EndpointCall, Endpoints};
use crate::domain::MacroSnapshot;
use crate::ingest::error::FetchError;
use crate::ingest::provider::{fetch_table, RecordSource};
use crate::ingest::retry::RetryPolicy;
use crate::ingest::schema::{
    coerce_f64, column_names, find_column, latest_records, latest_value, FieldRule,
    MONEY_SUPPLY_GROWTH_RULES, NET_FLOW_RULES, SOCIAL_FINANCING_GROWTH_RULES,
};
use crate::ingest::types::Record;
use std::sync::Arc;

/// Best-effort liquidity snapshot. Each field is fetched and parsed on its own; a failure
/// leaves only that field absent.
#[derive(Clone)]
pub struct MacroFetcher {
    source: Arc<dyn RecordSource>,
    retry: RetryPolicy,
}

impl MacroFetcher {
    pub fn new(source: Arc<dyn RecordSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub async fn fetch(&self, endpoints: &Endpoints, net_flow_days: usize) -> MacroSnapshot {
        let money_supply_growth = self
            .table(&endpoints.money_supply)
            .await
            .and_then(|rows| {
                pick_latest(&endpoints.money_supply.path, &rows, MONEY_SUPPLY_GROWTH_RULES)
            });

        let social_financing_growth = self
            .table(&endpoints.social_financing)
            .await
            .and_then(|rows| {
                pick_latest(&endpoints.social_financing.path, &rows, SOCIAL_FINANCING_GROWTH_RULES)
            });

        let net_cross_border_flow = self
            .table(&endpoints.net_flow)
            .await
            .and_then(|rows| {
                sum_recent(&endpoints.net_flow.path, &rows, NET_FLOW_RULES, net_flow_days)
            });

        let snapshot = MacroSnapshot {
            money_supply_growth,
            social_financing_growth,
            net_cross_border_flow,
        };
        tracing::info!(?snapshot, "macro snapshot resolved");
        snapshot
    }

    async fn table(&self, call: &EndpointCall) -> Option<Vec<Record>> {
        fetch_table(self.source.as_ref(), &self.retry, &call.path, &call.params).await
    }
}

fn pick_latest(endpoint: &str, rows: &[Record], rules: &[FieldRule]) -> Option<f64> {
    let value = latest_value(rows, rules);
    if value.is_none() {
        log_mismatch(endpoint, rows);
    }
    value
}

/// Sum of the newest `days` readable values, e.g. a 5-day net inflow from daily rows.
fn sum_recent(endpoint: &str, rows: &[Record], rules: &[FieldRule], days: usize) -> Option<f64> {
    let values: Vec<f64> = latest_records(rows, days)
        .into_iter()
        .filter_map(|r| find_column(r, rules).and_then(|col| r.get(col)).and_then(coerce_f64))
        .collect();

    if values.is_empty() {
        log_mismatch(endpoint, rows);
        return None;
    }
    Some(values.iter().sum())
}

fn log_mismatch(endpoint: &str, rows: &[Record]) {
    let err = FetchError::SchemaMismatch {
        endpoint: endpoint.to_string(),
        columns: column_names(rows),
    };
    tracing::warn!(error = %err, "field left absent");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::series::stub::StubSource;
    use serde_json::json;

    fn endpoints() -> Endpoints {
        Endpoints {
            net_flow: EndpointCall::new("hsgt", &[]),
            money_supply: EndpointCall::new("m2", &[]),
            social_financing: EndpointCall::new("shrz", &[]),
            ..Endpoints::default()
        }
    }

    #[tokio::test]
    async fn resolves_fields_from_wide_tables() {
        let source = StubSource::default()
            .with(
                "m2",
                json!([
                    {"月份": "2025年2月份", "货币和准货币(M2)-同比增长": 7.0, "货币和准货币(M2)-数量(亿元)": 3.0e6},
                    {"月份": "2025年3月份", "货币和准货币(M2)-同比增长": 7.4, "货币和准货币(M2)-数量(亿元)": 3.1e6}
                ]),
            )
            .with("shrz", json!([{"date": "2025-03", "social_financing_yoy": "8.2%"}]))
            .with(
                "hsgt",
                json!([
                    {"日期": "2025-03-01", "当日成交净买额": 10.0, "历史累计净买额": 9000.0},
                    {"日期": "2025-03-02", "当日成交净买额": 20.0, "历史累计净买额": 9020.0},
                    {"日期": "2025-03-03", "当日成交净买额": -5.0, "历史累计净买额": 9015.0}
                ]),
            );
        let fetcher = MacroFetcher::new(Arc::new(source), RetryPolicy::immediate(1));

        let snap = fetcher.fetch(&endpoints(), 2).await;
        assert_eq!(snap.money_supply_growth, Some(7.4));
        assert_eq!(snap.social_financing_growth, Some(8.2));
        assert_eq!(snap.net_cross_border_flow, Some(15.0));
    }

    #[tokio::test]
    async fn failures_leave_fields_absent_not_zero() {
        let source = StubSource::default()
            .with("m2", json!([{"月份": "2025年3月份", "unrelated": 1.0}]))
            .with("hsgt", json!([{"日期": "2025-03-03", "当日成交净买额": 12.5}]));
        let fetcher = MacroFetcher::new(Arc::new(source), RetryPolicy::immediate(2));

        let snap = fetcher.fetch(&endpoints(), 5).await;
        assert_eq!(snap.money_supply_growth, None);
        assert_eq!(snap.social_financing_growth, None);
        assert_eq!(snap.net_cross_border_flow, Some(12.5));
    }
}
