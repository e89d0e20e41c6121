use crate::config::{EndpointCall, Endpoints};
use crate::domain::ValuationSnapshot;
use crate::ingest::provider::{fetch_table, RecordSource};
use crate::ingest::retry::RetryPolicy;
use crate::ingest::schema::{
    latest_fraction, latest_value, FieldRule, PB_PERCENTILE_RULES, PB_RULES, PE_PERCENTILE_RULES,
    PE_RULES,
};
use crate::ingest::series::normalize_symbol;
use crate::ingest::types::Record;
use std::sync::Arc;

/// Raw PE/PB from the quote endpoint, historical percentiles from the percentile
/// endpoint. The two are independent; whatever resolves is kept.
#[derive(Clone)]
pub struct ValuationFetcher {
    source: Arc<dyn RecordSource>,
    retry: RetryPolicy,
}

impl ValuationFetcher {
    pub fn new(source: Arc<dyn RecordSource>, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    pub async fn fetch(&self, index_symbol: &str, endpoints: &Endpoints) -> ValuationSnapshot {
        let (code, _) = normalize_symbol(index_symbol);

        let quote = self.table(&endpoints.valuation_quote, &code).await;
        let pct = self.table(&endpoints.valuation_percentile, &code).await;

        let from = |rows: &Option<Vec<Record>>, rules: &[FieldRule]| {
            rows.as_deref().and_then(|r| latest_value(r, rules))
        };
        let share = |rows: &Option<Vec<Record>>, rules: &[FieldRule]| {
            rows.as_deref().and_then(|r| latest_fraction(r, rules))
        };

        let snapshot = ValuationSnapshot {
            pe_ttm: from(&quote, PE_RULES),
            pb: from(&quote, PB_RULES),
            pe_percentile: share(&pct, PE_PERCENTILE_RULES)
                .or_else(|| share(&quote, PE_PERCENTILE_RULES)),
            pb_percentile: share(&pct, PB_PERCENTILE_RULES)
                .or_else(|| share(&quote, PB_PERCENTILE_RULES)),
        };
        tracing::info!(index = index_symbol, ?snapshot, "valuation snapshot resolved");
        snapshot
    }

    async fn table(&self, call: &EndpointCall, code: &str) -> Option<Vec<Record>> {
        let mut params = call.params.clone();
        if !params.iter().any(|(k, _)| k == "symbol") {
            params.push(("symbol".to_string(), code.to_string()));
        }
        fetch_table(self.source.as_ref(), &self.retry, &call.path, &params).await
    }
}
