//! One heat-check run: snapshots, index technicals, holdings, scores and report.

use crate::config::HeatProfile;
use crate::domain::{BandSeries, HoldingOutcome, MacroSnapshot, ScoreBreakdown, ValuationSnapshot};
use crate::indicators::compute_bands;
use crate::ingest::{
    DateRange, MacroFetcher, RecordSource, RetryPolicy, SeriesFetcher, ValuationFetcher,
};
use crate::portfolio::PortfolioAnalyzer;
use crate::report::{assemble_report, Report};
use crate::scoring::score_all;
use crate::storage::ChartSink;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct HeatRun {
    pub generated_at: NaiveDateTime,
    pub range: DateRange,
    pub macro_snapshot: MacroSnapshot,
    pub valuation: ValuationSnapshot,
    pub index_available: bool,
    pub scores: ScoreBreakdown,
    pub holdings: Vec<HoldingOutcome>,
    pub report: Report,
}

pub struct HeatCheck {
    profile: HeatProfile,
    series: SeriesFetcher,
    macro_fetcher: MacroFetcher,
    valuation: ValuationFetcher,
    portfolio: PortfolioAnalyzer,
}

impl HeatCheck {
    pub fn new(profile: HeatProfile, source: Arc<dyn RecordSource>, retry: RetryPolicy) -> Self {
        let series = SeriesFetcher::new(source.clone(), retry);
        let portfolio = PortfolioAnalyzer::new(
            series.clone(),
            profile.endpoints.equity_series.clone(),
            profile.bands,
        );
        Self {
            macro_fetcher: MacroFetcher::new(source.clone(), retry),
            valuation: ValuationFetcher::new(source, retry),
            series,
            portfolio,
            profile,
        }
    }

    pub fn profile(&self) -> &HeatProfile {
        &self.profile
    }

    /// `[start, end]` for a run ending on `end`; without an explicit start the window is
    /// the profile's lookback.
    pub fn date_range(
        &self,
        start: Option<NaiveDate>,
        end: NaiveDate,
    ) -> anyhow::Result<DateRange> {
        let range = match start {
            Some(start) => DateRange { start, end },
            None => DateRange::trailing(end, self.profile.lookback_days),
        };
        anyhow::ensure!(
            range.start <= range.end,
            "start date {} is after end date {}",
            range.start,
            range.end
        );
        Ok(range)
    }

    /// Never fails on missing data; every gap degrades to an absent value or a neutral
    /// score. Chart export errors are logged and dropped.
    pub async fn run(
        &self,
        holdings: &[String],
        range: DateRange,
        generated_at: NaiveDateTime,
        charts: Option<&dyn ChartSink>,
    ) -> HeatRun {
        let p = &self.profile;
        tracing::info!(
            index = %p.index_symbol,
            holdings = holdings.len(),
            start = %range.start,
            end = %range.end,
            "heat check started"
        );

        let macro_snapshot = self.macro_fetcher.fetch(&p.endpoints, p.net_flow_days).await;
        let valuation = self.valuation.fetch(&p.index_symbol, &p.endpoints).await;
        let index_bands = self.index_bands(range).await;

        let analyses = self.portfolio.analyze(holdings, range).await;

        if let Some(sink) = charts {
            if let Some(bands) = &index_bands {
                export(sink, &p.index_symbol, bands);
            }
            for a in &analyses {
                if let Some(bands) = &a.bands {
                    export(sink, a.outcome.symbol(), bands);
                }
            }
        }

        let scores = score_all(&macro_snapshot, &valuation, index_bands.as_ref(), &p.scoring);
        let holdings: Vec<HoldingOutcome> = analyses.into_iter().map(|a| a.outcome).collect();
        let index_available = index_bands.is_some();
        let report = assemble_report(
            generated_at,
            &p.index_label,
            &scores,
            index_available,
            &holdings,
        );

        tracing::info!(
            liquidity = scores.liquidity,
            valuation = scores.valuation,
            technical = scores.technical,
            composite = scores.composite,
            tier = %scores.tier,
            "heat check finished"
        );

        HeatRun {
            generated_at,
            range,
            macro_snapshot,
            valuation,
            index_available,
            scores,
            holdings,
            report,
        }
    }

    async fn index_bands(&self, range: DateRange) -> Option<BandSeries> {
        let p = &self.profile;
        let series = self
            .series
            .fetch(&p.index_symbol, &p.endpoints.index_series, range)
            .await?;

        match compute_bands(&series, p.bands) {
            Ok(bands) => Some(bands),
            Err(err) => {
                tracing::warn!(
                    index = %p.index_symbol,
                    error = %format!("{err:#}"),
                    "index bands unavailable"
                );
                None
            }
        }
    }
}

fn export(sink: &dyn ChartSink, name: &str, bands: &BandSeries) {
    if let Err(err) = sink.export(name, bands) {
        tracing::warn!(name, error = %format!("{err:#}"), "chart export failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BandSignal, HeatTier};
    use crate::ingest::series::stub::{zh_rows, StubSource};
    use crate::scoring::composite_score;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        names: Mutex<Vec<String>>,
    }

    impl ChartSink for RecordingSink {
        fn export(&self, name: &str, _bands: &BandSeries) -> anyhow::Result<PathBuf> {
            self.names.lock().unwrap().push(name.to_string());
            Ok(PathBuf::from(name))
        }
    }

    struct FailingSink;

    impl ChartSink for FailingSink {
        fn export(&self, _name: &str, _bands: &BandSeries) -> anyhow::Result<PathBuf> {
            anyhow::bail!("disk full")
        }
    }

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(16, 0, 0)
            .unwrap()
    }

    fn range() -> DateRange {
        DateRange {
            start: NaiveDate::from_ymd_opt(2024, 12, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        }
    }

    fn full_source() -> StubSource {
        let flows: Vec<_> = (1..=7)
            .map(|d| json!({"日期": format!("2025-03-0{d}"), "当日成交净买额": 100.0}))
            .collect();
        StubSource::default()
            .with(
                "macro_china_money_supply",
                json!([{"月份": "2025年02月份", "货币和准货币(M2)-同比增长": 10.0}]),
            )
            .with(
                "macro_china_shrzgm",
                json!([{"月份": "202502", "社会融资规模存量-同比": 12.0}]),
            )
            .with("stock_hsgt_hist_em", json!(flows))
            .with(
                "stock_zh_index_value_csindex:000905",
                json!([{"date": "2025-03-13", "pe_ttm": 25.0, "pb": 1.8}]),
            )
            .with(
                "index_value_percentile:000905",
                json!([{"date": "2025-03-13", "pe_percentile": 50, "pb_percentile": 50}]),
            )
            .with("stock_zh_index_daily:000905", zh_rows(&[10.0; 30]))
            .with("stock_zh_a_hist:300502", zh_rows(&[20.0; 30]))
    }

    fn holdings() -> Vec<String> {
        vec!["300502.SZ".to_string(), "002463.SZ".to_string()]
    }

    #[tokio::test]
    async fn end_to_end_with_partial_outage() {
        let check = HeatCheck::new(
            HeatProfile::default(),
            Arc::new(full_source()),
            RetryPolicy::immediate(1),
        );
        let sink = RecordingSink::default();

        let run = check
            .run(&holdings(), range(), at(), Some(&sink as &dyn ChartSink))
            .await;

        assert_eq!(run.macro_snapshot.money_supply_growth, Some(10.0));
        assert_eq!(run.macro_snapshot.social_financing_growth, Some(12.0));
        assert_eq!(run.macro_snapshot.net_cross_border_flow, Some(500.0));
        assert_eq!(run.valuation.pe_percentile, Some(0.5));
        assert!(run.index_available);

        assert_eq!(run.scores.liquidity, 50);
        assert_eq!(run.scores.valuation, 70);
        assert_eq!(run.scores.technical, 60);
        let weights = HeatProfile::default().scoring.weights;
        assert_eq!(run.scores.composite, composite_score(50, 70, 60, &weights));
        assert_eq!(run.scores.tier, HeatTier::Elevated);

        let signals: Vec<_> = run
            .holdings
            .iter()
            .map(|h| match h {
                HoldingOutcome::Verdict(v) => v.signal,
                HoldingOutcome::Failed { .. } => panic!("unexpected failure"),
            })
            .collect();
        assert_eq!(signals, vec![BandSignal::Neutral, BandSignal::Unavailable]);

        assert_eq!(run.report.lines().len(), 8);
        assert!(run.report.lines()[0].contains("2025-03-14 16:00:00"));
        assert!(run.report.lines()[7].starts_with("002463.SZ: unavailable"));

        assert_eq!(*sink.names.lock().unwrap(), vec!["000905.SH", "300502.SZ"]);
    }

    #[tokio::test]
    async fn total_outage_still_yields_a_report() {
        let check = HeatCheck::new(
            HeatProfile::default(),
            Arc::new(StubSource::default()),
            RetryPolicy::immediate(2),
        );

        let run = check
            .run(&holdings(), range(), at(), Some(&FailingSink as &dyn ChartSink))
            .await;

        assert!(run.macro_snapshot.is_empty());
        assert_eq!(run.valuation, ValuationSnapshot::default());
        assert!(!run.index_available);
        assert_eq!(run.scores.liquidity, 50);
        assert_eq!(run.scores.valuation, 50);
        assert_eq!(run.scores.technical, 50);
        assert!(run.report.lines()[3].ends_with("(index data unavailable)"));
        assert_eq!(run.report.lines().len(), 8);
    }

    #[test]
    fn date_range_defaults_to_lookback() {
        let check = HeatCheck::new(
            HeatProfile::default(),
            Arc::new(StubSource::default()),
            RetryPolicy::immediate(1),
        );
        let end = NaiveDate::from_ymd_opt(2025, 3, 31).unwrap();
        let r = check.date_range(None, end).unwrap();
        assert_eq!(r.start, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());

        let late = NaiveDate::from_ymd_opt(2025, 4, 1).unwrap();
        assert!(check.date_range(Some(late), end).is_err());
    }
}
