use crate::config::{BandParams, SeriesEndpoint};
use crate::domain::{BandSeries, BandSignal, HoldingOutcome, HoldingVerdict, PriceSeries};
use crate::indicators::compute_bands;
use crate::ingest::{DateRange, SeriesFetcher};

const VERDICT_TAIL: usize = 3;

/// Per-holding result plus the bands behind it, kept for chart export.
#[derive(Debug, Clone)]
pub struct HoldingAnalysis {
    pub outcome: HoldingOutcome,
    pub bands: Option<BandSeries>,
}

/// Band verdicts for a watchlist. Symbols are processed one at a time in input order and a
/// failure only ever affects its own entry.
#[derive(Clone)]
pub struct PortfolioAnalyzer {
    fetcher: SeriesFetcher,
    endpoints: Vec<SeriesEndpoint>,
    params: BandParams,
}

impl PortfolioAnalyzer {
    pub fn new(fetcher: SeriesFetcher, endpoints: Vec<SeriesEndpoint>, params: BandParams) -> Self {
        Self {
            fetcher,
            endpoints,
            params,
        }
    }

    pub async fn analyze(&self, symbols: &[String], range: DateRange) -> Vec<HoldingAnalysis> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let analysis = self.analyze_one(symbol, range).await;
            if let HoldingOutcome::Failed { reason, .. } = &analysis.outcome {
                tracing::error!(symbol = %symbol, reason = %reason, "holding analysis failed");
            }
            out.push(analysis);
        }
        out
    }

    async fn analyze_one(&self, symbol: &str, range: DateRange) -> HoldingAnalysis {
        let Some(series) = self.fetcher.fetch(symbol, &self.endpoints, range).await else {
            return HoldingAnalysis {
                outcome: HoldingOutcome::Verdict(HoldingVerdict {
                    symbol: symbol.to_string(),
                    latest_close: None,
                    signal: BandSignal::Unavailable,
                }),
                bands: None,
            };
        };

        match evaluate(&series, self.params) {
            Ok((verdict, bands)) => {
                tracing::info!(
                    symbol,
                    signal = %verdict.signal,
                    latest_close = ?verdict.latest_close,
                    "holding evaluated"
                );
                HoldingAnalysis {
                    outcome: HoldingOutcome::Verdict(verdict),
                    bands: Some(bands),
                }
            }
            Err(err) => HoldingAnalysis {
                outcome: HoldingOutcome::Failed {
                    symbol: symbol.to_string(),
                    reason: format!("{err:#}"),
                },
                bands: None,
            },
        }
    }
}

/// Compares the most recent defined close with its band. A series too short for a single
/// band row is neutral.
pub fn evaluate(
    series: &PriceSeries,
    params: BandParams,
) -> anyhow::Result<(HoldingVerdict, BandSeries)> {
    let bands = compute_bands(series, params)?;
    let tail = bands.tail_defined(VERDICT_TAIL);

    let signal = match tail.last() {
        Some((p, band)) if p.close > band.upper => BandSignal::Overbought,
        Some((p, band)) if p.close < band.lower => BandSignal::Oversold,
        _ => BandSignal::Neutral,
    };

    let verdict = HoldingVerdict {
        symbol: series.symbol().to_string(),
        latest_close: series.last().map(|p| p.close),
        signal,
    };
    Ok((verdict, bands))
}
