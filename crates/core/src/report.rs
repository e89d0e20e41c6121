//! Plain-text report in a fixed line order.

use crate::domain::{HoldingOutcome, ScoreBreakdown};
use chrono::NaiveDateTime;

/// Ordered, append-only report lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    lines: Vec<String>,
}

impl Report {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn finalize(&self) -> String {
        self.lines.join("\n")
    }
}

/// Timestamp, the five score lines, then one line per holding in watchlist order.
pub fn assemble_report(
    generated_at: NaiveDateTime,
    index_label: &str,
    scores: &ScoreBreakdown,
    index_available: bool,
    holdings: &[HoldingOutcome],
) -> Report {
    let mut report = Report::default();

    report.push(format!(
        "Market heat check @ {}",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    report.push(format!("Liquidity score: {}/100", scores.liquidity));
    report.push(format!("Valuation score: {}/100", scores.valuation));
    if index_available {
        report.push(format!(
            "Technical score ({index_label}): {}/100",
            scores.technical
        ));
    } else {
        report.push(format!(
            "Technical score ({index_label}): {}/100 (index data unavailable)",
            scores.technical
        ));
    }
    report.push(format!("Composite heat score: {}/100", scores.composite));
    report.push(format!("Classification: {}", scores.tier));

    for outcome in holdings {
        report.push(holding_line(outcome));
    }
    report
}

fn holding_line(outcome: &HoldingOutcome) -> String {
    match outcome {
        HoldingOutcome::Verdict(v) => {
            let close = v
                .latest_close
                .map(|c| format!("{c:.2}"))
                .unwrap_or_else(|| "N/A".to_string());
            format!("{}: {} (latest close {close})", v.symbol, v.signal)
        }
        HoldingOutcome::Failed { symbol, reason } => {
            format!("{symbol}: analysis failed: {reason}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BandSignal, HeatTier, HoldingVerdict};
    use chrono::NaiveDate;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 14)
            .unwrap()
            .and_hms_opt(15, 30, 0)
            .unwrap()
    }

    fn scores() -> ScoreBreakdown {
        ScoreBreakdown {
            liquidity: 80,
            valuation: 60,
            technical: 20,
            composite: 55,
            tier: HeatTier::Elevated,
        }
    }

    #[test]
    fn lines_follow_fixed_order() {
        let holdings = vec![
            HoldingOutcome::Verdict(HoldingVerdict {
                symbol: "300502.SZ".to_string(),
                latest_close: Some(123.456),
                signal: BandSignal::Overbought,
            }),
            HoldingOutcome::Verdict(HoldingVerdict {
                symbol: "002463.SZ".to_string(),
                latest_close: None,
                signal: BandSignal::Unavailable,
            }),
            HoldingOutcome::Failed {
                symbol: "603606.SH".to_string(),
                reason: "band window must be >= 2 (got 0)".to_string(),
            },
        ];

        let report = assemble_report(at(), "CSI 500", &scores(), true, &holdings);
        assert_eq!(
            report.lines(),
            &[
                "Market heat check @ 2025-03-14 15:30:00",
                "Liquidity score: 80/100",
                "Valuation score: 60/100",
                "Technical score (CSI 500): 20/100",
                "Composite heat score: 55/100",
                "Classification: elevated, stay alert",
                "300502.SZ: overbought (watch for pullback) (latest close 123.46)",
                "002463.SZ: unavailable (latest close N/A)",
                "603606.SH: analysis failed: band window must be >= 2 (got 0)",
            ]
        );
        assert_eq!(report.finalize().lines().count(), 9);
    }

    #[test]
    fn notes_missing_index_data() {
        let report = assemble_report(at(), "CSI 500", &scores(), false, &[]);
        assert_eq!(report.lines().len(), 6);
        assert!(report.lines()[3].ends_with("(index data unavailable)"));
    }
}
