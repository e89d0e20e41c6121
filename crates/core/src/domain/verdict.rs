use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandSignal {
    Overbought,
    Oversold,
    Neutral,
    Unavailable,
}

impl BandSignal {
    pub fn label(self) -> &'static str {
        match self {
            BandSignal::Overbought => "overbought (watch for pullback)",
            BandSignal::Oversold => "oversold (watch for rebound)",
            BandSignal::Neutral => "neutral",
            BandSignal::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for BandSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingVerdict {
    pub symbol: String,
    pub latest_close: Option<f64>,
    pub signal: BandSignal,
}

/// Outcome for one watchlist entry. A failure only ever covers its own symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HoldingOutcome {
    Verdict(HoldingVerdict),
    Failed { symbol: String, reason: String },
}

impl HoldingOutcome {
    pub fn symbol(&self) -> &str {
        match self {
            HoldingOutcome::Verdict(v) => &v.symbol,
            HoldingOutcome::Failed { symbol, .. } => symbol,
        }
    }
}
