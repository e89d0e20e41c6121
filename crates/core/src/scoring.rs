//! Pure mapping from snapshots and bands to 0-100 sub-scores and the composite heat index.
//!
//! Every function here is total: any mix of present and absent inputs yields a score in
//! [0, 100].

use crate::config::{ScoringConfig, Weights};
use crate::domain::{BandSeries, HeatTier, MacroSnapshot, ScoreBreakdown, ValuationSnapshot};

pub const NEUTRAL_SCORE: u8 = 50;

const TECH_OVERHEATED: u8 = 20;
const TECH_CALM: u8 = 60;
const TECH_TAIL: usize = 5;

/// Linear rescale of `value` from `[lo, hi]` onto `[0, 100]`, clamped. `None` when the
/// value is absent or not finite, or the range is empty.
pub fn map_linear(value: Option<f64>, lo: f64, hi: f64) -> Option<f64> {
    let v = value.filter(|v| v.is_finite())?;
    if hi == lo || !lo.is_finite() || !hi.is_finite() {
        return None;
    }
    Some(((v - lo) / (hi - lo) * 100.0).clamp(0.0, 100.0))
}

fn to_score(x: f64) -> u8 {
    if x.is_nan() {
        return NEUTRAL_SCORE;
    }
    x.clamp(0.0, 100.0) as u8
}

/// Equal-weight mean of whichever liquidity inputs are present (higher = looser).
pub fn liquidity_score(snapshot: &MacroSnapshot, cfg: &ScoringConfig) -> u8 {
    let parts: Vec<f64> = [
        (snapshot.money_supply_growth, cfg.money_supply_range),
        (snapshot.social_financing_growth, cfg.social_financing_range),
        (snapshot.net_cross_border_flow, cfg.net_flow_range),
    ]
    .into_iter()
    .filter_map(|(v, r)| map_linear(v, r.lo, r.hi))
    .collect();

    if parts.is_empty() {
        return NEUTRAL_SCORE;
    }
    to_score(parts.iter().sum::<f64>() / parts.len() as f64)
}

/// Piecewise map of an average valuation percentile: cheaper scores higher.
pub fn valuation_curve(avg_pct: f64) -> f64 {
    let p = avg_pct.clamp(0.0, 1.0);
    if p < 0.5 {
        70.0 + (0.5 - p) / 0.5 * 30.0
    } else if p < 0.7 {
        50.0 + (0.7 - p) / 0.2 * 20.0
    } else {
        (50.0 - (p - 0.7) / 0.3 * 50.0).max(0.0)
    }
}

pub fn valuation_score(snapshot: &ValuationSnapshot) -> u8 {
    let pcts: Vec<f64> = [snapshot.pe_percentile, snapshot.pb_percentile]
        .into_iter()
        .flatten()
        .filter(|p| p.is_finite())
        .collect();

    if pcts.is_empty() {
        return NEUTRAL_SCORE;
    }
    let avg = pcts.iter().sum::<f64>() / pcts.len() as f64;
    to_score(valuation_curve(avg))
}

/// Two consecutive closes above the upper band read as short-term overheating.
pub fn technical_score(bands: Option<&BandSeries>) -> u8 {
    let Some(bands) = bands else {
        return NEUTRAL_SCORE;
    };

    let tail = bands.tail_defined(TECH_TAIL);
    if tail.len() < 2 {
        return NEUTRAL_SCORE;
    }

    let above = |i: usize| {
        let (p, band) = tail[i];
        p.close > band.upper
    };
    let n = tail.len();
    if above(n - 1) && above(n - 2) {
        TECH_OVERHEATED
    } else {
        TECH_CALM
    }
}

/// Weighted sum truncated to an integer.
pub fn composite_score(liquidity: u8, valuation: u8, technical: u8, weights: &Weights) -> u8 {
    let sum = weights.liquidity * f64::from(liquidity)
        + weights.valuation * f64::from(valuation)
        + weights.technical * f64::from(technical);
    to_score(sum.floor())
}

/// Thresholds are inclusive; a tie goes to the hotter tier.
pub fn classify(composite: u8, cfg: &ScoringConfig) -> HeatTier {
    if composite >= cfg.overheated_at {
        HeatTier::Overheated
    } else if composite >= cfg.elevated_at {
        HeatTier::Elevated
    } else {
        HeatTier::Cool
    }
}

pub fn score_all(
    macro_snapshot: &MacroSnapshot,
    valuation: &ValuationSnapshot,
    index_bands: Option<&BandSeries>,
    cfg: &ScoringConfig,
) -> ScoreBreakdown {
    let liquidity = liquidity_score(macro_snapshot, cfg);
    let valuation = valuation_score(valuation);
    let technical = technical_score(index_bands);
    let composite = composite_score(liquidity, valuation, technical, &cfg.weights);

    ScoreBreakdown {
        liquidity,
        valuation,
        technical,
        composite,
        tier: classify(composite, cfg),
    }
}
