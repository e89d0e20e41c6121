pub mod score;
pub mod series;
pub mod snapshot;
pub mod verdict;

pub use score::{HeatTier, ScoreBreakdown};
pub use series::{Band, BandPoint, BandSeries, PricePoint, PriceSeries};
pub use snapshot::{MacroSnapshot, ValuationSnapshot};
pub use verdict::{BandSignal, HoldingOutcome, HoldingVerdict};
