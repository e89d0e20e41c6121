use serde::{Deserialize, Serialize};

/// Liquidity inputs. `None` means the provider gave nothing usable, which is not zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroSnapshot {
    /// Year-over-year M2 growth, percent.
    pub money_supply_growth: Option<f64>,
    /// Year-over-year social-financing stock growth, percent.
    pub social_financing_growth: Option<f64>,
    /// Net cross-border (northbound) inflow summed over the recent window, provider units.
    pub net_cross_border_flow: Option<f64>,
}

impl MacroSnapshot {
    pub fn is_empty(&self) -> bool {
        self.money_supply_growth.is_none()
            && self.social_financing_growth.is_none()
            && self.net_cross_border_flow.is_none()
    }
}

/// Index valuation. Percentiles are fractions in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    pub pe_ttm: Option<f64>,
    pub pb: Option<f64>,
    pub pe_percentile: Option<f64>,
    pub pb_percentile: Option<f64>,
}
