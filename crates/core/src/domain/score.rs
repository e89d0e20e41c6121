use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeatTier {
    Overheated,
    Elevated,
    Cool,
}

impl HeatTier {
    pub fn label(self) -> &'static str {
        match self {
            HeatTier::Overheated => "overheated, consider trimming",
            HeatTier::Elevated => "elevated, stay alert",
            HeatTier::Cool => "cool, accumulation opportunity",
        }
    }
}

impl fmt::Display for HeatTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub liquidity: u8,
    pub valuation: u8,
    pub technical: u8,
    pub composite: u8,
    pub tier: HeatTier,
}
