use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api/public";
const DEFAULT_OUTPUT_DIR: &str = "./market_heat_output";

#[derive(Debug, Clone)]
pub struct Settings {
    pub data_provider_base_url: Option<String>,
    pub sentry_dsn: Option<String>,
    pub output_dir: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            data_provider_base_url: std::env::var("DATA_PROVIDER_BASE_URL").ok(),
            sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            output_dir: std::env::var("HEAT_OUTPUT_DIR").ok(),
        })
    }

    pub fn data_provider_base_url(&self) -> &str {
        self.data_provider_base_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(
            self.output_dir
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(DEFAULT_OUTPUT_DIR),
        )
    }
}

/// Closed normalization interval used by `scoring::map_linear`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearRange {
    pub lo: f64,
    pub hi: f64,
}

impl LinearRange {
    pub const fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub liquidity: f64,
    pub valuation: f64,
    pub technical: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            liquidity: 0.35,
            valuation: 0.35,
            technical: 0.30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandParams {
    pub window: usize,
    pub multiplier: f64,
}

impl Default for BandParams {
    fn default() -> Self {
        Self {
            window: 20,
            multiplier: 2.0,
        }
    }
}

/// Heuristic scoring constants. The ranges have no documented derivation and are kept
/// configurable rather than re-fitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub money_supply_range: LinearRange,
    pub social_financing_range: LinearRange,
    pub net_flow_range: LinearRange,
    pub weights: Weights,
    pub overheated_at: u8,
    pub elevated_at: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            money_supply_range: LinearRange::new(6.0, 14.0),
            social_financing_range: LinearRange::new(8.0, 16.0),
            net_flow_range: LinearRange::new(0.0, 1000.0),
            weights: Weights::default(),
            overheated_at: 75,
            elevated_at: 55,
        }
    }
}

/// One price-history endpoint of the provider gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesEndpoint {
    pub path: String,
    /// Whether the endpoint accepts `start_date`/`end_date` (YYYYMMDD) parameters.
    #[serde(default)]
    pub ranged: bool,
    #[serde(default)]
    pub extra_params: Vec<(String, String)>,
}

impl SeriesEndpoint {
    pub fn new(path: &str, ranged: bool, extra_params: &[(&str, &str)]) -> Self {
        Self {
            path: path.to_string(),
            ranged,
            extra_params: extra_params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// A snapshot endpoint called with fixed parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointCall {
    pub path: String,
    #[serde(default)]
    pub params: Vec<(String, String)>,
}

impl EndpointCall {
    pub fn new(path: &str, params: &[(&str, &str)]) -> Self {
        Self {
            path: path.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub equity_series: Vec<SeriesEndpoint>,
    pub index_series: Vec<SeriesEndpoint>,
    pub money_supply: EndpointCall,
    pub social_financing: EndpointCall,
    pub net_flow: EndpointCall,
    /// Called with `symbol` set to the bare index code.
    pub valuation_quote: EndpointCall,
    /// Called with `symbol` set to the bare index code.
    pub valuation_percentile: EndpointCall,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            equity_series: vec![SeriesEndpoint::new(
                "stock_zh_a_hist",
                true,
                &[("period", "daily"), ("adjust", "qfq")],
            )],
            index_series: vec![
                SeriesEndpoint::new("stock_zh_index_daily", false, &[]),
                SeriesEndpoint::new("index_zh_a_hist", true, &[("period", "daily")]),
            ],
            money_supply: EndpointCall::new("macro_china_money_supply", &[]),
            social_financing: EndpointCall::new("macro_china_shrzgm", &[]),
            net_flow: EndpointCall::new("stock_hsgt_hist_em", &[("symbol", "北向资金")]),
            valuation_quote: EndpointCall::new("stock_zh_index_value_csindex", &[]),
            valuation_percentile: EndpointCall::new("index_value_percentile", &[]),
        }
    }
}

/// Static run profile: what to score and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatProfile {
    pub index_symbol: String,
    pub index_label: String,
    pub holdings: Vec<String>,
    pub lookback_days: i64,
    pub net_flow_days: usize,
    pub bands: BandParams,
    pub scoring: ScoringConfig,
    pub endpoints: Endpoints,
}

impl Default for HeatProfile {
    fn default() -> Self {
        Self {
            index_symbol: "000905.SH".to_string(),
            index_label: "CSI 500".to_string(),
            holdings: [
                "300502.SZ",
                "300308.SZ",
                "603063.SH",
                "002463.SZ",
                "603606.SH",
                "002487.SZ",
                "300395.SZ",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            lookback_days: 90,
            net_flow_days: 5,
            bands: BandParams::default(),
            scoring: ScoringConfig::default(),
            endpoints: Endpoints::default(),
        }
    }
}

impl HeatProfile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read profile {}", path.display()))?;
        let profile: Self = serde_json::from_str(&text)
            .with_context(|| format!("profile {} is not valid JSON", path.display()))?;
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            !self.index_symbol.trim().is_empty(),
            "index_symbol must be non-empty"
        );
        anyhow::ensure!(
            self.lookback_days > 0,
            "lookback_days must be positive (got {})",
            self.lookback_days
        );
        anyhow::ensure!(self.net_flow_days >= 1, "net_flow_days must be >= 1");
        anyhow::ensure!(
            self.bands.window >= 2,
            "band window must be >= 2 (got {})",
            self.bands.window
        );
        anyhow::ensure!(
            self.bands.multiplier.is_finite() && self.bands.multiplier > 0.0,
            "band multiplier must be finite and positive (got {})",
            self.bands.multiplier
        );

        let s = &self.scoring;
        let w = s.weights;
        anyhow::ensure!(
            w.liquidity >= 0.0 && w.valuation >= 0.0 && w.technical >= 0.0,
            "weights must be non-negative: {w:?}"
        );
        let sum = w.liquidity + w.valuation + w.technical;
        anyhow::ensure!(
            (sum - 1.0).abs() <= 1e-9,
            "weights must sum to 1.0 (got {sum})"
        );
        for (name, range) in [
            ("money_supply_range", s.money_supply_range),
            ("social_financing_range", s.social_financing_range),
            ("net_flow_range", s.net_flow_range),
        ] {
            anyhow::ensure!(
                range.lo < range.hi,
                "{name} must have lo < hi (got {} .. {})",
                range.lo,
                range.hi
            );
        }
        anyhow::ensure!(
            s.elevated_at <= s.overheated_at && s.overheated_at <= 100,
            "tier thresholds must satisfy elevated_at <= overheated_at <= 100"
        );
        anyhow::ensure!(
            !self.endpoints.equity_series.is_empty() && !self.endpoints.index_series.is_empty(),
            "at least one equity and one index series endpoint is required"
        );
        Ok(())
    }
}
