use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Daily closes with strictly increasing dates. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date and keeps the last row seen for a duplicated date.
    /// Non-finite closes are dropped.
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.retain(|p| p.close.is_finite());
        points.sort_by_key(|p| p.date);

        let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
        for p in points {
            match out.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => out.push(p),
            }
        }

        Self {
            symbol: symbol.into(),
            points: out,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.close)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub mid: f64,
    pub upper: f64,
    pub lower: f64,
}

/// One row of a band series: the close for `date` and, once the trailing window is
/// full, its band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandPoint {
    pub date: NaiveDate,
    pub close: f64,
    pub band: Option<Band>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandSeries {
    pub window: usize,
    pub multiplier: f64,
    pub points: Vec<BandPoint>,
}

impl BandSeries {
    pub fn defined(&self) -> impl DoubleEndedIterator<Item = (&BandPoint, Band)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.band.map(|band| (p, band)))
    }

    /// The last `n` defined rows, oldest first.
    pub fn tail_defined(&self, n: usize) -> Vec<(BandPoint, Band)> {
        let mut out: Vec<_> = self.defined().rev().take(n).map(|(p, b)| (*p, b)).collect();
        out.reverse();
        out
    }

    pub fn defined_len(&self) -> usize {
        self.defined().count()
    }
}
