use crate::config::BandParams;
use crate::domain::{Band, BandPoint, BandSeries, PriceSeries};

/// Volatility bands over a trailing window: simple moving average for the mid line and
/// `multiplier` sample standard deviations either side.
///
/// The first `window - 1` rows carry no band. A window longer than the series leaves every
/// row undefined, which is not an error.
pub fn compute_bands(series: &PriceSeries, params: BandParams) -> anyhow::Result<BandSeries> {
    let BandParams { window, multiplier } = params;
    anyhow::ensure!(window >= 2, "band window must be >= 2 (got {window})");
    anyhow::ensure!(
        multiplier.is_finite(),
        "band multiplier must be finite (got {multiplier})"
    );

    let closes: Vec<f64> = series.closes().collect();
    let points = series
        .points()
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let band = (i + 1 >= window).then(|| {
                let slice = &closes[i + 1 - window..=i];
                let (mid, sd) = mean_and_sample_std(slice);
                Band {
                    mid,
                    upper: mid + multiplier * sd,
                    lower: mid - multiplier * sd,
                }
            });
            BandPoint {
                date: p.date,
                close: p.close,
                band,
            }
        })
        .collect();

    Ok(BandSeries {
        window,
        multiplier,
        points,
    })
}

fn mean_and_sample_std(xs: &[f64]) -> (f64, f64) {
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PricePoint;
    use chrono::{Duration, NaiveDate};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        PriceSeries::new(
            "T",
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| PricePoint {
                    date: start + Duration::days(i as i64),
                    close: *c,
                })
                .collect(),
        )
    }

    fn window(window: usize) -> BandParams {
        BandParams {
            window,
            multiplier: 2.0,
        }
    }

    #[test]
    fn leading_rows_are_undefined_not_zero() {
        let bands = compute_bands(&series(&[1.0, 2.0, 3.0, 4.0]), window(3)).unwrap();
        assert!(bands.points[0].band.is_none());
        assert!(bands.points[1].band.is_none());
        assert!(bands.points[2].band.is_some());
        assert_eq!(bands.defined_len(), 2);
    }

    #[test]
    fn matches_hand_computed_sample_std() {
        // Window [2, 4, 6]: mean 4, sample variance 4, sd 2.
        let bands = compute_bands(&series(&[2.0, 4.0, 6.0]), window(3)).unwrap();
        let band = bands.points[2].band.unwrap();
        assert!((band.mid - 4.0).abs() < 1e-12);
        assert!((band.upper - 8.0).abs() < 1e-12);
        assert!((band.lower - 0.0).abs() < 1e-12);
    }

    #[test]
    fn short_series_has_no_defined_rows() {
        let bands = compute_bands(&series(&[1.0; 5]), BandParams::default()).unwrap();
        assert_eq!(bands.points.len(), 5);
        assert!(bands.points.iter().all(|p| p.band.is_none()));
    }

    #[test]
    fn flat_series_collapses_band_onto_close() {
        let bands = compute_bands(&series(&[10.0; 25]), BandParams::default()).unwrap();
        let (_, band) = bands.tail_defined(1)[0];
        assert_eq!(band.upper, 10.0);
        assert_eq!(band.lower, 10.0);
    }

    #[test]
    fn rejects_degenerate_window() {
        assert!(compute_bands(&series(&[1.0, 2.0]), window(1)).is_err());
    }
}
