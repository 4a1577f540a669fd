//! Derived series: the compounding monthly accumulation and the
//! decaying magnitude histogram.

use crate::{
    config::{HistogramConfig, MonthlyConfig, MAX_HISTOGRAM_BINS, MAX_MONTHS},
    error::{EngineError, EngineResult},
    types::{PeriodIndex, Pct},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPoint {
    pub period_index: PeriodIndex,
    pub cumulative_share_pct: Pct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub bucket_label: String,
    pub count: u32,
}

/// Period values start at `start_value` and grow by a rate that itself
/// decays each period. Each point is the running total as a share of
/// the grand total, so the final period is exactly 100.
pub fn monthly_series(months: u32, params: &MonthlyConfig) -> EngineResult<Vec<MonthlyPoint>> {
    if months == 0 {
        return Err(EngineError::config("months", "must be positive"));
    }
    if months > MAX_MONTHS {
        return Err(EngineError::config(
            "months",
            format!("{months} exceeds the limit of {MAX_MONTHS}"),
        ));
    }

    let mut values = Vec::with_capacity(months as usize);
    let mut value = params.start_value;
    let mut rate = params.initial_rate;
    for _ in 0..months {
        values.push(value);
        value *= 1.0 + rate;
        rate *= params.rate_decay;
    }

    let total: f64 = values.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(EngineError::DegenerateDistribution { total });
    }

    let mut running = 0.0;
    let mut series: Vec<MonthlyPoint> = values
        .iter()
        .zip(1..)
        .map(|(v, period_index)| {
            running += v;
            MonthlyPoint {
                period_index,
                cumulative_share_pct: running / total * 100.0,
            }
        })
        .collect();

    if let Some(last) = series.last_mut() {
        last.cumulative_share_pct = 100.0;
    }
    Ok(series)
}

/// Bucket thresholds grow geometrically; counts decay geometrically,
/// rounded, and always drop by at least one per bin. A count never
/// falls below the number of bins still to come, so the last bin is
/// the first that may reach the floor of 1.
pub fn histogram(bins: u32, params: &HistogramConfig) -> EngineResult<Vec<HistogramBin>> {
    if bins == 0 {
        return Err(EngineError::config("histogramBins", "must be positive"));
    }
    if bins > MAX_HISTOGRAM_BINS {
        return Err(EngineError::config(
            "histogramBins",
            format!("{bins} exceeds the limit of {MAX_HISTOGRAM_BINS}"),
        ));
    }
    if params.start_count < bins {
        return Err(EngineError::config(
            "histogram.startCount",
            format!(
                "{} cannot decrease strictly across histogramBins = {bins}",
                params.start_count
            ),
        ));
    }

    let mut out = Vec::with_capacity(bins as usize);
    let mut count = params.start_count;
    let mut bucket = params.start_bucket;
    for i in 0..bins {
        out.push(HistogramBin {
            bucket_label: format_bucket(bucket),
            count,
        });
        // Leave room for one count per remaining bin.
        let floor = (bins - i - 1).max(1);
        let decayed = (count as f64 * params.count_decay).round() as u32;
        count = decayed.min(count.saturating_sub(1)).max(floor);
        bucket *= params.bucket_growth;
    }
    Ok(out)
}

fn format_bucket(threshold: f64) -> String {
    if threshold >= 100.0 {
        format!("{threshold:.0}")
    } else if threshold >= 10.0 {
        format!("{threshold:.1}")
    } else {
        format!("{threshold:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_labels_narrow_precision_as_they_grow() {
        assert_eq!(format_bucket(0.25), "0.25");
        assert_eq!(format_bucket(12.345), "12.3");
        assert_eq!(format_bucket(250.4), "250");
    }

    #[test]
    fn histogram_matches_hand_computed_counts() {
        let bins = histogram(12, &HistogramConfig::default()).unwrap();
        let counts: Vec<u32> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![140, 101, 73, 53, 38, 27, 19, 14, 10, 7, 5, 4]);
        assert_eq!(bins[0].bucket_label, "0.25");
    }

    #[test]
    fn shallow_decay_still_drops_by_one() {
        let params = HistogramConfig {
            start_count: 6,
            count_decay: 0.99,
            ..Default::default()
        };
        let counts: Vec<u32> = histogram(6, &params)
            .unwrap()
            .iter()
            .map(|b| b.count)
            .collect();
        assert_eq!(counts, vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn zero_periods_is_a_configuration_error() {
        assert!(matches!(
            monthly_series(0, &MonthlyConfig::default()),
            Err(EngineError::Configuration { field: "months", .. })
        ));
        assert!(matches!(
            histogram(0, &HistogramConfig::default()),
            Err(EngineError::Configuration { field: "histogramBins", .. })
        ));
    }

    #[test]
    fn oversized_series_are_refused_before_allocating() {
        assert!(matches!(
            monthly_series(u32::MAX, &MonthlyConfig::default()),
            Err(EngineError::Configuration { field: "months", .. })
        ));
        let params = HistogramConfig {
            start_count: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            histogram(u32::MAX, &params),
            Err(EngineError::Configuration { field: "histogramBins", .. })
        ));
    }
}
