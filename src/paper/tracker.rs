//! Summary statistics over simulated equity outcomes.
//! All functions are pure -- they take values and return computed figures.

use smallvec::SmallVec;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PercentileValue {
    pub percentile: f64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EquityStats {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (N - 1). Zero for a single observation.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Share of runs ending below the starting equity.
    pub probability_of_loss: f64,
    pub percentiles: SmallVec<[PercentileValue; 8]>,
    /// Largest peak-to-trough fall of the cumulative equity curve.
    pub max_drawdown: f64,
}

/// Compute statistics for terminal equities. `values` is left in generation
/// order; percentiles read a sorted copy.
pub fn summarize(values: &[f64], starting_equity: f64, percentiles: &[f64], curve: &[f64]) -> EquityStats {
    let n = values.len();
    let mean = mean(values);
    let std_dev = sample_std(values, mean);

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let losses = values.iter().filter(|&&v| v < starting_equity).count();
    let probability_of_loss = if n == 0 { 0.0 } else { losses as f64 / n as f64 };

    let percentiles = percentiles
        .iter()
        .map(|&p| PercentileValue {
            percentile: p,
            value: percentile_sorted(&sorted, p),
        })
        .collect();

    EquityStats {
        count: n,
        mean,
        std_dev,
        min: sorted.first().copied().unwrap_or(0.0),
        max: sorted.last().copied().unwrap_or(0.0),
        probability_of_loss,
        percentiles,
        max_drawdown: max_drawdown(starting_equity, curve),
    }
}

#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let ss = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    (ss / (n as f64 - 1.0)).sqrt()
}

/// Linear interpolation between order statistics. `p` in [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => return 0.0,
        1 => return sorted[0],
        _ => {}
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Account equity after each trade: start + running sum of per-trade P&L.
pub fn equity_curve(starting_equity: f64, pnls: impl IntoIterator<Item = f64>) -> Vec<f64> {
    pnls.into_iter()
        .scan(starting_equity, |equity, pnl| {
            *equity += pnl;
            Some(*equity)
        })
        .collect()
}

pub fn max_drawdown(starting_equity: f64, curve: &[f64]) -> f64 {
    let mut peak = starting_equity;
    let mut worst = 0.0_f64;
    for &equity in curve {
        if equity > peak {
            peak = equity;
        }
        let dd = peak - equity;
        if dd > worst {
            worst = dd;
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_percentiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_sorted(&sorted, 25.0), 2.0);
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert_eq!(percentile_sorted(&sorted, 100.0), 5.0);
        assert_relative_eq!(percentile_sorted(&sorted, 10.0), 1.4, epsilon = 1e-12);
        assert_eq!(percentile_sorted(&[7.0], 95.0), 7.0);
    }

    #[test]
    fn test_summary_keeps_input_order() {
        let values = [110.0, 90.0, 100.0, 130.0];
        let curve = equity_curve(100.0, values.iter().map(|v| v - 100.0));
        let stats = summarize(&values, 100.0, &[50.0], &curve);

        assert_eq!(values, [110.0, 90.0, 100.0, 130.0]);
        assert_eq!(stats.count, 4);
        assert_relative_eq!(stats.mean, 107.5, epsilon = 1e-12);
        // deviations 2.5, -17.5, -7.5, 22.5 -> ss = 875, /3
        assert_relative_eq!(stats.std_dev, (875.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_eq!(stats.min, 90.0);
        assert_eq!(stats.max, 130.0);
        assert_eq!(stats.probability_of_loss, 0.25);
        assert_eq!(stats.percentiles[0].value, 105.0);
    }

    #[test]
    fn test_single_value_std_is_zero() {
        let stats = summarize(&[42.0], 40.0, &[5.0, 95.0], &[42.0]);
        assert_eq!(stats.std_dev, 0.0);
        assert_eq!(stats.percentiles[1].value, 42.0);
        assert_eq!(stats.probability_of_loss, 0.0);
    }

    #[test]
    fn test_curve_and_drawdown() {
        let curve = equity_curve(0.0, [10.0, -30.0, 5.0, 40.0, -10.0]);
        assert_eq!(curve, vec![10.0, -20.0, -15.0, 25.0, 15.0]);
        assert_eq!(max_drawdown(0.0, &curve), 30.0);
        assert_eq!(max_drawdown(0.0, &[1.0, 2.0, 3.0]), 0.0);
    }
}
