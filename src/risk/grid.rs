use crate::errors::{ensure_finite, ensure_positive, EngineError, EngineResult};
use crate::models::black_scholes::PricingEngine;
use crate::models::{OptionKind, OptionSpec, Position};
use rayon::prelude::*;

/// Axes and entry cost for a spot x volatility P&L sweep.
///
/// Axis order is preserved exactly; rows follow `vol_values`, columns follow
/// `spot_values`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GridSpec {
    pub spot_values: Vec<f64>,
    pub vol_values: Vec<f64>,
    pub entry_premium: f64,
    #[serde(default)]
    pub position: Position,
}

impl GridSpec {
    pub fn new(spot_values: Vec<f64>, vol_values: Vec<f64>, entry_premium: f64, position: Position) -> Self {
        Self {
            spot_values,
            vol_values,
            entry_premium,
            position,
        }
    }

    /// `points` evenly spaced values from `min` to `max`, both ends included.
    pub fn linspace(field: &'static str, min: f64, max: f64, points: usize) -> EngineResult<Vec<f64>> {
        ensure_finite(field, min)?;
        ensure_finite(field, max)?;
        if points == 0 {
            return Err(EngineError::invalid(field, points, "need at least one point"));
        }
        if max < min {
            return Err(EngineError::invalid(field, format!("{min}..{max}"), "max must be >= min"));
        }
        if points == 1 {
            return Ok(vec![min]);
        }
        let step = (max - min) / (points - 1) as f64;
        let mut values: Vec<f64> = (0..points).map(|i| min + step * i as f64).collect();
        // Pin the last point so rounding never drifts past max
        values[points - 1] = max;
        Ok(values)
    }

    fn validate(&self) -> EngineResult<()> {
        if self.spot_values.is_empty() {
            return Err(EngineError::invalid("spot_values", "[]", "must not be empty"));
        }
        if self.vol_values.is_empty() {
            return Err(EngineError::invalid("vol_values", "[]", "must not be empty"));
        }
        for &spot in &self.spot_values {
            ensure_positive("spot_values", spot)?;
        }
        for &vol in &self.vol_values {
            ensure_positive("vol_values", vol)?;
        }
        ensure_finite("entry_premium", self.entry_premium)?;
        if self.entry_premium < 0.0 {
            return Err(EngineError::invalid("entry_premium", self.entry_premium, "must be >= 0"));
        }
        Ok(())
    }
}

/// Signed P&L matrix plus the axis labels a heatmap needs.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PnlGrid {
    pub kind: OptionKind,
    pub position: Position,
    pub entry_premium: f64,
    pub spot_values: Vec<f64>,
    pub vol_values: Vec<f64>,
    /// `cells[i][j]` is the P&L at `vol_values[i]`, `spot_values[j]`.
    pub cells: Vec<Vec<f64>>,
}

impl PnlGrid {
    /// (rows, cols) = (|vol_values|, |spot_values|)
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.vol_values.len(), self.spot_values.len())
    }
}

/// Sweeps spot and volatility through the pricing engine.
///
/// Each cell is an independent pure pricing call; rows run on the rayon pool
/// and are collected back in input order.
#[derive(Debug, Clone, Default)]
pub struct GridEvaluator {
    engine: PricingEngine,
}

impl GridEvaluator {
    pub fn new(engine: PricingEngine) -> Self {
        Self { engine }
    }

    pub fn evaluate(&self, spec: &OptionSpec, grid: &GridSpec) -> EngineResult<PnlGrid> {
        grid.validate()?;

        let sign = grid.position.sign();
        let premium = grid.entry_premium;

        let cells = grid
            .vol_values
            .par_iter()
            .map(|&vol| {
                grid.spot_values
                    .iter()
                    .map(|&spot| {
                        let cell = spec.with_spot(spot).with_volatility(vol);
                        self.engine.value(&cell).map(|price| sign * (price - premium))
                    })
                    .collect::<EngineResult<Vec<f64>>>()
            })
            .collect::<EngineResult<Vec<Vec<f64>>>>()?;

        let result = PnlGrid {
            kind: spec.kind,
            position: grid.position,
            entry_premium: premium,
            spot_values: grid.spot_values.clone(),
            vol_values: grid.vol_values.clone(),
            cells,
        };
        let (rows, cols) = result.shape();
        tracing::debug!(kind = %spec.kind, rows, cols, premium, "pnl grid evaluated");
        Ok(result)
    }

    /// Long call and long put grids over the same axes, each against its own
    /// market quote.
    pub fn evaluate_call_put(
        &self,
        spec: &OptionSpec,
        spot_values: Vec<f64>,
        vol_values: Vec<f64>,
        call_premium: f64,
        put_premium: f64,
    ) -> EngineResult<(PnlGrid, PnlGrid)> {
        let call_grid = GridSpec::new(spot_values, vol_values, call_premium, Position::Long);
        let call = self.evaluate(&spec.with_kind(OptionKind::Call), &call_grid)?;

        let put_grid = GridSpec {
            entry_premium: put_premium,
            ..call_grid
        };
        let put = self.evaluate(&spec.with_kind(OptionKind::Put), &put_grid)?;
        Ok((call, put))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn spec() -> OptionSpec {
        OptionSpec::new(100.0, 100.0, 1.0, 0.3, 0.05, OptionKind::Call)
    }

    #[test]
    fn test_shape_and_axis_orientation() {
        let evaluator = GridEvaluator::default();
        let spots = vec![80.0, 90.0, 100.0, 110.0, 120.0];
        let vols = vec![0.1, 0.15, 0.2, 0.25, 0.3, 0.35, 0.4];
        let grid = GridSpec::new(spots.clone(), vols.clone(), 10.0, Position::Long);
        let result = evaluator.evaluate(&spec(), &grid).unwrap();

        assert_eq!(result.shape(), (7, 5));
        assert_eq!(result.cells.len(), 7);
        assert!(result.cells.iter().all(|row| row.len() == 5));

        let engine = PricingEngine::new();
        for (i, &vol) in vols.iter().enumerate() {
            for (j, &spot) in spots.iter().enumerate() {
                let expected = engine.value(&spec().with_spot(spot).with_volatility(vol)).unwrap() - 10.0;
                assert_relative_eq!(result.cells[i][j], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_caller_order_preserved() {
        let evaluator = GridEvaluator::default();
        let spots = vec![120.0, 80.0, 100.0];
        let vols = vec![0.4, 0.1];
        let grid = GridSpec::new(spots.clone(), vols.clone(), 0.0, Position::Long);
        let result = evaluator.evaluate(&spec(), &grid).unwrap();
        assert_eq!(result.spot_values, spots);
        assert_eq!(result.vol_values, vols);
        // Call value rises with spot, so the first column (120) beats the second (80)
        assert!(result.cells[0][0] > result.cells[0][1]);
        // Higher vol row comes first
        assert!(result.cells[0][2] > result.cells[1][2]);
    }

    #[test]
    fn test_short_flips_sign() {
        let evaluator = GridEvaluator::default();
        let long = GridSpec::new(vec![90.0, 110.0], vec![0.2, 0.3], 12.0, Position::Long);
        let short = GridSpec {
            position: Position::Short,
            ..long.clone()
        };
        let a = evaluator.evaluate(&spec(), &long).unwrap();
        let b = evaluator.evaluate(&spec(), &short).unwrap();
        for (ra, rb) in a.cells.iter().zip(&b.cells) {
            for (x, y) in ra.iter().zip(rb) {
                assert_eq!(*x, -*y);
            }
        }
    }

    #[test]
    fn test_rejects_bad_axes() {
        let evaluator = GridEvaluator::default();
        let zero_vol = GridSpec::new(vec![100.0], vec![0.2, 0.0], 1.0, Position::Long);
        assert_eq!(evaluator.evaluate(&spec(), &zero_vol).unwrap_err().field(), Some("vol_values"));

        let neg_spot = GridSpec::new(vec![-1.0], vec![0.2], 1.0, Position::Long);
        assert_eq!(evaluator.evaluate(&spec(), &neg_spot).unwrap_err().field(), Some("spot_values"));

        let empty = GridSpec::new(vec![], vec![0.2], 1.0, Position::Long);
        assert!(evaluator.evaluate(&spec(), &empty).is_err());

        let bad_premium = GridSpec::new(vec![100.0], vec![0.2], -3.0, Position::Long);
        assert_eq!(
            evaluator.evaluate(&spec(), &bad_premium).unwrap_err().field(),
            Some("entry_premium")
        );
    }

    #[test]
    fn test_base_spec_errors_propagate() {
        let evaluator = GridEvaluator::default();
        let grid = GridSpec::new(vec![100.0], vec![0.2], 1.0, Position::Long);
        let bad = spec().with_maturity(-1.0);
        assert_eq!(evaluator.evaluate(&bad, &grid).unwrap_err().field(), Some("time_to_maturity"));
    }

    #[test]
    fn test_linspace() {
        let v = GridSpec::linspace("spot", 80.0, 120.0, 5).unwrap();
        assert_eq!(v, vec![80.0, 90.0, 100.0, 110.0, 120.0]);
        assert_eq!(GridSpec::linspace("spot", 5.0, 5.0, 1).unwrap(), vec![5.0]);
        let ten = GridSpec::linspace("vol", 0.15, 0.45, 10).unwrap();
        assert_eq!(ten.len(), 10);
        assert_eq!(ten[0], 0.15);
        assert_eq!(ten[9], 0.45);
        assert!(GridSpec::linspace("vol", 0.5, 0.1, 3).is_err());
        assert!(GridSpec::linspace("vol", 0.1, 0.5, 0).is_err());
    }

    #[test]
    fn test_call_put_pair() {
        let evaluator = GridEvaluator::default();
        let (call, put) = evaluator
            .evaluate_call_put(&spec(), vec![90.0, 100.0, 110.0], vec![0.2, 0.3], 14.1, 9.2)
            .unwrap();
        assert_eq!(call.kind, OptionKind::Call);
        assert_eq!(put.kind, OptionKind::Put);
        assert_eq!(call.entry_premium, 14.1);
        assert_eq!(put.entry_premium, 9.2);
        // At spot 100, vol 0.3 the call is worth ~14.23 and the put ~9.35
        assert_relative_eq!(call.cells[1][1], 14.231254785985826 - 14.1, epsilon = 1e-6);
        assert_relative_eq!(put.cells[1][1], 9.354197236057232 - 9.2, epsilon = 1e-6);
    }
}
