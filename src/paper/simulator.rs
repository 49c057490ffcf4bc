use crate::errors::{ensure_finite, EngineError, EngineResult};
use crate::models::black_scholes::PricingEngine;
use crate::models::gbm::{run_rng, PathSimulator};
use crate::models::{OptionSpec, Position};
use crate::paper::strategy::Strategy;
use crate::paper::tracker::{self, EquityStats};
use rayon::prelude::*;
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;
use std::time::Instant;

/// How the independent runs are scheduled. Both modes yield identical output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    Sequential,
    #[default]
    Parallel,
}

/// Everything one Monte Carlo equity study needs. Read-only during a run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    pub paths: usize,
    pub steps: usize,
    pub spec: OptionSpec,
    pub strategy: Arc<dyn Strategy>,
    pub starting_equity: f64,
    /// Run i draws from a generator seeded with `seed + i`.
    pub seed: u64,
    pub percentiles: SmallVec<[f64; 8]>,
    pub execution: Execution,
}

impl SimulationConfig {
    pub fn new(spec: OptionSpec, strategy: Arc<dyn Strategy>) -> Self {
        Self {
            paths: 8_500,
            steps: 252,
            spec,
            strategy,
            starting_equity: 0.0,
            seed: 42,
            percentiles: smallvec![5.0, 25.0, 50.0, 75.0, 95.0],
            execution: Execution::Parallel,
        }
    }

    pub fn with_paths(mut self, paths: usize) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_starting_equity(mut self, starting_equity: f64) -> Self {
        self.starting_equity = starting_equity;
        self
    }

    pub fn with_percentiles(mut self, percentiles: &[f64]) -> Self {
        self.percentiles = SmallVec::from_slice(percentiles);
        self
    }

    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Bounds owned by the aggregator. Spec and step checks stay with the
    /// pricer and the path simulator.
    fn validate(&self) -> EngineResult<()> {
        if self.paths == 0 {
            return Err(EngineError::invalid("paths", self.paths, "must be > 0"));
        }
        ensure_finite("starting_equity", self.starting_equity)?;
        for &p in &self.percentiles {
            if !(0.0..=100.0).contains(&p) {
                return Err(EngineError::invalid("percentiles", p, "must be within [0, 100]"));
            }
        }
        self.strategy.validate()
    }
}

/// Terminal equities in generation order plus their summary.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EquityDistribution {
    pub strategy: &'static str,
    pub position: Position,
    pub paths: usize,
    pub steps: usize,
    pub seed: u64,
    pub starting_equity: f64,
    /// Closed-form value of the option being traded.
    pub fair_value: f64,
    /// fair_value - entry premium, per contract, from the long side.
    pub edge: f64,
    /// values[i] = starting equity + P&L of run i.
    pub values: Vec<f64>,
    /// Starting equity plus the running sum of per-run P&L, trade by trade.
    pub equity_curve: Vec<f64>,
    pub stats: EquityStats,
}

/// Runs N independent path simulations and reduces them to an equity
/// distribution.
///
/// Each run seeds its own generator, simulates one path, applies the
/// strategy and drops the path. Nothing is shared between runs except the
/// read-only config.
#[derive(Debug, Clone, Default)]
pub struct EquityAggregator {
    engine: PricingEngine,
}

impl EquityAggregator {
    pub fn new(engine: PricingEngine) -> Self {
        Self { engine }
    }

    pub fn run(&self, config: &SimulationConfig) -> EngineResult<EquityDistribution> {
        config.validate()?;
        let started = Instant::now();

        let pnls: Vec<f64> = match config.execution {
            Execution::Sequential => (0..config.paths)
                .map(|i| self.run_one(config, i))
                .collect::<EngineResult<_>>()?,
            Execution::Parallel => (0..config.paths)
                .into_par_iter()
                .map(|i| self.run_one(config, i))
                .collect::<EngineResult<_>>()?,
        };

        let fair_value = self.engine.value(&config.spec)?;
        let values: Vec<f64> = pnls.iter().map(|pnl| config.starting_equity + pnl).collect();
        let equity_curve = tracker::equity_curve(config.starting_equity, pnls.iter().copied());
        let stats = tracker::summarize(&values, config.starting_equity, &config.percentiles, &equity_curve);

        tracing::info!(
            strategy = config.strategy.name(),
            paths = config.paths,
            steps = config.steps,
            mean = stats.mean,
            std_dev = stats.std_dev,
            prob_loss = stats.probability_of_loss,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "equity simulation complete"
        );

        Ok(EquityDistribution {
            strategy: config.strategy.name(),
            position: config.strategy.position(),
            paths: config.paths,
            steps: config.steps,
            seed: config.seed,
            starting_equity: config.starting_equity,
            fair_value,
            edge: fair_value - config.strategy.entry_premium(),
            values,
            equity_curve,
            stats,
        })
    }

    /// P&L of run `index`. The path lives only inside this call.
    fn run_one(&self, config: &SimulationConfig, index: usize) -> EngineResult<f64> {
        let mut rng = run_rng(config.seed, index);
        let path = PathSimulator::simulate(&config.spec, config.steps, &mut rng)?;
        let pnl = config.strategy.pnl(&config.spec, &path, &self.engine)?;
        if !pnl.is_finite() {
            tracing::debug!(run = index, seed = config.seed, "non-finite run pnl");
            return Err(EngineError::invalid(
                "pnl",
                pnl,
                "run pnl overflowed; reduce contracts or volatility",
            ));
        }
        Ok(pnl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OptionKind;
    use crate::paper::strategy::{DeltaHedge, HoldToExpiry};
    use approx::assert_relative_eq;

    fn spec() -> OptionSpec {
        OptionSpec::new(100.0, 100.0, 1.0, 0.3, 0.05, OptionKind::Call)
    }

    fn hold(premium: f64, contracts: f64) -> Arc<dyn Strategy> {
        Arc::new(HoldToExpiry {
            position: Position::Long,
            contracts,
            entry_premium: premium,
        })
    }

    #[test]
    fn test_length_and_generation_order() {
        let aggregator = EquityAggregator::default();
        let config = SimulationConfig::new(spec(), hold(14.1, 100.0))
            .with_paths(200)
            .with_steps(20)
            .with_seed(9)
            .with_starting_equity(10_000.0);
        let dist = aggregator.run(&config).unwrap();

        assert_eq!(dist.values.len(), 200);
        assert_eq!(dist.equity_curve.len(), 200);
        assert!(dist.values.iter().all(|v| v.is_finite()));

        for i in [0usize, 17, 199] {
            let path = PathSimulator::simulate(&spec(), 20, &mut run_rng(9, i)).unwrap();
            let expected = 10_000.0 + 100.0 * ((path.terminal() - 100.0).max(0.0) - 14.1);
            assert_relative_eq!(dist.values[i], expected, epsilon = 1e-9);
        }
        assert_relative_eq!(
            *dist.equity_curve.last().unwrap(),
            10_000.0 + dist.values.iter().map(|v| v - 10_000.0).sum::<f64>(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_sequential_equals_parallel() {
        let aggregator = EquityAggregator::default();
        let strategy: Arc<dyn Strategy> = Arc::new(DeltaHedge {
            position: Position::Short,
            contracts: 10.0,
            entry_premium: 14.0,
            rebalance_every: 5,
        });
        let base = SimulationConfig::new(spec(), strategy).with_paths(300).with_steps(25);
        let seq = aggregator.run(&base.clone().with_execution(Execution::Sequential)).unwrap();
        let par = aggregator.run(&base.with_execution(Execution::Parallel)).unwrap();
        assert_eq!(seq.values, par.values);
        assert_eq!(seq.stats, par.stats);
    }

    #[test]
    fn test_mean_payoff_converges_to_closed_form() {
        let flat_rate = OptionSpec::new(100.0, 100.0, 1.0, 0.2, 0.0, OptionKind::Call);
        let aggregator = EquityAggregator::default();
        let config = SimulationConfig::new(flat_rate, hold(0.0, 1.0))
            .with_paths(100_000)
            .with_steps(4)
            .with_seed(2024);
        let dist = aggregator.run(&config).unwrap();

        let standard_error = dist.stats.std_dev / (dist.paths as f64).sqrt();
        let gap = (dist.stats.mean - dist.fair_value).abs();
        assert!(
            gap < 4.0 * standard_error,
            "mc mean {} vs closed form {} (se {standard_error})",
            dist.stats.mean,
            dist.fair_value
        );
        assert_relative_eq!(dist.fair_value, 7.965567455405798, epsilon = 1e-9);
    }

    #[test]
    fn test_edge_and_loss_probability() {
        let aggregator = EquityAggregator::default();
        let config = SimulationConfig::new(spec(), hold(14.1, 100.0)).with_paths(2_000).with_steps(10);
        let dist = aggregator.run(&config).unwrap();
        assert_relative_eq!(dist.edge, dist.fair_value - 14.1, epsilon = 1e-12);
        // A long call at roughly fair value loses its premium more often than not
        assert!(dist.stats.probability_of_loss > 0.5);
        assert!(dist.stats.probability_of_loss < 0.8);
        assert_eq!(dist.stats.percentiles.len(), 5);
        let p: Vec<f64> = dist.stats.percentiles.iter().map(|p| p.value).collect();
        assert!(p.windows(2).all(|w| w[0] <= w[1]));
        assert_relative_eq!(dist.stats.min, -1_410.0, epsilon = 1e-9);
    }

    #[test]
    fn test_single_path_has_zero_std() {
        let aggregator = EquityAggregator::default();
        let config = SimulationConfig::new(spec(), hold(1.0, 1.0)).with_paths(1).with_steps(3);
        let dist = aggregator.run(&config).unwrap();
        assert_eq!(dist.values.len(), 1);
        assert_eq!(dist.stats.std_dev, 0.0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let aggregator = EquityAggregator::default();
        let base = SimulationConfig::new(spec(), hold(1.0, 1.0)).with_steps(5);

        let err = aggregator.run(&base.clone().with_paths(0)).unwrap_err();
        assert_eq!(err.field(), Some("paths"));

        let err = aggregator.run(&base.clone().with_paths(10).with_steps(0)).unwrap_err();
        assert_eq!(err.field(), Some("steps"));

        let err = aggregator.run(&base.clone().with_percentiles(&[50.0, 101.0])).unwrap_err();
        assert_eq!(err.field(), Some("percentiles"));

        let mut bad_spec = base.clone().with_paths(10);
        bad_spec.spec = spec().with_spot(0.0);
        assert_eq!(aggregator.run(&bad_spec).unwrap_err().field(), Some("spot"));

        let bad_strategy = SimulationConfig::new(spec(), hold(1.0, -5.0)).with_paths(10);
        assert_eq!(aggregator.run(&bad_strategy).unwrap_err().field(), Some("contracts"));
    }

    #[test]
    fn test_overflowing_pnl_names_pnl() {
        let aggregator = EquityAggregator::default();
        let config = SimulationConfig::new(spec(), hold(14.1, f64::MAX))
            .with_paths(20)
            .with_steps(5);
        let err = aggregator.run(&config).unwrap_err();
        assert_eq!(err.field(), Some("pnl"));
    }

    #[test]
    fn test_hedged_run_with_extreme_vol_completes() {
        let aggregator = EquityAggregator::default();
        let wild = spec().with_volatility(45.0);
        let hedge = Arc::new(DeltaHedge {
            position: Position::Short,
            contracts: 1.0,
            entry_premium: 1.0,
            rebalance_every: 1,
        });
        let config = SimulationConfig::new(wild, hedge).with_paths(50).with_steps(252);
        let dist = aggregator.run(&config).unwrap();
        assert_eq!(dist.position, Position::Short);
        assert_eq!(dist.values.len(), 50);
        assert!(dist.values.iter().all(|v| v.is_finite()));
    }
}
