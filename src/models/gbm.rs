use crate::errors::{EngineError, EngineResult};
use crate::models::OptionSpec;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

/// One simulated price path: `steps + 1` prices starting at the spot.
///
/// Owned by the run that produced it. The aggregator reduces it to a single
/// equity figure and drops it, so memory stays O(steps) per run.
#[derive(Debug, Clone, PartialEq)]
pub struct PricePath {
    prices: Vec<f64>,
    dt: f64,
}

impl PricePath {
    #[inline]
    pub fn prices(&self) -> &[f64] {
        &self.prices
    }

    /// Step size in years.
    #[inline]
    pub fn dt(&self) -> f64 {
        self.dt
    }

    #[inline]
    pub fn steps(&self) -> usize {
        self.prices.len() - 1
    }

    #[inline]
    pub fn terminal(&self) -> f64 {
        self.prices[self.prices.len() - 1]
    }
}

/// Exact lognormal discretisation of geometric Brownian motion.
///
/// S_{i+1} = S_i * exp((r - sigma^2/2) * dt + sigma * sqrt(dt) * Z_i)
///
/// Z_i ~ N(0,1) drawn from the caller's generator, exactly `steps` draws per
/// call. No discretisation bias regardless of step count.
pub struct PathSimulator;

impl PathSimulator {
    pub fn simulate<R: Rng + ?Sized>(
        spec: &OptionSpec,
        steps: usize,
        rng: &mut R,
    ) -> EngineResult<PricePath> {
        if steps == 0 {
            return Err(EngineError::invalid("steps", steps, "must be > 0"));
        }
        spec.validate()?;

        let dt = spec.time_to_maturity / steps as f64;
        let sigma = spec.volatility;
        let drift = (spec.risk_free_rate - 0.5 * sigma * sigma) * dt;
        let diffusion = sigma * dt.sqrt();

        let mut prices = Vec::with_capacity(steps + 1);
        let mut current = spec.spot;
        prices.push(current);
        for _ in 0..steps {
            let z: f64 = StandardNormal.sample(rng);
            current *= (drift + diffusion * z).exp();
            prices.push(current);
        }

        Ok(PricePath { prices, dt })
    }
}

/// Generator for one logical run: seed = base_seed + run_index.
///
/// Each run owns an independent stream, so sequential and parallel execution
/// see the same draws for the same run.
#[inline]
pub fn run_rng(base_seed: u64, run_index: usize) -> StdRng {
    StdRng::seed_from_u64(base_seed.wrapping_add(run_index as u64))
}
