use crate::errors::{ensure_finite, ensure_positive, EngineError, EngineResult};
use crate::models::black_scholes::PricingEngine;
use crate::models::gbm::PricePath;
use crate::models::{OptionKind, OptionSpec, Position};

/// A trade rule applied to one simulated path.
///
/// pnl() must be a pure function of its inputs so runs can execute in any
/// order on any thread. Send + Sync required for the rayon pool.
pub trait Strategy: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    /// Premium per contract paid (long) or received (short) at entry.
    fn entry_premium(&self) -> f64;

    fn position(&self) -> Position;

    /// Reject nonsensical sizing before any path is simulated.
    fn validate(&self) -> EngineResult<()>;

    /// Trade P&L in account currency for one path.
    fn pnl(&self, spec: &OptionSpec, path: &PricePath, engine: &PricingEngine) -> EngineResult<f64>;
}

fn validate_sizing(contracts: f64, entry_premium: f64) -> EngineResult<()> {
    ensure_positive("contracts", contracts)?;
    ensure_finite("entry_premium", entry_premium)?;
    if entry_premium < 0.0 {
        return Err(EngineError::invalid("entry_premium", entry_premium, "must be >= 0"));
    }
    Ok(())
}

/// Open at the quoted premium, settle at expiry, no intermediate trading.
///
/// pnl = sign * contracts * (payoff(S_T) - premium)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HoldToExpiry {
    pub position: Position,
    pub contracts: f64,
    pub entry_premium: f64,
}

impl Strategy for HoldToExpiry {
    fn name(&self) -> &'static str {
        "hold-to-expiry"
    }

    fn entry_premium(&self) -> f64 {
        self.entry_premium
    }

    fn position(&self) -> Position {
        self.position
    }

    fn validate(&self) -> EngineResult<()> {
        validate_sizing(self.contracts, self.entry_premium)
    }

    #[inline]
    fn pnl(&self, spec: &OptionSpec, path: &PricePath, _engine: &PricingEngine) -> EngineResult<f64> {
        let payoff = spec.kind.payoff(path.terminal(), spec.strike);
        Ok(self.position.sign() * self.contracts * (payoff - self.entry_premium))
    }
}

/// Option position plus an offsetting stock position held at the
/// Black-Scholes delta, rebalanced every `rebalance_every` steps.
///
/// Cash (premium and share purchases) accrues at the risk-free rate. The
/// option settles and the shares are unwound at the terminal price.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DeltaHedge {
    pub position: Position,
    pub contracts: f64,
    pub entry_premium: f64,
    pub rebalance_every: usize,
}

impl Strategy for DeltaHedge {
    fn name(&self) -> &'static str {
        "delta-hedge"
    }

    fn entry_premium(&self) -> f64 {
        self.entry_premium
    }

    fn position(&self) -> Position {
        self.position
    }

    fn validate(&self) -> EngineResult<()> {
        validate_sizing(self.contracts, self.entry_premium)?;
        if self.rebalance_every == 0 {
            return Err(EngineError::invalid("rebalance_every", 0, "must be > 0"));
        }
        Ok(())
    }

    fn pnl(&self, spec: &OptionSpec, path: &PricePath, engine: &PricingEngine) -> EngineResult<f64> {
        let sign = self.position.sign();
        let prices = path.prices();
        let dt = path.dt();
        let growth = (spec.risk_free_rate * dt).exp();

        // Per contract: long pays the premium, short receives it
        let mut cash = -sign * self.entry_premium;
        let mut shares = 0.0_f64;

        for (i, &spot) in prices[..path.steps()].iter().enumerate() {
            if i % self.rebalance_every == 0 {
                let remaining = spec.time_to_maturity - i as f64 * dt;
                let delta = if spot > 0.0 {
                    engine.delta(&spec.with_spot(spot).with_maturity(remaining))?
                } else {
                    // Underflowed to an absorbing zero: S -> 0 limit
                    match spec.kind {
                        OptionKind::Call => 0.0,
                        OptionKind::Put => -1.0,
                    }
                };
                let target = -sign * delta;
                cash -= (target - shares) * spot;
                shares = target;
            }
            cash *= growth;
        }

        let terminal = path.terminal();
        cash += shares * terminal + sign * spec.kind.payoff(terminal, spec.strike);
        Ok(self.contracts * cash)
    }
}
