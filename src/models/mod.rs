pub mod black_scholes;
pub mod gbm;

use crate::errors::{ensure_finite, ensure_positive, EngineError, EngineResult};

/// European exercise only. Parsing any other name is a parameter error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

impl OptionKind {
    /// Payoff at expiry for a terminal spot.
    #[inline]
    pub fn payoff(self, spot: f64, strike: f64) -> f64 {
        match self {
            OptionKind::Call => (spot - strike).max(0.0),
            OptionKind::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionKind {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" | "c" => Ok(OptionKind::Call),
            "put" | "p" => Ok(OptionKind::Put),
            _ => Err(EngineError::invalid("kind", s, "must be call or put")),
        }
    }
}

/// Direction of a trade. Short flips the sign of every P&L figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    #[default]
    Long,
    Short,
}

impl Position {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Position::Long => 1.0,
            Position::Short => -1.0,
        }
    }
}

/// Market and contract inputs for a single European option.
///
/// Plain Copy record. Validation lives with the engines that consume it
/// (`black_scholes` and `gbm`), not in the constructor.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OptionSpec {
    pub spot: f64,
    pub strike: f64,
    /// Years.
    pub time_to_maturity: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub kind: OptionKind,
}

impl OptionSpec {
    pub fn new(
        spot: f64,
        strike: f64,
        time_to_maturity: f64,
        volatility: f64,
        risk_free_rate: f64,
        kind: OptionKind,
    ) -> Self {
        Self {
            spot,
            strike,
            time_to_maturity,
            volatility,
            risk_free_rate,
            kind,
        }
    }

    #[inline]
    pub fn with_spot(self, spot: f64) -> Self {
        Self { spot, ..self }
    }

    #[inline]
    pub fn with_volatility(self, volatility: f64) -> Self {
        Self { volatility, ..self }
    }

    #[inline]
    pub fn with_maturity(self, time_to_maturity: f64) -> Self {
        Self {
            time_to_maturity,
            ..self
        }
    }

    #[inline]
    pub fn with_kind(self, kind: OptionKind) -> Self {
        Self { kind, ..self }
    }

    /// Shared constraint check. Zero volatility is allowed here; the pricer
    /// handles it as the deterministic limit and the simulator produces a
    /// drift-only path.
    pub fn validate(&self) -> EngineResult<()> {
        ensure_positive("spot", self.spot)?;
        ensure_positive("strike", self.strike)?;
        ensure_positive("time_to_maturity", self.time_to_maturity)?;
        ensure_finite("volatility", self.volatility)?;
        if self.volatility < 0.0 {
            return Err(EngineError::invalid("volatility", self.volatility, "must be >= 0"));
        }
        ensure_finite("risk_free_rate", self.risk_free_rate)?;
        Ok(())
    }

    #[inline]
    pub fn discount_factor(&self) -> f64 {
        (-self.risk_free_rate * self.time_to_maturity).exp()
    }
}

/// Closed-form sensitivities. `theta` is the derivative with respect to time
/// to maturity (per year), not calendar time.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub kind: OptionKind,
    pub price: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

impl PricingResult {
    pub fn new(kind: OptionKind, price: f64, greeks: Greeks) -> Self {
        Self {
            kind,
            price,
            delta: greeks.delta,
            gamma: greeks.gamma,
            vega: greeks.vega,
            theta: greeks.theta,
            rho: greeks.rho,
        }
    }
}
