use crate::errors::{EngineError, EngineResult};
use crate::models::{Greeks, OptionKind, OptionSpec, PricingResult};
use statrs::distribution::{Continuous, ContinuousCDF, Normal};

/// Below this sigma*sqrt(T) the lognormal collapses to a point mass and the
/// closed form would divide by zero.
const DEGENERATE_SIGMA_SQRT_T: f64 = 1e-12;

/// Black-Scholes European option pricing.
///
/// call = S * Phi(d1) - K * e^{-rT} * Phi(d2)
/// put  = K * e^{-rT} * Phi(-d2) - S * Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// and   d2 = d1 - sigma * sqrt(T).
///
/// Pure: same spec always yields the same result. Greeks are analytic.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Precomputed terms shared by price and Greeks. Stack only.
#[derive(Debug, Clone, Copy)]
struct Terms {
    sqrt_t: f64,
    sigma_sqrt_t: f64,
    discount: f64,
    d1: f64,
    d2: f64,
}

impl PricingEngine {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }

    pub fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    /// Theoretical price only. This is the path the grid sweep takes.
    pub fn value(&self, spec: &OptionSpec) -> EngineResult<f64> {
        spec.validate()?;
        let Some(terms) = terms(spec)? else {
            return Ok(deterministic_value(spec));
        };
        Ok(self.closed_form(spec, &terms))
    }

    /// Price plus closed-form Greeks.
    pub fn price(&self, spec: &OptionSpec) -> EngineResult<PricingResult> {
        spec.validate()?;
        let Some(terms) = terms(spec)? else {
            return Ok(PricingResult::new(
                spec.kind,
                deterministic_value(spec),
                deterministic_greeks(spec),
            ));
        };
        let price = self.closed_form(spec, &terms);
        Ok(PricingResult::new(spec.kind, price, self.greeks(spec, &terms)))
    }

    /// Delta alone, for hedging loops that run once per simulated step.
    pub fn delta(&self, spec: &OptionSpec) -> EngineResult<f64> {
        spec.validate()?;
        let Some(terms) = terms(spec)? else {
            return Ok(deterministic_greeks(spec).delta);
        };
        Ok(match spec.kind {
            OptionKind::Call => self.normal.cdf(terms.d1),
            OptionKind::Put => self.normal.cdf(terms.d1) - 1.0,
        })
    }

    /// Call and put for the same inputs, whatever `spec.kind` says.
    pub fn call_and_put(&self, spec: &OptionSpec) -> EngineResult<(PricingResult, PricingResult)> {
        let call = self.price(&spec.with_kind(OptionKind::Call))?;
        let put = self.price(&spec.with_kind(OptionKind::Put))?;
        Ok((call, put))
    }

    #[inline]
    fn closed_form(&self, spec: &OptionSpec, t: &Terms) -> f64 {
        let s = spec.spot;
        let k_disc = spec.strike * t.discount;
        let price = match spec.kind {
            OptionKind::Call => s * self.normal.cdf(t.d1) - k_disc * self.normal.cdf(t.d2),
            OptionKind::Put => k_disc * self.normal.cdf(-t.d2) - s * self.normal.cdf(-t.d1),
        };
        // Cancellation far out of the money can leave a tiny negative
        price.max(0.0)
    }

    fn greeks(&self, spec: &OptionSpec, t: &Terms) -> Greeks {
        let s = spec.spot;
        let k_disc = spec.strike * t.discount;
        let pdf_d1 = self.normal.pdf(t.d1);

        let gamma = pdf_d1 / (s * t.sigma_sqrt_t);
        let vega = s * pdf_d1 * t.sqrt_t;
        // dV/dT shared diffusion term
        let time_decay = s * pdf_d1 * spec.volatility / (2.0 * t.sqrt_t);

        match spec.kind {
            OptionKind::Call => {
                let n_d2 = self.normal.cdf(t.d2);
                Greeks {
                    delta: self.normal.cdf(t.d1),
                    gamma,
                    vega,
                    theta: time_decay + spec.risk_free_rate * k_disc * n_d2,
                    rho: spec.time_to_maturity * k_disc * n_d2,
                }
            }
            OptionKind::Put => {
                let n_neg_d2 = self.normal.cdf(-t.d2);
                Greeks {
                    delta: self.normal.cdf(t.d1) - 1.0,
                    gamma,
                    vega,
                    theta: time_decay - spec.risk_free_rate * k_disc * n_neg_d2,
                    rho: -spec.time_to_maturity * k_disc * n_neg_d2,
                }
            }
        }
    }
}

/// Ok(None) when sigma*sqrt(T) is too small for the closed form.
///
/// Finite fields can still overflow once combined (e^{-rT}, sigma*sqrt(T));
/// those are rejected here so no NaN reaches a price or a Greek.
#[inline]
fn terms(spec: &OptionSpec) -> EngineResult<Option<Terms>> {
    let discount = spec.discount_factor();
    if !(spec.strike * discount).is_finite() {
        return Err(EngineError::invalid(
            "risk_free_rate",
            spec.risk_free_rate,
            "discounted strike K*e^(-rT) overflows",
        ));
    }
    let sqrt_t = spec.time_to_maturity.sqrt();
    let sigma_sqrt_t = spec.volatility * sqrt_t;
    if sigma_sqrt_t < DEGENERATE_SIGMA_SQRT_T {
        return Ok(None);
    }
    let half_sigma_sq = 0.5 * spec.volatility * spec.volatility;
    let d1 = ((spec.spot / spec.strike).ln()
        + (spec.risk_free_rate + half_sigma_sq) * spec.time_to_maturity)
        / sigma_sqrt_t;
    if !sigma_sqrt_t.is_finite() || d1.is_nan() {
        return Err(EngineError::invalid(
            "volatility",
            spec.volatility,
            "sigma * sqrt(T) overflows",
        ));
    }
    Ok(Some(Terms {
        sqrt_t,
        sigma_sqrt_t,
        discount,
        d1,
        d2: d1 - sigma_sqrt_t,
    }))
}

/// Zero-volatility limit: the discounted payoff on the forward.
/// Collapses to intrinsic value as T -> 0.
#[inline]
fn deterministic_value(spec: &OptionSpec) -> f64 {
    let k_disc = spec.strike * spec.discount_factor();
    match spec.kind {
        OptionKind::Call => (spec.spot - k_disc).max(0.0),
        OptionKind::Put => (k_disc - spec.spot).max(0.0),
    }
}

/// Derivatives of `deterministic_value`. Gamma and vega vanish.
fn deterministic_greeks(spec: &OptionSpec) -> Greeks {
    let k_disc = spec.strike * spec.discount_factor();
    let r = spec.risk_free_rate;
    let t = spec.time_to_maturity;
    match spec.kind {
        OptionKind::Call if spec.spot > k_disc => Greeks {
            delta: 1.0,
            theta: r * k_disc,
            rho: t * k_disc,
            ..Greeks::default()
        },
        OptionKind::Put if k_disc > spec.spot => Greeks {
            delta: -1.0,
            theta: -r * k_disc,
            rho: -t * k_disc,
            ..Greeks::default()
        },
        _ => Greeks::default(),
    }
}
