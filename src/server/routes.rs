use crate::config::{AppConfig, MarketDefaults};
use crate::errors::{EngineError, EngineResult};
use crate::models::{OptionKind, OptionSpec, Position};
use crate::paper::simulator::{Execution, SimulationConfig};
use crate::paper::strategy::{DeltaHedge, HoldToExpiry, Strategy};
use crate::risk::grid::GridSpec;
use crate::state::{AppState, PerfCounters};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

/// Points per heatmap axis when the request does not say.
const DEFAULT_GRID_POINTS: usize = 10;

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match self {
            EngineError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Market inputs shared by every request. Missing fields use configured defaults.
#[derive(Debug, Default, Clone, serde::Deserialize)]
pub struct MarketInput {
    pub spot: Option<f64>,
    pub strike: Option<f64>,
    pub time_to_maturity: Option<f64>,
    pub volatility: Option<f64>,
    pub risk_free_rate: Option<f64>,
}

impl MarketInput {
    fn resolve(&self, d: &MarketDefaults, kind: OptionKind) -> OptionSpec {
        OptionSpec::new(
            self.spot.unwrap_or(d.spot),
            self.strike.unwrap_or(d.strike),
            self.time_to_maturity.unwrap_or(d.time_to_maturity),
            self.volatility.unwrap_or(d.volatility),
            self.risk_free_rate.unwrap_or(d.risk_free_rate),
            kind,
        )
    }
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct PriceRequest {
    #[serde(flatten)]
    pub market: MarketInput,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct HeatmapRequest {
    #[serde(flatten)]
    pub market: MarketInput,
    pub min_spot: Option<f64>,
    pub max_spot: Option<f64>,
    pub min_vol: Option<f64>,
    pub max_vol: Option<f64>,
    pub points: Option<usize>,
    pub call_quote: Option<f64>,
    pub put_quote: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Hold,
    DeltaHedge,
}

#[derive(Debug, Default, serde::Deserialize)]
pub struct EquityRequest {
    #[serde(flatten)]
    pub market: MarketInput,
    pub kind: Option<OptionKind>,
    pub position: Option<Position>,
    pub strategy: Option<StrategyKind>,
    /// Per-contract premium; defaults to the configured quote for `kind`.
    pub entry_premium: Option<f64>,
    pub contracts: Option<f64>,
    pub trades: Option<usize>,
    pub time_steps: Option<usize>,
    pub rebalance_every: Option<usize>,
    pub seed: Option<u64>,
    pub starting_equity: Option<f64>,
    pub percentiles: Option<Vec<f64>>,
    pub execution: Option<Execution>,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Count the outcome of a handler before handing it to axum.
fn tally<T>(state: &AppState, result: EngineResult<T>) -> EngineResult<T> {
    PerfCounters::add(&state.counters.requests_served, 1);
    if let Err(e) = &result {
        PerfCounters::add(&state.counters.errors_returned, 1);
        tracing::debug!(field = e.field(), "request rejected: {e}");
    }
    result
}

/// GET /api/defaults -- configured default inputs
pub async fn get_defaults(State(state): State<Arc<AppState>>) -> Json<MarketDefaults> {
    Json(state.config.defaults.clone())
}

/// POST /api/price -- call and put value with Greeks
pub async fn post_price(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PriceRequest>,
) -> EngineResult<Json<serde_json::Value>> {
    let spec = req.market.resolve(&state.config.defaults, OptionKind::Call);
    let result = state.pricing.call_and_put(&spec).map(|(call, put)| {
        PerfCounters::add(&state.counters.prices_computed, 2);
        Json(serde_json::json!({
            "inputs": spec,
            "call": call,
            "put": put,
            "generated_at": now(),
        }))
    });
    tally(&state, result)
}

/// POST /api/heatmap -- call and put P&L grids over spot x volatility
pub async fn post_heatmap(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HeatmapRequest>,
) -> EngineResult<Json<serde_json::Value>> {
    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || build_heatmap(&worker, &req))
        .await
        .map_err(EngineError::from)
        .and_then(|r| r);
    tally(&state, result)
}

fn build_heatmap(state: &AppState, req: &HeatmapRequest) -> EngineResult<Json<serde_json::Value>> {
    let d = &state.config.defaults;
    let spec = req.market.resolve(d, OptionKind::Call);
    let points = req.points.unwrap_or(DEFAULT_GRID_POINTS);
    if points > state.config.max_grid_points {
        return Err(EngineError::invalid("points", points, "exceeds MAX_GRID_POINTS"));
    }

    let spots = GridSpec::linspace(
        "spot_values",
        req.min_spot.unwrap_or(spec.spot * 0.8),
        req.max_spot.unwrap_or(spec.spot * 1.2),
        points,
    )?;
    let vols = GridSpec::linspace(
        "vol_values",
        req.min_vol.unwrap_or(spec.volatility * 0.5),
        req.max_vol.unwrap_or(spec.volatility * 1.5),
        points,
    )?;

    let (call, put) = state.grid.evaluate_call_put(
        &spec,
        spots,
        vols,
        req.call_quote.unwrap_or(d.call_quote),
        req.put_quote.unwrap_or(d.put_quote),
    )?;
    PerfCounters::add(&state.counters.grid_cells_evaluated, 2 * (points * points) as u64);

    Ok(Json(serde_json::json!({
        "call": call,
        "put": put,
        "generated_at": now(),
    })))
}

/// POST /api/equity -- Monte Carlo account equity distribution
pub async fn post_equity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EquityRequest>,
) -> EngineResult<Json<serde_json::Value>> {
    let worker = state.clone();
    let result = tokio::task::spawn_blocking(move || run_equity(&worker, &req))
        .await
        .map_err(EngineError::from)
        .and_then(|r| r);
    tally(&state, result)
}

fn run_equity(state: &AppState, req: &EquityRequest) -> EngineResult<Json<serde_json::Value>> {
    let config = simulation_config(&state.config, req)?;
    let dist = state.aggregator.run(&config)?;
    PerfCounters::add(&state.counters.paths_simulated, config.paths as u64);
    Ok(Json(serde_json::json!({
        "distribution": dist,
        "generated_at": now(),
    })))
}

/// Translate a request into a simulation config, enforcing server limits.
pub fn simulation_config(cfg: &AppConfig, req: &EquityRequest) -> EngineResult<SimulationConfig> {
    let d = &cfg.defaults;
    let kind = req.kind.unwrap_or(OptionKind::Call);
    let spec = req.market.resolve(d, kind);

    let paths = req.trades.unwrap_or(d.trades);
    if paths > cfg.max_paths {
        return Err(EngineError::invalid("paths", paths, "exceeds MAX_PATHS"));
    }
    let steps = req.time_steps.unwrap_or(d.time_steps);
    if steps > cfg.max_steps {
        return Err(EngineError::invalid("steps", steps, "exceeds MAX_STEPS"));
    }

    let default_quote = match kind {
        OptionKind::Call => d.call_quote,
        OptionKind::Put => d.put_quote,
    };
    let position = req.position.unwrap_or_default();
    let contracts = req.contracts.unwrap_or(d.contracts);
    let entry_premium = req.entry_premium.unwrap_or(default_quote);

    let strategy: Arc<dyn Strategy> = match req.strategy.unwrap_or_default() {
        StrategyKind::Hold => Arc::new(HoldToExpiry {
            position,
            contracts,
            entry_premium,
        }),
        StrategyKind::DeltaHedge => Arc::new(DeltaHedge {
            position,
            contracts,
            entry_premium,
            rebalance_every: req.rebalance_every.unwrap_or(1),
        }),
    };

    let mut config = SimulationConfig::new(spec, strategy)
        .with_paths(paths)
        .with_steps(steps)
        .with_seed(req.seed.unwrap_or(d.seed))
        .with_starting_equity(req.starting_equity.unwrap_or(d.starting_equity))
        .with_execution(req.execution.unwrap_or_default());
    if let Some(percentiles) = &req.percentiles {
        config = config.with_percentiles(percentiles);
    }
    Ok(config)
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!(state.counters.snapshot()))
}
