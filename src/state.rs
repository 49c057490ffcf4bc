use crate::config::AppConfig;
use crate::models::black_scholes::PricingEngine;
use crate::paper::simulator::EquityAggregator;
use crate::risk::grid::GridEvaluator;
use portable_atomic::{AtomicU64, Ordering};
use std::sync::Arc;

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub requests_served: AtomicU64,
    pub prices_computed: AtomicU64,
    pub grid_cells_evaluated: AtomicU64,
    pub paths_simulated: AtomicU64,
    pub errors_returned: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            requests_served: AtomicU64::new(0),
            prices_computed: AtomicU64::new(0),
            grid_cells_evaluated: AtomicU64::new(0),
            paths_simulated: AtomicU64::new(0),
            errors_returned: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        use portable_atomic::Ordering::Relaxed;
        CounterSnapshot {
            requests_served: self.requests_served.load(Relaxed),
            prices_computed: self.prices_computed.load(Relaxed),
            grid_cells_evaluated: self.grid_cells_evaluated.load(Relaxed),
            paths_simulated: self.paths_simulated.load(Relaxed),
            errors_returned: self.errors_returned.load(Relaxed),
        }
    }
}

impl Default for PerfCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CounterSnapshot {
    pub requests_served: u64,
    pub prices_computed: u64,
    pub grid_cells_evaluated: u64,
    pub paths_simulated: u64,
    pub errors_returned: u64,
}

// ── Application shared state (immutable engines, atomic counters) ──

pub struct AppState {
    pub config: AppConfig,
    pub pricing: PricingEngine,
    pub grid: GridEvaluator,
    pub aggregator: EquityAggregator,
    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(config: AppConfig) -> Arc<Self> {
        let pricing = PricingEngine::new();
        Arc::new(Self {
            config,
            grid: GridEvaluator::new(pricing.clone()),
            aggregator: EquityAggregator::new(pricing.clone()),
            pricing,
            counters: PerfCounters::new(),
        })
    }
}
