use crate::errors::{EngineError, EngineResult};
use std::str::FromStr;

/// Default market inputs, used when an API request leaves a field out.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MarketDefaults {
    pub spot: f64,
    pub strike: f64,
    pub time_to_maturity: f64,
    pub volatility: f64,
    pub risk_free_rate: f64,
    pub call_quote: f64,
    pub put_quote: f64,
    pub contracts: f64,
    pub time_steps: usize,
    pub trades: usize,
    pub starting_equity: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    /// rayon pool size; 0 keeps rayon's default (one per core)
    pub sim_threads: usize,
    pub max_paths: usize,
    pub max_steps: usize,
    pub max_grid_points: usize,
    pub defaults: MarketDefaults,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = MarketDefaults {
            spot: parse_or("DEFAULT_SPOT", "100.0")?,
            strike: parse_or("DEFAULT_STRIKE", "100.0")?,
            time_to_maturity: parse_or("DEFAULT_MATURITY", "1.0")?,
            volatility: parse_or("DEFAULT_VOLATILITY", "0.3")?,
            risk_free_rate: parse_or("DEFAULT_RATE", "0.05")?,
            call_quote: parse_or("DEFAULT_CALL_QUOTE", "14.1")?,
            put_quote: parse_or("DEFAULT_PUT_QUOTE", "9.2")?,
            contracts: parse_or("DEFAULT_CONTRACTS", "100")?,
            time_steps: parse_or("DEFAULT_TIME_STEPS", "252")?,
            trades: parse_or("DEFAULT_TRADES", "8500")?,
            starting_equity: parse_or("DEFAULT_STARTING_EQUITY", "0.0")?,
            seed: parse_or("DEFAULT_SEED", "42")?,
        };

        let cfg = Self {
            server_port: parse_or("SERVER_PORT", "3001")?,
            sim_threads: parse_or("SIM_THREADS", "0")?,
            max_paths: parse_or("MAX_PATHS", "25000")?,
            max_steps: parse_or("MAX_STEPS", "5000")?,
            max_grid_points: parse_or("MAX_GRID_POINTS", "50")?,
            defaults,
        };

        if cfg.max_paths == 0 || cfg.max_steps == 0 || cfg.max_grid_points == 0 {
            return Err(EngineError::Config("MAX_PATHS, MAX_STEPS and MAX_GRID_POINTS must be > 0".into()));
        }
        Ok(cfg)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            sim_threads: 0,
            max_paths: 25_000,
            max_steps: 5_000,
            max_grid_points: 50,
            defaults: MarketDefaults {
                spot: 100.0,
                strike: 100.0,
                time_to_maturity: 1.0,
                volatility: 0.3,
                risk_free_rate: 0.05,
                call_quote: 14.1,
                put_quote: 9.2,
                contracts: 100.0,
                time_steps: 252,
                trades: 8_500,
                starting_equity: 0.0,
                seed: 42,
            },
        }
    }
}

fn parse_or<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var_or(key, default)
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_when_unset() {
        let v: f64 = parse_or("EDGE_LAB_TEST_UNSET_VAR", "0.25").unwrap();
        assert_eq!(v, 0.25);
    }

    #[test]
    fn test_parse_error_names_variable() {
        let err = parse_or::<u16>("EDGE_LAB_TEST_UNSET_PORT", "not-a-port").unwrap_err();
        assert!(err.to_string().contains("EDGE_LAB_TEST_UNSET_PORT"));
    }

    #[test]
    fn test_default_matches_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server_port, 3001);
        assert_eq!(cfg.max_paths, 25_000);
        assert_eq!(cfg.defaults.call_quote, 14.1);
        assert_eq!(cfg.defaults.time_steps, 252);
    }
}
