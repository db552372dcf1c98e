//! Engine configuration
//!
//! Defaults can be overridden from a JSON file or from environment variables:
//!   APPRAISAL_DISCOUNT_RATE, APPRAISAL_SIMULATIONS, APPRAISAL_CHUNK_SIZE, APPRAISAL_SEED

use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::path::Path;

use crate::error::{AppraisalError, Result};

/// Default discount rate in percent (10 = 10%)
pub const DEFAULT_DISCOUNT_RATE_PCT: f64 = 10.0;

/// Default number of Monte Carlo trials
pub const DEFAULT_SIMULATION_COUNT: usize = 10_000;

/// Tunables for the analyzers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Discount rate in percent
    #[serde(default = "default_discount_rate")]
    pub discount_rate_pct: f64,

    /// Monte Carlo trials per run
    #[serde(default = "default_simulation_count")]
    pub simulation_count: usize,

    /// Upper bound accepted for a single run
    #[serde(default = "default_max_simulation_count")]
    pub max_simulation_count: usize,

    /// Trials per parallel chunk (cancellation is checked between chunks)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Base seed for reproducible runs (None = random)
    #[serde(default)]
    pub seed: Option<u64>,

    /// Uniform range for inflow perturbation factors
    #[serde(default = "default_inflow_range")]
    pub inflow_range: (f64, f64),

    /// Uniform range for outflow perturbation factors
    #[serde(default = "default_outflow_range")]
    pub outflow_range: (f64, f64),

    /// One-at-a-time shift for sensitivity drivers (0.10 = ±10%)
    #[serde(default = "default_sensitivity_shift")]
    pub sensitivity_shift: f64,

    #[serde(default = "default_irr_initial_guess")]
    pub irr_initial_guess: f64,

    #[serde(default = "default_irr_tolerance")]
    pub irr_tolerance: f64,

    #[serde(default = "default_irr_max_iterations")]
    pub irr_max_iterations: u32,
}

fn default_discount_rate() -> f64 { DEFAULT_DISCOUNT_RATE_PCT }
fn default_simulation_count() -> usize { DEFAULT_SIMULATION_COUNT }
fn default_max_simulation_count() -> usize { 10_000_000 }
fn default_chunk_size() -> usize { 1_000 }
fn default_inflow_range() -> (f64, f64) { (0.8, 1.2) }
fn default_outflow_range() -> (f64, f64) { (0.9, 1.1) }
fn default_sensitivity_shift() -> f64 { 0.10 }
fn default_irr_initial_guess() -> f64 { 0.10 }
fn default_irr_tolerance() -> f64 { 1e-4 }
fn default_irr_max_iterations() -> u32 { 100 }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            discount_rate_pct: default_discount_rate(),
            simulation_count: default_simulation_count(),
            max_simulation_count: default_max_simulation_count(),
            chunk_size: default_chunk_size(),
            seed: None,
            inflow_range: default_inflow_range(),
            outflow_range: default_outflow_range(),
            sensitivity_shift: default_sensitivity_shift(),
            irr_initial_guess: default_irr_initial_guess(),
            irr_tolerance: default_irr_tolerance(),
            irr_max_iterations: default_irr_max_iterations(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any APPRAISAL_* environment variables.
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(rate) = env_parse("APPRAISAL_DISCOUNT_RATE") {
            config.discount_rate_pct = rate;
        }
        if let Some(n) = env_parse("APPRAISAL_SIMULATIONS") {
            config.simulation_count = n;
        }
        if let Some(chunk) = env_parse("APPRAISAL_CHUNK_SIZE") {
            config.chunk_size = chunk;
        }
        if let Some(seed) = env_parse("APPRAISAL_SEED") {
            config.seed = Some(seed);
        }
        config
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_path(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.discount_rate_pct.is_finite() || self.discount_rate_pct <= -100.0 {
            return Err(AppraisalError::invalid(
                "discount_rate_pct",
                format!("must be finite and above -100, got {}", self.discount_rate_pct),
            ));
        }
        if self.chunk_size == 0 {
            return Err(AppraisalError::invalid("chunk_size", "must be at least 1"));
        }
        check_range("inflow_range", self.inflow_range)?;
        check_range("outflow_range", self.outflow_range)?;
        if !(self.sensitivity_shift > 0.0 && self.sensitivity_shift < 1.0) {
            return Err(AppraisalError::invalid(
                "sensitivity_shift",
                format!("must be in (0, 1), got {}", self.sensitivity_shift),
            ));
        }
        if !(self.irr_tolerance > 0.0) || self.irr_max_iterations == 0 {
            return Err(AppraisalError::invalid(
                "irr_tolerance",
                "tolerance must be positive and the iteration cap at least 1",
            ));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn check_range(name: &'static str, (low, high): (f64, f64)) -> Result<()> {
    if !(low.is_finite() && high.is_finite()) || low < 0.0 || low > high {
        return Err(AppraisalError::invalid(
            name,
            format!("expected 0 <= low <= high, got [{}, {}]", low, high),
        ));
    }
    Ok(())
}
