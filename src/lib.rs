//! Appraisal Engine - Investment appraisal and risk simulation for seafood-processing plans
//!
//! This library provides:
//! - Cash flow series modeling and CSV loading
//! - Discounted cash flow analysis (NPV, payback, profitability index)
//! - IRR solving with explicit non-convergence reporting
//! - Parallel, cancellable Monte Carlo NPV simulation
//! - One-at-a-time sensitivity (tornado) analysis
//! - Named production-plan scenarios with a closed-form cost model

pub mod error;
pub mod config;
pub mod cashflow;
pub mod analysis;
pub mod scenario;

// Re-export commonly used types
pub use error::{AppraisalError, Result};
pub use config::EngineConfig;
pub use cashflow::{CashFlowPeriod, CashFlowSeries};
pub use analysis::{
    analyze_cash_flow, analyze_sensitivity, run_monte_carlo, solve_irr, DcfResult, MonteCarloResult,
    MonteCarloSimulator, SensitivityReport,
};
pub use scenario::{
    evaluate_scenario, Scenario, ScenarioEngine, ScenarioParameters, ScenarioResult, ScenarioStore,
};
