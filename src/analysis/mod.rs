//! Investment appraisal analyzers over cash flow series

mod dcf;
mod irr;
mod monte_carlo;
mod sensitivity;

pub use dcf::{analyze_cash_flow, discount_factor, discounted_flows, npv, DcfResult};
pub use irr::{solve_irr, IrrSolver};
pub use monte_carlo::{
    run_monte_carlo, CancellationToken, MonteCarloResult, MonteCarloSimulator, SimulationHandle,
    REPORTED_PERCENTILES,
};
pub use sensitivity::{
    analyze_sensitivity, SensitivityAnalyzer, SensitivityDriver, SensitivityEntry, SensitivityReport,
};

/// Investment of 500k followed by five growing periods
#[cfg(test)]
pub(crate) fn reference_series() -> crate::cashflow::CashFlowSeries {
    crate::cashflow::CashFlowSeries::from_tuples(&[
        (0, 0.0, 500_000.0),
        (1, 200_000.0, 120_000.0),
        (2, 250_000.0, 140_000.0),
        (3, 300_000.0, 160_000.0),
        (4, 350_000.0, 180_000.0),
        (5, 400_000.0, 200_000.0),
    ])
    .unwrap()
}
