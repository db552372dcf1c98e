//! Internal Rate of Return (IRR) calculation
//!
//! Newton-Raphson on `f(r) = Σ net_t / (1+r)^t`. A vanishing derivative or an
//! exhausted iteration budget is reported as `NonConvergence`; the last
//! estimate is never returned as if it were a root.

use log::debug;

use crate::cashflow::CashFlowSeries;
use crate::config::EngineConfig;
use crate::error::{AppraisalError, Result};

/// Relative size below which the derivative is treated as zero
const DERIVATIVE_EPSILON: f64 = 1e-10;

/// Newton-Raphson IRR solver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrrSolver {
    /// Starting periodic rate as a decimal (0.10 = 10%)
    pub initial_guess: f64,

    /// Stop once |NPV| falls below this amount
    pub tolerance: f64,

    pub max_iterations: u32,
}

impl Default for IrrSolver {
    fn default() -> Self {
        Self {
            initial_guess: 0.10,
            tolerance: 1e-4,
            max_iterations: 100,
        }
    }
}

impl IrrSolver {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            initial_guess: config.irr_initial_guess,
            tolerance: config.irr_tolerance,
            max_iterations: config.irr_max_iterations,
        }
    }

    /// Retry helper: same settings, different starting point
    pub fn with_initial_guess(self, initial_guess: f64) -> Self {
        Self { initial_guess, ..self }
    }

    /// Solve for the IRR, returned in percent
    pub fn solve(&self, series: &CashFlowSeries) -> Result<f64> {
        let flows: Vec<(u32, f64)> = series.net_flows().collect();

        // At least one sign change is required for a root to exist
        let has_positive = flows.iter().any(|&(_, cf)| cf > 0.0);
        let has_negative = flows.iter().any(|&(_, cf)| cf < 0.0);
        if !has_positive || !has_negative {
            return Err(AppraisalError::NonConvergence {
                iterations: 0,
                reason: "net flows never change sign".to_string(),
            });
        }

        let scale: f64 = flows
            .iter()
            .map(|&(t, cf)| (t as f64).max(1.0) * cf.abs())
            .sum();

        let mut rate = self.initial_guess;
        for iteration in 0..self.max_iterations {
            let (npv, dnpv) = npv_and_derivative(&flows, rate);

            if npv.abs() < self.tolerance {
                debug!("IRR converged to {:.6} after {} iterations", rate, iteration);
                return Ok(rate * 100.0);
            }

            if !dnpv.is_finite() || dnpv.abs() <= DERIVATIVE_EPSILON * scale {
                return Err(AppraisalError::NonConvergence {
                    iterations: iteration,
                    reason: format!("derivative vanished at rate {}", rate),
                });
            }

            rate -= npv / dnpv;

            if !rate.is_finite() || rate <= -1.0 {
                return Err(AppraisalError::NonConvergence {
                    iterations: iteration + 1,
                    reason: format!("iterate left the domain (rate = {})", rate),
                });
            }
        }

        let (npv, _) = npv_and_derivative(&flows, rate);
        if npv.abs() < self.tolerance {
            return Ok(rate * 100.0);
        }

        Err(AppraisalError::NonConvergence {
            iterations: self.max_iterations,
            reason: format!("|NPV| = {:.6} still above tolerance {}", npv.abs(), self.tolerance),
        })
    }
}

/// Calculate NPV and its derivative with respect to a decimal rate
fn npv_and_derivative(flows: &[(u32, f64)], rate: f64) -> (f64, f64) {
    let mut npv = 0.0;
    let mut dnpv = 0.0;

    for &(t, cf) in flows {
        let growth = (1.0 + rate).powi(t as i32);
        npv += cf / growth;
        if t > 0 {
            dnpv -= (t as f64) * cf / (growth * (1.0 + rate));
        }
    }

    (npv, dnpv)
}

/// IRR in percent with the default solver settings
pub fn solve_irr(series: &CashFlowSeries) -> Result<f64> {
    IrrSolver::default().solve(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{npv, reference_series};
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn test_simple_irr() {
        // Investment of $1000 returning $1100 one period later
        let series = CashFlowSeries::with_investment(1000.0, &[(1100.0, 0.0)]).unwrap();
        let irr = solve_irr(&series).unwrap();
        assert_abs_diff_eq!(irr, 10.0, epsilon = 1e-6);
    }

    #[test]
    fn test_reference_irr() {
        let series = reference_series();
        let irr = solve_irr(&series).unwrap();
        assert_abs_diff_eq!(irr, 10.61398, epsilon = 1e-3);
        assert_abs_diff_eq!(npv(&series, irr), 0.0, epsilon = 1e-2);
    }

    #[test]
    fn test_no_sign_change() {
        let series = CashFlowSeries::from_tuples(&[(0, 100.0, 0.0), (1, 50.0, 0.0)]).unwrap();
        assert!(solve_irr(&series).unwrap_err().is_non_convergence());

        let empty = CashFlowSeries::default();
        assert!(solve_irr(&empty).is_err());
    }

    #[test]
    fn test_vanishing_derivative() {
        // f'(0.10) = -100/1.1^2 + 2*55/1.1^3 = 0
        let series = CashFlowSeries::from_tuples(&[
            (0, 0.0, 10.0),
            (1, 100.0, 0.0),
            (2, 0.0, 55.0),
        ])
        .unwrap();
        let err = solve_irr(&series).unwrap_err();
        assert!(err.is_non_convergence());
        assert!(err.to_string().contains("derivative"));
    }

    #[test]
    fn test_iteration_cap() {
        let solver = IrrSolver {
            max_iterations: 1,
            ..Default::default()
        };
        let err = solver.solve(&reference_series()).unwrap_err();
        assert!(matches!(err, AppraisalError::NonConvergence { iterations: 1, .. }));
    }

    #[test]
    fn test_retry_with_other_guess() {
        let solver = IrrSolver::default().with_initial_guess(0.5);
        let irr = solver.solve(&reference_series()).unwrap();
        assert_abs_diff_eq!(irr, 10.61398, epsilon = 1e-3);
    }

    fn conventional_series() -> impl Strategy<Value = CashFlowSeries> {
        (
            1_000.0f64..1_000_000.0,
            prop::collection::vec(0.0f64..0.6, 1..15),
        )
            .prop_map(|(investment, fractions)| {
                let flows: Vec<(f64, f64)> = fractions.iter().map(|f| (f * investment, 0.0)).collect();
                CashFlowSeries::with_investment(investment, &flows).unwrap()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_irr_zeroes_npv(series in conventional_series()) {
            // Undiscounted inflows cover the investment, so the root is >= 0%
            // and the first Newton step cannot leave the domain
            prop_assume!(npv(&series, 0.0) >= 0.0);
            let irr = solve_irr(&series);
            prop_assert!(irr.is_ok(), "solver failed: {:?}", irr);
            let irr = irr.unwrap();
            prop_assert!(npv(&series, irr).abs() < 1e-2);
        }

        #[test]
        fn prop_converges_when_root_above_guess(series in conventional_series()) {
            prop_assume!(npv(&series, 10.0) > 0.0);
            let irr = solve_irr(&series);
            prop_assert!(irr.is_ok());
            prop_assert!(irr.unwrap() >= 10.0);
        }
    }
}
