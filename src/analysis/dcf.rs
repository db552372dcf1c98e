//! Discounted cash flow analysis: NPV, payback periods and profitability index
//!
//! Discount rates are expressed in percent (10 = 10%) and applied per period:
//! the period `t` flow is divided by `(1 + r/100)^t`, period 0 included.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::irr::IrrSolver;
use crate::cashflow::CashFlowSeries;
use crate::error::{AppraisalError, Result};

/// Result of a discounted cash flow analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfResult {
    /// Net present value at the requested rate
    pub npv: f64,

    /// Internal rate of return in percent, None if the solver found no root
    pub irr: Option<f64>,

    /// First period at which the cumulative undiscounted net flow is >= 0
    pub payback_period: Option<u32>,

    /// First period at which the cumulative discounted net flow is >= 0
    pub discounted_payback: Option<u32>,

    /// PV of the period >= 1 gross inflows over the initial investment
    pub profitability_index: f64,
}

/// Check a percent discount rate
pub(crate) fn check_rate(discount_rate_pct: f64) -> Result<()> {
    if !discount_rate_pct.is_finite() || discount_rate_pct <= -100.0 {
        return Err(AppraisalError::invalid(
            "discount_rate",
            format!("must be finite and above -100%, got {}", discount_rate_pct),
        ));
    }
    Ok(())
}

/// Discount factor for `period` at a percent rate
#[inline]
pub fn discount_factor(discount_rate_pct: f64, period: u32) -> f64 {
    1.0 / (1.0 + discount_rate_pct / 100.0).powi(period as i32)
}

/// Net present value of the series at a percent rate
pub fn npv(series: &CashFlowSeries, discount_rate_pct: f64) -> f64 {
    series
        .net_flows()
        .map(|(period, net)| net * discount_factor(discount_rate_pct, period))
        .sum()
}

/// `(period, discounted net flow)` for every period
pub fn discounted_flows(series: &CashFlowSeries, discount_rate_pct: f64) -> Vec<(u32, f64)> {
    series
        .net_flows()
        .map(|(period, net)| (period, net * discount_factor(discount_rate_pct, period)))
        .collect()
}

/// First period after 0 where the running total (seeded with the period 0
/// flow) becomes non-negative
fn payback<I>(initial: f64, flows: I) -> Option<u32>
where
    I: Iterator<Item = (u32, f64)>,
{
    let mut cumulative = initial;
    for (period, value) in flows {
        cumulative += value;
        if cumulative >= 0.0 {
            return Some(period);
        }
    }
    None
}

/// Full DCF analysis of a series at a percent discount rate
///
/// Fails with `InvalidParameter` if the rate is not usable or if period 0
/// carries no investment outflow (the profitability index would divide by zero).
pub fn analyze_cash_flow(series: &CashFlowSeries, discount_rate_pct: f64) -> Result<DcfResult> {
    check_rate(discount_rate_pct)?;

    let investment = series.initial_investment();
    if investment <= 0.0 {
        return Err(AppraisalError::invalid(
            "initial_investment",
            "period 0 must hold a positive investment outflow",
        ));
    }

    let discounted = discounted_flows(series, discount_rate_pct);
    let npv: f64 = discounted.iter().map(|&(_, v)| v).sum();

    let initial = series.initial_net_flow();
    let payback_period = payback(initial, series.net_flows().filter(|&(p, _)| p > 0));
    let discounted_payback = payback(initial, discounted.iter().copied().filter(|&(p, _)| p > 0));

    let pv_inflows: f64 = series
        .periods()
        .iter()
        .filter(|p| p.period > 0)
        .map(|p| p.inflow * discount_factor(discount_rate_pct, p.period))
        .sum();
    let profitability_index = pv_inflows / investment;

    let irr = match IrrSolver::default().solve(series) {
        Ok(rate) => Some(rate),
        Err(err) => {
            warn!("IRR unavailable for {}-period series: {}", series.len(), err);
            None
        }
    };

    debug!(
        "DCF at {}%: npv={:.2} payback={:?} discounted_payback={:?} pi={:.4}",
        discount_rate_pct, npv, payback_period, discounted_payback, profitability_index
    );

    Ok(DcfResult {
        npv,
        irr,
        payback_period,
        discounted_payback,
        profitability_index,
    })
}
