//! One-at-a-time sensitivity (tornado) analysis of NPV
//!
//! Each driver is shifted up and down by the same fraction while everything
//! else stays at baseline:
//! - discount rate: the percent rate itself is scaled
//! - initial investment: the period 0 outlay grows or shrinks by
//!   `shift * initial_investment`, undiscounted
//! - cash flow scale: gross amounts of every period except 0 are scaled,
//!   period 0 being a sunk cost

use serde::{Deserialize, Serialize};

use super::dcf::{check_rate, npv};
use crate::cashflow::CashFlowSeries;
use crate::config::EngineConfig;
use crate::error::{AppraisalError, Result};

/// NPV driver perturbed by the analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensitivityDriver {
    DiscountRate,
    InitialInvestment,
    CashFlowScale,
}

impl SensitivityDriver {
    pub const ALL: [SensitivityDriver; 3] = [
        SensitivityDriver::DiscountRate,
        SensitivityDriver::InitialInvestment,
        SensitivityDriver::CashFlowScale,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SensitivityDriver::DiscountRate => "discountRate",
            SensitivityDriver::InitialInvestment => "initialInvestment",
            SensitivityDriver::CashFlowScale => "cashFlowScale",
        }
    }
}

/// NPV impact of shifting one driver in one direction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityEntry {
    pub driver: SensitivityDriver,
    /// Signed fractional shift (0.10 = +10%)
    pub shift: f64,
    pub perturbed_npv: f64,
    /// perturbed_npv - baseline_npv
    pub delta_npv: f64,
}

/// Baseline NPV plus one entry per driver and direction, in driver order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub baseline_npv: f64,
    pub entries: Vec<SensitivityEntry>,
}

impl SensitivityReport {
    /// Entries ranked by |delta_npv|, largest first
    pub fn tornado(&self) -> Vec<SensitivityEntry> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.delta_npv.abs().total_cmp(&a.delta_npv.abs()));
        ranked
    }

    pub fn entry(&self, driver: SensitivityDriver, shift: f64) -> Option<&SensitivityEntry> {
        self.entries
            .iter()
            .find(|e| e.driver == driver && (e.shift - shift).abs() < 1e-12)
    }
}

/// Sensitivity analyzer with a configurable shift size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitivityAnalyzer {
    /// Fractional shift applied in each direction
    pub shift: f64,
}

impl Default for SensitivityAnalyzer {
    fn default() -> Self {
        Self { shift: 0.10 }
    }
}

impl SensitivityAnalyzer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            shift: config.sensitivity_shift,
        }
    }

    pub fn analyze(
        &self,
        series: &CashFlowSeries,
        discount_rate_pct: f64,
        initial_investment: f64,
    ) -> Result<SensitivityReport> {
        check_rate(discount_rate_pct)?;
        if series.is_empty() {
            return Err(AppraisalError::invalid("series", "cash flow series is empty"));
        }
        if !initial_investment.is_finite() || initial_investment <= 0.0 {
            return Err(AppraisalError::invalid(
                "initial_investment",
                format!("must be positive, got {}", initial_investment),
            ));
        }
        if !(self.shift > 0.0 && self.shift < 1.0) {
            return Err(AppraisalError::invalid(
                "sensitivity_shift",
                format!("must be in (0, 1), got {}", self.shift),
            ));
        }

        let baseline_npv = npv(series, discount_rate_pct);

        let mut entries = Vec::with_capacity(SensitivityDriver::ALL.len() * 2);
        for driver in SensitivityDriver::ALL {
            for shift in [self.shift, -self.shift] {
                let perturbed_npv = match driver {
                    SensitivityDriver::DiscountRate => {
                        let shifted_rate = discount_rate_pct * (1.0 + shift);
                        check_rate(shifted_rate)?;
                        npv(series, shifted_rate)
                    }
                    SensitivityDriver::InitialInvestment => baseline_npv - shift * initial_investment,
                    SensitivityDriver::CashFlowScale => {
                        let factor = 1.0 + shift;
                        let scaled = series.map_scaled(|p| {
                            if p.period == 0 {
                                (1.0, 1.0)
                            } else {
                                (factor, factor)
                            }
                        });
                        npv(&scaled, discount_rate_pct)
                    }
                };
                entries.push(SensitivityEntry {
                    driver,
                    shift,
                    perturbed_npv,
                    delta_npv: perturbed_npv - baseline_npv,
                });
            }
        }

        Ok(SensitivityReport { baseline_npv, entries })
    }
}

/// Sensitivity analysis with the default ±10% shift
pub fn analyze_sensitivity(
    series: &CashFlowSeries,
    discount_rate_pct: f64,
    initial_investment: f64,
) -> Result<SensitivityReport> {
    SensitivityAnalyzer::default().analyze(series, discount_rate_pct, initial_investment)
}
