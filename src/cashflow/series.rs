//! Per-period cash flow records and the ordered series built from them

use serde::{Deserialize, Serialize};

use crate::error::{AppraisalError, Result};

/// A single period's inflow and outflow
///
/// Net flow is always derived from the two gross amounts and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CashFlowPeriod {
    /// Period index (0 = investment date)
    pub period: u32,

    /// Gross inflow for the period (non-negative)
    pub inflow: f64,

    /// Gross outflow for the period (non-negative)
    pub outflow: f64,
}

impl CashFlowPeriod {
    pub fn new(period: u32, inflow: f64, outflow: f64) -> Result<Self> {
        check_amount("inflow", inflow)?;
        check_amount("outflow", outflow)?;
        Ok(Self {
            period,
            inflow,
            outflow,
        })
    }

    /// Inflow minus outflow
    #[inline]
    pub fn net_flow(&self) -> f64 {
        self.inflow - self.outflow
    }

    /// Same period with both gross amounts multiplied by their factors
    pub fn scaled(&self, inflow_factor: f64, outflow_factor: f64) -> Self {
        Self {
            period: self.period,
            inflow: self.inflow * inflow_factor,
            outflow: self.outflow * outflow_factor,
        }
    }
}

fn check_amount(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppraisalError::invalid(
            name,
            format!("must be a finite non-negative amount, got {}", value),
        ));
    }
    Ok(())
}

/// Ordered collection of cash flow periods, unique by period index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CashFlowPeriod>", into = "Vec<CashFlowPeriod>")]
pub struct CashFlowSeries {
    periods: Vec<CashFlowPeriod>,
}

impl CashFlowSeries {
    /// Build a series, sorting by period and rejecting duplicates or invalid amounts
    pub fn new(mut periods: Vec<CashFlowPeriod>) -> Result<Self> {
        for p in &periods {
            check_amount("inflow", p.inflow)?;
            check_amount("outflow", p.outflow)?;
        }

        periods.sort_by_key(|p| p.period);
        if let Some(pair) = periods.windows(2).find(|w| w[0].period == w[1].period) {
            return Err(AppraisalError::invalid(
                "period",
                format!("period {} appears more than once", pair[0].period),
            ));
        }

        Ok(Self { periods })
    }

    /// Build from `(period, inflow, outflow)` tuples
    pub fn from_tuples(rows: &[(u32, f64, f64)]) -> Result<Self> {
        let periods = rows
            .iter()
            .map(|&(period, inflow, outflow)| CashFlowPeriod::new(period, inflow, outflow))
            .collect::<Result<Vec<_>>>()?;
        Self::new(periods)
    }

    /// Classic layout: an investment at period 0 followed by one
    /// `(inflow, outflow)` pair per period starting at 1
    pub fn with_investment(initial_investment: f64, flows: &[(f64, f64)]) -> Result<Self> {
        let mut rows = Vec::with_capacity(flows.len() + 1);
        rows.push((0, 0.0, initial_investment));
        rows.extend(
            flows
                .iter()
                .enumerate()
                .map(|(i, &(inflow, outflow))| (i as u32 + 1, inflow, outflow)),
        );
        Self::from_tuples(&rows)
    }

    pub fn periods(&self) -> &[CashFlowPeriod] {
        &self.periods
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    pub fn get(&self, period: u32) -> Option<&CashFlowPeriod> {
        self.periods
            .binary_search_by_key(&period, |p| p.period)
            .ok()
            .map(|idx| &self.periods[idx])
    }

    /// Insert or replace the record for `record.period`, keeping order
    pub fn upsert(&mut self, record: CashFlowPeriod) -> Result<()> {
        check_amount("inflow", record.inflow)?;
        check_amount("outflow", record.outflow)?;
        match self.periods.binary_search_by_key(&record.period, |p| p.period) {
            Ok(idx) => self.periods[idx] = record,
            Err(idx) => self.periods.insert(idx, record),
        }
        Ok(())
    }

    /// Replace the gross amounts of an existing period
    pub fn set_flows(&mut self, period: u32, inflow: f64, outflow: f64) -> Result<()> {
        check_amount("inflow", inflow)?;
        check_amount("outflow", outflow)?;
        let idx = self
            .periods
            .binary_search_by_key(&period, |p| p.period)
            .map_err(|_| AppraisalError::invalid("period", format!("period {} not in series", period)))?;
        self.periods[idx].inflow = inflow;
        self.periods[idx].outflow = outflow;
        Ok(())
    }

    /// Net flows in period order
    pub fn net_flows(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.periods.iter().map(|p| (p.period, p.net_flow()))
    }

    /// Net flow at period 0, or 0 if the series has no period 0
    pub fn initial_net_flow(&self) -> f64 {
        self.get(0).map(|p| p.net_flow()).unwrap_or(0.0)
    }

    /// Magnitude of the period 0 net flow when it is an outflow, else 0
    pub fn initial_investment(&self) -> f64 {
        let net = self.initial_net_flow();
        if net < 0.0 {
            -net
        } else {
            0.0
        }
    }

    /// New series with every period's gross amounts multiplied by the factors
    /// returned for it
    pub fn map_scaled<F>(&self, mut factors: F) -> Self
    where
        F: FnMut(&CashFlowPeriod) -> (f64, f64),
    {
        let periods = self
            .periods
            .iter()
            .map(|p| {
                let (fi, fo) = factors(p);
                p.scaled(fi, fo)
            })
            .collect();
        Self { periods }
    }

    /// Split into the periods `< at` and the periods `>= at`
    pub fn split_at_period(&self, at: u32) -> (Self, Self) {
        let idx = self.periods.partition_point(|p| p.period < at);
        (
            Self { periods: self.periods[..idx].to_vec() },
            Self { periods: self.periods[idx..].to_vec() },
        )
    }
}

impl TryFrom<Vec<CashFlowPeriod>> for CashFlowSeries {
    type Error = AppraisalError;

    fn try_from(periods: Vec<CashFlowPeriod>) -> Result<Self> {
        Self::new(periods)
    }
}

impl From<CashFlowSeries> for Vec<CashFlowPeriod> {
    fn from(series: CashFlowSeries) -> Self {
        series.periods
    }
}
