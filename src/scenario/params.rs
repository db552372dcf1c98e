//! Production plan parameters and the closed-form cost model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cashflow::CashFlowSeries;
use crate::error::{AppraisalError, Result};

/// Identifier assigned by the scenario engine
pub type ScenarioId = u64;

/// Cost and production drivers of one plan
///
/// Per-unit costs scale with `production_volume`; `transport_cost` is a flat
/// logistics charge per plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParameters {
    /// Raw material cost per unit, scaled by the seasonal factor
    pub raw_material_cost: f64,
    pub labor_cost: f64,
    pub energy_cost: f64,
    /// Flat transport charge (not volume-scaled)
    pub transport_cost: f64,
    pub overhead: f64,
    /// Units processed before efficiency and wastage
    pub production_volume: f64,
    pub selling_price: f64,
    /// Percent of output lost, in [0, 100]
    pub wastage_rate: f64,
    /// Percent line efficiency, in (0, 100]
    pub efficiency: f64,
    /// Multiplier on raw material cost (1.0 = average season)
    pub seasonal_factor: f64,
}

impl ScenarioParameters {
    /// Range checks on every field
    pub fn validate(&self) -> Result<()> {
        let costs = [
            ("raw_material_cost", self.raw_material_cost),
            ("labor_cost", self.labor_cost),
            ("energy_cost", self.energy_cost),
            ("transport_cost", self.transport_cost),
            ("overhead", self.overhead),
        ];
        for (name, value) in costs {
            if !value.is_finite() || value < 0.0 {
                return Err(AppraisalError::invalid(
                    name,
                    format!("must be a finite non-negative cost, got {}", value),
                ));
            }
        }

        let positives = [
            ("production_volume", self.production_volume),
            ("selling_price", self.selling_price),
            ("seasonal_factor", self.seasonal_factor),
        ];
        for (name, value) in positives {
            if !value.is_finite() || value <= 0.0 {
                return Err(AppraisalError::invalid(name, format!("must be positive, got {}", value)));
            }
        }

        if !(0.0..=100.0).contains(&self.wastage_rate) {
            return Err(AppraisalError::invalid(
                "wastage_rate",
                format!("must be within [0, 100], got {}", self.wastage_rate),
            ));
        }
        if !(self.efficiency > 0.0 && self.efficiency <= 100.0) {
            return Err(AppraisalError::invalid(
                "efficiency",
                format!("must be within (0, 100], got {}", self.efficiency),
            ));
        }
        Ok(())
    }

    /// Saleable units after efficiency and wastage
    pub fn adjusted_volume(&self) -> f64 {
        self.production_volume * (self.efficiency / 100.0) * (1.0 - self.wastage_rate / 100.0)
    }

    /// Total plan cost; transport is added once, every other driver per unit
    pub fn total_cost(&self) -> f64 {
        let volume = self.production_volume;
        self.raw_material_cost * volume * self.seasonal_factor
            + self.labor_cost * volume
            + self.energy_cost * volume
            + self.transport_cost
            + self.overhead * volume
    }

    /// Level series for DCF tools: period 0 holds the investment, periods
    /// 1..=periods repeat this plan's revenue and total cost
    pub fn to_cash_flow_series(&self, initial_investment: f64, periods: u32) -> Result<CashFlowSeries> {
        let result = evaluate_scenario(self)?;
        if periods == 0 {
            return Err(AppraisalError::invalid("periods", "at least one operating period is required"));
        }
        let flows = vec![(result.revenue, result.total_cost); periods as usize];
        CashFlowSeries::with_investment(initial_investment, &flows)
    }
}

/// Derived financials of a plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub adjusted_volume: f64,
    pub total_cost: f64,
    pub unit_cost: f64,
    pub revenue: f64,
    pub gross_profit: f64,
    /// Units that must be sold at `selling_price` to cover total cost
    pub break_even_point: f64,
    /// Percent of revenue
    pub profit_margin: f64,
    /// Percent of total cost
    pub roi: f64,
}

/// Evaluate the cost model; every division is guarded
pub fn evaluate_scenario(parameters: &ScenarioParameters) -> Result<ScenarioResult> {
    parameters.validate()?;

    let adjusted_volume = parameters.adjusted_volume();
    if adjusted_volume <= 0.0 {
        return Err(AppraisalError::invalid(
            "adjusted_volume",
            format!(
                "no saleable output (efficiency {}%, wastage {}%)",
                parameters.efficiency, parameters.wastage_rate
            ),
        ));
    }

    let total_cost = parameters.total_cost();
    let unit_cost = total_cost / adjusted_volume;

    let revenue = parameters.selling_price * adjusted_volume;
    if revenue <= 0.0 {
        return Err(AppraisalError::invalid("revenue", "revenue must be positive"));
    }
    let gross_profit = revenue - total_cost;
    let profit_margin = gross_profit / revenue * 100.0;

    if total_cost <= 0.0 {
        return Err(AppraisalError::invalid("total_cost", "total cost must be positive"));
    }
    let break_even_point = total_cost / parameters.selling_price;
    let roi = gross_profit / total_cost * 100.0;

    Ok(ScenarioResult {
        adjusted_volume,
        total_cost,
        unit_cost,
        revenue,
        gross_profit,
        break_even_point,
        profit_margin,
        roi,
    })
}

/// Partial update of individual parameters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterPatch {
    pub raw_material_cost: Option<f64>,
    pub labor_cost: Option<f64>,
    pub energy_cost: Option<f64>,
    pub transport_cost: Option<f64>,
    pub overhead: Option<f64>,
    pub production_volume: Option<f64>,
    pub selling_price: Option<f64>,
    pub wastage_rate: Option<f64>,
    pub efficiency: Option<f64>,
    pub seasonal_factor: Option<f64>,
}

impl ParameterPatch {
    pub fn apply(&self, base: &ScenarioParameters) -> ScenarioParameters {
        ScenarioParameters {
            raw_material_cost: self.raw_material_cost.unwrap_or(base.raw_material_cost),
            labor_cost: self.labor_cost.unwrap_or(base.labor_cost),
            energy_cost: self.energy_cost.unwrap_or(base.energy_cost),
            transport_cost: self.transport_cost.unwrap_or(base.transport_cost),
            overhead: self.overhead.unwrap_or(base.overhead),
            production_volume: self.production_volume.unwrap_or(base.production_volume),
            selling_price: self.selling_price.unwrap_or(base.selling_price),
            wastage_rate: self.wastage_rate.unwrap_or(base.wastage_rate),
            efficiency: self.efficiency.unwrap_or(base.efficiency),
            seasonal_factor: self.seasonal_factor.unwrap_or(base.seasonal_factor),
        }
    }
}

impl From<ScenarioParameters> for ParameterPatch {
    /// Patch that replaces every parameter
    fn from(p: ScenarioParameters) -> Self {
        Self {
            raw_material_cost: Some(p.raw_material_cost),
            labor_cost: Some(p.labor_cost),
            energy_cost: Some(p.energy_cost),
            transport_cost: Some(p.transport_cost),
            overhead: Some(p.overhead),
            production_volume: Some(p.production_volume),
            selling_price: Some(p.selling_price),
            wastage_rate: Some(p.wastage_rate),
            efficiency: Some(p.efficiency),
            seasonal_factor: Some(p.seasonal_factor),
        }
    }
}

/// Edit to a stored scenario; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: ParameterPatch,
}

/// A named, persisted production plan with its cached result
///
/// `result` is always recomputed from `parameters` by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    pub description: String,
    pub parameters: ScenarioParameters,
    pub result: ScenarioResult,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn reference_parameters() -> ScenarioParameters {
    ScenarioParameters {
        raw_material_cost: 100.0,
        labor_cost: 50.0,
        energy_cost: 20.0,
        transport_cost: 15.0,
        overhead: 30.0,
        production_volume: 1000.0,
        selling_price: 300.0,
        wastage_rate: 5.0,
        efficiency: 85.0,
        seasonal_factor: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn test_reference_evaluation() {
        let result = evaluate_scenario(&reference_parameters()).unwrap();

        assert_relative_eq!(result.adjusted_volume, 807.5, epsilon = 1e-9);
        assert_relative_eq!(result.total_cost, 200_015.0, epsilon = 1e-9);
        assert_relative_eq!(result.unit_cost, 200_015.0 / 807.5, epsilon = 1e-9);
        assert_relative_eq!(result.unit_cost, 247.6966, epsilon = 1e-4);
        assert_relative_eq!(result.revenue, 242_250.0, epsilon = 1e-9);
        assert_relative_eq!(result.gross_profit, 42_235.0, epsilon = 1e-6);
        assert_relative_eq!(result.profit_margin, 42_235.0 / 242_250.0 * 100.0, epsilon = 1e-9);
        assert_relative_eq!(result.break_even_point, 200_015.0 / 300.0, epsilon = 1e-9);
        assert_relative_eq!(result.roi, 42_235.0 / 200_015.0 * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_transport_is_flat() {
        let mut doubled = reference_parameters();
        doubled.production_volume = 2000.0;
        let base = evaluate_scenario(&reference_parameters()).unwrap();
        let big = evaluate_scenario(&doubled).unwrap();
        // Every per-unit driver doubles, the 15 transport charge does not
        assert_relative_eq!(big.total_cost, 2.0 * (base.total_cost - 15.0) + 15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seasonal_factor_scales_raw_material_only() {
        let mut peak = reference_parameters();
        peak.seasonal_factor = 1.5;
        let result = evaluate_scenario(&peak).unwrap();
        assert_relative_eq!(result.total_cost, 250_015.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_selling_price_rejected() {
        let mut params = reference_parameters();
        params.selling_price = 0.0;
        assert!(evaluate_scenario(&params).unwrap_err().is_invalid_parameter());
    }

    #[test]
    fn test_total_wastage_rejected() {
        let mut params = reference_parameters();
        params.wastage_rate = 100.0;
        let err = evaluate_scenario(&params).unwrap_err();
        assert!(err.to_string().contains("adjusted_volume"));
    }

    #[test]
    fn test_zero_efficiency_rejected() {
        let mut params = reference_parameters();
        params.efficiency = 0.0;
        assert!(evaluate_scenario(&params).is_err());
    }

    #[test]
    fn test_zero_cost_rejected() {
        let params = ScenarioParameters {
            raw_material_cost: 0.0,
            labor_cost: 0.0,
            energy_cost: 0.0,
            transport_cost: 0.0,
            overhead: 0.0,
            ..reference_parameters()
        };
        let err = evaluate_scenario(&params).unwrap_err();
        assert!(err.to_string().contains("total_cost"));
    }

    #[test]
    fn test_negative_cost_rejected() {
        let params = ScenarioParameters {
            labor_cost: -1.0,
            ..reference_parameters()
        };
        assert!(evaluate_scenario(&params).is_err());
    }

    #[test]
    fn test_parameter_patch() {
        let patch = ParameterPatch {
            labor_cost: Some(60.0),
            ..Default::default()
        };
        let patched = patch.apply(&reference_parameters());
        assert_eq!(patched.labor_cost, 60.0);
        assert_eq!(patched.raw_material_cost, 100.0);

        let full: ParameterPatch = reference_parameters().into();
        assert_eq!(full.apply(&patched), reference_parameters());
    }

    #[test]
    fn test_to_cash_flow_series() {
        let series = reference_parameters().to_cash_flow_series(100_000.0, 3).unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.initial_investment(), 100_000.0);
        assert_relative_eq!(series.get(2).unwrap().net_flow(), 42_235.0, epsilon = 1e-6);
        assert!(reference_parameters().to_cash_flow_series(100_000.0, 0).is_err());
    }

    fn parameters_strategy() -> impl Strategy<Value = ScenarioParameters> {
        (
            (0.0f64..500.0, 0.0f64..200.0, 0.0f64..100.0, 0.0f64..10_000.0, 0.0f64..100.0),
            (1.0f64..100_000.0, 1.0f64..1_000.0, 0.0f64..99.0, 1.0f64..100.0, 0.5f64..2.0),
        )
            .prop_map(|((raw, labor, energy, transport, overhead), (volume, price, wastage, efficiency, seasonal))| {
                ScenarioParameters {
                    raw_material_cost: raw,
                    labor_cost: labor,
                    energy_cost: energy,
                    transport_cost: transport,
                    overhead,
                    production_volume: volume,
                    selling_price: price,
                    wastage_rate: wastage,
                    efficiency,
                    seasonal_factor: seasonal,
                }
            })
    }

    proptest! {
        #[test]
        fn prop_evaluation_is_deterministic(params in parameters_strategy()) {
            let first = evaluate_scenario(&params);
            let second = evaluate_scenario(&params);
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(a, b),
                (Err(_), Err(_)) => {}
                _ => prop_assert!(false, "evaluation outcome changed between calls"),
            }
        }

        #[test]
        fn prop_profit_identity(params in parameters_strategy()) {
            if let Ok(r) = evaluate_scenario(&params) {
                prop_assert!((r.revenue - r.total_cost - r.gross_profit).abs() <= 1e-9 * r.revenue.max(r.total_cost));
                prop_assert!(r.unit_cost >= 0.0);
            }
        }
    }
}
