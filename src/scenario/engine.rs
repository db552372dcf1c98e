//! Scenario lifecycle: create, update, duplicate, delete, compare
//!
//! The store sits behind a mutex together with the id counter. Every
//! read-modify-write runs under that lock, so concurrent edits of the same
//! scenario are serialized and none is lost.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use super::params::{evaluate_scenario, Scenario, ScenarioId, ScenarioParameters, ScenarioPatch, ScenarioResult};
use super::store::ScenarioStore;
use crate::analysis::{SensitivityAnalyzer, SensitivityReport};
use crate::error::{AppraisalError, Result};

/// Suffix appended to the name of a duplicated scenario
pub const COPY_SUFFIX: &str = " (copy)";

/// Side-by-side results of two scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioComparison {
    pub a_id: ScenarioId,
    pub a_name: String,
    pub a: ScenarioResult,
    pub b_id: ScenarioId,
    pub b_name: String,
    pub b: ScenarioResult,
}

impl ScenarioComparison {
    /// Gross profit of b minus gross profit of a
    pub fn profit_gap(&self) -> f64 {
        self.b.gross_profit - self.a.gross_profit
    }
}

struct EngineState<S> {
    store: S,
    next_id: ScenarioId,
}

/// Owns the scenario collection and keeps every cached result current
pub struct ScenarioEngine<S: ScenarioStore> {
    state: Mutex<EngineState<S>>,
}

impl<S: ScenarioStore> ScenarioEngine<S> {
    /// Wrap a store; new ids continue after the largest id it has ever held
    pub fn new(store: S) -> Result<Self> {
        let next_id = store.high_water_id()? + 1;
        Ok(Self {
            state: Mutex::new(EngineState { store, next_id }),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, EngineState<S>>> {
        self.state
            .lock()
            .map_err(|_| AppraisalError::StoreUnavailable("scenario lock poisoned".to_string()))
    }

    /// Pure evaluation, no store access
    pub fn evaluate(&self, parameters: &ScenarioParameters) -> Result<ScenarioResult> {
        evaluate_scenario(parameters)
    }

    pub fn create(&self, name: &str, description: &str, parameters: ScenarioParameters) -> Result<Scenario> {
        let result = evaluate_scenario(&parameters)?;
        let now = Utc::now();

        let mut state = self.lock()?;
        let scenario = Scenario {
            id: state.next_id,
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            result,
            created_at: now,
            updated_at: now,
        };
        state.store.put(scenario.clone())?;
        state.next_id += 1;

        info!("Created scenario {} '{}'", scenario.id, scenario.name);
        Ok(scenario)
    }

    /// Apply a patch, re-evaluate and refresh `updated_at`.
    /// An invalid patch leaves the stored scenario untouched.
    pub fn update(&self, id: ScenarioId, patch: ScenarioPatch) -> Result<Scenario> {
        let mut state = self.lock()?;
        let mut scenario = state.store.get(id)?.ok_or(AppraisalError::ScenarioNotFound(id))?;

        let parameters = patch.parameters.apply(&scenario.parameters);
        scenario.result = evaluate_scenario(&parameters)?;
        scenario.parameters = parameters;
        if let Some(name) = patch.name {
            scenario.name = name;
        }
        if let Some(description) = patch.description {
            scenario.description = description;
        }
        scenario.updated_at = Utc::now();

        state.store.put(scenario.clone())?;
        info!("Updated scenario {}", id);
        Ok(scenario)
    }

    /// Copy parameters into a new scenario named "<name> (copy)"
    pub fn duplicate(&self, id: ScenarioId) -> Result<Scenario> {
        let mut state = self.lock()?;
        let source = state.store.get(id)?.ok_or(AppraisalError::ScenarioNotFound(id))?;

        let now = Utc::now();
        let copy = Scenario {
            id: state.next_id,
            name: format!("{}{}", source.name, COPY_SUFFIX),
            description: source.description.clone(),
            parameters: source.parameters,
            result: evaluate_scenario(&source.parameters)?,
            created_at: now,
            updated_at: now,
        };
        state.store.put(copy.clone())?;
        state.next_id += 1;

        info!("Duplicated scenario {} as {}", id, copy.id);
        Ok(copy)
    }

    /// Remove a scenario together with its cached result
    pub fn delete(&self, id: ScenarioId) -> Result<Scenario> {
        let mut state = self.lock()?;
        let removed = state.store.delete(id)?.ok_or(AppraisalError::ScenarioNotFound(id))?;
        info!("Deleted scenario {} '{}'", id, removed.name);
        Ok(removed)
    }

    pub fn get(&self, id: ScenarioId) -> Result<Scenario> {
        self.lock()?.store.get(id)?.ok_or(AppraisalError::ScenarioNotFound(id))
    }

    pub fn list(&self) -> Result<Vec<Scenario>> {
        self.lock()?.store.list()
    }

    /// Read both scenarios under one lock so the pair is consistent
    pub fn compare(&self, a: ScenarioId, b: ScenarioId) -> Result<ScenarioComparison> {
        let state = self.lock()?;
        let first = state.store.get(a)?.ok_or(AppraisalError::ScenarioNotFound(a))?;
        let second = state.store.get(b)?.ok_or(AppraisalError::ScenarioNotFound(b))?;
        Ok(ScenarioComparison {
            a_id: first.id,
            a_name: first.name,
            a: first.result,
            b_id: second.id,
            b_name: second.name,
            b: second.result,
        })
    }

    /// Tornado analysis of one scenario projected over `periods` operating periods
    pub fn sensitivity(
        &self,
        id: ScenarioId,
        analyzer: &SensitivityAnalyzer,
        initial_investment: f64,
        periods: u32,
        discount_rate_pct: f64,
    ) -> Result<SensitivityReport> {
        let parameters = self.get(id)?.parameters;
        let series = parameters.to_cash_flow_series(initial_investment, periods)?;
        analyzer.analyze(&series, discount_rate_pct, initial_investment)
    }

    /// Give back the underlying store
    pub fn into_store(self) -> Result<S> {
        self.state
            .into_inner()
            .map(|state| state.store)
            .map_err(|_| AppraisalError::StoreUnavailable("scenario lock poisoned".to_string()))
    }
}
