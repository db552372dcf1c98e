//! Named production-plan scenarios and their cost model

mod params;
mod engine;
mod store;
pub mod loader;

pub use params::{
    evaluate_scenario, ParameterPatch, Scenario, ScenarioId, ScenarioParameters, ScenarioPatch,
    ScenarioResult,
};
pub use engine::{ScenarioComparison, ScenarioEngine, COPY_SUFFIX};
pub use store::{InMemoryScenarioStore, JsonFileScenarioStore, ScenarioStore};
pub use loader::{load_scenarios, load_scenarios_from_reader, NamedParameters};
