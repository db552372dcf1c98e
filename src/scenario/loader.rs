//! Load batches of named scenario parameters from CSV

use super::ScenarioParameters;
use crate::error::Result;
use csv::Reader;
use std::path::Path;

/// Raw CSV row matching the scenario batch columns
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Description", default)]
    description: String,
    #[serde(rename = "RawMaterialCost")]
    raw_material_cost: f64,
    #[serde(rename = "LaborCost")]
    labor_cost: f64,
    #[serde(rename = "EnergyCost")]
    energy_cost: f64,
    #[serde(rename = "TransportCost")]
    transport_cost: f64,
    #[serde(rename = "Overhead")]
    overhead: f64,
    #[serde(rename = "ProductionVolume")]
    production_volume: f64,
    #[serde(rename = "SellingPrice")]
    selling_price: f64,
    #[serde(rename = "WastageRate")]
    wastage_rate: f64,
    #[serde(rename = "Efficiency")]
    efficiency: f64,
    #[serde(rename = "SeasonalFactor")]
    seasonal_factor: f64,
}

/// One plan read from a batch file
#[derive(Debug, Clone, PartialEq)]
pub struct NamedParameters {
    pub name: String,
    pub description: String,
    pub parameters: ScenarioParameters,
}

impl From<CsvRow> for NamedParameters {
    fn from(row: CsvRow) -> Self {
        Self {
            name: row.name,
            description: row.description,
            parameters: ScenarioParameters {
                raw_material_cost: row.raw_material_cost,
                labor_cost: row.labor_cost,
                energy_cost: row.energy_cost,
                transport_cost: row.transport_cost,
                overhead: row.overhead,
                production_volume: row.production_volume,
                selling_price: row.selling_price,
                wastage_rate: row.wastage_rate,
                efficiency: row.efficiency,
                seasonal_factor: row.seasonal_factor,
            },
        }
    }
}

/// Load all plans from a CSV file. Values are not range-checked here;
/// evaluation reports invalid plans individually.
pub fn load_scenarios<P: AsRef<Path>>(path: P) -> Result<Vec<NamedParameters>> {
    let mut reader = Reader::from_path(path)?;
    let mut plans = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        plans.push(row.into());
    }
    Ok(plans)
}

/// Load plans from any reader
pub fn load_scenarios_from_reader<R: std::io::Read>(reader: R) -> Result<Vec<NamedParameters>> {
    let mut csv_reader = Reader::from_reader(reader);
    let mut plans = Vec::new();
    for result in csv_reader.deserialize() {
        let row: CsvRow = result?;
        plans.push(row.into());
    }
    Ok(plans)
}
