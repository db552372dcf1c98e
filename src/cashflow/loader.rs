//! Load cash flow series from CSV
//!
//! Expected header: `Period,Inflow,Outflow`

use super::{CashFlowPeriod, CashFlowSeries};
use crate::error::Result;
use csv::Reader;
use std::path::Path;

/// Raw CSV row
#[derive(Debug, serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Period")]
    period: u32,
    #[serde(rename = "Inflow")]
    inflow: f64,
    #[serde(rename = "Outflow")]
    outflow: f64,
}

impl CsvRow {
    fn into_period(self) -> Result<CashFlowPeriod> {
        CashFlowPeriod::new(self.period, self.inflow, self.outflow)
    }
}

/// Load a series from a CSV file
pub fn load_cash_flows<P: AsRef<Path>>(path: P) -> Result<CashFlowSeries> {
    let mut reader = Reader::from_path(path)?;
    collect_rows(&mut reader)
}

/// Load a series from any reader (e.g., string buffer, request body)
pub fn load_cash_flows_from_reader<R: std::io::Read>(reader: R) -> Result<CashFlowSeries> {
    let mut csv_reader = Reader::from_reader(reader);
    collect_rows(&mut csv_reader)
}

fn collect_rows<R: std::io::Read>(reader: &mut Reader<R>) -> Result<CashFlowSeries> {
    let mut periods = Vec::new();
    for result in reader.deserialize() {
        let row: CsvRow = result?;
        periods.push(row.into_period()?);
    }
    CashFlowSeries::new(periods)
}
