//! Cash flow data model shared by every analyzer

mod series;
pub mod loader;

pub use series::{CashFlowPeriod, CashFlowSeries};
pub use loader::{load_cash_flows, load_cash_flows_from_reader};
