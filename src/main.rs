//! Appraisal Engine CLI
//!
//! Command-line interface for cash flow appraisal, risk simulation and
//! scenario management. Results are printed as JSON.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use appraisal_engine::analysis::{
    analyze_cash_flow, IrrSolver, MonteCarloSimulator, SensitivityAnalyzer,
};
use appraisal_engine::cashflow::{load_cash_flows, CashFlowSeries};
use appraisal_engine::scenario::{
    JsonFileScenarioStore, ScenarioEngine, ScenarioId, ScenarioParameters, ScenarioPatch,
};
use appraisal_engine::EngineConfig;
use clap::{Parser, Subcommand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "appraisal_engine", version, about = "Investment appraisal and risk simulation")]
struct Cli {
    /// JSON engine configuration (defaults + APPRAISAL_* env vars otherwise)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// NPV, IRR, payback periods and profitability index
    Dcf {
        /// CSV with Period,Inflow,Outflow columns
        #[arg(long)]
        input: PathBuf,
        /// Discount rate in percent
        #[arg(long)]
        rate: Option<f64>,
    },
    /// Internal rate of return only
    Irr {
        #[arg(long)]
        input: PathBuf,
        /// Initial guess as a decimal rate (0.10 = 10%)
        #[arg(long)]
        guess: Option<f64>,
    },
    /// Monte Carlo NPV distribution
    MonteCarlo {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        simulations: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Tornado ranking of NPV drivers
    Sensitivity {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        rate: Option<f64>,
        /// Initial investment (defaults to the period 0 outflow)
        #[arg(long)]
        investment: Option<f64>,
    },
    /// Manage persisted scenarios
    Scenario {
        /// JSON file holding the scenario collection
        #[arg(long, default_value = "scenarios.json")]
        store: PathBuf,
        #[command(subcommand)]
        action: ScenarioAction,
    },
}

#[derive(Subcommand, Debug)]
enum ScenarioAction {
    List,
    /// Evaluate a parameter file without storing it
    Evaluate {
        #[arg(long)]
        params: PathBuf,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        params: PathBuf,
    },
    Update {
        #[arg(long)]
        id: ScenarioId,
        /// JSON ScenarioPatch
        #[arg(long)]
        patch: PathBuf,
    },
    Duplicate {
        #[arg(long)]
        id: ScenarioId,
    },
    Delete {
        #[arg(long)]
        id: ScenarioId,
    },
    Compare {
        #[arg(long)]
        a: ScenarioId,
        #[arg(long)]
        b: ScenarioId,
    },
    /// Tornado analysis of one scenario run over several periods
    Sensitivity {
        #[arg(long)]
        id: ScenarioId,
        #[arg(long)]
        investment: f64,
        #[arg(long, default_value_t = 5)]
        periods: u32,
        #[arg(long)]
        rate: Option<f64>,
    },
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_path(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::from_env(),
    };

    match cli.command {
        Command::Dcf { input, rate } => {
            let series = read_series(&input)?;
            let result = analyze_cash_flow(&series, rate.unwrap_or(config.discount_rate_pct))?;
            print_json(&result)
        }
        Command::Irr { input, guess } => {
            let series = read_series(&input)?;
            let mut solver = IrrSolver::from_config(&config);
            if let Some(guess) = guess {
                solver = solver.with_initial_guess(guess);
            }
            let irr = solver.solve(&series)?;
            print_json(&serde_json::json!({ "irr_pct": irr }))
        }
        Command::MonteCarlo { input, rate, simulations, seed } => {
            let series = read_series(&input)?;
            let config = EngineConfig {
                seed: seed.or(config.seed),
                ..config
            };
            let rate = rate.unwrap_or(config.discount_rate_pct);
            let count = simulations.unwrap_or(config.simulation_count);
            let simulator = MonteCarloSimulator::new(config)?;
            let result = simulator.spawn(series, rate, count)?.join()?;
            print_json(&result)
        }
        Command::Sensitivity { input, rate, investment } => {
            let series = read_series(&input)?;
            let investment = investment.unwrap_or_else(|| series.initial_investment());
            let report = SensitivityAnalyzer::from_config(&config).analyze(
                &series,
                rate.unwrap_or(config.discount_rate_pct),
                investment,
            )?;
            print_json(&serde_json::json!({
                "baseline_npv": report.baseline_npv,
                "entries": report.entries,
                "tornado": report.tornado(),
            }))
        }
        Command::Scenario { store, action } => run_scenario(&store, action, &config),
    }
}

fn run_scenario(store: &Path, action: ScenarioAction, config: &EngineConfig) -> Result<()> {
    let store = JsonFileScenarioStore::open(store)
        .with_context(|| format!("Failed to open scenario store {}", store.display()))?;
    let engine = ScenarioEngine::new(store)?;

    match action {
        ScenarioAction::List => print_json(&engine.list()?),
        ScenarioAction::Evaluate { params } => {
            let parameters: ScenarioParameters = read_json(&params)?;
            print_json(&engine.evaluate(&parameters)?)
        }
        ScenarioAction::Create { name, description, params } => {
            let parameters: ScenarioParameters = read_json(&params)?;
            print_json(&engine.create(&name, &description, parameters)?)
        }
        ScenarioAction::Update { id, patch } => {
            let patch: ScenarioPatch = read_json(&patch)?;
            print_json(&engine.update(id, patch)?)
        }
        ScenarioAction::Duplicate { id } => print_json(&engine.duplicate(id)?),
        ScenarioAction::Delete { id } => print_json(&engine.delete(id)?),
        ScenarioAction::Compare { a, b } => {
            let comparison = engine.compare(a, b)?;
            print_json(&serde_json::json!({
                "comparison": comparison,
                "profit_gap": comparison.profit_gap(),
            }))
        }
        ScenarioAction::Sensitivity { id, investment, periods, rate } => {
            let report = engine.sensitivity(
                id,
                &SensitivityAnalyzer::from_config(config),
                investment,
                periods,
                rate.unwrap_or(config.discount_rate_pct),
            )?;
            print_json(&report)
        }
    }
}

fn read_series(path: &Path) -> Result<CashFlowSeries> {
    load_cash_flows(path).with_context(|| format!("Failed to load cash flows from {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
