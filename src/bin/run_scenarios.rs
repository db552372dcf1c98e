//! Evaluate a CSV batch of production plans in parallel
//!
//! Writes one result row per plan; plans that fail validation are reported
//! and skipped.

use anyhow::{Context, Result};
use appraisal_engine::scenario::{load_scenarios, NamedParameters};
use appraisal_engine::{evaluate_scenario, ScenarioResult};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "run_scenarios", about = "Evaluate a batch of production plans")]
struct Args {
    /// CSV of plans (Name,Description,RawMaterialCost,...,SeasonalFactor)
    #[arg(long, default_value = "scenarios.csv")]
    input: PathBuf,

    #[arg(long, default_value = "scenario_results.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start = Instant::now();
    println!("Loading plans from {}...", args.input.display());
    let plans = load_scenarios(&args.input)
        .with_context(|| format!("Failed to load plans from {}", args.input.display()))?;
    println!("Loaded {} plans in {:?}", plans.len(), start.elapsed());

    let eval_start = Instant::now();
    let results: Vec<(&NamedParameters, appraisal_engine::Result<ScenarioResult>)> = plans
        .par_iter()
        .map(|plan| (plan, evaluate_scenario(&plan.parameters)))
        .collect();
    println!("Evaluation complete in {:?}", eval_start.elapsed());

    let mut out = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    out.write_record([
        "Name",
        "AdjustedVolume",
        "TotalCost",
        "UnitCost",
        "Revenue",
        "GrossProfit",
        "BreakEven",
        "ProfitMargin",
        "ROI",
    ])?;

    let mut skipped = 0usize;
    let mut best: Option<(&str, f64)> = None;
    for (plan, result) in &results {
        let r = match result {
            Ok(r) => r,
            Err(e) => {
                log::warn!("Skipping plan '{}': {}", plan.name, e);
                skipped += 1;
                continue;
            }
        };
        out.write_record([
            plan.name.clone(),
            format!("{:.4}", r.adjusted_volume),
            format!("{:.2}", r.total_cost),
            format!("{:.4}", r.unit_cost),
            format!("{:.2}", r.revenue),
            format!("{:.2}", r.gross_profit),
            format!("{:.4}", r.break_even_point),
            format!("{:.4}", r.profit_margin),
            format!("{:.4}", r.roi),
        ])?;
        if best.map_or(true, |(_, profit)| r.gross_profit > profit) {
            best = Some((plan.name.as_str(), r.gross_profit));
        }
    }
    out.flush()?;

    println!("Output written to {}", args.output.display());
    println!("\nBatch Summary:");
    println!("  Evaluated: {}", results.len() - skipped);
    println!("  Skipped:   {}", skipped);
    if let Some((name, profit)) = best {
        println!("  Best gross profit: {} (${:.0})", name, profit);
    }
    println!("\nTotal time: {:?}", start.elapsed());

    Ok(())
}
