//! Monte Carlo risk simulation over a cash flow series
//!
//! Each trial scales every period's inflow by a factor drawn uniformly from
//! `inflow_range` and every outflow (period 0 included) by a factor from
//! `outflow_range`, then discounts the perturbed net flows at a fixed rate.
//!
//! Trials are split into chunks that run on the rayon pool. Chunk `i` draws
//! from its own ChaCha8 stream seeded with `base_seed + i`, so a seeded run
//! returns the same sample whatever the scheduling. Cancellation is checked
//! before each chunk starts.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use log::{debug, info};
use rand::distributions::{Distribution, Uniform};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::dcf::{check_rate, discount_factor};
use crate::cashflow::CashFlowSeries;
use crate::config::EngineConfig;
use crate::error::{AppraisalError, Result};

/// Percentile keys reported in `MonteCarloResult::percentiles`
pub const REPORTED_PERCENTILES: [u32; 6] = [5, 10, 25, 75, 90, 95];

/// Shared flag for cooperative cancellation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Summary statistics of a simulated NPV distribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub simulation_count: usize,
    pub mean_npv: f64,
    /// Middle element of the sorted sample
    pub median_npv: f64,
    /// Population standard deviation
    pub std_deviation: f64,
    /// Sample values at the 2.5th and 97.5th percentile indices
    pub confidence_interval: (f64, f64),
    /// Share of trials with NPV > 0
    pub probability_positive: f64,
    /// Percentile -> NPV for the keys in `REPORTED_PERCENTILES`
    pub percentiles: BTreeMap<u32, f64>,
    pub min_npv: f64,
    pub max_npv: f64,
}

impl MonteCarloResult {
    /// Build the summary from an unsorted sample
    ///
    /// Percentile `p` is read at index `floor(N * p / 100)`.
    pub fn from_samples(mut samples: Vec<f64>) -> Result<Self> {
        let n = samples.len();
        if n == 0 {
            return Err(AppraisalError::invalid("simulation_count", "no samples to summarise"));
        }
        if samples.iter().any(|x| !x.is_finite()) {
            return Err(AppraisalError::invalid("samples", "simulated NPV is not finite"));
        }

        samples.sort_by(|a, b| a.total_cmp(b));

        // floor(n * per_mille / 1000), kept in integers so exact multiples stay exact
        let at = |per_mille: usize| samples[(n * per_mille / 1000).min(n - 1)];

        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        let positive = samples.iter().filter(|&&x| x > 0.0).count();

        let percentiles = REPORTED_PERCENTILES
            .iter()
            .map(|&p| (p, at(p as usize * 10)))
            .collect();

        Ok(Self {
            simulation_count: n,
            mean_npv: mean,
            median_npv: samples[n / 2],
            std_deviation: variance.sqrt(),
            confidence_interval: (at(25), at(975)),
            probability_positive: positive as f64 / n as f64,
            percentiles,
            min_npv: samples[0],
            max_npv: samples[n - 1],
        })
    }

    pub fn percentile(&self, p: u32) -> Option<f64> {
        self.percentiles.get(&p).copied()
    }
}

/// Monte Carlo NPV simulator
#[derive(Debug, Clone)]
pub struct MonteCarloSimulator {
    config: EngineConfig,
}

impl MonteCarloSimulator {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `simulation_count` trials on the calling thread (chunks fan out to rayon)
    pub fn run(
        &self,
        series: &CashFlowSeries,
        discount_rate_pct: f64,
        simulation_count: usize,
    ) -> Result<MonteCarloResult> {
        self.run_with_cancel(series, discount_rate_pct, simulation_count, &CancellationToken::new())
    }

    /// Like `run`, returning `Cancelled` if the token fires before all chunks start
    pub fn run_with_cancel(
        &self,
        series: &CashFlowSeries,
        discount_rate_pct: f64,
        simulation_count: usize,
        token: &CancellationToken,
    ) -> Result<MonteCarloResult> {
        self.validate_inputs(series, discount_rate_pct, simulation_count)?;

        let start = Instant::now();
        let base_seed = self.config.seed.unwrap_or_else(rand::random);
        let chunk_size = self.config.chunk_size;
        let num_chunks = simulation_count.div_ceil(chunk_size);

        // (inflow PV, outflow PV) per period at the fixed rate
        let discounted: Vec<(f64, f64)> = series
            .periods()
            .iter()
            .map(|p| {
                let df = discount_factor(discount_rate_pct, p.period);
                (p.inflow * df, p.outflow * df)
            })
            .collect();

        let inflow_dist = Uniform::new_inclusive(self.config.inflow_range.0, self.config.inflow_range.1);
        let outflow_dist = Uniform::new_inclusive(self.config.outflow_range.0, self.config.outflow_range.1);

        debug!(
            "Monte Carlo: {} trials in {} chunks of {} (seed {})",
            simulation_count, num_chunks, chunk_size, base_seed
        );

        let chunks: Vec<Vec<f64>> = (0..num_chunks)
            .into_par_iter()
            .map(|chunk| {
                if token.is_cancelled() {
                    return Err(AppraisalError::Cancelled);
                }
                let trials = chunk_size.min(simulation_count - chunk * chunk_size);
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(chunk as u64));
                let npvs: Vec<f64> = (0..trials)
                    .map(|_| {
                        discounted
                            .iter()
                            .map(|&(pv_in, pv_out)| {
                                let fi = inflow_dist.sample(&mut rng);
                                let fo = outflow_dist.sample(&mut rng);
                                pv_in * fi - pv_out * fo
                            })
                            .sum::<f64>()
                    })
                    .collect();
                Ok(npvs)
            })
            .collect::<Result<Vec<_>>>()?;

        let samples: Vec<f64> = chunks.into_iter().flatten().collect();
        let result = MonteCarloResult::from_samples(samples)?;

        info!(
            "Monte Carlo complete: {} trials in {:?}, mean NPV {:.2}, P(NPV>0) {:.3}",
            simulation_count,
            start.elapsed(),
            result.mean_npv,
            result.probability_positive
        );

        Ok(result)
    }

    /// Run on a background thread so the caller is never blocked
    pub fn spawn(
        &self,
        series: CashFlowSeries,
        discount_rate_pct: f64,
        simulation_count: usize,
    ) -> Result<SimulationHandle> {
        let token = CancellationToken::new();
        let worker_token = token.clone();
        let simulator = self.clone();

        let handle = std::thread::Builder::new()
            .name("monte-carlo".to_string())
            .spawn(move || {
                simulator.run_with_cancel(&series, discount_rate_pct, simulation_count, &worker_token)
            })
            .map_err(|e| AppraisalError::WorkerFailed(e.to_string()))?;

        Ok(SimulationHandle { token, handle })
    }

    fn validate_inputs(
        &self,
        series: &CashFlowSeries,
        discount_rate_pct: f64,
        simulation_count: usize,
    ) -> Result<()> {
        check_rate(discount_rate_pct)?;
        if series.is_empty() {
            return Err(AppraisalError::invalid("series", "cash flow series is empty"));
        }
        if simulation_count < 1 || simulation_count > self.config.max_simulation_count {
            return Err(AppraisalError::invalid(
                "simulation_count",
                format!(
                    "must be in [1, {}], got {}",
                    self.config.max_simulation_count, simulation_count
                ),
            ));
        }
        Ok(())
    }
}

impl Default for MonteCarloSimulator {
    fn default() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }
}

/// A simulation running on a background thread
#[derive(Debug)]
pub struct SimulationHandle {
    token: CancellationToken,
    handle: JoinHandle<Result<MonteCarloResult>>,
}

impl SimulationHandle {
    /// Ask the worker to stop before its next chunk
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker and return its result
    pub fn join(self) -> Result<MonteCarloResult> {
        self.handle
            .join()
            .map_err(|_| AppraisalError::WorkerFailed("simulation thread panicked".to_string()))?
    }
}

/// Run a simulation with the default perturbation ranges and chunking
pub fn run_monte_carlo(
    series: &CashFlowSeries,
    discount_rate_pct: f64,
    simulation_count: usize,
) -> Result<MonteCarloResult> {
    MonteCarloSimulator::default().run(series, discount_rate_pct, simulation_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{npv, reference_series};
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn seeded(seed: u64) -> MonteCarloSimulator {
        MonteCarloSimulator::new(EngineConfig {
            seed: Some(seed),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_statistics_from_known_sample() {
        // 1..=100 in reverse order; the summary must sort first
        let samples: Vec<f64> = (1..=100).rev().map(|x| x as f64).collect();
        let result = MonteCarloResult::from_samples(samples).unwrap();

        assert_eq!(result.simulation_count, 100);
        assert_relative_eq!(result.mean_npv, 50.5);
        assert_eq!(result.median_npv, 51.0);
        assert_relative_eq!(result.std_deviation, (9999.0f64 / 12.0).sqrt(), epsilon = 1e-9);
        assert_eq!(result.confidence_interval, (3.0, 98.0));
        assert_eq!(result.percentile(5), Some(6.0));
        assert_eq!(result.percentile(25), Some(26.0));
        assert_eq!(result.percentile(95), Some(96.0));
        assert_eq!(result.probability_positive, 1.0);
        assert_eq!(result.min_npv, 1.0);
        assert_eq!(result.max_npv, 100.0);
    }

    #[test]
    fn test_single_trial() {
        let result = MonteCarloResult::from_samples(vec![-42.0]).unwrap();
        assert_eq!(result.median_npv, -42.0);
        assert_eq!(result.std_deviation, 0.0);
        assert_eq!(result.confidence_interval, (-42.0, -42.0));
        assert_eq!(result.probability_positive, 0.0);
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let err = run_monte_carlo(&reference_series(), 10.0, 0).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_empty_series_rejected() {
        let err = run_monte_carlo(&CashFlowSeries::default(), 10.0, 100).unwrap_err();
        assert!(err.is_invalid_parameter());
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let series = reference_series();
        let a = seeded(42).run(&series, 10.0, 5_000).unwrap();
        let b = seeded(42).run(&series, 10.0, 5_000).unwrap();
        assert_eq!(a, b);

        let c = seeded(43).run(&series, 10.0, 5_000).unwrap();
        assert_ne!(a.mean_npv, c.mean_npv);
    }

    #[test]
    fn test_partial_last_chunk() {
        let simulator = MonteCarloSimulator::new(EngineConfig {
            seed: Some(1),
            chunk_size: 300,
            ..Default::default()
        })
        .unwrap();
        let result = simulator.run(&reference_series(), 10.0, 1_000).unwrap();
        assert_eq!(result.simulation_count, 1_000);
    }

    #[test]
    fn test_oversized_chunk_runs_as_one_chunk() {
        let simulator = MonteCarloSimulator::new(EngineConfig {
            seed: Some(5),
            chunk_size: usize::MAX,
            ..Default::default()
        })
        .unwrap();
        let result = simulator.run(&reference_series(), 10.0, 100).unwrap();
        assert_eq!(result.simulation_count, 100);

        // Below the default chunk size both runs draw from the single chunk-0 stream
        let default_chunks = seeded(5).run(&reference_series(), 10.0, 100).unwrap();
        assert_eq!(result, default_chunks);
    }

    #[test]
    fn test_variance_of_mean_shrinks_with_trials() {
        let series = reference_series();
        let variance_of_mean = |n: usize| {
            // Seeds spaced apart so no two runs share a chunk stream
            let means: Vec<f64> = (0..40u64)
                .map(|i| seeded(i * 1_000).run(&series, 10.0, n).unwrap().mean_npv)
                .collect();
            let m = means.iter().sum::<f64>() / means.len() as f64;
            means.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (means.len() - 1) as f64
        };

        // 16x the trials should cut the variance of the mean about 16x
        let ratio = variance_of_mean(100) / variance_of_mean(1_600);
        assert!(ratio > 5.0 && ratio < 50.0, "variance ratio {}", ratio);
    }

    #[test]
    fn test_mean_converges_to_deterministic_npv() {
        let series = reference_series();
        let expected = npv(&series, 10.0);
        let result = seeded(7).run(&series, 10.0, 100_000).unwrap();

        // Standard error of the mean is a few hundred at this N
        assert!((result.mean_npv - expected).abs() < 1_500.0, "mean {} vs {}", result.mean_npv, expected);
        assert!(result.confidence_interval.0 < expected);
        assert!(result.confidence_interval.1 > expected);
        assert!(result.probability_positive > 0.0 && result.probability_positive < 1.0);
    }

    #[test]
    fn test_degenerate_ranges_reproduce_npv() {
        let simulator = MonteCarloSimulator::new(EngineConfig {
            inflow_range: (1.0, 1.0),
            outflow_range: (1.0, 1.0),
            ..Default::default()
        })
        .unwrap();
        let series = reference_series();
        let result = simulator.run(&series, 10.0, 50).unwrap();
        assert_relative_eq!(result.mean_npv, npv(&series, 10.0), epsilon = 1e-6);
        assert!(result.std_deviation < 1e-6);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let err = seeded(1)
            .run_with_cancel(&reference_series(), 10.0, 10_000, &token)
            .unwrap_err();
        assert!(matches!(err, AppraisalError::Cancelled));
    }

    #[test]
    fn test_background_run() {
        let handle = seeded(9).spawn(reference_series(), 10.0, 2_000).unwrap();
        let background = handle.join().unwrap();
        let foreground = seeded(9).run(&reference_series(), 10.0, 2_000).unwrap();
        assert_eq!(background, foreground);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_percentiles_ordered(samples in prop::collection::vec(-1e6f64..1e6, 1..500)) {
            let r = MonteCarloResult::from_samples(samples).unwrap();
            let p = |k: u32| r.percentile(k).unwrap();
            prop_assert!(p(5) <= p(10));
            prop_assert!(p(10) <= p(25));
            prop_assert!(p(25) <= r.median_npv);
            prop_assert!(r.median_npv <= p(75));
            prop_assert!(p(75) <= p(90));
            prop_assert!(p(90) <= p(95));
            prop_assert!(r.confidence_interval.0 <= r.confidence_interval.1);
            prop_assert!((0.0..=1.0).contains(&r.probability_positive));
        }
    }
}
