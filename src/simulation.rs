//! Mining/arrival engine and simulation driver
//!
//! Each repetition interleaves two Poisson processes against one simulated
//! clock: block mining advances the consumer clock, and the arrival process
//! fills the pending queue up to that clock before the block is packed. The
//! two roles alternate strictly, one block window at a time, so no
//! transaction is ever visible to a block that closed before it was created.
//!
//! The histogram loggers are the only state that survives a repetition;
//! queue and clocks are torn down every time.

use crate::error::{ConfigError, RunError, SimError};
use crate::logger::{CumulativeLogger, Logger};
use crate::profile::SpikeProfile;
use crate::sampler::PoissonSampler;
use crate::txn::{Txn, TxnQueue};

// Assumptions
/// 1 block every 10 minutes
pub const BITCOIN_BLOCK_RATE: f64 = 1.0 / 600.0;

/// 250 bytes per transaction
pub const BITCOIN_TRANSACTION_SIZE: i64 = 250;

/// 1 MiB block capacity
pub const DEFAULT_BLOCK_SIZE: i64 = 1024 * 1024;

// Default simulation parameters
pub const DEFAULT_NUM_BLOCKS: u64 = 1000;
pub const DEFAULT_NUM_ITERATIONS: u64 = 100;

/// Simulation parameters, validated before any work begins
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Blocks mined per repetition
    pub num_blocks: u64,

    /// Independent repetitions aggregated into the same histograms
    pub num_iterations: u64,

    /// Block capacity in bytes
    pub block_size_bytes: i64,

    /// Fixed transaction size in bytes
    pub txn_size_bytes: i64,

    /// Block arrival rate in blocks per second
    pub block_rate: f64,

    /// Arrival rate at load 1.0, in txns per second
    pub max_tps: f64,

    /// Random seed (None = seed from entropy once per process)
    pub seed: Option<[u8; 32]>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            num_blocks: DEFAULT_NUM_BLOCKS,
            num_iterations: DEFAULT_NUM_ITERATIONS,
            block_size_bytes: DEFAULT_BLOCK_SIZE,
            txn_size_bytes: BITCOIN_TRANSACTION_SIZE,
            block_rate: BITCOIN_BLOCK_RATE,
            max_tps: capacity_tps(DEFAULT_BLOCK_SIZE, BITCOIN_TRANSACTION_SIZE, BITCOIN_BLOCK_RATE),
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_blocks == 0 {
            return Err(ConfigError::NonPositive("num_blocks"));
        }
        if self.num_iterations == 0 {
            return Err(ConfigError::NonPositive("num_iterations"));
        }
        if self.block_size_bytes <= 0 {
            return Err(ConfigError::NonPositive("block_size_bytes"));
        }
        if self.txn_size_bytes <= 0 {
            return Err(ConfigError::NonPositive("txn_size_bytes"));
        }
        if self.block_rate <= 0.0 {
            return Err(ConfigError::NonPositive("block_rate"));
        }
        if self.max_tps <= 0.0 {
            return Err(ConfigError::NonPositive("max_tps"));
        }
        Ok(())
    }
}

/// Throughput at which arrivals exactly saturate block capacity: the rate a
/// load multiplier of 1.0 corresponds to
pub fn capacity_tps(block_size_bytes: i64, txn_size_bytes: i64, block_rate: f64) -> f64 {
    (block_size_bytes as f64 / txn_size_bytes as f64) * block_rate
}

/// Producer role: generates transaction arrivals ahead of the mining clock.
///
/// Holds the timestamp of the next arrival between windows. The first txn of
/// a repetition is created at time 0. The original design ran this as a
/// separate task behind an unbuffered rendezvous; since the hand-off is
/// strictly alternating, interleaving it on one thread is equivalent.
struct ArrivalProcess {
    next_arrival: f64,
    txn_size_bytes: i64,
    max_tps: f64,

    // Set while a zero-load window holds arrivals back; the next window
    // with load draws a fresh gap instead of reusing a stale timestamp
    stalled: bool,
}

impl ArrivalProcess {
    fn new(txn_size_bytes: i64, max_tps: f64) -> Self {
        Self {
            next_arrival: 0.0,
            txn_size_bytes,
            max_tps,
            stalled: false,
        }
    }

    /// Enqueue every arrival up to `horizon`, tagging each txn with the
    /// spike in effect at `progress` when it is created
    fn generate_until(
        &mut self,
        sampler: &mut PoissonSampler,
        profile: &SpikeProfile,
        horizon: f64,
        progress: f64,
        queue: &mut TxnQueue,
    ) {
        let load = profile.current_load(progress);
        if load == 0.0 {
            // No arrivals while the load is zero; anything pending slides
            // past the quiet window
            self.next_arrival = self.next_arrival.max(horizon);
            self.stalled = true;
            return;
        }

        let rate = load * self.max_tps;
        if self.stalled {
            self.stalled = false;
            self.next_arrival += sampler.draw_gap(rate);
        }

        let spike_index = profile.current_spike_index(progress);
        while self.next_arrival <= horizon {
            queue.push(Txn::new(self.next_arrival, self.txn_size_bytes, spike_index));
            self.next_arrival += sampler.draw_gap(rate);
        }
    }
}

/// Per-regime rendered output plus the descriptor the driver uses to name
/// its file
#[derive(Debug, Clone, PartialEq)]
pub struct RegimeReport {
    pub descriptor: String,
    pub body: String,
}

/// All reports for one attached logger
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerReport {
    pub prefix: String,
    pub suffix: String,
    pub regimes: Vec<RegimeReport>,
}

/// Repeated-run load spike simulation.
///
/// Built up in stages, then run:
///
/// ```no_run
/// use load_spike::{LoadSpikeSimulation, SimConfig, SpikeProfile};
///
/// let mut sim = LoadSpikeSimulation::new(SimConfig::default())
///     .use_spike_profile(SpikeProfile::constant(0.5))
///     .add_cumulative_logger("data/load-spike");
/// sim.run().unwrap();
/// ```
pub struct LoadSpikeSimulation {
    config: SimConfig,
    spike_profile: Option<SpikeProfile>,
    loggers: Vec<Box<dyn Logger>>,
    sampler: PoissonSampler,
    txn_count: u64,
}

impl LoadSpikeSimulation {
    pub fn new(config: SimConfig) -> Self {
        let sampler = PoissonSampler::new(config.seed);
        Self {
            config,
            spike_profile: None,
            loggers: Vec::new(),
            sampler,
            txn_count: 0,
        }
    }

    /// Attach the load profile driving the arrival rate. Must be called
    /// before loggers that allocate one plot per spike.
    pub fn use_spike_profile(mut self, profile: SpikeProfile) -> Self {
        self.spike_profile = Some(profile);
        self
    }

    /// Attach any logger implementation
    pub fn add_logger(mut self, logger: Box<dyn Logger>) -> Self {
        self.loggers.push(logger);
        self
    }

    /// Attach a cumulative histogram logger with one plot per spike of the
    /// attached profile
    pub fn add_cumulative_logger(self, file_prefix: &str) -> Self {
        let num_spikes = self
            .spike_profile
            .as_ref()
            .map(|p| p.num_spikes())
            .unwrap_or(1);
        self.add_logger(Box::new(CumulativeLogger::new(file_prefix, num_spikes)))
    }

    /// Seed in use, for reproducing a run
    pub fn seed(&self) -> [u8; 32] {
        self.sampler.seed()
    }

    /// Total transactions confirmed across all repetitions so far
    pub fn txn_count(&self) -> u64 {
        self.txn_count
    }

    /// Run all repetitions, aggregating confirmations into the attached
    /// loggers. Fails fast on invalid configuration and on any logging
    /// invariant violation; there is no retry.
    pub fn run(&mut self) -> Result<(), RunError> {
        self.config.validate()?;
        let profile = self
            .spike_profile
            .clone()
            .ok_or(ConfigError::MissingProfile)?;
        profile.validate()?;

        log::info!(
            "starting simulation: {} blocks x {} repetitions, block size {} bytes",
            self.config.num_blocks,
            self.config.num_iterations,
            self.config.block_size_bytes
        );
        profile.log_profile();

        let divisor = (self.config.num_iterations / 100).max(1);

        for i in 0..self.config.num_iterations {
            self.simulate_mining(&profile)?;

            if i % divisor == 0 {
                log::info!(
                    "repetition {}/{} complete",
                    i,
                    self.config.num_iterations
                );
            }
        }

        log::info!("simulation done, {} txns confirmed", self.txn_count);
        Ok(())
    }

    /// One independent repetition: `num_blocks` blocks mined against a fresh
    /// queue and fresh clocks
    fn simulate_mining(&mut self, profile: &SpikeProfile) -> Result<(), SimError> {
        let mut queue = TxnQueue::new();
        let mut arrivals = ArrivalProcess::new(self.config.txn_size_bytes, self.config.max_tps);
        let mut cumulative_time = 0.0;

        for block in 0..self.config.num_blocks {
            // time to mine the next block
            cumulative_time += self.sampler.draw_gap(self.config.block_rate);

            // create new transactions for this window
            let progress = block as f64 / self.config.num_blocks as f64;
            arrivals.generate_until(
                &mut self.sampler,
                profile,
                cumulative_time,
                progress,
                &mut queue,
            );

            // consume transactions to be recorded in the block
            let confirmed = self.create_block(cumulative_time, &mut queue)?;
            self.txn_count += confirmed;
        }

        // Whatever is still pending has an unknown confirmation age; it is
        // discarded, never logged
        queue.drain();
        Ok(())
    }

    /// Greedy FIFO bin packing: admit queue heads while they fit and were
    /// created before this block closed. The first txn that fails either
    /// check stays at the head and blocks the rest of the queue; there is no
    /// reordering by size or fee.
    fn create_block(
        &mut self,
        block_timestamp: f64,
        queue: &mut TxnQueue,
    ) -> Result<u64, SimError> {
        let mut remaining_block_size = self.config.block_size_bytes;
        let mut num_txns_in_block = 0;

        while let Some(&txn) = queue.front() {
            if txn.size_bytes > remaining_block_size || txn.created_at >= block_timestamp {
                break;
            }
            queue.pop();

            remaining_block_size -= txn.size_bytes;
            num_txns_in_block += 1;

            for logger in self.loggers.iter_mut() {
                logger.log(block_timestamp, txn.created_at, txn.spike_index)?;
            }
        }

        Ok(num_txns_in_block)
    }

    /// Rendered per-regime tables for every attached logger, paired with
    /// the regime descriptors the driver needs for file naming. The core
    /// performs no I/O itself.
    pub fn reports(&self) -> Vec<LoggerReport> {
        let descriptors: Vec<String> = self
            .spike_profile
            .as_ref()
            .map(|p| p.spikes.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default();

        self.loggers
            .iter()
            .map(|logger| LoggerReport {
                prefix: logger.log_prefix().to_string(),
                suffix: logger.file_suffix().to_string(),
                regimes: descriptors
                    .iter()
                    .cloned()
                    .zip(logger.outputs())
                    .map(|(descriptor, body)| RegimeReport { descriptor, body })
                    .collect(),
            })
            .collect()
    }

    /// Clear all logger state for an unrelated batch of repetitions
    pub fn reset_loggers(&mut self) {
        for logger in self.loggers.iter_mut() {
            logger.reset();
        }
        self.txn_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Spike;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Logger that records every confirmation it sees, for inspecting
    /// admission order and tagging
    struct RecordingLogger {
        entries: Rc<RefCell<Vec<(f64, f64, usize)>>>,
    }

    impl Logger for RecordingLogger {
        fn log_prefix(&self) -> &str {
            "recording"
        }

        fn file_suffix(&self) -> &str {
            "rec"
        }

        fn log(
            &mut self,
            block_timestamp: f64,
            txn_timestamp: f64,
            spike_index: usize,
        ) -> Result<(), SimError> {
            self.entries
                .borrow_mut()
                .push((block_timestamp, txn_timestamp, spike_index));
            Ok(())
        }

        fn outputs(&self) -> Vec<String> {
            Vec::new()
        }

        fn reset(&mut self) {
            self.entries.borrow_mut().clear();
        }
    }

    fn recording_sim(config: SimConfig) -> (LoadSpikeSimulation, Rc<RefCell<Vec<(f64, f64, usize)>>>) {
        let entries = Rc::new(RefCell::new(Vec::new()));
        let sim = LoadSpikeSimulation::new(config)
            .use_spike_profile(SpikeProfile::constant(1.0))
            .add_logger(Box::new(RecordingLogger {
                entries: entries.clone(),
            }));
        (sim, entries)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.num_blocks, 1000);
        assert_eq!(config.num_iterations, 100);
        assert_eq!(config.block_size_bytes, 1024 * 1024);
        assert_eq!(config.txn_size_bytes, 250);
        assert_eq!(config.block_rate, 1.0 / 600.0);
        assert!(config.validate().is_ok());

        // Saturation throughput for the defaults: (1 MiB / 250 B) / 600 s
        assert!((config.max_tps - 6.990506666666667).abs() < 1e-9);
    }

    #[test]
    fn test_config_rejects_non_positive_parameters() {
        let mut config = SimConfig::default();
        config.num_blocks = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("num_blocks"))
        );

        let mut config = SimConfig::default();
        config.block_size_bytes = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("block_size_bytes"))
        );

        let mut config = SimConfig::default();
        config.block_rate = -1.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NonPositive("block_rate"))
        );
    }

    #[test]
    fn test_run_requires_profile() {
        let mut sim = LoadSpikeSimulation::new(SimConfig::default());
        assert_eq!(
            sim.run(),
            Err(RunError::Config(ConfigError::MissingProfile))
        );
    }

    #[test]
    fn test_run_rejects_invalid_profile() {
        let profile = SpikeProfile {
            spikes: vec![Spike {
                percent: 0.5,
                load: 1.0,
            }],
        };
        let mut sim = LoadSpikeSimulation::new(SimConfig::default()).use_spike_profile(profile);
        assert_eq!(
            sim.run(),
            Err(RunError::Config(ConfigError::FirstSpikeNotAtZero))
        );
    }

    // ========================================================================
    // Block admission
    // ========================================================================

    #[test]
    fn test_fifo_admission_order() {
        let (mut sim, entries) = recording_sim(SimConfig::default());

        let mut queue = TxnQueue::new();
        for i in 0..5 {
            queue.push(Txn::new(i as f64, 250, 0));
        }

        let admitted = sim.create_block(100.0, &mut queue).unwrap();
        assert_eq!(admitted, 5);

        let logged = entries.borrow();
        let created: Vec<f64> = logged.iter().map(|e| e.1).collect();
        assert_eq!(created, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_capacity_stops_admission_at_queue_head() {
        let mut config = SimConfig::default();
        config.block_size_bytes = 625; // room for 2.5 txns of 250 bytes
        let (mut sim, entries) = recording_sim(config);

        let mut queue = TxnQueue::new();
        for i in 0..5 {
            queue.push(Txn::new(i as f64, 250, 0));
        }

        let admitted = sim.create_block(100.0, &mut queue).unwrap();
        assert_eq!(admitted, 2);
        assert_eq!(entries.borrow().len(), 2);

        // The third txn stays at the head for the next block
        assert_eq!(queue.front().unwrap().created_at, 2.0);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_txn_created_after_block_close_is_not_admitted() {
        let (mut sim, entries) = recording_sim(SimConfig::default());

        let mut queue = TxnQueue::new();
        queue.push(Txn::new(5.0, 250, 0));
        queue.push(Txn::new(10.0, 250, 0)); // arrives exactly at block close
        queue.push(Txn::new(3.0, 250, 0)); // would fit, but FIFO blocks it

        let admitted = sim.create_block(10.0, &mut queue).unwrap();
        assert_eq!(admitted, 1);
        assert_eq!(entries.borrow()[0].1, 5.0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_empty_queue_admits_nothing() {
        let (mut sim, entries) = recording_sim(SimConfig::default());
        let mut queue = TxnQueue::new();

        assert_eq!(sim.create_block(10.0, &mut queue).unwrap(), 0);
        assert!(entries.borrow().is_empty());
    }

    // ========================================================================
    // Arrival process
    // ========================================================================

    #[test]
    fn test_arrivals_stay_within_horizon() {
        let mut sampler = PoissonSampler::new(Some([1u8; 32]));
        let profile = SpikeProfile::constant(1.0);
        let mut arrivals = ArrivalProcess::new(250, 2.0);
        let mut queue = TxnQueue::new();

        arrivals.generate_until(&mut sampler, &profile, 100.0, 0.0, &mut queue);

        assert!(!queue.is_empty());
        let mut previous = -1.0;
        while let Some(txn) = queue.pop() {
            assert!(txn.created_at <= 100.0);
            assert!(txn.created_at > previous, "arrivals must be ordered");
            previous = txn.created_at;
        }
        // The overshoot is kept for the next window
        assert!(arrivals.next_arrival > 100.0);
    }

    #[test]
    fn test_first_arrival_is_at_time_zero() {
        let mut sampler = PoissonSampler::new(Some([1u8; 32]));
        let profile = SpikeProfile::constant(1.0);
        let mut arrivals = ArrivalProcess::new(250, 1.0);
        let mut queue = TxnQueue::new();

        arrivals.generate_until(&mut sampler, &profile, 50.0, 0.0, &mut queue);
        assert_eq!(queue.pop().unwrap().created_at, 0.0);
    }

    #[test]
    fn test_zero_load_window_generates_no_arrivals() {
        let mut sampler = PoissonSampler::new(Some([1u8; 32]));
        let profile = SpikeProfile {
            spikes: vec![
                Spike {
                    percent: 0.0,
                    load: 0.0,
                },
                Spike {
                    percent: 0.5,
                    load: 1.0,
                },
            ],
        };
        let mut arrivals = ArrivalProcess::new(250, 2.0);
        let mut queue = TxnQueue::new();

        arrivals.generate_until(&mut sampler, &profile, 100.0, 0.0, &mut queue);
        assert!(queue.is_empty());

        // Load resumes in the second half; arrivals restart after the quiet
        // window, not inside it
        arrivals.generate_until(&mut sampler, &profile, 200.0, 0.6, &mut queue);
        assert!(!queue.is_empty());
        while let Some(txn) = queue.pop() {
            assert!(txn.created_at > 100.0);
            assert!(txn.created_at <= 200.0);
        }
    }

    #[test]
    fn test_txns_tagged_with_creation_time_regime() {
        let mut sampler = PoissonSampler::new(Some([2u8; 32]));
        let profile = SpikeProfile {
            spikes: vec![
                Spike {
                    percent: 0.0,
                    load: 1.0,
                },
                Spike {
                    percent: 0.5,
                    load: 2.0,
                },
            ],
        };
        let mut arrivals = ArrivalProcess::new(250, 1.0);
        let mut queue = TxnQueue::new();

        arrivals.generate_until(&mut sampler, &profile, 100.0, 0.25, &mut queue);
        while let Some(txn) = queue.pop() {
            assert_eq!(txn.spike_index, 0);
        }

        arrivals.generate_until(&mut sampler, &profile, 200.0, 0.75, &mut queue);
        assert!(!queue.is_empty());
        while let Some(txn) = queue.pop() {
            assert_eq!(txn.spike_index, 1);
        }
    }

    // ========================================================================
    // Full runs
    // ========================================================================

    fn small_config(seed: u8) -> SimConfig {
        let mut config = SimConfig::default();
        config.num_blocks = 100;
        config.num_iterations = 5;
        config.max_tps = 1.0;
        config.seed = Some([seed; 32]);
        config
    }

    #[test]
    fn test_end_to_end_cdf_is_non_decreasing_and_ends_at_one() {
        let mut sim = LoadSpikeSimulation::new(small_config(3))
            .use_spike_profile(SpikeProfile::constant(0.5))
            .add_cumulative_logger("data/load-spike");

        sim.run().unwrap();
        assert!(sim.txn_count() > 0);

        let reports = sim.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].prefix, "data/load-spike");
        assert_eq!(reports[0].suffix, "cl-dat");
        assert_eq!(reports[0].regimes.len(), 1);
        assert_eq!(reports[0].regimes[0].descriptor, "0.0000:0.5000");

        let body = &reports[0].regimes[0].body;
        let mut previous = 0.0;
        let mut last = 0.0;
        for row in body.lines() {
            let cols: Vec<&str> = row.split(" | ").collect();
            let cumulative: f64 = cols[3].parse().unwrap();
            assert!(cumulative >= previous);
            previous = cumulative;
            last = cumulative;
        }
        assert!((last - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_spiked_run_fills_every_regime_plot() {
        let profile = SpikeProfile {
            spikes: vec![
                Spike {
                    percent: 0.0,
                    load: 0.2,
                },
                Spike {
                    percent: 0.33,
                    load: 2.0,
                },
                Spike {
                    percent: 0.67,
                    load: 0.2,
                },
            ],
        };

        let mut sim = LoadSpikeSimulation::new(small_config(4))
            .use_spike_profile(profile)
            .add_cumulative_logger("data/load-spike");
        sim.run().unwrap();

        let reports = sim.reports();
        assert_eq!(reports[0].regimes.len(), 3);
        for regime in &reports[0].regimes {
            assert!(!regime.body.is_empty(), "regime {} has no samples", regime.descriptor);
        }
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let run = || {
            let mut sim = LoadSpikeSimulation::new(small_config(7))
                .use_spike_profile(SpikeProfile::constant(0.5))
                .add_cumulative_logger("data/load-spike");
            sim.run().unwrap();
            (sim.txn_count(), sim.reports())
        };

        let (count_a, reports_a) = run();
        let (count_b, reports_b) = run();
        assert_eq!(count_a, count_b);
        assert_eq!(reports_a, reports_b);
    }

    #[test]
    fn test_reset_loggers_clears_state_between_batches() {
        let mut sim = LoadSpikeSimulation::new(small_config(5))
            .use_spike_profile(SpikeProfile::constant(0.5))
            .add_cumulative_logger("data/load-spike");

        sim.run().unwrap();
        assert!(sim.txn_count() > 0);

        sim.reset_loggers();
        assert_eq!(sim.txn_count(), 0);
        for report in sim.reports() {
            for regime in report.regimes {
                assert!(regime.body.is_empty());
            }
        }
    }

    #[test]
    fn test_overloaded_run_saturates_blocks() {
        // Load 5x capacity: arrivals outpace drain, so nearly every block
        // fills to its byte limit
        let mut config = small_config(6);
        config.num_iterations = 1;
        config.max_tps = capacity_tps(
            config.block_size_bytes,
            config.txn_size_bytes,
            config.block_rate,
        );
        let per_block_cap = (config.block_size_bytes / config.txn_size_bytes) as u64;
        let num_blocks = config.num_blocks;

        let (mut sim, entries) = recording_sim(config);
        sim.spike_profile = Some(SpikeProfile::constant(5.0));

        sim.run().unwrap();

        let logged = entries.borrow();
        assert!(logged.len() as u64 <= per_block_cap * num_blocks);
        // A few early blocks may close before the backlog forms
        assert!(logged.len() as u64 >= per_block_cap * (num_blocks - 5));

        // Ages are strictly positive throughout
        for (block_ts, created_at, _) in logged.iter() {
            assert!(block_ts - created_at > 0.0);
        }
    }
}
