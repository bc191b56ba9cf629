//! # load_spike - Bitcoin confirmation latency under load spikes
//!
//! Models how long a Bitcoin-style transaction waits before being recorded
//! in a block while the transaction arrival rate varies over time, across
//! many independent simulated mining runs.
//!
//! ## Core Components
//!
//! - **LoadSpikeSimulation**: discrete-event engine interleaving block
//!   mining and transaction arrival, plus the driver that repeats it
//! - **SpikeProfile**: step function from simulation progress to a load
//!   multiplier on maximum throughput
//! - **CumulativeLogger**: log10-bucketed histograms of confirmation age,
//!   one per load regime, rendered as empirical CDFs
//! - **PoissonSampler**: exponential inter-event gaps for both processes
//!
//! Time is purely simulated; nothing here touches the wall clock, the
//! network, or the disk. File output belongs to the driver binary, which
//! consumes the rendered reports.
//!
//! ```no_run
//! use load_spike::{LoadSpikeSimulation, SimConfig, SpikeProfile, Spike};
//!
//! let profile = SpikeProfile {
//!     spikes: vec![
//!         Spike { percent: 0.0, load: 0.1 },
//!         Spike { percent: 0.33, load: 10.0 },
//!         Spike { percent: 0.67, load: 0.11 },
//!     ],
//! };
//!
//! let mut sim = LoadSpikeSimulation::new(SimConfig::default())
//!     .use_spike_profile(profile)
//!     .add_cumulative_logger("data/load-spike");
//!
//! sim.run().unwrap();
//! let reports = sim.reports();
//! // write each regime body to
//! // <prefix>-<descriptor>-<blocks>-<iterations>.<suffix>
//! ```

// Core simulation modules
pub mod error;
pub mod logger;
pub mod profile;
pub mod sampler;
pub mod simulation;
pub mod txn;

// Re-export commonly used types
pub use error::{ConfigError, RunError, SimError};
pub use logger::{BucketScale, CumulativeLogger, CumulativePlot, Logger};
pub use profile::{Spike, SpikeProfile};
pub use sampler::PoissonSampler;
pub use simulation::{
    capacity_tps, LoadSpikeSimulation, LoggerReport, RegimeReport, SimConfig,
    BITCOIN_BLOCK_RATE, BITCOIN_TRANSACTION_SIZE, DEFAULT_BLOCK_SIZE, DEFAULT_NUM_BLOCKS,
    DEFAULT_NUM_ITERATIONS,
};
pub use txn::{Txn, TxnQueue};
