//! Load spike profiles
//!
//! A `SpikeProfile` is a step function from simulation progress (fraction of
//! blocks mined so far) to a load multiplier. The transaction arrival rate at
//! any moment is `current_load(progress) * max_tps`.
//!
//! Example: three spikes at 0%, 20% and 40% hold their loads until the next
//! spike begins or the simulation ends.
//!
//! ```text
//!      ___
//!     |   |
//!  ___|   |_________
//! |   |   |
//! 0% 20% 40%       100%
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// One step of a load profile: the load multiplier that takes effect at
/// `percent` of the way through a repetition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spike {
    /// Progress fraction in [0, 1) at which this load takes effect
    pub percent: f64,

    /// Load as a multiple of maximum throughput, >= 0
    pub load: f64,
}

impl fmt::Display for Spike {
    /// Regime descriptor used in output file names: `"<percent>:<load>"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}:{:.4}", self.percent, self.load)
    }
}

/// Ordered list of spikes defining the load at any point of a repetition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpikeProfile {
    pub spikes: Vec<Spike>,
}

impl SpikeProfile {
    /// Flat profile holding a single load for the whole repetition
    pub fn constant(load: f64) -> Self {
        Self {
            spikes: vec![Spike {
                percent: 0.0,
                load,
            }],
        }
    }

    /// Load multiplier in effect at `progress`
    pub fn current_load(&self, progress: f64) -> f64 {
        self.spikes[self.current_spike_index(progress)].load
    }

    /// Index of the spike in effect at `progress`: the last spike whose
    /// percent is <= `progress`. An exact hit selects that spike; past the
    /// final spike the final spike stays in effect through 1.0.
    pub fn current_spike_index(&self, progress: f64) -> usize {
        for (i, spike) in self.spikes.iter().enumerate() {
            if progress < spike.percent {
                return i - 1;
            }
        }
        self.spikes.len() - 1
    }

    /// Number of spikes, which is also the number of regime plots a logger
    /// maintains
    pub fn num_spikes(&self) -> usize {
        self.spikes.len()
    }

    /// Check that the profile can drive a simulation: non-empty, first spike
    /// at exactly 0, percents in [0, 1) and non-decreasing, loads >= 0.
    ///
    /// An invalid profile is a fatal configuration error, not something the
    /// simulation can recover from mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spikes.is_empty() {
            return Err(ConfigError::EmptyProfile);
        }

        let mut previous_percent = 0.0;
        for (i, spike) in self.spikes.iter().enumerate() {
            if i == 0 && spike.percent != 0.0 {
                return Err(ConfigError::FirstSpikeNotAtZero);
            }
            if !(0.0..1.0).contains(&spike.percent) {
                return Err(ConfigError::SpikeOutOfRange(spike.percent));
            }
            if spike.load < 0.0 {
                return Err(ConfigError::NegativeLoad(spike.load));
            }
            if spike.percent < previous_percent {
                return Err(ConfigError::SpikesOutOfOrder);
            }
            previous_percent = spike.percent;
        }
        Ok(())
    }

    /// Log the profile, one line per spike
    pub fn log_profile(&self) {
        for spike in &self.spikes {
            log::info!("  {:3.0}%: {}", 100.0 * spike.percent, spike.load);
        }
    }
}
