//! Error taxonomy for the load spike simulator
//!
//! Two classes only: configuration errors raised before any simulation work
//! begins, and invariant violations raised at the point of detection. There
//! is no retry path anywhere; every error means the setup or the bucket
//! parameters must be fixed and the run repeated.

use std::fmt;

/// Errors detected while validating configuration, before simulation starts
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Spike profile has no spikes
    EmptyProfile,

    /// First spike must sit at percent 0.0
    FirstSpikeNotAtZero,

    /// A spike percent lies outside [0, 1)
    SpikeOutOfRange(f64),

    /// Spike percents are not in non-decreasing order
    SpikesOutOfOrder,

    /// A spike carries a negative load
    NegativeLoad(f64),

    /// A numeric parameter that must be positive is not
    NonPositive(&'static str),

    /// Simulation started without a spike profile attached
    MissingProfile,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::EmptyProfile => write!(f, "spike profile contains no spikes"),
            ConfigError::FirstSpikeNotAtZero => {
                write!(f, "first spike must be at percent 0.0")
            }
            ConfigError::SpikeOutOfRange(p) => {
                write!(f, "spike percent {} outside [0, 1)", p)
            }
            ConfigError::SpikesOutOfOrder => write!(f, "spike percents out of order"),
            ConfigError::NegativeLoad(l) => write!(f, "spike load {} is negative", l),
            ConfigError::NonPositive(name) => {
                write!(f, "parameter `{}` must be positive", name)
            }
            ConfigError::MissingProfile => write!(f, "no spike profile configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Invariant violations raised while a simulation is running
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A confirmation age came out zero or negative; the engine must never
    /// admit a transaction into a block that closed before it was created
    NonPositiveAge { age: f64 },

    /// A confirmation age maps past the end of the bucket array; the bucket
    /// range is too narrow for the observed latency
    BucketOverflow { index: usize, limit: usize },

    /// A transaction carried a spike index with no matching plot
    UnknownSpike { index: usize },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::NonPositiveAge { age } => {
                write!(f, "non-positive confirmation age {}", age)
            }
            SimError::BucketOverflow { index, limit } => {
                write!(
                    f,
                    "bucket index {} exceeds histogram size {}; widen positive_orders",
                    index, limit
                )
            }
            SimError::UnknownSpike { index } => {
                write!(f, "no plot for spike index {}", index)
            }
        }
    }
}

impl std::error::Error for SimError {}

/// Either failure class, as surfaced by a full simulation run
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    Config(ConfigError),
    Sim(SimError),
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        RunError::Config(e)
    }
}

impl From<SimError> for RunError {
    fn from(e: SimError) -> Self {
        RunError::Sim(e)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Config(e) => write!(f, "configuration error: {}", e),
            RunError::Sim(e) => write!(f, "simulation invariant violated: {}", e),
        }
    }
}

impl std::error::Error for RunError {}
