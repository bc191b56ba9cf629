//! Confirmation-age histograms and the logger capability
//!
//! Confirmation ages span many orders of magnitude (sub-second under light
//! load, hours under backlog), so fixed-width linear buckets are useless at
//! one extreme or the other. Buckets are spaced uniformly in log10-age space
//! instead: a configurable number of negative decades gives sub-second
//! resolution and positive decades cover the long tail.

use crate::error::SimError;

/// Default sub-second decades
pub const NEGATIVE_ORDERS: usize = 1;

/// Default long-tail decades
pub const POSITIVE_ORDERS: usize = 10;

/// Default buckets per decade of age
pub const BUCKETS_PER_ORDER: usize = 1000;

/// Capability consumed by the engine to record each confirmed transaction.
/// Implemented by output components; the engine only ever calls `log`,
/// the driver layer calls the rest.
pub trait Logger {
    /// Output file prefix chosen by the driver
    fn log_prefix(&self) -> &str;

    /// File extension for this logger's output
    fn file_suffix(&self) -> &str;

    /// Record one confirmation: the block that recorded the txn, the txn's
    /// creation time, and the spike the txn was created under
    fn log(
        &mut self,
        block_timestamp: f64,
        txn_timestamp: f64,
        spike_index: usize,
    ) -> Result<(), SimError>;

    /// Rendered table per spike, in spike-index order
    fn outputs(&self) -> Vec<String>;

    /// Discard all accumulated counts for an unrelated batch of repetitions
    fn reset(&mut self);
}

/// Log-scale bucketing parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketScale {
    pub buckets_per_order: usize,
    pub negative_orders: usize,
    pub positive_orders: usize,
}

impl Default for BucketScale {
    fn default() -> Self {
        Self {
            buckets_per_order: BUCKETS_PER_ORDER,
            negative_orders: NEGATIVE_ORDERS,
            positive_orders: POSITIVE_ORDERS,
        }
    }
}

impl BucketScale {
    /// Total size of the bucket array
    pub fn num_buckets(&self) -> usize {
        self.buckets_per_order * (self.negative_orders + self.positive_orders)
    }

    /// Map a confirmation age to its bucket.
    ///
    /// Ages below one time unit to the `negative_orders` limit collapse into
    /// bucket 0. An age past the top of the array means the configured range
    /// is too narrow for the observed latency; that is a fatal mismatch, the
    /// sample is never clamped or dropped because either would corrupt the
    /// CDF.
    pub fn bucket_index(&self, age: f64) -> Result<usize, SimError> {
        if age <= 0.0 {
            return Err(SimError::NonPositiveAge { age });
        }

        let log_age_bucket = age.log10() * self.buckets_per_order as f64;
        let offset = (self.negative_orders * self.buckets_per_order) as i64;

        let b = (log_age_bucket.ceil() as i64 + offset).max(0) as usize;

        if b >= self.num_buckets() {
            return Err(SimError::BucketOverflow {
                index: b,
                limit: self.num_buckets(),
            });
        }
        Ok(b)
    }

    /// Representative age for a bucket index, the inverse of `bucket_index`
    /// on bucket upper bounds
    pub fn representative_age(&self, index: usize) -> f64 {
        let offset = (self.negative_orders * self.buckets_per_order) as f64;
        10f64.powf((index as f64 - offset) / self.buckets_per_order as f64)
    }
}

/// Bucket counters for one spike. Tracks the active index range and the
/// total number of recorded txns so rendering can skip the empty tails.
#[derive(Debug, Clone)]
pub struct CumulativePlot {
    buckets: Vec<i64>,
    smallest_bucket: usize,
    largest_bucket: usize,
    txn_count: i64,
}

impl CumulativePlot {
    pub fn new(scale: BucketScale) -> Self {
        Self {
            buckets: vec![0; scale.num_buckets()],
            smallest_bucket: scale.num_buckets(),
            largest_bucket: 0,
            txn_count: 0,
        }
    }

    /// Count one txn in bucket `index` and widen the active range
    pub fn record(&mut self, index: usize) {
        self.buckets[index] += 1;
        self.txn_count += 1;

        if self.largest_bucket < index {
            self.largest_bucket = index;
        }
        if self.smallest_bucket > index {
            self.smallest_bucket = index;
        }
    }

    pub fn txn_count(&self) -> i64 {
        self.txn_count
    }

    /// Render the plot as one row per bucket over the active range,
    /// inclusive of the last non-empty bucket:
    ///
    /// `bucket | representative age | share | cumulative share`
    ///
    /// The cumulative column is the empirical CDF of confirmation age and
    /// ends at 1.0 on the last row.
    pub fn render(&self, scale: &BucketScale) -> String {
        if self.txn_count == 0 {
            return String::new();
        }

        let mut contents = String::new();
        let mut cumulative_total = 0.0;
        let txn_count = self.txn_count as f64;

        for index in self.smallest_bucket..=self.largest_bucket {
            let bucket_count = self.buckets[index] as f64;
            cumulative_total += bucket_count;

            contents.push_str(&format!(
                "{} | {:.6} | {:.6} | {:.6}\n",
                index,
                scale.representative_age(index),
                bucket_count / txn_count,
                cumulative_total / txn_count
            ));
        }
        contents
    }
}

/// Logger that accumulates one cumulative plot per spike
pub struct CumulativeLogger {
    plots: Vec<CumulativePlot>,
    scale: BucketScale,
    file_prefix: String,
}

impl CumulativeLogger {
    /// One plot per spike in the profile, default bucket scale
    pub fn new(file_prefix: &str, num_spikes: usize) -> Self {
        Self::with_scale(file_prefix, num_spikes, BucketScale::default())
    }

    pub fn with_scale(file_prefix: &str, num_spikes: usize, scale: BucketScale) -> Self {
        Self {
            plots: (0..num_spikes).map(|_| CumulativePlot::new(scale)).collect(),
            scale,
            file_prefix: file_prefix.to_string(),
        }
    }

    /// Total txns recorded across all spikes
    pub fn total_txns(&self) -> i64 {
        self.plots.iter().map(|p| p.txn_count()).sum()
    }
}

impl Logger for CumulativeLogger {
    fn log_prefix(&self) -> &str {
        &self.file_prefix
    }

    fn file_suffix(&self) -> &str {
        "cl-dat"
    }

    fn log(
        &mut self,
        block_timestamp: f64,
        txn_timestamp: f64,
        spike_index: usize,
    ) -> Result<(), SimError> {
        let age = block_timestamp - txn_timestamp;
        let bucket = self.scale.bucket_index(age)?;

        let plot = self
            .plots
            .get_mut(spike_index)
            .ok_or(SimError::UnknownSpike { index: spike_index })?;
        plot.record(bucket);
        Ok(())
    }

    fn outputs(&self) -> Vec<String> {
        self.plots
            .iter()
            .enumerate()
            .map(|(i, plot)| {
                log::debug!("generating cumulative plot data for spike {}", i);
                plot.render(&self.scale)
            })
            .collect()
    }

    fn reset(&mut self) {
        for plot in self.plots.iter_mut() {
            *plot = CumulativePlot::new(self.scale);
        }
    }
}
