//! A histogram with logarithmically spaced bins.
//!
//! Round trip times within one capture easily span four orders of magnitude, from the tens of
//! microseconds of a local peer to seconds behind a congested link. Bins that grow geometrically
//! keep the same relative resolution across the whole range with a few dozen bins.
//!
//! Bin `i` represents the value `min × 10^(i / bins_per_decade)`. A value falls into the bin whose
//! representative is closest on the logarithmic scale.
use core::fmt;

/// The lower end of the default range, ten microseconds.
pub const DEFAULT_MIN: f64 = 0.000_01;

/// The upper end of the default range, ten seconds.
pub const DEFAULT_MAX: f64 = 10.0;

/// The default resolution.
pub const DEFAULT_BINS_PER_DECADE: f64 = 6.0;

/// The largest number of bins a histogram may have.
pub const MAX_BINS: usize = 1 << 20;

/// The histogram parameters do not describe a usable range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidRange {
    /// The requested lower end.
    pub min: f64,
    /// The requested upper end.
    pub max: f64,
    /// The requested resolution.
    pub bins_per_decade: f64,
}

/// Counts of samples in logarithmically spaced bins.
#[derive(Debug, Clone, PartialEq)]
pub struct LogHistogram {
    min: f64,
    bins_per_decade: f64,
    /// Exclusive upper bound of every bin but the last, which is unbounded.
    upper: Vec<f64>,
    counts: Vec<u64>,
    total: u64,
}

/// The 5th, 50th and 95th percentile of a distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Percentiles {
    /// The 5th percentile.
    pub p05: f64,
    /// The median.
    pub p50: f64,
    /// The 95th percentile.
    pub p95: f64,
}

impl LogHistogram {
    /// Create a histogram covering `[min, max]`.
    ///
    /// The number of bins is `1 + round(log10(max / min) × bins_per_decade)` and must not exceed
    /// [`MAX_BINS`].
    ///
    /// [`MAX_BINS`]: constant.MAX_BINS.html
    pub fn new(min: f64, max: f64, bins_per_decade: f64) -> Result<Self, InvalidRange> {
        let valid = min > 0.0
            && max > min
            && max.is_finite()
            && bins_per_decade > 0.0
            && bins_per_decade.is_finite();
        let bins = bin_count(min, max, bins_per_decade);
        if !valid || !bins.is_finite() || bins > MAX_BINS as f64 {
            return Err(InvalidRange { min, max, bins_per_decade });
        }
        Ok(Self::build(min, bins as usize, bins_per_decade))
    }

    fn build(min: f64, bins: usize, bins_per_decade: f64) -> Self {
        let upper = (0..bins - 1)
            .map(|i| min * 10f64.powf((i as f64 + 0.5) / bins_per_decade))
            .collect();

        LogHistogram {
            min,
            bins_per_decade,
            upper,
            counts: vec![0; bins],
            total: 0,
        }
    }

    /// The lower end of the range.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// The number of bins per factor of ten.
    pub fn bins_per_decade(&self) -> f64 {
        self.bins_per_decade
    }

    /// A histogram with the same bins but no samples.
    pub fn empty(&self) -> Self {
        LogHistogram {
            counts: vec![0; self.bins()],
            total: 0,
            ..self.clone()
        }
    }

    /// The number of bins.
    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    /// The number of samples added.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// The count of each bin.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// The bin a value falls into.
    ///
    /// Values at or below the minimum (and NaN) land in the first bin, values at or above the
    /// maximum in the last one.
    pub fn index(&self, value: f64) -> usize {
        if !(value > self.min) {
            return 0;
        }
        self.upper.partition_point(|&bound| bound <= value)
    }

    /// Compute the bin of a value directly, without the precomputed bounds.
    pub fn slow_index(&self, value: f64) -> usize {
        if !(value > self.min) {
            return 0;
        }
        let index = ((value / self.min).log10() * self.bins_per_decade).round();
        (index as usize).min(self.bins() - 1)
    }

    /// The representative value of a bin.
    pub fn value(&self, index: usize) -> f64 {
        self.min * 10f64.powf(index as f64 / self.bins_per_decade)
    }

    /// Add a sample.
    pub fn add(&mut self, value: f64) {
        let index = self.index(value);
        self.counts[index] += 1;
        self.total += 1;
    }

    /// Find the representative value at each of the requested fractions.
    ///
    /// The fractions must be ascending. A single pass over the bins serves all of them. Returns
    /// `None` when no sample was added.
    pub fn quantiles(&self, fractions: &[f64]) -> Option<Vec<f64>> {
        if self.total == 0 {
            return None;
        }

        let mut values = Vec::with_capacity(fractions.len());
        let mut seen = 0u64;
        let mut bin = 0;
        for &fraction in fractions {
            let target = fraction.max(0.0).min(1.0) * self.total as f64;
            while bin < self.bins() && (seen == 0 || (seen as f64) < target) {
                seen += self.counts[bin];
                bin += 1;
            }
            values.push(self.value(bin - 1));
        }
        Some(values)
    }

    /// The 5th, 50th and 95th percentile.
    pub fn percentiles(&self) -> Option<Percentiles> {
        match self.quantiles(&[0.05, 0.5, 0.95])?.as_slice() {
            &[p05, p50, p95] => Some(Percentiles { p05, p50, p95 }),
            _ => None,
        }
    }
}

/// Covers ten microseconds to ten seconds, with six bins per decade.
impl Default for LogHistogram {
    fn default() -> Self {
        let bins = bin_count(DEFAULT_MIN, DEFAULT_MAX, DEFAULT_BINS_PER_DECADE);
        LogHistogram::build(DEFAULT_MIN, bins as usize, DEFAULT_BINS_PER_DECADE)
    }
}

/// The bin count for a range, not finite if the ratio overflows.
fn bin_count(min: f64, max: f64, bins_per_decade: f64) -> f64 {
    1.0 + ((max / min).log10() * bins_per_decade).round()
}

impl fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid histogram range [{}, {}] with {} bins per decade",
               self.min, self.max, self.bins_per_decade)
    }
}

impl std::error::Error for InvalidRange { }

impl fmt::Display for Percentiles {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "p05 {:.6}s p50 {:.6}s p95 {:.6}s", self.p05, self.p50, self.p95)
    }
}
