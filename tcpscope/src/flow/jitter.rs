//! Timing jitter inferred from the TCP timestamp option.
//!
//! A sender stamps each segment with its own clock (TSval). Comparing the progress of that clock
//! with the capture clock yields an offset per segment. A constant offset means the segments
//! reach the capture point at an even pace, so the variation of the offset is the jitter added
//! between the sender and the capture point.
//!
//! The timestamp clock of the sender is assumed to tick once per millisecond. The echoed value
//! (TSecr) of the peer's segments refers to the same clock, offsets derived from it include the
//! path to the peer and back.
use core::fmt;

use crate::flow::histogram::{LogHistogram, Percentiles};
use crate::time::Instant;

/// Nanoseconds per timestamp tick.
const TICK_NANOS: i64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    count: u64,
    sum: f64,
    sum_sq: f64,
}

/// Offsets between a sender's timestamp clock and the capture clock.
#[derive(Debug, Clone)]
pub struct JitterTracker {
    origin: Option<(u32, Instant)>,
    values: Moments,
    echoes: Moments,
    last_offset: Option<f64>,
    changes: LogHistogram,
}

/// The jitter of one direction.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct JitterSummary {
    /// Timestamp values contributing offsets.
    pub samples: u64,
    /// Echoed values contributing offsets.
    pub echo_samples: u64,
    /// Mean offset, in seconds.
    pub mean: f64,
    /// Standard deviation of the offset, in seconds.
    pub jitter: f64,
    /// Mean value offset minus mean echo offset, in seconds.
    pub delay: f64,
    /// Distribution of the change between consecutive offsets.
    pub changes: Option<Percentiles>,
}

impl Moments {
    fn add(&mut self, offset: f64) {
        self.count += 1;
        self.sum += offset;
        self.sum_sq += offset * offset;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    fn deviation(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        // Rounding can make the variance of a constant offset slightly negative.
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0).sqrt()
    }
}

impl JitterTracker {
    /// Create a tracker collecting offset changes in `changes`.
    pub fn new(changes: LogHistogram) -> Self {
        JitterTracker {
            origin: None,
            values: Moments::default(),
            echoes: Moments::default(),
            last_offset: None,
            changes,
        }
    }

    fn offset(origin: (u32, Instant), stamp: u32, time: Instant) -> f64 {
        let (first, first_time) = origin;
        let ticks = i64::from(stamp.wrapping_sub(first)) * TICK_NANOS;
        let elapsed = time.nanos.wrapping_sub(first_time.nanos);
        ticks.wrapping_sub(elapsed) as f64 / 1e9
    }

    /// Record a timestamp value sent at `time`.
    ///
    /// The first value only establishes the origin of both clocks.
    pub fn add(&mut self, value: u32, time: Instant) {
        let origin = match self.origin {
            Some(origin) => origin,
            None => {
                self.origin = Some((value, time));
                return;
            },
        };

        let offset = Self::offset(origin, value, time);
        self.values.add(offset);
        if let Some(last) = self.last_offset {
            self.changes.add((offset - last).abs());
        }
        self.last_offset = Some(offset);
    }

    /// Record a value of this clock echoed by the peer at `time`.
    ///
    /// Ignored until a value established the origin.
    pub fn add_echo(&mut self, echo: u32, time: Instant) {
        if let Some(origin) = self.origin {
            self.echoes.add(Self::offset(origin, echo, time));
        }
    }

    /// The number of value offsets.
    pub fn samples(&self) -> u64 {
        self.values.count
    }

    /// The mean value offset in seconds, zero without samples.
    pub fn mean(&self) -> f64 {
        self.values.mean()
    }

    /// The standard deviation of the value offsets in seconds.
    pub fn jitter(&self) -> f64 {
        self.values.deviation()
    }

    /// The difference of the mean offsets of values and echoes.
    ///
    /// Zero unless both were observed.
    pub fn delay(&self) -> f64 {
        if self.values.count == 0 || self.echoes.count == 0 {
            return 0.0;
        }
        self.values.mean() - self.echoes.mean()
    }

    /// The changes between consecutive value offsets, in seconds.
    pub fn changes(&self) -> &LogHistogram {
        &self.changes
    }

    /// Summarize all observations.
    pub fn summary(&self) -> JitterSummary {
        JitterSummary {
            samples: self.values.count,
            echo_samples: self.echoes.count,
            mean: self.mean(),
            jitter: self.jitter(),
            delay: self.delay(),
            changes: self.changes.percentiles(),
        }
    }
}

impl fmt::Display for JitterSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "mean {:.6}s jitter {:.6}s delay {:.6}s ({} samples, {} echoes)",
               self.mean, self.jitter, self.delay, self.samples, self.echo_samples)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tracker() -> JitterTracker {
        JitterTracker::new(LogHistogram::new(0.00001, 10.0, 6.0).unwrap())
    }

    fn ms(millis: i64) -> Instant {
        Instant::from_micros(millis * 1000)
    }

    #[test]
    fn empty() {
        let tracker = tracker();
        let summary = tracker.summary();
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.jitter, 0.0);
        assert_eq!(summary.delay, 0.0);
        assert_eq!(summary.changes, None);
    }

    #[test]
    fn first_value_is_origin() {
        let mut tracker = tracker();
        tracker.add(1000, ms(5));
        assert_eq!(tracker.samples(), 0);
        tracker.add(1010, ms(15));
        assert_eq!(tracker.samples(), 1);
        assert_eq!(tracker.mean(), 0.0);
    }

    #[test]
    fn steady_clock_has_no_jitter() {
        let mut tracker = tracker();
        for i in 0..50 {
            tracker.add(7 + i as u32, ms(100 + i));
        }
        assert_eq!(tracker.samples(), 49);
        assert!(tracker.mean().abs() < 1e-12);
        assert!(tracker.jitter().abs() < 1e-9);
        assert!(!tracker.jitter().is_nan());
    }

    #[test]
    fn alternating_offsets() {
        let mut tracker = tracker();
        tracker.add(0, ms(0));
        // Offsets alternate between -2ms and +2ms.
        for i in 1..=100i64 {
            let skew = if i % 2 == 0 { -2 } else { 2 };
            tracker.add((i * 10) as u32, ms(i * 10 + skew));
        }
        assert!(tracker.mean().abs() < 1e-9);
        assert!((tracker.jitter() - 0.002).abs() < 1e-9);
        assert_eq!(tracker.changes().total(), 99);
        let changes = tracker.summary().changes.unwrap();
        assert!((changes.p50 - 0.004).abs() < 0.001);
    }

    #[test]
    fn echo_delay() {
        let mut tracker = tracker();
        tracker.add_echo(5, ms(0));
        assert_eq!(tracker.summary().echo_samples, 0);

        tracker.add(100, ms(0));
        tracker.add(110, ms(10));
        tracker.add(120, ms(20));
        // The peer echoes each value 30ms after it was captured.
        tracker.add_echo(110, ms(40));
        tracker.add_echo(120, ms(50));
        let summary = tracker.summary();
        assert_eq!(summary.echo_samples, 2);
        assert!((summary.delay - 0.030).abs() < 1e-9);
    }

    #[test]
    fn wrapping_timestamp() {
        let mut tracker = tracker();
        tracker.add(u32::max_value() - 4, ms(0));
        tracker.add(5, ms(10));
        assert!(tracker.mean().abs() < 1e-12);
    }
}
