//! Append-only result series keyed by simulation time.

use crate::{WdError, WdResult};

/// Time-ordered `(t_seconds, value)` samples for one result of one element.
///
/// Samples are only ever appended with strictly increasing times and the
/// series is cleared wholesale before a new run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    samples: Vec<(u64, f64)>,
}

impl TimeSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, t: u64, value: f64) -> WdResult<()> {
        if let Some(&(last, _)) = self.samples.last()
            && t <= last
        {
            return Err(WdError::NonMonotonicTime { last, t });
        }
        self.samples.push((t, value));
        Ok(())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn at(&self, t: u64) -> Option<f64> {
        self.samples
            .binary_search_by_key(&t, |&(ts, _)| ts)
            .ok()
            .map(|i| self.samples[i].1)
    }

    pub fn last(&self) -> Option<(u64, f64)> {
        self.samples.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.samples.iter().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|&(_, v)| v)
    }

    /// Forward-weighted integral: each value holds until the next sample.
    pub fn integral(&self) -> f64 {
        let mut total = 0.0;
        let mut t_prev = 0;
        let mut v_prev = 0.0;
        for &(t, v) in &self.samples {
            total += v_prev * (t - t_prev) as f64;
            t_prev = t;
            v_prev = v;
        }
        total
    }

    /// [`Self::integral`] divided by the last sample time (0 for a single sample).
    pub fn time_weighted_mean(&self) -> f64 {
        match self.samples.last() {
            Some(&(t_end, _)) if t_end > 0 => self.integral() / t_end as f64,
            _ => 0.0,
        }
    }
}

impl FromIterator<(u64, f64)> for TimeSeries {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        let mut samples: Vec<(u64, f64)> = iter.into_iter().collect();
        samples.sort_by_key(|&(t, _)| t);
        samples.dedup_by_key(|&mut (t, _)| t);
        Self { samples }
    }
}
