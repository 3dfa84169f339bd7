//! Mergeable running statistics
//!
//! Single-pass (Welford) accumulators whose state can be combined with the
//! pairwise update of Chan et al., so partial sums from independent workers
//! merge to the same result as one pass over all events.

use serde::{Deserialize, Serialize};

/// Running mean and variance of one quantity
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStat {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStat {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// Combine with another accumulator
    pub fn merge(&mut self, other: &RunningStat) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count as f64;
        let n_b = other.count as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.count += other.count;
    }

    /// Number of samples
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sample mean, zero when empty
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Unbiased sample variance, zero with fewer than two samples
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Standard deviation of the samples
    pub fn width(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard error of the mean
    pub fn error(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.variance() / self.count as f64).sqrt()
        }
    }

    /// Freeze the current state
    pub fn summary(&self) -> Summary {
        Summary {
            count: self.count,
            mean: self.mean(),
            error: self.error(),
            width: self.width(),
        }
    }
}

/// Frozen result of a [`RunningStat`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub count: u64,
    pub mean: f64,
    pub error: f64,
    pub width: f64,
}

/// Running covariance of a pair of quantities
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningCovariance {
    x: RunningStat,
    y: RunningStat,
    c_xy: f64,
}

impl RunningCovariance {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one `(x, y)` sample
    pub fn push(&mut self, x: f64, y: f64) {
        let dx = x - self.x.mean();
        self.x.push(x);
        self.y.push(y);
        self.c_xy += dx * (y - self.y.mean());
    }

    /// Combine with another accumulator
    pub fn merge(&mut self, other: &RunningCovariance) {
        if other.count() == 0 {
            return;
        }
        if self.count() == 0 {
            *self = *other;
            return;
        }
        let n_a = self.count() as f64;
        let n_b = other.count() as f64;
        let n = n_a + n_b;
        let dx = other.x.mean() - self.x.mean();
        let dy = other.y.mean() - self.y.mean();
        self.c_xy += other.c_xy + dx * dy * n_a * n_b / n;
        self.x.merge(&other.x);
        self.y.merge(&other.y);
    }

    /// Number of samples
    pub fn count(&self) -> u64 {
        self.x.count()
    }

    /// Accumulated statistics of `x`
    pub fn x(&self) -> &RunningStat {
        &self.x
    }

    /// Accumulated statistics of `y`
    pub fn y(&self) -> &RunningStat {
        &self.y
    }

    /// Unbiased sample covariance
    pub fn covariance(&self) -> f64 {
        if self.count() < 2 {
            0.0
        } else {
            self.c_xy / (self.count() - 1) as f64
        }
    }

    /// Least-squares slope of `y` against `x`; `None` if `x` never varied
    pub fn slope(&self) -> Option<f64> {
        let var_x = self.x.variance();
        (var_x > 0.0).then(|| self.covariance() / var_x)
    }

    /// Pearson correlation coefficient; `None` if either side never varied
    pub fn correlation(&self) -> Option<f64> {
        let denom = (self.x.variance() * self.y.variance()).sqrt();
        (denom > 0.0).then(|| self.covariance() / denom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_running_stat() {
        let mut stat = RunningStat::new();
        for x in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            stat.push(x);
        }
        assert_eq!(stat.count(), 8);
        assert_relative_eq!(stat.mean(), 5.0);
        assert_relative_eq!(stat.variance(), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(stat.error(), (32.0 / 7.0 / 8.0_f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_empty_stat() {
        let stat = RunningStat::new();
        assert_eq!(stat.mean(), 0.0);
        assert_eq!(stat.variance(), 0.0);
        assert_eq!(stat.error(), 0.0);
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let data: Vec<f64> = (0..50).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();

        let mut whole = RunningStat::new();
        data.iter().for_each(|&x| whole.push(x));

        let (left, right) = data.split_at(17);
        let mut a = RunningStat::new();
        let mut b = RunningStat::new();
        left.iter().for_each(|&x| a.push(x));
        right.iter().for_each(|&x| b.push(x));
        a.merge(&b);

        assert_eq!(a.count(), whole.count());
        assert_relative_eq!(a.mean(), whole.mean(), epsilon = 1e-12);
        assert_relative_eq!(a.variance(), whole.variance(), epsilon = 1e-10);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut a = RunningStat::new();
        let mut b = RunningStat::new();
        b.push(3.0);
        a.merge(&b);
        assert_eq!(a, b);
        a.merge(&RunningStat::new());
        assert_eq!(a, b);
    }

    #[test]
    fn test_covariance_slope() {
        let mut cov = RunningCovariance::new();
        for i in 0..20 {
            let x = i as f64;
            cov.push(x, 3.0 * x - 1.0);
        }
        assert_relative_eq!(cov.slope().unwrap(), 3.0, epsilon = 1e-12);
        assert_relative_eq!(cov.correlation().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_covariance_degenerate() {
        let mut cov = RunningCovariance::new();
        cov.push(1.0, 2.0);
        cov.push(1.0, 5.0);
        assert!(cov.slope().is_none());
        assert!(cov.correlation().is_none());
    }

    #[test]
    fn test_covariance_merge() {
        let pairs: Vec<(f64, f64)> = (0..40)
            .map(|i| {
                let x = (i as f64 * 0.7).cos();
                (x, 0.5 * x + (i as f64 * 1.3).sin() * 0.1)
            })
            .collect();

        let mut whole = RunningCovariance::new();
        pairs.iter().for_each(|&(x, y)| whole.push(x, y));

        let mut a = RunningCovariance::new();
        let mut b = RunningCovariance::new();
        pairs[..25].iter().for_each(|&(x, y)| a.push(x, y));
        pairs[25..].iter().for_each(|&(x, y)| b.push(x, y));
        a.merge(&b);

        assert_relative_eq!(a.covariance(), whole.covariance(), epsilon = 1e-12);
        assert_relative_eq!(a.slope().unwrap(), whole.slope().unwrap(), epsilon = 1e-10);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_merge_any_split(
                data in prop::collection::vec(-1.0e3..1.0e3f64, 1..200),
                split in 0usize..200,
            ) {
                let split = split.min(data.len());
                let mut whole = RunningStat::new();
                data.iter().for_each(|&x| whole.push(x));

                let mut a = RunningStat::new();
                let mut b = RunningStat::new();
                data[..split].iter().for_each(|&x| a.push(x));
                data[split..].iter().for_each(|&x| b.push(x));
                a.merge(&b);

                prop_assert_eq!(a.count(), whole.count());
                prop_assert!((a.mean() - whole.mean()).abs() <= 1e-9 * (1.0 + whole.mean().abs()));
                prop_assert!((a.variance() - whole.variance()).abs() <= 1e-7 * (1.0 + whole.variance()));
            }
        }
    }
}
