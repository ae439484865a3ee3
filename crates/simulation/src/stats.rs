//! Summary statistics over one candidate's simulated vote shares.

use common::round2;
use serde::Serialize;

/// Number of equal-width histogram buckets between min and max.
pub const HISTOGRAM_BUCKETS: usize = 20;

/// Distribution of a candidate's vote share across all trials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Population standard deviation.
    pub std_dev: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    /// Width of each histogram bucket; 1 when every sample is equal.
    pub bucket_width: f64,
    /// Trial counts per bucket, starting at `min`.
    pub histogram: Vec<u32>,
}

impl Default for DistributionSummary {
    fn default() -> Self {
        Self {
            mean: 0.0,
            median: 0.0,
            min: 0.0,
            max: 0.0,
            std_dev: 0.0,
            percentile_5: 0.0,
            percentile_95: 0.0,
            bucket_width: 1.0,
            histogram: vec![0; HISTOGRAM_BUCKETS],
        }
    }
}

impl DistributionSummary {
    /// Summarize a set of samples. An empty set yields the all-zero summary.
    pub fn from_samples(mut samples: Vec<f64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let n = samples.len();
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;

        samples.sort_by(|a, b| a.total_cmp(b));
        let min = samples[0];
        let max = samples[n - 1];
        let at = |fraction: f64| samples[((n as f64 * fraction).floor() as usize).min(n - 1)];

        let range = max - min;
        let bucket_width = if range > 0.0 {
            range / HISTOGRAM_BUCKETS as f64
        } else {
            1.0
        };
        let mut histogram = vec![0u32; HISTOGRAM_BUCKETS];
        for value in &samples {
            let bucket = ((value - min) / bucket_width).floor() as usize;
            histogram[bucket.min(HISTOGRAM_BUCKETS - 1)] += 1;
        }

        Self {
            mean,
            median: samples[n / 2],
            min,
            max,
            std_dev: variance.sqrt(),
            percentile_5: at(0.05),
            percentile_95: at(0.95),
            bucket_width,
            histogram,
        }
    }

    /// Copy with every statistic rounded to two decimals for reporting.
    /// Histogram counts are untouched.
    pub fn rounded(&self) -> Self {
        Self {
            mean: round2(self.mean),
            median: round2(self.median),
            min: round2(self.min),
            max: round2(self.max),
            std_dev: round2(self.std_dev),
            percentile_5: round2(self.percentile_5),
            percentile_95: round2(self.percentile_95),
            bucket_width: round2(self.bucket_width),
            histogram: self.histogram.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_moments() {
        let summary = DistributionSummary::from_samples(vec![4.0, 2.0, 6.0, 8.0]);
        assert_eq!(summary.mean, 5.0);
        assert_eq!(summary.min, 2.0);
        assert_eq!(summary.max, 8.0);
        // Middle element of the sorted samples: index 2.
        assert_eq!(summary.median, 6.0);
        // Population variance: (9 + 1 + 1 + 9) / 4 = 5
        assert!((summary.std_dev - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_percentile_indices() {
        let samples: Vec<f64> = (0..100).rev().map(f64::from).collect();
        let summary = DistributionSummary::from_samples(samples);
        assert_eq!(summary.percentile_5, 5.0);
        assert_eq!(summary.percentile_95, 95.0);
        assert_eq!(summary.median, 50.0);
    }

    #[test]
    fn test_histogram_counts_every_sample() {
        let samples: Vec<f64> = (0..1_000).map(|i| (i as f64 * 0.37).sin() * 10.0).collect();
        let summary = DistributionSummary::from_samples(samples);
        assert_eq!(summary.histogram.len(), HISTOGRAM_BUCKETS);
        assert_eq!(summary.histogram.iter().sum::<u32>(), 1_000);
        // Max lands in the last bucket, min in the first.
        assert!(summary.histogram[0] > 0);
        assert!(summary.histogram[HISTOGRAM_BUCKETS - 1] > 0);
    }

    #[test]
    fn test_constant_samples_use_unit_bucket() {
        let summary = DistributionSummary::from_samples(vec![12.5; 40]);
        assert_eq!(summary.bucket_width, 1.0);
        assert_eq!(summary.histogram[0], 40);
        assert_eq!(summary.std_dev, 0.0);
    }

    #[test]
    fn test_empty_samples() {
        let summary = DistributionSummary::from_samples(Vec::new());
        assert_eq!(summary, DistributionSummary::default());
        assert_eq!(summary.histogram.iter().sum::<u32>(), 0);
    }
}
