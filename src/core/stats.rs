/// Running record of one allocation's iteration incomes.
#[derive(Debug, Clone)]
pub struct OutcomeAccumulator {
    incomes: Vec<f64>,
    sum: f64,
    min: f64,
    max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutcomeSummary {
    pub iterations: u32,
    pub sum: f64,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub ci_left: f64,
    pub ci_right: f64,
    pub median: f64,
    pub p10: f64,
    pub p90: f64,
}

impl OutcomeAccumulator {
    pub fn with_capacity(iterations: usize) -> Self {
        Self {
            incomes: Vec::with_capacity(iterations),
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn record(&mut self, income: f64) {
        self.incomes.push(income);
        self.sum += income;
        if income < self.min {
            self.min = income;
        }
        if income > self.max {
            self.max = income;
        }
    }

    pub fn incomes(&self) -> &[f64] {
        &self.incomes
    }

    pub fn summarize(mut self, confidence_z: f64) -> OutcomeSummary {
        let n = self.incomes.len();
        if n == 0 {
            return OutcomeSummary {
                iterations: 0,
                sum: 0.0,
                mean: 0.0,
                min: 0.0,
                max: 0.0,
                std_dev: 0.0,
                ci_left: 0.0,
                ci_right: 0.0,
                median: 0.0,
                p10: 0.0,
                p90: 0.0,
            };
        }

        let mean = self.sum / n as f64;
        let std_dev = population_std_dev(&self.incomes, mean);
        let (ci_left, ci_right) = confidence_interval(mean, std_dev, confidence_z);
        self.incomes.sort_by(|a, b| a.total_cmp(b));

        OutcomeSummary {
            iterations: n as u32,
            sum: self.sum,
            mean,
            min: self.min,
            max: self.max,
            std_dev,
            ci_left,
            ci_right,
            median: percentile_of_sorted(&self.incomes, 50.0),
            p10: percentile_of_sorted(&self.incomes, 10.0),
            p90: percentile_of_sorted(&self.incomes, 90.0),
        }
    }
}

/// `sqrt(sum((x - mean)^2) / n)`, the population form.
pub fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let squared: f64 = values.iter().map(|x| (x - mean) * (x - mean)).sum();
    (squared / values.len() as f64).sqrt()
}

/// Normal-approximation interval `mean ± z·σ`. No small-sample correction.
pub fn confidence_interval(mean: f64, std_dev: f64, z: f64) -> (f64, f64) {
    let half_width = z * std_dev;
    (mean - half_width, mean + half_width)
}

/// Linear-interpolated percentile of an ascending slice, `p` in [0, 100].
pub fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted {
        [] => 0.0,
        [only] => *only,
        _ => {
            let rank = (p / 100.0) * (sorted.len() - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            let w = rank - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * w
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn population_std_dev_matches_hand_calculation() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(population_std_dev(&values, 5.0), 2.0);
    }

    #[test]
    fn summary_tracks_min_max_and_interval() {
        let mut acc = OutcomeAccumulator::with_capacity(4);
        for income in [100.0, 300.0, 200.0, 400.0] {
            acc.record(income);
        }
        let summary = acc.summarize(1.96);
        assert_eq!(summary.iterations, 4);
        assert_eq!(summary.mean, 250.0);
        assert_eq!(summary.min, 100.0);
        assert_eq!(summary.max, 400.0);
        let sigma = 12_500.0_f64.sqrt();
        assert_approx_tol(summary.std_dev, sigma, 1e-9);
        assert_approx_tol(summary.ci_left, 250.0 - 1.96 * sigma, 1e-9);
        assert_approx_tol(summary.ci_right, 250.0 + 1.96 * sigma, 1e-9);
        assert_eq!(summary.median, 250.0);
    }

    #[test]
    fn z_value_scales_interval_width() {
        let (l95, r95) = confidence_interval(10.0, 2.0, 1.96);
        let (l90, r90) = confidence_interval(10.0, 2.0, 1.65);
        assert!(r95 - l95 > r90 - l90);
        assert_approx_tol(r90 - l90, 6.6, 1e-12);
    }

    #[test]
    fn empty_accumulator_summarizes_to_zeroes() {
        let summary = OutcomeAccumulator::with_capacity(0).summarize(1.96);
        assert_eq!(summary.iterations, 0);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.min, 0.0);
    }

    #[test]
    fn percentile_interpolates_between_points() {
        let values = [10.0, 20.0, 30.0, 40.0];
        assert_approx_tol(percentile_of_sorted(&values, 50.0), 25.0, 1e-12);
        assert_approx_tol(percentile_of_sorted(&values, 10.0), 13.0, 1e-12);
        assert_eq!(percentile_of_sorted(&values, 0.0), 10.0);
        assert_eq!(percentile_of_sorted(&values, 100.0), 40.0);
        assert_eq!(percentile_of_sorted(&[7.5], 90.0), 7.5);
    }

    #[test]
    fn summary_percentiles_ignore_recording_order() {
        let mut acc = OutcomeAccumulator::with_capacity(5);
        for income in [500.0, 100.0, 400.0, 200.0, 300.0] {
            acc.record(income);
        }
        let s = acc.summarize(1.96);
        assert_eq!(s.median, 300.0);
        assert_approx_tol(s.p10, 140.0, 1e-9);
        assert_approx_tol(s.p90, 460.0, 1e-9);
        assert_eq!(s.min, 100.0);
        assert_eq!(s.max, 500.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_summary_invariants_hold(
            incomes in vec(0.0_f64..1_000_000.0, 1..200),
            z in 0.5_f64..3.5,
        ) {
            let mut acc = OutcomeAccumulator::with_capacity(incomes.len());
            for &income in &incomes {
                acc.record(income);
            }
            let s = acc.summarize(z);
            let n = incomes.len() as f64;

            prop_assert!((s.mean * n - s.sum).abs() <= 1e-6 * s.sum.abs().max(1.0));
            prop_assert!(s.std_dev >= 0.0);
            prop_assert!(s.ci_left <= s.mean && s.mean <= s.ci_right);
            let slack = 1e-9 * s.max.abs().max(1.0);
            prop_assert!(s.min <= s.mean + slack && s.mean <= s.max + slack);
            prop_assert!(s.p10 <= s.median && s.median <= s.p90);
        }
    }
}
