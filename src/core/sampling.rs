use super::error::{SimError, SimResult};

/// Allowed drift of a distribution's total probability mass away from 1.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Discrete weighted distribution. Entries partition [0, 1) into cumulative
/// buckets in list order.
#[derive(Debug, Clone, PartialEq)]
pub struct Distribution {
    entries: Vec<(f64, f64)>,
}

impl Distribution {
    pub fn new(entries: Vec<(f64, f64)>, context: &str) -> SimResult<Self> {
        if entries.is_empty() {
            return Err(SimError::invalid_distribution(context, "no entries"));
        }
        for (idx, &(value, prob)) in entries.iter().enumerate() {
            if !value.is_finite() {
                return Err(SimError::invalid_distribution(
                    context,
                    format!("entry {idx} has non-finite value {value}"),
                ));
            }
            if !prob.is_finite() || prob < 0.0 {
                return Err(SimError::invalid_distribution(
                    context,
                    format!("entry {idx} has invalid probability {prob}"),
                ));
            }
        }

        let total: f64 = entries.iter().map(|&(_, p)| p).sum();
        if (total - 1.0).abs() > PROBABILITY_EPSILON {
            return Err(SimError::invalid_distribution(
                context,
                format!("probabilities sum to {total}, expected 1"),
            ));
        }

        Ok(Self { entries })
    }

    /// A distribution that always yields `value`.
    pub fn constant(value: f64) -> Self {
        Self {
            entries: vec![(value, 1.0)],
        }
    }

    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    /// Maps a uniform draw onto the value whose cumulative bucket contains it.
    ///
    /// Draws outside [0, 1) are rejected. A draw inside [0, 1) that lands past
    /// the last bucket, because rounding left the total mass short of 1, is
    /// absorbed by the last bucket with positive probability.
    pub fn value_for_draw(&self, draw: f64) -> SimResult<f64> {
        if !(0.0..1.0).contains(&draw) {
            return Err(SimError::SamplingExhaustion { draw });
        }

        let mut cumulative = 0.0;
        for &(value, prob) in &self.entries {
            if draw >= cumulative && draw < cumulative + prob {
                return Ok(value);
            }
            cumulative += prob;
        }

        self.entries
            .iter()
            .rev()
            .find(|&&(_, prob)| prob > 0.0)
            .map(|&(value, _)| value)
            .ok_or(SimError::SamplingExhaustion { draw })
    }

    pub fn sample(&self, rng: &mut Rng) -> SimResult<f64> {
        self.value_for_draw(rng.next_f64())
    }
}

/// Seed for one allocation's draw stream, independent of scheduling order.
pub fn derive_seed(base_seed: u64, allocation_index: usize) -> u64 {
    let mixed = base_seed ^ ((allocation_index as u64).rotate_left(32));
    splitmix64(mixed)
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// xorshift64* generator.
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Uniform draw strictly inside (0, 1).
    pub fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }
}
