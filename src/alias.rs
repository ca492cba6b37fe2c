//! Alias-method sampling from a discrete weight distribution.
//!
//! Vose's algorithm: O(n) preprocessing into a probability/alias table,
//! then O(1) per draw — pick a column uniformly, flip that column's
//! weighted coin, land on the column or its alias. See Keith Schwarz,
//! "Darts, Dice, and Coins: Sampling from a Discrete Distribution".

use rand::Rng;

use crate::error::{Error, Result};

/// Preprocessed table for one distribution snapshot.
#[derive(Debug, Clone)]
pub struct AliasTable {
    prob: Vec<f64>,
    alias: Vec<usize>,
}

impl AliasTable {
    /// Build a table from positive weights. Weights need not sum to one.
    pub fn new(weights: &[f64]) -> Result<Self> {
        if weights.is_empty() {
            return Err(Error::Config("alias table needs at least one weight".into()));
        }
        if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(Error::Config(
                "alias table weights must be positive and finite".into(),
            ));
        }

        let n = weights.len();
        let total: f64 = weights.iter().sum();
        // Scale so the average weight is exactly 1.
        let mut scaled: Vec<f64> = weights.iter().map(|w| w * n as f64 / total).collect();

        let mut small = Vec::with_capacity(n);
        let mut large = Vec::with_capacity(n);
        for (i, p) in scaled.iter().enumerate() {
            if *p < 1.0 {
                small.push(i);
            } else {
                large.push(i);
            }
        }

        // Leftover entries keep probability 1 and alias to themselves.
        let mut prob = vec![1.0; n];
        let mut alias: Vec<usize> = (0..n).collect();

        while let (Some(&less), Some(&more)) = (small.last(), large.last()) {
            small.pop();
            large.pop();

            prob[less] = scaled[less];
            alias[less] = more;

            scaled[more] = (scaled[more] + scaled[less]) - 1.0;
            if scaled[more] >= 1.0 {
                large.push(more);
            } else {
                small.push(more);
            }
        }

        Ok(Self { prob, alias })
    }

    /// Draw one index, weight-proportionally.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let column = rng.random_range(0..self.prob.len());
        if rng.random::<f64>() < self.prob[column] {
            column
        } else {
            self.alias[column]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn frequencies(weights: &[f64], draws: usize, seed: u64) -> Vec<f64> {
        let table = AliasTable::new(weights).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut counts = vec![0usize; weights.len()];
        for _ in 0..draws {
            counts[table.sample(&mut rng)] += 1;
        }
        counts.iter().map(|c| *c as f64 / draws as f64).collect()
    }

    #[test]
    fn skewed_weights_match_empirical_frequency() {
        let freq = frequencies(&[0.1, 0.9], 10_000, 42);
        assert!((freq[0] - 0.1).abs() < 0.03, "light channel drew {}", freq[0]);
        assert!((freq[1] - 0.9).abs() < 0.03, "heavy channel drew {}", freq[1]);
    }

    #[test]
    fn unnormalized_weights_behave_like_normalized_ones() {
        let freq = frequencies(&[1.0, 8.0, 1.0], 10_000, 7);
        assert!((freq[1] - 0.8).abs() < 0.03);
    }

    #[test]
    fn single_weight_always_wins() {
        let table = AliasTable::new(&[3.5]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            assert_eq!(table.sample(&mut rng), 0);
        }
    }

    #[test]
    fn uniform_weights_spread_evenly() {
        let freq = frequencies(&[1.0, 1.0, 1.0, 1.0], 10_000, 11);
        for f in freq {
            assert!((f - 0.25).abs() < 0.03);
        }
    }

    #[test]
    fn empty_and_nonpositive_weights_are_config_errors() {
        assert!(matches!(AliasTable::new(&[]), Err(Error::Config(_))));
        assert!(matches!(AliasTable::new(&[1.0, 0.0]), Err(Error::Config(_))));
        assert!(matches!(
            AliasTable::new(&[1.0, -2.0]),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            AliasTable::new(&[f64::NAN]),
            Err(Error::Config(_))
        ));
    }
}
