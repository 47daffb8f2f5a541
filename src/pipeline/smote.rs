//! Minority oversampling by nearest-neighbour interpolation (SMOTE)

use crate::pipeline::encoded::{EncodedMatrix, EncodedRow};
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Balances a binary training set by synthesizing minority rows.
///
/// Only used while fitting; at inference the stage is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoteOversampler {
    pub k_neighbors: usize,
    pub seed: u64,
    /// Synthetic rows generated during the last fit
    pub synthesized: usize,
}

impl SmoteOversampler {
    pub fn new(k_neighbors: usize, seed: u64) -> Self {
        Self {
            k_neighbors,
            seed,
            synthesized: 0,
        }
    }

    /// Append synthetic minority rows until both classes have equal counts.
    ///
    /// Numeric columns are interpolated between a minority row and one of
    /// its neighbours. Categorical columns take the value of whichever end
    /// the synthetic point lies closer to. With a single class there is
    /// nothing to balance and the input comes back unchanged. A minority
    /// class of one row can only be duplicated.
    pub fn fit_resample(&mut self, x: EncodedMatrix, y: Vec<bool>) -> (EncodedMatrix, Vec<bool>) {
        let positives = y.iter().filter(|&&label| label).count();
        let negatives = y.len() - positives;
        self.synthesized = 0;

        if positives == 0 || negatives == 0 || positives == negatives {
            return (x, y);
        }

        let minority_label = positives < negatives;
        let minority: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == minority_label)
            .map(|(i, _)| i)
            .collect();
        let needed = positives.max(negatives) - minority.len();

        let neighbours = nearest_neighbours(&x, &minority, self.k_neighbors);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let original = x.nrows();

        let mut numeric = Array2::<f64>::zeros((original + needed, x.numeric.ncols()));
        numeric.slice_mut(s![..original, ..]).assign(&x.numeric);
        let mut categorical = Array2::<u32>::zeros((original + needed, x.categorical.ncols()));
        categorical.slice_mut(s![..original, ..]).assign(&x.categorical);

        for out in original..original + needed {
            let base = rng.gen_range(0..minority.len());
            let origin = minority[base];
            let candidates = &neighbours[base];

            if candidates.is_empty() {
                numeric.row_mut(out).assign(&x.numeric.row(origin));
                categorical.row_mut(out).assign(&x.categorical.row(origin));
                continue;
            }

            let other = minority[candidates[rng.gen_range(0..candidates.len())]];
            let gap: f64 = rng.gen();
            let from = x.numeric.row(origin);
            let to = x.numeric.row(other);
            numeric.row_mut(out).assign(&(&from + &((&to - &from) * gap)));
            let nearer = if gap < 0.5 { origin } else { other };
            categorical.row_mut(out).assign(&x.categorical.row(nearer));
        }

        let mut y = y;
        y.extend(std::iter::repeat(minority_label).take(needed));
        self.synthesized = needed;

        debug!(
            minority = minority.len(),
            synthesized = needed,
            total = y.len(),
            "Oversampled minority class"
        );

        let resampled = EncodedMatrix {
            numeric,
            categorical,
            layout: x.layout,
        };
        (resampled, y)
    }
}

/// For each minority row, the positions (within `members`) of its k nearest
/// other members, closest first.
fn nearest_neighbours(x: &EncodedMatrix, members: &[usize], k: usize) -> Vec<Vec<usize>> {
    let k = k.min(members.len().saturating_sub(1));

    members
        .iter()
        .enumerate()
        .map(|(a, &row_a)| {
            let mut distances: Vec<(f64, usize)> = members
                .iter()
                .enumerate()
                .filter(|(b, _)| *b != a)
                .map(|(b, &row_b)| (squared_distance(x.row(row_a), x.row(row_b)), b))
                .collect();
            distances.sort_by(|l, r| l.0.total_cmp(&r.0).then(l.1.cmp(&r.1)));
            distances.into_iter().take(k).map(|(_, b)| b).collect()
        })
        .collect()
}

/// Squared distance in one-hot space: a differing category costs 2
fn squared_distance(a: EncodedRow<'_>, b: EncodedRow<'_>) -> f64 {
    let numeric: f64 = a
        .numeric
        .iter()
        .zip(b.numeric.iter())
        .map(|(p, q)| (p - q).powi(2))
        .sum();
    let mismatches = a
        .categorical
        .iter()
        .zip(b.categorical.iter())
        .filter(|(p, q)| p != q)
        .count();
    numeric + 2.0 * mismatches as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn numeric(x: Array2<f64>) -> EncodedMatrix {
        EncodedMatrix::from_numeric(x)
    }

    #[test]
    fn test_balances_classes() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [10.0, 10.0], [11.0, 11.0]];
        let y = vec![false, false, false, false, true, true];

        let mut smote = SmoteOversampler::new(5, 42);
        let (x_res, y_res) = smote.fit_resample(numeric(x), y);

        assert_eq!(x_res.nrows(), 8);
        assert_eq!(y_res.iter().filter(|&&l| l).count(), 4);
        assert_eq!(smote.synthesized, 2);

        // synthetic points lie on the segment between the two minority rows
        for row in x_res.numeric.rows().into_iter().skip(6) {
            assert!(row[0] >= 10.0 && row[0] <= 11.0);
            assert!((row[0] - row[1]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_synthetic_categories_come_from_an_endpoint() {
        let x = EncodedMatrix::new(
            array![[0.0], [0.1], [0.2], [0.3], [0.4], [5.0], [6.0]],
            array![[0], [0], [0], [0], [0], [1], [2]],
            vec![3],
        );
        let y = vec![false, false, false, false, false, true, true];

        let (x_res, _) = SmoteOversampler::new(5, 3).fit_resample(x, y);
        assert_eq!(x_res.nrows(), 10);
        assert_eq!(x_res.layout.cardinalities, vec![3]);
        for i in 7..10 {
            let value = x_res.numeric[[i, 0]];
            let category = x_res.categorical[[i, 0]];
            assert!((5.0..=6.0).contains(&value));
            assert!(category == 1 || category == 2);
            // the category follows the closer endpoint
            assert_eq!(category == 1, value < 5.5);
        }
    }

    #[test]
    fn test_is_deterministic_for_a_seed() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0], [7.0], [8.0], [9.5]];
        let y = vec![false, false, false, false, false, true, true, true];

        let (a, _) = SmoteOversampler::new(2, 7).fit_resample(numeric(x.clone()), y.clone());
        let (b, _) = SmoteOversampler::new(2, 7).fit_resample(numeric(x), y);
        assert_eq!(a, b);
    }

    #[test]
    fn test_single_class_is_untouched() {
        let x = numeric(array![[0.0], [1.0], [2.0]]);
        let y = vec![false, false, false];

        let mut smote = SmoteOversampler::new(5, 42);
        let (x_res, y_res) = smote.fit_resample(x.clone(), y.clone());
        assert_eq!(x_res, x);
        assert_eq!(y_res, y);
        assert_eq!(smote.synthesized, 0);
    }

    #[test]
    fn test_single_minority_row_is_duplicated() {
        let x = EncodedMatrix::new(
            array![[0.0], [1.0], [2.0], [9.0]],
            array![[0], [0], [1], [1]],
            vec![2],
        );
        let y = vec![false, false, false, true];

        let (x_res, y_res) = SmoteOversampler::new(5, 42).fit_resample(x, y);
        assert_eq!(x_res.nrows(), 6);
        assert_eq!(x_res.numeric[[4, 0]], 9.0);
        assert_eq!(x_res.numeric[[5, 0]], 9.0);
        assert_eq!(x_res.categorical[[5, 0]], 1);
        assert_eq!(y_res[4..], [true, true]);
    }

    #[test]
    fn test_minority_can_be_the_negative_class() {
        let x = numeric(array![[0.0], [5.0], [6.0], [7.0]]);
        let y = vec![false, true, true, true];

        let (_, y_res) = SmoteOversampler::new(5, 42).fit_resample(x, y);
        assert_eq!(y_res.iter().filter(|&&l| !l).count(), 3);
    }
}
