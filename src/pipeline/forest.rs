//! Random forest: bootstrap-aggregated decision trees

use crate::error::TrainingError;
use crate::pipeline::encoded::{EncodedMatrix, FeatureLayout};
use crate::pipeline::tree::{DecisionTree, TreeParams};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Ensemble of CART trees whose leaf probabilities are averaged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    pub n_estimators: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    layout: FeatureLayout,
    trees: Vec<DecisionTree>,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators,
            seed,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            layout: FeatureLayout::default(),
            trees: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_min_samples(mut self, split: usize, leaf: usize) -> Self {
        self.min_samples_split = split;
        self.min_samples_leaf = leaf;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Fit every tree on its own bootstrap sample.
    ///
    /// Tree `i` draws from a generator seeded with `seed + i`, so the fitted
    /// forest depends only on the data and the seed.
    pub fn fit(&mut self, x: &EncodedMatrix, y: &[bool]) -> Result<(), TrainingError> {
        let rows = x.nrows();
        if rows == 0 {
            return Err(TrainingError::Fit("cannot fit forest on zero rows".to_string()));
        }
        if rows != y.len() {
            return Err(TrainingError::Fit(format!(
                "feature rows ({rows}) and labels ({}) differ in length",
                y.len()
            )));
        }
        if self.n_estimators == 0 {
            return Err(TrainingError::Fit("n_estimators must be positive".to_string()));
        }

        let n_features = x.layout.width();
        let params = TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: ((n_features as f64).sqrt() as usize).max(1),
        };

        self.trees = (0..self.n_estimators)
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> = (0..rows).map(|_| rng.gen_range(0..rows)).collect();
                DecisionTree::fit(x, y, bootstrap, &params, &mut rng)
            })
            .collect();
        self.layout = x.layout.clone();

        debug!(
            trees = self.trees.len(),
            rows,
            features = n_features,
            max_features = params.max_features,
            "Random forest fitted"
        );

        Ok(())
    }

    /// Mean fraud probability across trees, one value per row
    pub fn predict_proba(&self, x: &EncodedMatrix) -> Result<Vec<f64>, String> {
        if !self.is_fitted() {
            return Err("random forest has not been fitted".to_string());
        }
        if x.layout != self.layout {
            return Err(format!(
                "expected {} encoded features, got {}",
                self.layout.width(),
                x.layout.width()
            ));
        }

        let trees = self.trees.len() as f64;
        Ok((0..x.nrows())
            .map(|i| {
                let row = x.row(i);
                self.trees.iter().map(|t| t.predict_proba(row)).sum::<f64>() / trees
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn separable(n: usize) -> (EncodedMatrix, Vec<bool>) {
        let mut numeric = Array2::<f64>::zeros((n, 2));
        let mut categorical = Array2::<u32>::zeros((n, 1));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let fraud = i % 4 == 0;
            numeric[[i, 0]] = if fraud { 5.0 + i as f64 * 0.01 } else { i as f64 * 0.01 - 2.0 };
            numeric[[i, 1]] = (i % 7) as f64;
            categorical[[i, 0]] = (i % 3) as u32;
            y.push(fraud);
        }
        (EncodedMatrix::new(numeric, categorical, vec![3]), y)
    }

    #[test]
    fn test_fits_separable_data() {
        let (x, y) = separable(80);
        let mut forest = RandomForestClassifier::new(15, 42);
        forest.fit(&x, &y).unwrap();

        assert_eq!(forest.tree_count(), 15);
        let proba = forest.predict_proba(&x).unwrap();
        for (p, label) in proba.iter().zip(&y) {
            assert_eq!(*p > 0.5, *label);
        }
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = separable(40);
        let mut a = RandomForestClassifier::new(5, 9);
        let mut b = RandomForestClassifier::new(5, 9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_mismatched_input() {
        let (x, y) = separable(10);
        let mut forest = RandomForestClassifier::new(3, 1);
        assert!(forest.fit(&x, &y[..5]).is_err());
        assert!(forest.predict_proba(&x).is_err());

        forest.fit(&x, &y).unwrap();
        let wrong = EncodedMatrix::from_numeric(Array2::<f64>::zeros((2, 3)));
        assert!(forest.predict_proba(&wrong).is_err());

        // same width, different vocabulary split
        let regrouped = EncodedMatrix::new(Array2::zeros((2, 2)), Array2::zeros((2, 2)), vec![1, 2]);
        assert!(forest.predict_proba(&regrouped).is_err());
    }
}
