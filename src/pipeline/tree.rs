//! CART decision tree for binary classification (Gini impurity)

use crate::pipeline::encoded::{EncodedMatrix, EncodedRow, FeatureRef};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Growth limits shared by every tree of a forest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split before settling for the best found
    pub max_features: usize,
}

/// Test applied at a split; rows satisfying it go right
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitRule {
    /// Numeric column above `threshold`
    Threshold { feature: usize, threshold: f64 },
    /// Categorical column equal to `category`
    Category { column: usize, category: u32 },
}

impl SplitRule {
    fn goes_right(&self, row: EncodedRow<'_>) -> bool {
        match *self {
            SplitRule::Threshold { feature, threshold } => row.numeric[feature] > threshold,
            SplitRule::Category { column, category } => row.categorical[column] == category,
        }
    }
}

/// Flat node storage; children are indices into the tree's node list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        rule: SplitRule,
        left: usize,
        right: usize,
    },
    Leaf {
        fraud_probability: f64,
        samples: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    rule: SplitRule,
    impurity: f64,
}

impl DecisionTree {
    /// Grow a tree on the given sample indices (duplicates allowed, as
    /// produced by bootstrap sampling).
    ///
    /// Candidate features are numbered as in a dense one-hot matrix, so a
    /// categorical column contributes one candidate per category.
    pub fn fit(
        x: &EncodedMatrix,
        y: &[bool],
        samples: Vec<usize>,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let mut nodes = vec![Node::Leaf {
            fraud_probability: 0.0,
            samples: 0,
        }];
        let mut pending = vec![(0usize, samples, 0usize)];
        let mut features: Vec<usize> = (0..x.layout.width()).collect();

        while let Some((slot, samples, depth)) = pending.pop() {
            let positives = samples.iter().filter(|&&i| y[i]).count();
            let leaf = Node::Leaf {
                fraud_probability: if samples.is_empty() {
                    0.0
                } else {
                    positives as f64 / samples.len() as f64
                },
                samples: samples.len(),
            };

            let pure = positives == 0 || positives == samples.len();
            let too_deep = params.max_depth.is_some_and(|max| depth >= max);
            if pure || too_deep || samples.len() < params.min_samples_split.max(2) {
                nodes[slot] = leaf;
                continue;
            }

            features.shuffle(rng);
            let Some(split) = best_split(x, y, &samples, &features, params) else {
                nodes[slot] = leaf;
                continue;
            };

            let (right_samples, left_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&i| split.rule.goes_right(x.row(i)));

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                fraud_probability: 0.0,
                samples: 0,
            });
            nodes.push(Node::Leaf {
                fraud_probability: 0.0,
                samples: 0,
            });
            nodes[slot] = Node::Split {
                rule: split.rule,
                left,
                right,
            };
            pending.push((right, right_samples, depth + 1));
            pending.push((left, left_samples, depth + 1));
        }

        Self { nodes }
    }

    /// Fraud probability of the leaf `row` falls into
    pub fn predict_proba(&self, row: EncodedRow<'_>) -> f64 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                Node::Split { rule, left, right } => {
                    index = if rule.goes_right(row) { *right } else { *left };
                }
                Node::Leaf {
                    fraud_probability, ..
                } => return *fraud_probability,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], index: usize) -> usize {
            match &nodes[index] {
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
                Node::Leaf { .. } => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

fn gini(positives: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = positives as f64 / total as f64;
    2.0 * p * (1.0 - p)
}

fn weighted_gini(left: (usize, usize), right: (usize, usize)) -> f64 {
    let total = left.1 + right.1;
    (left.1 as f64 * gini(left.0, left.1) + right.1 as f64 * gini(right.0, right.1)) / total as f64
}

/// Search features in the given order; once `max_features` have been
/// examined, stop at the first point where a valid split exists.
fn best_split(
    x: &EncodedMatrix,
    y: &[bool],
    samples: &[usize],
    features: &[usize],
    params: &TreeParams,
) -> Option<SplitCandidate> {
    let total = samples.len();
    let total_positives = samples.iter().filter(|&&i| y[i]).count();
    let min_leaf = params.min_samples_leaf.max(1);
    let mut best: Option<SplitCandidate> = None;
    let mut values: Vec<(f64, bool)> = Vec::with_capacity(total);

    let consider = |best: &mut Option<SplitCandidate>, rule: SplitRule, impurity: f64| {
        if best.as_ref().map_or(true, |b| impurity < b.impurity) {
            *best = Some(SplitCandidate { rule, impurity });
        }
    };

    for (examined, &feature) in features.iter().enumerate() {
        if examined >= params.max_features && best.is_some() {
            break;
        }

        match x.layout.resolve(feature) {
            Some(FeatureRef::Numeric(column)) => {
                values.clear();
                values.extend(samples.iter().map(|&i| (x.numeric[[i, column]], y[i])));
                values.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut left_positives = 0;
                for split_at in 1..total {
                    if values[split_at - 1].1 {
                        left_positives += 1;
                    }
                    let (lower, upper) = (values[split_at - 1].0, values[split_at].0);
                    if lower == upper || split_at < min_leaf || total - split_at < min_leaf {
                        continue;
                    }

                    let impurity = weighted_gini(
                        (left_positives, split_at),
                        (total_positives - left_positives, total - split_at),
                    );
                    let mid = lower + (upper - lower) / 2.0;
                    let threshold = if mid < upper { mid } else { lower };
                    consider(
                        &mut best,
                        SplitRule::Threshold {
                            feature: column,
                            threshold,
                        },
                        impurity,
                    );
                }
            }
            Some(FeatureRef::Category { column, category }) => {
                let (mut matched, mut matched_positives) = (0, 0);
                for &i in samples {
                    if x.categorical[[i, column]] == category {
                        matched += 1;
                        matched_positives += usize::from(y[i]);
                    }
                }
                if matched < min_leaf || total - matched < min_leaf {
                    continue;
                }

                let impurity = weighted_gini(
                    (total_positives - matched_positives, total - matched),
                    (matched_positives, matched),
                );
                consider(&mut best, SplitRule::Category { column, category }, impurity);
            }
            None => {}
        }
    }

    best
}
