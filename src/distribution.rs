//! Views of a weight matrix used to pick the genes of a latent feature.

use std::{fmt, str::FromStr};

use derive_new::new;
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;

use crate::{
    error::{InterpretError, Result},
    matrix::WeightMatrix,
};

/// Default number of standard deviations defining a high-weight gene
pub const DEFAULT_STD_DEV: f64 = 2.5;

/// Tail of a feature's weight distribution that a test covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Both,
    Positive,
    Negative,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Both => "both",
            Direction::Positive => "positive",
            Direction::Negative => "negative",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strategy for deriving ranked gene lists from a latent feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Distribution {
    /// Raw weights, tested once
    Full,
    /// Squared weights, tested once
    FullSquared,
    /// Positive and negative weights, tested separately
    PosNeg,
    /// Genes beyond the standard deviation cutoff on either side, tested separately
    PosNegHighWeight,
}

impl Distribution {
    pub const ALL: [Distribution; 4] = [
        Distribution::Full,
        Distribution::FullSquared,
        Distribution::PosNeg,
        Distribution::PosNegHighWeight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Distribution::Full => "full",
            Distribution::FullSquared => "full_squared",
            Distribution::PosNeg => "pos_neg",
            Distribution::PosNegHighWeight => "pos_neg_high_weight",
        }
    }

    pub fn directions(&self) -> &'static [Direction] {
        match self {
            Distribution::Full | Distribution::FullSquared => &[Direction::Both],
            Distribution::PosNeg | Distribution::PosNegHighWeight => {
                &[Direction::Positive, Direction::Negative]
            }
        }
    }

    /// The matrix view backing one direction of this distribution
    pub fn selection(&self, direction: Direction) -> Option<Selection> {
        match (self, direction) {
            (Distribution::Full, Direction::Both) => Some(Selection::Full),
            (Distribution::FullSquared, Direction::Both) => Some(Selection::Squared),
            (Distribution::PosNeg, Direction::Positive) => Some(Selection::Positive),
            (Distribution::PosNeg, Direction::Negative) => Some(Selection::Negative),
            (Distribution::PosNegHighWeight, Direction::Positive) => Some(Selection::HighPositive),
            (Distribution::PosNegHighWeight, Direction::Negative) => Some(Selection::HighNegative),
            _ => None,
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Distribution {
    type Err = InterpretError;

    fn from_str(s: &str) -> Result<Self> {
        Distribution::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| InterpretError::InvalidDistribution(s.to_string()))
    }
}

/// Cell selection rule applied to the weight matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Full,
    Squared,
    Positive,
    Negative,
    HighPositive,
    HighNegative,
}

/// One non-missing cell of a view in long format
#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct LongRecord {
    pub gene: String,
    pub feature: String,
    pub value: f64,
}

/// All views of one weight matrix
///
/// High-weight flags are computed once on construction; the other views are
/// derived from the borrowed matrix on demand.
pub struct Distributions<'a> {
    matrix: &'a WeightMatrix,
    std_dev: f64,
    high_positive: Array2<bool>,
    high_negative: Array2<bool>,
}

impl<'a> Distributions<'a> {
    pub fn new(matrix: &'a WeightMatrix, std_dev: f64) -> Self {
        let weights = matrix.weights();
        let (high_positive, high_negative) = if matrix.num_genes() < 2 {
            (
                Array2::from_elem(weights.dim(), false),
                Array2::from_elem(weights.dim(), false),
            )
        } else {
            let mean = weights
                .mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(matrix.num_features()));
            let cutoff = weights.std_axis(Axis(0), 1.0) * std_dev;
            let upper = &mean + &cutoff;
            let lower = &mean - &cutoff;
            (
                Array2::from_shape_fn(weights.dim(), |(i, j)| weights[[i, j]] >= upper[j]),
                Array2::from_shape_fn(weights.dim(), |(i, j)| weights[[i, j]] <= lower[j]),
            )
        };
        Self {
            matrix,
            std_dev,
            high_positive,
            high_negative,
        }
    }

    pub fn matrix(&self) -> &WeightMatrix {
        self.matrix
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn full(&self) -> &Array2<f64> {
        self.matrix.weights()
    }

    pub fn squared(&self) -> Array2<f64> {
        self.matrix.weights().mapv(|w| w * w)
    }

    pub fn positive(&self) -> Array2<Option<f64>> {
        self.masked(Selection::Positive)
    }

    pub fn negative(&self) -> Array2<Option<f64>> {
        self.masked(Selection::Negative)
    }

    pub fn high_positive(&self) -> &Array2<bool> {
        &self.high_positive
    }

    pub fn high_negative(&self) -> &Array2<bool> {
        &self.high_negative
    }

    fn masked(&self, selection: Selection) -> Array2<Option<f64>> {
        Array2::from_shape_fn(self.matrix.weights().dim(), |(i, j)| {
            self.value(selection, i, j)
        })
    }

    /// Score of a cell under a selection rule, `None` when the cell is not selected
    fn value(&self, selection: Selection, row: usize, column: usize) -> Option<f64> {
        let weight = self.matrix.weights()[[row, column]];
        match selection {
            Selection::Full => Some(weight),
            Selection::Squared => Some(weight * weight),
            Selection::Positive => (weight > 0.0).then_some(weight),
            Selection::Negative => (weight < 0.0).then_some(weight),
            Selection::HighPositive => self.high_positive[[row, column]].then_some(weight),
            Selection::HighNegative => self.high_negative[[row, column]].then_some(weight),
        }
    }

    /// Selected (gene, score) pairs of one column in matrix row order
    pub fn ranked_scores(&self, selection: Selection, column: usize) -> Vec<(String, f64)> {
        self.matrix
            .genes()
            .iter()
            .enumerate()
            .filter_map(|(i, gene)| {
                self.value(selection, i, column)
                    .filter(|v| !v.is_nan())
                    .map(|v| (gene.clone(), v))
            })
            .collect()
    }

    /// Reshapes a view into (gene, feature, value) rows, skipping unselected cells
    pub fn long_format(&self, selection: Selection) -> Vec<LongRecord> {
        let genes = self.matrix.genes();
        let features = self.matrix.features();
        (0..features.len())
            .flat_map(|j| {
                (0..genes.len()).filter_map(move |i| {
                    self.value(selection, i, j)
                        .map(|v| LongRecord::new(genes[i].clone(), features[j].clone(), v))
                })
            })
            .collect()
    }
}
