//! Error types for latent feature interpretation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, InterpretError>;

#[derive(Error, Debug)]
pub enum InterpretError {
    #[error("Invalid gene identifier namespace '{0}': expected 'entrez_gene_id' or 'symbol'")]
    InvalidNamespace(String),

    #[error("Invalid distribution '{0}': expected one of full, full_squared, pos_neg, pos_neg_high_weight")]
    InvalidDistribution(String),

    #[error("Malformed weight matrix {path:?}: {reason}")]
    MalformedMatrix { path: PathBuf, reason: String },

    #[error("Cannot extract a seed from weight file name {0:?}")]
    MalformedFileName(PathBuf),

    #[error("Candidate gene list is empty")]
    EmptyCandidateList,

    #[error("Feature index {index} out of range: algorithm '{algorithm}' has {available} features")]
    FeatureOutOfRange {
        algorithm: String,
        index: usize,
        available: usize,
    },

    #[error("Distribution {distribution} has no {direction} direction")]
    UnsupportedDirection {
        distribution: String,
        direction: String,
    },

    #[error("Gene set '{gene_set}' yields a negative contingency cell: {table:?}")]
    InvalidContingency {
        gene_set: String,
        table: [[i64; 2]; 2],
    },

    #[error("Unknown gene set collection '{name}' (looked for {path:?})")]
    UnknownGeneSetCollection { name: String, path: PathBuf },

    #[error("Malformed adjacency matrix for metaedge '{metaedge}': {reason}")]
    MalformedAdjacency { metaedge: String, reason: String },

    #[error("Gene dictionary unavailable: {0}")]
    DictionaryUnavailable(String),

    #[error("Statistics error: {0}")]
    Statistics(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl InterpretError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        InterpretError::MalformedMatrix {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
