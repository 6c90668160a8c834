//! Gene-anchored adjacency matrices of a heterogeneous network and its permutations.
//!
//! Parsing the network and building metaedge matrices is left to a
//! [`MetaedgeSource`] implementation; this module aligns the resulting matrices
//! to a weight matrix's genes.

use std::collections::HashMap;

use ndarray::Array2;
use tracing::{debug, info};

use crate::{
    error::{InterpretError, Result},
    utils::normalize_key,
};

/// Dense adjacency of one metaedge as produced by a network backend
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyMatrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

/// Anything that can turn a metaedge abbreviation (e.g. `GpBP`) into an adjacency matrix
pub trait MetaedgeSource {
    fn metaedge_to_adjacency(&self, metaedge: &str) -> Result<AdjacencyMatrix>;
}

/// Binary adjacency with one row per requested gene, in the requested order
#[derive(Debug, Clone, PartialEq)]
pub struct HetnetAdjacency {
    genes: Vec<String>,
    columns: Vec<String>,
    adjacency: Array2<u8>,
}

impl HetnetAdjacency {
    /// Reindexes the source rows onto `genes`
    ///
    /// Genes absent from the network get an all-zero row; any non-zero entry
    /// becomes 1.
    pub fn from_source<S: MetaedgeSource + ?Sized>(
        source: &S,
        metaedge: &str,
        genes: &[String],
    ) -> Result<Self> {
        let matrix = source.metaedge_to_adjacency(metaedge)?;
        if matrix.values.dim() != (matrix.rows.len(), matrix.columns.len()) {
            return Err(InterpretError::MalformedAdjacency {
                metaedge: metaedge.to_string(),
                reason: format!(
                    "shape {:?} does not match {} rows x {} columns",
                    matrix.values.dim(),
                    matrix.rows.len(),
                    matrix.columns.len()
                ),
            });
        }

        let mut row_index = HashMap::with_capacity(matrix.rows.len());
        for (i, row) in matrix.rows.iter().enumerate() {
            row_index.entry(normalize_key(row)).or_insert(i);
        }

        let genes = genes.iter().map(|g| normalize_key(g)).collect::<Vec<_>>();
        let lookup = genes
            .iter()
            .map(|gene| row_index.get(gene).copied())
            .collect::<Vec<_>>();
        let adjacency = Array2::from_shape_fn((genes.len(), matrix.columns.len()), |(i, j)| {
            lookup[i].map_or(0, |row| u8::from(matrix.values[[row, j]] != 0.0))
        });
        debug!(
            "Metaedge {}: {} of {} genes present in the network",
            metaedge,
            lookup.iter().filter(|row| row.is_some()).count(),
            genes.len()
        );

        Ok(Self {
            genes,
            columns: matrix.columns,
            adjacency,
        })
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn adjacency(&self) -> &Array2<u8> {
        &self.adjacency
    }

    /// Number of edges incident to each gene
    pub fn degrees(&self) -> Vec<usize> {
        self.adjacency
            .rows()
            .into_iter()
            .map(|row| row.iter().filter(|&&v| v == 1).count())
            .collect()
    }
}

/// A real network and its degree-preserving permutations, aligned to the same genes
#[derive(Debug, Clone, PartialEq)]
pub struct HetnetCollection {
    pub real: HetnetAdjacency,
    pub permuted: Vec<HetnetAdjacency>,
}

impl HetnetCollection {
    pub fn num_permuted(&self) -> usize {
        self.permuted.len()
    }
}

pub fn load_hetnets<R, P>(
    real: &R,
    permuted: &[P],
    genes: &[String],
    metaedge: &str,
) -> Result<HetnetCollection>
where
    R: MetaedgeSource + ?Sized,
    P: MetaedgeSource,
{
    let real = HetnetAdjacency::from_source(real, metaedge, genes)?;
    let permuted = permuted
        .iter()
        .map(|source| HetnetAdjacency::from_source(source, metaedge, genes))
        .collect::<Result<Vec<_>>>()?;
    info!(
        "Loaded metaedge {} from the real network and {} permutations",
        metaedge,
        permuted.len()
    );
    Ok(HetnetCollection { real, permuted })
}
