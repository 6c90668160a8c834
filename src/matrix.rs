//! Gene by latent feature weight matrices.

use std::{
    collections::HashSet,
    fs::{self, File},
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use itertools::Itertools;
use ndarray::{Array2, ArrayView1, Axis};
use tracing::{debug, info, warn};

use crate::{
    error::{InterpretError, Result},
    genes::{Namespace, Translator},
    utils::{index_mask, normalize_key, seed_from_file_name},
};

const WEIGHT_FILE_TOKEN: &str = "_weight_matrix";

/// Cells read as a missing weight
const MISSING_VALUES: [&str; 2] = ["", "NA"];

/// Opens a plain or gzip-compressed (`.gz`) file
fn open_table(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(path).map(BufReader::new)?;
    let gzipped = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));
    Ok(if gzipped {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    })
}

/// Parses one weight cell; empty and `NA` cells are NaN
fn parse_weight(field: &str) -> Option<f64> {
    let field = field.trim();
    if MISSING_VALUES.contains(&field) {
        return Some(f64::NAN);
    }
    field.parse::<f64>().ok()
}

/// Per-gene weights of every latent feature of one or more compression models
///
/// Rows are genes, columns are latent features. Row keys are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    genes: Vec<String>,
    features: Vec<String>,
    weights: Array2<f64>,
}

impl WeightMatrix {
    /// Builds a matrix, keeping the first row of every duplicated gene
    pub fn new(genes: Vec<String>, features: Vec<String>, weights: Array2<f64>) -> Result<Self> {
        if weights.dim() != (genes.len(), features.len()) {
            return Err(InterpretError::malformed(
                PathBuf::new(),
                format!(
                    "shape {:?} does not match {} genes x {} features",
                    weights.dim(),
                    genes.len(),
                    features.len()
                ),
            ));
        }
        let genes = genes.iter().map(|g| normalize_key(g)).collect::<Vec<_>>();
        let mut seen = HashSet::new();
        let keep = (0..genes.len())
            .filter(|&i| seen.insert(genes[i].clone()))
            .collect::<Vec<_>>();
        if keep.len() < genes.len() {
            warn!("Dropping {} duplicated gene rows", genes.len() - keep.len());
        }
        let weights = weights.select(Axis(0), &keep);
        let genes = keep.into_iter().map(|i| genes[i].clone()).collect();
        Ok(Self {
            genes,
            features,
            weights,
        })
    }

    /// Reads a tab separated matrix: header of feature names, first column of gene ids
    ///
    /// Files ending in `.gz` are decompressed. Empty and `NA` cells are read as
    /// NaN. With an `algorithm` token only the columns whose name contains it
    /// (ignoring case) are kept.
    pub fn load<P: AsRef<Path>>(path: P, algorithm: Option<&str>) -> Result<Self> {
        let path = path.as_ref();
        let reader =
            open_table(path).map_err(|e| InterpretError::malformed(path, e.to_string()))?;
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| InterpretError::malformed(path, e.to_string()))?
            .clone();
        if headers.len() < 2 {
            return Err(InterpretError::malformed(
                path,
                "expected a gene identifier column followed by feature columns",
            ));
        }
        let features = headers.iter().skip(1).map(str::to_string).collect::<Vec<_>>();

        let mut genes = Vec::new();
        let mut values = Vec::new();
        for (line, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| InterpretError::malformed(path, e.to_string()))?;
            let key = record.get(0).map(normalize_key).unwrap_or_default();
            if key.is_empty() {
                return Err(InterpretError::malformed(
                    path,
                    format!("missing gene identifier on data row {}", line + 1),
                ));
            }
            for (field, feature) in record.iter().skip(1).zip(&features) {
                let value = parse_weight(field).ok_or_else(|| {
                    InterpretError::malformed(
                        path,
                        format!(
                            "non-numeric weight '{}' for gene {} feature {}",
                            field, key, feature
                        ),
                    )
                })?;
                values.push(value);
            }
            genes.push(key);
        }
        if genes.is_empty() {
            return Err(InterpretError::malformed(path, "no gene rows"));
        }

        let weights = Array2::from_shape_vec((genes.len(), features.len()), values)
            .map_err(|e| InterpretError::malformed(path, e.to_string()))?;
        let matrix = Self::new(genes, features, weights).map_err(|e| match e {
            InterpretError::MalformedMatrix { reason, .. } => {
                InterpretError::malformed(path, reason)
            }
            other => other,
        })?;
        info!(
            "Loaded weight matrix {:?}: {} genes x {} features",
            path,
            matrix.num_genes(),
            matrix.num_features()
        );

        Ok(match algorithm {
            Some(token) => matrix.select_algorithm(token),
            None => matrix,
        })
    }

    /// Column indices belonging to one compression algorithm
    pub fn algorithm_columns(&self, algorithm: &str) -> Vec<usize> {
        index_mask(algorithm, &self.features)
    }

    /// A copy restricted to the columns of one compression algorithm
    pub fn select_algorithm(&self, algorithm: &str) -> Self {
        let columns = self.algorithm_columns(algorithm);
        debug!("Algorithm '{}' selects {} columns", algorithm, columns.len());
        Self {
            genes: self.genes.clone(),
            features: columns.iter().map(|&j| self.features[j].clone()).collect(),
            weights: self.weights.select(Axis(1), &columns),
        }
    }

    /// Re-keys rows into another identifier namespace
    ///
    /// Rows that do not translate are dropped, as are rows whose translation
    /// collides with an earlier row.
    pub fn translate_genes(
        &self,
        translator: &Translator,
        from: Namespace,
        to: Namespace,
    ) -> Result<Self> {
        let translated = translator.translate(&self.genes, from, to)?;
        let (rows, genes): (Vec<usize>, Vec<String>) = translated
            .into_iter()
            .enumerate()
            .filter_map(|(i, gene)| gene.map(|g| (i, g)))
            .unique_by(|(_, g)| g.clone())
            .unzip();
        if rows.len() < self.genes.len() {
            warn!(
                "{} of {} genes dropped translating {} to {}",
                self.genes.len() - rows.len(),
                self.genes.len(),
                from,
                to
            );
        }
        Ok(Self {
            genes,
            features: self.features.clone(),
            weights: self.weights.select(Axis(0), &rows),
        })
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn column(&self, index: usize) -> ArrayView1<'_, f64> {
        self.weights.column(index)
    }

    pub fn num_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }
}

/// Lists the weight matrix files of a directory, ordered by seed
///
/// Files whose name carries no seed come last, ordered by name; loading them
/// reports `MalformedFileName`.
pub fn discover_weight_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let mut paths = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(WEIGHT_FILE_TOKEN))
        })
        .collect::<Vec<_>>();
    paths.sort_by_cached_key(|path| {
        let seed = seed_from_file_name(path).ok();
        (seed.is_none(), seed, path.clone())
    });
    info!("Found {} weight matrices in {:?}", paths.len(), dir.as_ref());
    Ok(paths)
}
