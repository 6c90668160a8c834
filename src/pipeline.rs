//! Drives enrichment over every seed, algorithm, dimension, distribution and
//! direction of a set of weight matrices.

use std::{fmt, io::Write, path::Path};

use derive_new::new;
use itertools::iproduct;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    config::PipelineConfig,
    distribution::{Direction, Distribution, Distributions},
    error::{InterpretError, Result},
    gene_sets::GeneSetCollection,
    genes::Translator,
    gsea::{Gsea, RankedList},
    matrix::{discover_weight_files, WeightMatrix},
    results::{tsv_writer, EnrichmentRecord, Provenance},
    utils::seed_from_file_name,
};

const MANIFEST_HEADER: [&str; 7] = [
    "seed",
    "algorithm",
    "current_z",
    "distribution",
    "direction",
    "status",
    "reason",
];

/// One enrichment call of a weight matrix
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Unit {
    pub algorithm: String,
    pub current_z: usize,
    pub distribution: Distribution,
    pub direction: Direction,
}

/// Lazy enumeration of units, in algorithm, dimension, distribution, direction order
pub struct Combinations<'a> {
    inner: Box<dyn Iterator<Item = Unit> + 'a>,
}

impl<'a> Combinations<'a> {
    pub fn new(algorithms: &'a [String], z_dim: usize, distributions: &'a [Distribution]) -> Self {
        let inner = iproduct!(algorithms, 0..z_dim, distributions).flat_map(
            |(algorithm, current_z, distribution)| {
                distribution.directions().iter().map(move |&direction| {
                    Unit::new(algorithm.clone(), current_z, *distribution, direction)
                })
            },
        );
        Self {
            inner: Box::new(inner),
        }
    }
}

impl Iterator for Combinations<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitStatus {
    /// Nothing to test, e.g. no gene passed the selection rule
    Skipped,
    Failed,
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Skipped => write!(f, "skipped"),
            UnitStatus::Failed => write!(f, "failed"),
        }
    }
}

/// A unit, or a whole weight file when `unit` is `None`, that produced no results
#[derive(Debug, Clone, PartialEq, new)]
pub struct ManifestEntry {
    pub seed: Option<u64>,
    pub unit: Option<Unit>,
    pub status: UnitStatus,
    pub reason: String,
}

impl ManifestEntry {
    fn from_error(seed: Option<u64>, unit: Option<Unit>, error: &InterpretError) -> Self {
        let status = match error {
            InterpretError::EmptyCandidateList => UnitStatus::Skipped,
            _ => UnitStatus::Failed,
        };
        Self::new(seed, unit, status, error.to_string())
    }

    fn fields(&self) -> [String; 7] {
        let seed = self.seed.map(|s| s.to_string()).unwrap_or_default();
        let (algorithm, current_z, distribution, direction) = match &self.unit {
            Some(unit) => (
                unit.algorithm.clone(),
                unit.current_z.to_string(),
                unit.distribution.to_string(),
                unit.direction.to_string(),
            ),
            None => Default::default(),
        };
        [
            seed,
            algorithm,
            current_z,
            distribution,
            direction,
            self.status.to_string(),
            self.reason.clone(),
        ]
    }
}

/// Records of every completed unit in canonical order, plus what was skipped or failed
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub records: Vec<EnrichmentRecord>,
    pub manifest: Vec<ManifestEntry>,
}

impl PipelineOutput {
    fn extend(&mut self, other: PipelineOutput) {
        self.records.extend(other.records);
        self.manifest.extend(other.manifest);
    }

    fn sort(&mut self) {
        self.records.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
    }
}

pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    gene_sets: &'a GeneSetCollection,
    translator: Option<&'a Translator>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        gene_sets: &'a GeneSetCollection,
        translator: Option<&'a Translator>,
    ) -> Self {
        Self {
            config,
            gene_sets,
            translator,
        }
    }

    /// Runs every weight matrix file found in `dir`
    pub fn run_dir<P: AsRef<Path>>(&self, dir: P) -> Result<PipelineOutput> {
        let files = discover_weight_files(dir)?;
        Ok(self.run(&files))
    }

    /// Runs a list of weight matrix files
    ///
    /// A file that cannot be loaded is recorded in the manifest and the
    /// remaining files continue.
    pub fn run<P: AsRef<Path>>(&self, weight_files: &[P]) -> PipelineOutput {
        info!(
            "Interpreting {} weight matrices of {} (z = {})",
            weight_files.len(),
            self.config.dataset_label(),
            self.config.z_dim
        );
        let mut output = PipelineOutput::default();
        for path in weight_files {
            let path = path.as_ref();
            match self.prepare(path) {
                Ok((seed, matrix)) => output.extend(self.run_matrix(seed, &matrix)),
                Err((seed, error)) => {
                    warn!("Skipping weight file {:?}: {}", path, error);
                    output
                        .manifest
                        .push(ManifestEntry::from_error(seed, None, &error));
                }
            }
        }
        output.sort();
        info!(
            "Produced {} enrichment records; {} manifest entries",
            output.records.len(),
            output.manifest.len()
        );
        output
    }

    /// Parses the seed, loads and optionally translates one weight file
    fn prepare(
        &self,
        path: &Path,
    ) -> std::result::Result<(u64, WeightMatrix), (Option<u64>, InterpretError)> {
        let seed = seed_from_file_name(path).map_err(|e| (None, e))?;
        let matrix = WeightMatrix::load(path, None).map_err(|e| (Some(seed), e))?;
        let matrix = match self.config.translation {
            Some((from, to)) => {
                let translator = self.translator.ok_or_else(|| {
                    (
                        Some(seed),
                        InterpretError::DictionaryUnavailable(
                            "translation requested without a gene dictionary".to_string(),
                        ),
                    )
                })?;
                matrix
                    .translate_genes(translator, from, to)
                    .map_err(|e| (Some(seed), e))?
            }
            None => matrix,
        };
        Ok((seed, matrix))
    }

    /// Runs every unit of one loaded weight matrix in parallel
    pub fn run_matrix(&self, seed: u64, matrix: &WeightMatrix) -> PipelineOutput {
        info!(
            "Seed {}: {} genes x {} features",
            seed,
            matrix.num_genes(),
            matrix.num_features()
        );
        let distributions = Distributions::new(matrix, self.config.std_dev);
        let units = Combinations::new(
            &self.config.algorithms,
            self.config.z_dim,
            &self.config.distributions,
        )
        .collect::<Vec<_>>();

        let outcomes = units
            .par_iter()
            .map(|unit| self.run_unit(&distributions, seed, unit))
            .collect::<Vec<_>>();

        let mut output = PipelineOutput::default();
        for (unit, outcome) in units.into_iter().zip(outcomes) {
            match outcome {
                Ok(records) => output.records.extend(records),
                Err(error) => {
                    let entry = ManifestEntry::from_error(Some(seed), Some(unit), &error);
                    match entry.status {
                        UnitStatus::Skipped => debug!("Skipped {:?}: {}", entry.unit, error),
                        UnitStatus::Failed => warn!("Failed {:?}: {}", entry.unit, error),
                    }
                    output.manifest.push(entry);
                }
            }
        }
        output.sort();
        output
    }

    fn run_unit(
        &self,
        distributions: &Distributions,
        seed: u64,
        unit: &Unit,
    ) -> Result<Vec<EnrichmentRecord>> {
        let columns = distributions.matrix().algorithm_columns(&unit.algorithm);
        let column = *columns
            .get(unit.current_z)
            .ok_or_else(|| InterpretError::FeatureOutOfRange {
                algorithm: unit.algorithm.clone(),
                index: unit.current_z,
                available: columns.len(),
            })?;
        let selection = unit.distribution.selection(unit.direction).ok_or_else(|| {
            InterpretError::UnsupportedDirection {
                distribution: unit.distribution.to_string(),
                direction: unit.direction.to_string(),
            }
        })?;

        let ranked = RankedList::new(distributions.ranked_scores(selection, column));
        if ranked.is_empty() {
            return Err(InterpretError::EmptyCandidateList);
        }
        debug!(
            "Seed {} {} z{} {} {}: {} ranked genes",
            seed,
            unit.algorithm,
            unit.current_z,
            unit.distribution,
            unit.direction,
            ranked.len()
        );

        let provenance = Provenance::builder()
            .algorithm(unit.algorithm.as_str())
            .current_z(unit.current_z)
            .full_z(self.config.z_dim)
            .distribution(unit.distribution)
            .direction(unit.direction)
            .shuffled(self.config.shuffled)
            .seed(seed)
            .build();
        Ok(Gsea::new(&ranked, &self.config.gsea)
            .run(self.gene_sets)
            .into_iter()
            .map(|result| EnrichmentRecord::new(result, provenance.clone()))
            .collect())
    }
}

pub fn write_manifest<W: Write>(writer: W, manifest: &[ManifestEntry]) -> Result<()> {
    let mut writer = tsv_writer(writer);
    writer.write_record(MANIFEST_HEADER)?;
    for entry in manifest {
        writer.write_record(entry.fields())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene_sets::GeneSet;
    use ndarray::{array, Array2};

    fn config(distributions: Vec<Distribution>, z_dim: usize) -> PipelineConfig {
        PipelineConfig::builder()
            .dataset("tcga")
            .z_dim(z_dim)
            .algorithms(vec!["pca".to_string()])
            .distributions(distributions)
            .build()
    }

    fn gene_sets(genes: &[&str]) -> GeneSetCollection {
        GeneSetCollection::from_sets(vec![GeneSet::new(
            "SET".to_string(),
            String::new(),
            genes.iter().map(|g| g.to_string()).collect(),
        )])
    }

    #[test]
    fn test_combinations_order() {
        let algorithms = vec!["pca".to_string(), "ica".to_string()];
        let distributions = vec![Distribution::Full, Distribution::PosNeg];
        let units = Combinations::new(&algorithms, 2, &distributions).collect::<Vec<_>>();
        assert_eq!(units.len(), 2 * 2 * 3);
        assert_eq!(
            units[0],
            Unit::new("pca".to_string(), 0, Distribution::Full, Direction::Both)
        );
        assert_eq!(
            units[1],
            Unit::new("pca".to_string(), 0, Distribution::PosNeg, Direction::Positive)
        );
        assert_eq!(
            units[2],
            Unit::new("pca".to_string(), 0, Distribution::PosNeg, Direction::Negative)
        );
        assert_eq!(units[3].current_z, 1);
        assert_eq!(units[6].algorithm, "ica");
    }

    #[test]
    fn test_combinations_empty_dimension() {
        let algorithms = vec!["pca".to_string()];
        assert_eq!(Combinations::new(&algorithms, 0, &Distribution::ALL).count(), 0);
    }

    #[test]
    fn test_run_matrix_records_provenance() {
        let matrix = WeightMatrix::new(
            vec!["A".to_string(), "B".to_string()],
            vec!["pca_0".to_string(), "pca_1".to_string()],
            array![[1.0, -1.0], [0.5, 2.0]],
        )
        .unwrap();
        let config = config(vec![Distribution::PosNeg], 2);
        let sets = gene_sets(&["A"]);
        let output = Pipeline::new(&config, &sets, None).run_matrix(11, &matrix);

        // A is positive in pca_0 and negative in pca_1
        let units = output
            .records
            .iter()
            .map(|r| (r.provenance.current_z, r.provenance.direction))
            .collect::<Vec<_>>();
        assert_eq!(
            units,
            vec![(0, Direction::Positive), (1, Direction::Negative)]
        );
        let first = &output.records[0].provenance;
        assert_eq!(first.seed, 11);
        assert_eq!(first.full_z, 2);
        assert_eq!(first.algorithm, "pca");
        assert!(!first.shuffled);

        // pca_0 has no negative genes; in pca_1 the positive side misses A and yields no rows
        assert_eq!(output.manifest.len(), 1);
        let skipped = &output.manifest[0];
        assert_eq!(skipped.status, UnitStatus::Skipped);
        assert_eq!(
            skipped.unit,
            Some(Unit::new(
                "pca".to_string(),
                0,
                Distribution::PosNeg,
                Direction::Negative
            ))
        );
    }

    #[test]
    fn test_high_weight_gene_yields_record() {
        let mut weights = vec![0.0; 20];
        weights[0] = 10.0;
        weights[1] = -10.0;
        let genes = (0..20).map(|i| format!("g{}", i)).collect();
        let matrix = WeightMatrix::new(
            genes,
            vec!["pca_0".to_string()],
            Array2::from_shape_vec((20, 1), weights).unwrap(),
        )
        .unwrap();
        let config = config(vec![Distribution::PosNegHighWeight], 1);
        let sets = gene_sets(&["g0"]);
        let output = Pipeline::new(&config, &sets, None).run_matrix(2, &matrix);

        // the negative side ranks only g1, which misses the set
        assert!(output.manifest.is_empty());
        assert_eq!(output.records.len(), 1);
        let record = &output.records[0];
        assert_eq!(record.provenance.distribution, Distribution::PosNegHighWeight);
        assert_eq!(record.provenance.direction, Direction::Positive);
        assert_eq!(record.result.overlap, 1);
    }

    #[test]
    fn test_mismatched_direction_fails() {
        let matrix = WeightMatrix::new(
            vec!["A".to_string(), "B".to_string()],
            vec!["pca_0".to_string()],
            array![[1.0], [0.5]],
        )
        .unwrap();
        let config = config(vec![Distribution::Full], 1);
        let sets = gene_sets(&["A"]);
        let pipeline = Pipeline::new(&config, &sets, None);
        let distributions = Distributions::new(&matrix, config.std_dev);
        let unit = Unit::new("pca".to_string(), 0, Distribution::Full, Direction::Positive);
        let error = pipeline.run_unit(&distributions, 1, &unit).unwrap_err();
        assert!(matches!(error, InterpretError::UnsupportedDirection { .. }));
        assert_eq!(
            ManifestEntry::from_error(Some(1), Some(unit), &error).status,
            UnitStatus::Failed
        );
    }

    #[test]
    fn test_feature_out_of_range_fails_unit_only() {
        let matrix = WeightMatrix::new(
            vec!["A".to_string(), "B".to_string()],
            vec!["pca_0".to_string()],
            array![[1.0], [0.5]],
        )
        .unwrap();
        let config = config(vec![Distribution::Full], 2);
        let sets = gene_sets(&["A"]);
        let output = Pipeline::new(&config, &sets, None).run_matrix(1, &matrix);
        assert_eq!(output.records.len(), 1);
        assert_eq!(output.manifest.len(), 1);
        assert_eq!(output.manifest[0].status, UnitStatus::Failed);
        assert_eq!(output.manifest[0].unit.as_ref().map(|u| u.current_z), Some(1));
    }

    #[test]
    fn test_write_manifest() {
        let entries = vec![
            ManifestEntry::new(
                Some(3),
                Some(Unit::new(
                    "pca".to_string(),
                    1,
                    Distribution::PosNegHighWeight,
                    Direction::Positive,
                )),
                UnitStatus::Skipped,
                "Candidate gene list is empty".to_string(),
            ),
            ManifestEntry::new(None, None, UnitStatus::Failed, "bad file".to_string()),
        ];
        let mut buffer = Vec::new();
        write_manifest(&mut buffer, &entries).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "seed\talgorithm\tcurrent_z\tdistribution\tdirection\tstatus\treason\n\
             3\tpca\t1\tpos_neg_high_weight\tpositive\tskipped\tCandidate gene list is empty\n\
             \t\t\t\t\tfailed\tbad file\n"
        );
    }
}
