use adjustp::{adjust, Procedure};
use bon::Builder;

use crate::{distribution::Distribution, genes::Namespace};

/// How ranked scores are turned into running-sum step weights
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeightConfig {
    /// Every hit contributes equally (Kolmogorov-Smirnov statistic)
    Classic,
    /// Hits are weighted by the absolute score
    Weighted,
    /// Hits are weighted by the absolute score raised to `exponent`
    Power { exponent: f64 },
}

impl WeightConfig {
    pub fn build_weights(&self, scores: &[f64]) -> Vec<f64> {
        match self {
            WeightConfig::Classic => vec![1.0; scores.len()],
            WeightConfig::Weighted => scores.iter().map(|s| s.abs()).collect(),
            WeightConfig::Power { exponent } => {
                scores.iter().map(|s| s.abs().powf(*exponent)).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformConfig {
    Identity,
    Fdr,
    Bonferroni,
}
impl TransformConfig {
    pub fn transform(&self, pvalues: &[f64]) -> Vec<f64> {
        if pvalues.is_empty() {
            return Vec::new();
        }
        match self {
            TransformConfig::Identity => pvalues.to_vec(),
            TransformConfig::Fdr => adjust(pvalues, Procedure::BenjaminiHochberg),
            TransformConfig::Bonferroni => adjust(pvalues, Procedure::Bonferroni),
        }
    }
}

/// Parameters of a single prerank enrichment call
#[derive(Debug, Clone, Builder)]
pub struct GseaConfig {
    /// Number of null statistics drawn per gene set
    #[builder(default = 15)]
    pub permutations: usize,
    /// Seed of the permutation generator
    #[builder(default)]
    pub seed: u64,
    #[builder(default = WeightConfig::Weighted)]
    pub weight: WeightConfig,
    /// Smallest number of ranked genes a set must hit to be tested
    #[builder(default = 1)]
    pub min_size: usize,
    /// Largest number of ranked genes a set may hit to be tested
    pub max_size: Option<usize>,
    /// Multiple testing correction applied across the sets of one call
    #[builder(default = TransformConfig::Fdr)]
    pub transform: TransformConfig,
}

impl Default for GseaConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Parameters of a full interpretation run over a directory of weight matrices
#[derive(Debug, Clone, Builder)]
pub struct PipelineConfig {
    /// Dataset label, stored upper-cased
    #[builder(into)]
    pub dataset: String,
    /// Bottleneck dimensionality of every model in the run
    pub z_dim: usize,
    /// Column tokens selecting each compression algorithm
    pub algorithms: Vec<String>,
    #[builder(default = Distribution::ALL.to_vec())]
    pub distributions: Vec<Distribution>,
    /// Standard deviation multiplier for high-weight genes
    #[builder(default = 2.5)]
    pub std_dev: f64,
    /// Whether the input data were shuffled before compression
    #[builder(default)]
    pub shuffled: bool,
    #[builder(default)]
    pub gsea: GseaConfig,
    /// Namespaces to translate weight matrix row keys between, if any
    pub translation: Option<(Namespace, Namespace)>,
}

impl PipelineConfig {
    pub fn dataset_label(&self) -> String {
        self.dataset.to_uppercase()
    }
}
