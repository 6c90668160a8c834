//! latent-interpret: biological interpretation of latent gene-expression features
//!
//! This library attributes the latent features of compression models (PCA, ICA,
//! NMF, autoencoders) to curated pathways. Per-gene weight matrices are split
//! into full, squared, positive / negative and high-weight views, each view of
//! each feature is tested against gene set collections, and every result keeps
//! the provenance of the model and view that produced it.
//!
//! The main components of this library are:
//! - `GeneDictionary` / `Translator`: symbol and Entrez id translation
//! - `WeightMatrix`: gene by latent feature weight matrices
//! - `Distributions`: views of a weight matrix used to rank genes
//! - `GeneSetCollection`: GMT gene set collections
//! - `Gsea`: permutation based prerank enrichment
//! - `run_overrepresentation`: Fisher exact overrepresentation
//! - `Pipeline`: enrichment over every seed, algorithm, dimension and view
//! - `HetnetAdjacency`: gene-aligned adjacency of real and permuted networks

mod config;
mod distribution;
mod error;
mod gene_sets;
mod genes;
mod gsea;
mod hetnet;
mod math;
mod matrix;
mod ora;
mod pipeline;
mod results;
mod utils;

pub use config::{GseaConfig, PipelineConfig, TransformConfig, WeightConfig};
pub use distribution::{
    Direction, Distribution, Distributions, LongRecord, Selection, DEFAULT_STD_DEV,
};
pub use error::{InterpretError, Result};
pub use gene_sets::{load_sources, GeneSet, GeneSetCollection, GeneSetSource};
pub use genes::{GeneDictionary, GeneRecord, Namespace, Translator, UpdaterRecord};
pub use gsea::{Gsea, RankedList};
pub use hetnet::{load_hetnets, AdjacencyMatrix, HetnetAdjacency, HetnetCollection, MetaedgeSource};
pub use math::{enrichment_score, nominal_pvalue, normalized_enrichment_score};
pub use matrix::{discover_weight_files, WeightMatrix};
pub use ora::{contingency_table, fisher_exact, run_overrepresentation};
pub use pipeline::{
    write_manifest, Combinations, ManifestEntry, Pipeline, PipelineOutput, Unit, UnitStatus,
};
pub use results::{
    to_path_or_stdout, write_records, write_serialized, EnrichmentRecord, EnrichmentResult,
    OverrepresentationResult, Provenance,
};
pub use utils::seed_from_file_name;
