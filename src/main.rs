use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use latent_interpret::{
    load_sources, run_overrepresentation, to_path_or_stdout, write_manifest, write_records,
    write_serialized, Distribution, GeneDictionary, GeneSetCollection, GeneSetSource, GseaConfig,
    Namespace, Pipeline, PipelineConfig, Translator,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(version, about = "Interpret latent gene-expression features with gene set enrichment")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prerank enrichment of every latent feature of a directory of weight matrices
    Gsea(GseaArgs),
    /// Fisher exact overrepresentation of gene sets in a candidate list
    Ora(OraArgs),
}

#[derive(Args, Debug)]
struct GeneSetArgs {
    /// GMT files or collection names resolved in the library directory
    #[clap(short, long = "gene-sets", required = true, num_args = 1..)]
    gene_sets: Vec<String>,

    /// Directory holding `<name>.gmt` files for named collections
    #[clap(long, default_value = ".")]
    library_dir: PathBuf,
}

impl GeneSetArgs {
    fn load(&self) -> Result<GeneSetCollection> {
        let sources = self
            .gene_sets
            .iter()
            .map(|s| GeneSetSource::from(s.as_str()))
            .collect::<Vec<_>>();
        load_sources(&sources, &self.library_dir).context("Failed to load gene sets")
    }
}

#[derive(Args, Debug)]
struct GseaArgs {
    /// Directory of `<prefix>_<seed>_weight_matrix` files
    #[clap(short, long)]
    weights_dir: PathBuf,

    /// Bottleneck dimensionality of the models
    #[clap(short, long)]
    z_dim: usize,

    /// Dataset name recorded in the logs
    #[clap(short, long)]
    dataset: String,

    /// Column tokens of the compression algorithms to interpret
    #[clap(short, long = "algorithm", required = true, num_args = 1..)]
    algorithms: Vec<String>,

    /// Views of each feature to test [default: all]
    #[clap(long = "distribution", num_args = 1..)]
    distributions: Vec<Distribution>,

    #[clap(flatten)]
    gene_sets: GeneSetArgs,

    #[clap(short, long, default_value_t = 15)]
    permutations: usize,

    #[clap(long, default_value_t = 0)]
    permutation_seed: u64,

    /// Standard deviations from the mean defining a high-weight gene
    #[clap(long, default_value_t = 2.5)]
    std_dev: f64,

    /// Smallest overlap of a gene set with a ranked list to be tested
    #[clap(long, default_value_t = 1)]
    min_size: usize,

    /// Largest overlap of a gene set with a ranked list to be tested
    #[clap(long)]
    max_size: Option<usize>,

    /// The models were trained on shuffled data
    #[clap(long)]
    shuffled: bool,

    /// Translate weight matrix rows with the gene dictionary
    #[clap(long, requires = "gene_dictionary")]
    translate: bool,

    #[clap(long, default_value = "entrez_gene_id")]
    from_namespace: Namespace,

    #[clap(long, default_value = "symbol")]
    to_namespace: Namespace,

    /// Gene table with entrez_gene_id, symbol, gene_type and synonyms columns
    #[clap(long)]
    gene_dictionary: Option<PathBuf>,

    /// Table mapping deprecated entrez ids to current ones
    #[clap(long)]
    gene_updater: Option<PathBuf>,

    /// Enrichment results [default: stdout]
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Skipped and failed units
    #[clap(short, long)]
    manifest: Option<PathBuf>,

    /// Worker threads; 0 uses every available core
    #[clap(short, long, default_value_t = 0)]
    threads: usize,
}

#[derive(Args, Debug)]
struct OraArgs {
    /// Candidate genes, one per line
    #[clap(short, long)]
    candidates: PathBuf,

    /// Background genes, one per line
    #[clap(short, long)]
    background: PathBuf,

    #[clap(flatten)]
    gene_sets: GeneSetArgs,

    /// Overrepresentation results [default: stdout]
    #[clap(short, long)]
    output: Option<PathBuf>,
}

/// Reads the first tab separated field of every non-empty line
fn read_gene_list(path: &Path) -> Result<Vec<String>> {
    let reader = File::open(path)
        .map(BufReader::new)
        .with_context(|| format!("Failed to open gene list {:?}", path))?;
    let mut genes = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(gene) = line.split('\t').next().map(str::trim) {
            if !gene.is_empty() {
                genes.push(gene.to_string());
            }
        }
    }
    Ok(genes)
}

fn run_gsea(args: GseaArgs) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()
        .context("Failed to build the thread pool")?;

    let gene_sets = args.gene_sets.load()?;
    if gene_sets.is_empty() {
        bail!("No gene sets loaded from {:?}", args.gene_sets.gene_sets);
    }

    let translator = match (&args.gene_dictionary, args.translate) {
        (Some(genes), true) => {
            let genes = genes.clone();
            let updater = args.gene_updater.clone();
            Some(Translator::with_loader(move || {
                GeneDictionary::load(genes.clone(), updater.clone())
            }))
        }
        _ => None,
    };

    let gsea = GseaConfig::builder()
        .permutations(args.permutations)
        .seed(args.permutation_seed)
        .min_size(args.min_size)
        .maybe_max_size(args.max_size)
        .build();
    let distributions = if args.distributions.is_empty() {
        Distribution::ALL.to_vec()
    } else {
        args.distributions
    };
    let config = PipelineConfig::builder()
        .dataset(args.dataset)
        .z_dim(args.z_dim)
        .algorithms(args.algorithms)
        .distributions(distributions)
        .std_dev(args.std_dev)
        .shuffled(args.shuffled)
        .gsea(gsea)
        .maybe_translation(args.translate.then_some((args.from_namespace, args.to_namespace)))
        .build();

    let output = Pipeline::new(&config, &gene_sets, translator.as_ref())
        .run_dir(&args.weights_dir)
        .with_context(|| format!("Failed to read weight directory {:?}", args.weights_dir))?;

    to_path_or_stdout(args.output.as_deref(), |sink| write_records(sink, &output.records))
        .context("Failed to write enrichment results")?;
    if let Some(path) = args.manifest.as_deref() {
        to_path_or_stdout(Some(path), |sink| write_manifest(sink, &output.manifest))
            .context("Failed to write manifest")?;
    }
    info!(
        "Wrote {} records; {} units skipped or failed",
        output.records.len(),
        output.manifest.len()
    );
    Ok(())
}

fn run_ora(args: OraArgs) -> Result<()> {
    let gene_sets = args.gene_sets.load()?;
    let candidates = read_gene_list(&args.candidates)?;
    let background = read_gene_list(&args.background)?;
    let results = run_overrepresentation(&candidates, &gene_sets, &background)
        .context("Overrepresentation test failed")?;
    to_path_or_stdout(args.output.as_deref(), |sink| write_serialized(sink, &results))
        .context("Failed to write overrepresentation results")?;
    info!("Tested {} gene sets", results.len());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Gsea(args) => run_gsea(args),
        Command::Ora(args) => run_ora(args),
    }
}
