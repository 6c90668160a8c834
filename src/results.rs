use std::{io::Write, path::Path};

use bon::Builder;
use derive_new::new;
use serde::Serialize;

use crate::{
    distribution::{Direction, Distribution},
    error::Result,
};

/// Enrichment statistics of one gene set against one ranked list
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub term: String,
    pub es: f64,
    pub nes: f64,
    pub pvalue: f64,
    pub adjusted_pvalue: f64,
    /// Number of genes in the set
    pub set_size: usize,
    /// Number of set genes present in the ranked list
    pub overlap: usize,
}
impl EnrichmentResult {
    /// Creates a new EnrichmentResult
    ///
    /// `adjusted_pvalue` is initialized to 1.0 and set once every set of the call is scored.
    pub fn new(
        term: String,
        es: f64,
        nes: f64,
        pvalue: f64,
        set_size: usize,
        overlap: usize,
    ) -> Self {
        Self {
            term,
            es,
            nes,
            pvalue,
            adjusted_pvalue: 1.0, // initialized to 1.0
            set_size,
            overlap,
        }
    }
}

/// Origin of an enrichment call
#[derive(Debug, Clone, PartialEq, Builder)]
pub struct Provenance {
    #[builder(into)]
    pub algorithm: String,
    pub current_z: usize,
    pub full_z: usize,
    pub distribution: Distribution,
    pub direction: Direction,
    pub shuffled: bool,
    pub seed: u64,
}

/// An enrichment result tied to the unit that produced it
#[derive(Debug, Clone, PartialEq, new)]
pub struct EnrichmentRecord {
    pub result: EnrichmentResult,
    pub provenance: Provenance,
}

const RECORD_HEADER: [&str; 14] = [
    "term",
    "es",
    "nes",
    "pval",
    "adj_pval",
    "set_size",
    "overlap",
    "algorithm",
    "current_z",
    "full_z",
    "distribution",
    "direction",
    "shuffled",
    "seed",
];

impl EnrichmentRecord {
    fn fields(&self) -> [String; 14] {
        let r = &self.result;
        let p = &self.provenance;
        [
            r.term.clone(),
            r.es.to_string(),
            r.nes.to_string(),
            r.pvalue.to_string(),
            r.adjusted_pvalue.to_string(),
            r.set_size.to_string(),
            r.overlap.to_string(),
            p.algorithm.clone(),
            p.current_z.to_string(),
            p.full_z.to_string(),
            p.distribution.to_string(),
            p.direction.to_string(),
            p.shuffled.to_string(),
            p.seed.to_string(),
        ]
    }

    /// Sort key: seed, algorithm, dimension, distribution, direction, then term
    pub fn canonical_key(&self) -> (u64, &str, usize, Distribution, Direction, &str) {
        let p = &self.provenance;
        (
            p.seed,
            p.algorithm.as_str(),
            p.current_z,
            p.distribution,
            p.direction,
            self.result.term.as_str(),
        )
    }
}

/// Overrepresentation of one gene set in a candidate list
#[derive(Debug, Clone, PartialEq, Serialize, new)]
pub struct OverrepresentationResult {
    pub gene_set: String,
    pub odds_ratio: f64,
    pub pval: f64,
    pub overlap: usize,
    pub candidate_size: usize,
    pub set_size: usize,
    pub background_size: usize,
}

pub(crate) fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer)
}

pub fn write_records<W: Write>(writer: W, records: &[EnrichmentRecord]) -> Result<()> {
    let mut writer = tsv_writer(writer);
    writer.write_record(RECORD_HEADER)?;
    for record in records {
        writer.write_record(record.fields())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_serialized<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut writer = tsv_writer(writer);
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Hands `write` a buffered file sink, or stdout when no path is given
pub fn to_path_or_stdout<F>(path: Option<&Path>, write: F) -> Result<()>
where
    F: FnOnce(Box<dyn Write>) -> Result<()>,
{
    let sink: Box<dyn Write> = match path {
        Some(path) => Box::new(std::io::BufWriter::new(std::fs::File::create(path)?)),
        None => Box::new(std::io::stdout().lock()),
    };
    write(sink)
}
