//! Gene identifier translation between gene symbols and Entrez gene ids.
//!
//! The dictionary is built from a curated gene table (restricted to
//! protein-coding genes), its admissible synonyms, and an updater table that
//! maps deprecated Entrez ids to their current replacement.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    fs::File,
    io::BufReader,
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
};

use derive_new::new;
use itertools::Itertools;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{InterpretError, Result};

const PROTEIN_CODING: &str = "protein-coding";

/// One row of the curated gene table
#[derive(Debug, Clone, Deserialize, new)]
pub struct GeneRecord {
    pub entrez_gene_id: String,
    pub symbol: String,
    pub gene_type: String,
    /// Pipe-delimited alternative symbols
    #[serde(default)]
    pub synonyms: Option<String>,
}

/// One row of the deprecated id updater table
#[derive(Debug, Clone, Deserialize, new)]
pub struct UpdaterRecord {
    pub old_entrez_gene_id: String,
    pub new_entrez_gene_id: String,
}

/// Gene identifier namespaces the translator understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    EntrezGeneId,
    Symbol,
}

impl FromStr for Namespace {
    type Err = InterpretError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "entrez_gene_id" => Ok(Namespace::EntrezGeneId),
            "symbol" => Ok(Namespace::Symbol),
            other => Err(InterpretError::InvalidNamespace(other.to_string())),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::EntrezGeneId => write!(f, "entrez_gene_id"),
            Namespace::Symbol => write!(f, "symbol"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeneDictionary {
    /// Primary symbols and admissible synonyms to Entrez id
    symbol_to_id: HashMap<String, String>,
    /// Entrez id to primary symbol
    id_to_symbol: HashMap<String, String>,
    /// Deprecated Entrez id to current Entrez id
    old_to_new: HashMap<String, String>,
}

fn read_tsv<T, P>(path: P) -> Result<Vec<T>>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let reader = File::open(path.as_ref()).map(BufReader::new)?;
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();
    for record in csv_reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

impl GeneDictionary {
    /// Load the gene table and, optionally, the deprecated id updater table
    pub fn load<P: AsRef<Path>>(genes_path: P, updater_path: Option<P>) -> Result<Self> {
        let genes: Vec<GeneRecord> = read_tsv(&genes_path)?;
        let updates: Vec<UpdaterRecord> = match updater_path {
            Some(path) => read_tsv(path)?,
            None => Vec::new(),
        };
        let dictionary = Self::from_records(genes, updates);
        info!(
            "Loaded gene dictionary from {:?}: {} symbols, {} ids, {} deprecated ids",
            genes_path.as_ref(),
            dictionary.symbol_to_id.len(),
            dictionary.id_to_symbol.len(),
            dictionary.old_to_new.len()
        );
        Ok(dictionary)
    }

    pub fn from_records<G, U>(genes: G, updates: U) -> Self
    where
        G: IntoIterator<Item = GeneRecord>,
        U: IntoIterator<Item = UpdaterRecord>,
    {
        let coding = genes
            .into_iter()
            .filter(|g| g.gene_type == PROTEIN_CODING)
            .collect::<Vec<_>>();

        let mut symbol_to_id = HashMap::new();
        let mut id_to_symbol = HashMap::new();
        for gene in &coding {
            symbol_to_id.insert(gene.symbol.clone(), gene.entrez_gene_id.clone());
            id_to_symbol.insert(gene.entrez_gene_id.clone(), gene.symbol.clone());
        }

        let synonyms = admissible_synonyms(&coding);
        debug!("Merging {} admissible synonyms", synonyms.len());
        symbol_to_id.extend(synonyms);

        let old_to_new = updates
            .into_iter()
            .map(|u| (u.old_entrez_gene_id, u.new_entrez_gene_id))
            .collect();

        Self {
            symbol_to_id,
            id_to_symbol,
            old_to_new,
        }
    }

    /// Symbol (or synonym) to Entrez id lookup, before deprecated id substitution
    pub fn symbol_id(&self, symbol: &str) -> Option<&str> {
        self.symbol_to_id.get(symbol).map(String::as_str)
    }

    /// Current Entrez id for a possibly deprecated one
    pub fn update_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.old_to_new.get(id).map(String::as_str).unwrap_or(id)
    }

    fn symbol_for_id(&self, id: &str) -> Option<&String> {
        self.id_to_symbol
            .get(id)
            .or_else(|| self.id_to_symbol.get(self.update_id(id)))
    }

    fn symbol_to_current_id(&self, symbol: &str) -> Option<String> {
        self.symbol_id(symbol)
            .map(|id| self.update_id(id).to_string())
    }

    fn translate_one(&self, id: &str, from: Namespace, to: Namespace) -> Option<String> {
        match (from, to) {
            (Namespace::Symbol, Namespace::EntrezGeneId) => self.symbol_to_current_id(id),
            (Namespace::EntrezGeneId, Namespace::Symbol) => self.symbol_for_id(id).cloned(),
            (Namespace::EntrezGeneId, Namespace::EntrezGeneId) => {
                let current = self.update_id(id);
                self.id_to_symbol
                    .contains_key(current)
                    .then(|| current.to_string())
            }
            (Namespace::Symbol, Namespace::Symbol) => self
                .symbol_id(id)
                .and_then(|gene_id| self.symbol_for_id(gene_id))
                .cloned(),
        }
    }

    /// Translate each identifier; unmapped identifiers become `None`
    pub fn translate<S: AsRef<str>>(
        &self,
        ids: &[S],
        from: Namespace,
        to: Namespace,
    ) -> Vec<Option<String>> {
        ids.iter()
            .map(|id| self.translate_one(id.as_ref().trim(), from, to))
            .collect()
    }

    pub fn num_symbols(&self) -> usize {
        self.symbol_to_id.len()
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.symbol_to_id.contains_key(symbol)
    }
}

/// Synonyms that identify exactly one gene and do not shadow a primary symbol
fn admissible_synonyms(genes: &[GeneRecord]) -> HashMap<String, String> {
    let primary = genes.iter().map(|g| g.symbol.as_str()).collect::<HashSet<_>>();
    let pairs = genes
        .iter()
        .filter_map(|g| g.synonyms.as_deref().map(|s| (s, g.entrez_gene_id.as_str())))
        .flat_map(|(synonyms, id)| {
            synonyms
                .split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(move |s| (s, id))
        })
        .collect::<Vec<_>>();
    let counts = pairs.iter().map(|(synonym, _)| *synonym).counts();
    pairs
        .into_iter()
        .filter(|(synonym, _)| counts[synonym] == 1 && !primary.contains(synonym))
        .map(|(synonym, id)| (synonym.to_string(), id.to_string()))
        .collect()
}

type Loader = Box<dyn Fn() -> Result<GeneDictionary> + Send + Sync>;

/// Translates gene identifiers with a dictionary owned by this instance
///
/// The dictionary is either supplied up front or produced by a loader that
/// runs on first use and is memoized afterwards.
pub struct Translator {
    dictionary: Mutex<Option<Arc<GeneDictionary>>>,
    loader: Option<Loader>,
}

impl Translator {
    pub fn new(dictionary: GeneDictionary) -> Self {
        Self {
            dictionary: Mutex::new(Some(Arc::new(dictionary))),
            loader: None,
        }
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<GeneDictionary> + Send + Sync + 'static,
    {
        Self {
            dictionary: Mutex::new(None),
            loader: Some(Box::new(loader)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.dictionary
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Returns the dictionary, invoking the loader if it has not run successfully yet
    pub fn dictionary(&self) -> Result<Arc<GeneDictionary>> {
        let mut guard = self
            .dictionary
            .lock()
            .map_err(|_| InterpretError::DictionaryUnavailable("lock poisoned".to_string()))?;
        if let Some(dictionary) = guard.as_ref() {
            return Ok(Arc::clone(dictionary));
        }
        let loader = self.loader.as_ref().ok_or_else(|| {
            InterpretError::DictionaryUnavailable("no dictionary or loader provided".to_string())
        })?;
        let dictionary = Arc::new(loader()?);
        *guard = Some(Arc::clone(&dictionary));
        Ok(dictionary)
    }

    pub fn translate<S: AsRef<str>>(
        &self,
        ids: &[S],
        from: Namespace,
        to: Namespace,
    ) -> Result<Vec<Option<String>>> {
        Ok(self.dictionary()?.translate(ids, from, to))
    }

    /// Like [`Translator::translate`] with namespaces given by name
    pub fn translate_named<S: AsRef<str>>(
        &self,
        ids: &[S],
        from: &str,
        to: &str,
    ) -> Result<Vec<Option<String>>> {
        let from = from.parse::<Namespace>()?;
        let to = to.parse::<Namespace>()?;
        self.translate(ids, from, to)
    }
}
