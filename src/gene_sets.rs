//! Curated gene set collections in GMT format.

use std::{
    collections::{BTreeMap, HashSet},
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use derive_new::new;
use tracing::{debug, info};

use crate::error::{InterpretError, Result};

/// A named set of gene identifiers
#[derive(Debug, Clone, PartialEq, new)]
pub struct GeneSet {
    pub name: String,
    pub description: String,
    pub genes: HashSet<String>,
}

impl GeneSet {
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn contains(&self, gene: &str) -> bool {
        self.genes.contains(gene)
    }
}

/// Gene sets keyed and ordered by name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneSetCollection {
    sets: BTreeMap<String, GeneSet>,
}

impl GeneSetCollection {
    pub fn from_sets<I: IntoIterator<Item = GeneSet>>(sets: I) -> Self {
        let mut collection = Self::default();
        for set in sets {
            collection.insert(set);
        }
        collection
    }

    /// Adds a set, replacing any set of the same name
    pub fn insert(&mut self, set: GeneSet) {
        self.sets.insert(set.name.clone(), set);
    }

    /// Reads `<name>\t<description>\t<gene>\t<gene>...` lines
    ///
    /// A later line with an already seen name replaces the earlier one.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut collection = Self::default();
        for line in reader.lines() {
            let line = line?;
            let line = line.trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or_default().trim().to_string();
            let description = fields.next().unwrap_or_default().to_string();
            let genes = fields
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect();
            collection.insert(GeneSet::new(name, description, genes));
        }
        Ok(collection)
    }

    pub fn from_gmt<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = File::open(path.as_ref()).map(BufReader::new)?;
        let collection = Self::from_reader(reader)?;
        debug!("Read {} gene sets from {:?}", collection.len(), path.as_ref());
        Ok(collection)
    }

    /// Adds the sets of `other` whose names are not present yet
    pub fn merge(&mut self, other: GeneSetCollection) {
        for (name, set) in other.sets {
            self.sets.entry(name).or_insert(set);
        }
    }

    pub fn get(&self, name: &str) -> Option<&GeneSet> {
        self.sets.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneSet> {
        self.sets.values()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

/// Where a gene set collection comes from
#[derive(Debug, Clone, PartialEq)]
pub enum GeneSetSource {
    /// A GMT file on disk
    Gmt(PathBuf),
    /// A collection name such as `KEGG_2016`, looked up as `<name>.gmt` in a library directory
    Named(String),
}

impl From<&str> for GeneSetSource {
    fn from(value: &str) -> Self {
        if value.to_lowercase().ends_with(".gmt") {
            GeneSetSource::Gmt(PathBuf::from(value))
        } else {
            GeneSetSource::Named(value.to_string())
        }
    }
}

impl GeneSetSource {
    pub fn resolve(&self, library_dir: &Path) -> Result<PathBuf> {
        match self {
            GeneSetSource::Gmt(path) => Ok(path.clone()),
            GeneSetSource::Named(name) => {
                let path = library_dir.join(format!("{}.gmt", name));
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(InterpretError::UnknownGeneSetCollection {
                        name: name.clone(),
                        path,
                    })
                }
            }
        }
    }

    pub fn load(&self, library_dir: &Path) -> Result<GeneSetCollection> {
        GeneSetCollection::from_gmt(self.resolve(library_dir)?)
    }
}

/// Loads and merges several sources; earlier sources win on name clashes
pub fn load_sources(sources: &[GeneSetSource], library_dir: &Path) -> Result<GeneSetCollection> {
    let mut collection = GeneSetCollection::default();
    for source in sources {
        collection.merge(source.load(library_dir)?);
    }
    info!(
        "Loaded {} gene sets from {} sources",
        collection.len(),
        sources.len()
    );
    Ok(collection)
}
