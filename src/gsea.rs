use std::collections::HashSet;

use rand::{seq::index::sample, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    config::GseaConfig,
    gene_sets::{GeneSet, GeneSetCollection},
    math::{enrichment_score, nominal_pvalue, normalized_enrichment_score},
    results::EnrichmentResult,
    utils::select_indices,
};

/// Genes ordered by descending score
///
/// Ties keep their input order, repeated genes keep their first score and
/// non-finite scores are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedList {
    genes: Vec<String>,
    scores: Vec<f64>,
}

impl RankedList {
    pub fn new<I: IntoIterator<Item = (String, f64)>>(pairs: I) -> Self {
        let mut seen = HashSet::new();
        let pairs = pairs
            .into_iter()
            .filter(|(_, score)| score.is_finite())
            .filter(|(gene, _)| seen.insert(gene.clone()))
            .collect::<Vec<_>>();

        let mut order = (0..pairs.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| {
            pairs[b]
                .1
                .partial_cmp(&pairs[a].1)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let genes = order.iter().map(|&i| pairs[i].0.clone()).collect();
        let scores = order.iter().map(|&i| pairs[i].1).collect();
        Self { genes, scores }
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// Permutation based preranked gene set enrichment
///
/// Each gene set draws its null statistics from its own ChaCha stream, so the
/// results depend only on the seed, the ranked list and the set's position in
/// the collection.
pub struct Gsea<'a> {
    ranked: &'a RankedList,
    config: &'a GseaConfig,
    weights: Vec<f64>,
}
impl<'a> Gsea<'a> {
    pub fn new(ranked: &'a RankedList, config: &'a GseaConfig) -> Self {
        let weights = config.weight.build_weights(ranked.scores());
        Self {
            ranked,
            config,
            weights,
        }
    }

    /// Run the enrichment over every gene set of the collection
    ///
    /// 1. Locate each set's genes in the ranked list, skipping sets without hits
    /// 2. Score the observed running sum
    /// 3. Score the same number of hits at random ranks for every permutation
    /// 4. Derive nominal p-values and normalized scores from the null
    /// 5. Correct p-values across all tested sets
    pub fn run(&self, collection: &GeneSetCollection) -> Vec<EnrichmentResult> {
        let sets = collection.iter().enumerate().collect::<Vec<_>>();
        let mut results = sets
            .into_par_iter()
            .filter_map(|(index, set)| self.process_set(index, set))
            .collect::<Vec<_>>();

        let pvalues = results.iter().map(|r| r.pvalue).collect::<Vec<_>>();
        let adjusted = self.config.transform.transform(&pvalues);
        for (result, adjusted_pvalue) in results.iter_mut().zip(adjusted) {
            result.adjusted_pvalue = adjusted_pvalue;
        }
        results
    }

    /// Ascending ranks of the set's genes in the ranked list
    fn hit_positions(&self, set: &GeneSet) -> Vec<usize> {
        self.ranked
            .genes()
            .iter()
            .enumerate()
            .filter(|(_, gene)| set.contains(gene))
            .map(|(i, _)| i)
            .collect()
    }

    fn within_size_limits(&self, overlap: usize) -> bool {
        overlap >= self.config.min_size.max(1)
            && self.config.max_size.map_or(true, |max| overlap <= max)
    }

    /// Score a single gene set, `None` when it cannot be tested
    fn process_set(&self, index: usize, set: &GeneSet) -> Option<EnrichmentResult> {
        let positions = self.hit_positions(set);
        if !self.within_size_limits(positions.len()) {
            return None;
        }

        let n_genes = self.ranked.len();
        let hit_weights = select_indices(&positions, &self.weights);
        let es = enrichment_score(&positions, &hit_weights, n_genes);
        let null = self.null_distribution(index, positions.len());

        let pvalue = nominal_pvalue(es, &null);
        let nes = normalized_enrichment_score(es, &null);
        Some(EnrichmentResult::new(
            set.name.clone(),
            es,
            nes,
            pvalue,
            set.len(),
            positions.len(),
        ))
    }

    /// Enrichment scores of `n_hits` genes placed at random ranks
    fn null_distribution(&self, index: usize, n_hits: usize) -> Vec<f64> {
        let n_genes = self.ranked.len();
        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        rng.set_stream(index as u64);
        (0..self.config.permutations)
            .map(|_| {
                let mut positions = sample(&mut rng, n_genes, n_hits).into_vec();
                positions.sort_unstable();
                let hit_weights = select_indices(&positions, &self.weights);
                enrichment_score(&positions, &hit_weights, n_genes)
            })
            .collect()
    }
}
