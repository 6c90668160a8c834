//! Overrepresentation of gene sets in a candidate gene list.
//!
//! Every cell of the 2x2 contingency table carries a +1 pseudocount, so
//! sparse overlaps never produce zero cells. No multiple testing correction is
//! applied here.

use std::collections::HashSet;

use rayon::prelude::*;
use statrs::distribution::{Discrete, Hypergeometric};
use tracing::debug;

use crate::{
    error::{InterpretError, Result},
    gene_sets::{GeneSet, GeneSetCollection},
    results::OverrepresentationResult,
};

/// Relative tolerance when comparing table probabilities against the observed one
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Pseudocounted table `[[m+1, N-m+1], [P-m+1, G-N-P+m+1]]`
///
/// `m` is the overlap of set and candidates, `n` the candidate count, `p` the
/// set size and `g` the universe size. Returns the signed table as the error
/// when any cell would be negative.
pub fn contingency_table(
    m: usize,
    n: usize,
    p: usize,
    g: usize,
) -> std::result::Result<[[u64; 2]; 2], [[i64; 2]; 2]> {
    let (m, n, p, g) = (m as i64, n as i64, p as i64, g as i64);
    let signed = [[m + 1, n - m + 1], [p - m + 1, g - n - p + m + 1]];
    if signed.iter().flatten().any(|&cell| cell < 0) {
        return Err(signed);
    }
    Ok(signed.map(|row| row.map(|cell| cell as u64)))
}

/// Two-sided Fisher exact test on a 2x2 table, returning (odds ratio, p-value)
///
/// The p-value sums the hypergeometric probabilities of every table with the
/// same margins that is no more likely than the observed one.
pub fn fisher_exact(table: [[u64; 2]; 2]) -> Result<(f64, f64)> {
    let [[a, b], [c, d]] = table;
    let odds_ratio = if b == 0 || c == 0 {
        if a == 0 || d == 0 {
            f64::NAN
        } else {
            f64::INFINITY
        }
    } else {
        (a as f64 * d as f64) / (b as f64 * c as f64)
    };

    let population = a + b + c + d;
    let successes = a + b;
    let draws = a + c;
    if population == 0 {
        return Ok((odds_ratio, 1.0));
    }
    let distribution = Hypergeometric::new(population, successes, draws)
        .map_err(|e| InterpretError::Statistics(e.to_string()))?;

    let low = draws.saturating_sub(population - successes);
    let high = successes.min(draws);
    let observed = distribution.ln_pmf(a) + RELATIVE_TOLERANCE.ln_1p();
    let pvalue = (low..=high)
        .map(|x| distribution.ln_pmf(x))
        .filter(|&ln_p| ln_p <= observed)
        .map(f64::exp)
        .sum::<f64>();

    Ok((odds_ratio, pvalue.min(1.0)))
}

fn test_set(
    set: &GeneSet,
    candidates: &HashSet<&str>,
    universe_size: usize,
) -> Result<OverrepresentationResult> {
    let overlap = set
        .genes
        .iter()
        .filter(|gene| candidates.contains(gene.as_str()))
        .count();
    let table = contingency_table(overlap, candidates.len(), set.len(), universe_size).map_err(
        |table| InterpretError::InvalidContingency {
            gene_set: set.name.clone(),
            table,
        },
    )?;
    let (odds_ratio, pval) = fisher_exact(table)?;
    Ok(OverrepresentationResult::new(
        set.name.clone(),
        odds_ratio,
        pval,
        overlap,
        candidates.len(),
        set.len(),
        universe_size,
    ))
}

/// Test every gene set of the collection for overrepresentation among the candidates
///
/// The background is extended with the candidates and deduplicated before
/// counting.
pub fn run_overrepresentation<S: AsRef<str> + Sync>(
    candidates: &[S],
    collection: &GeneSetCollection,
    background: &[S],
) -> Result<Vec<OverrepresentationResult>> {
    let candidates = candidates
        .iter()
        .map(|g| g.as_ref())
        .collect::<HashSet<_>>();
    if candidates.is_empty() {
        return Err(InterpretError::EmptyCandidateList);
    }
    let universe_size = background
        .iter()
        .map(|g| g.as_ref())
        .chain(candidates.iter().copied())
        .collect::<HashSet<_>>()
        .len();
    debug!(
        "Testing {} gene sets: {} candidates in a universe of {}",
        collection.len(),
        candidates.len(),
        universe_size
    );

    collection
        .iter()
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|set| test_set(set, &candidates, universe_size))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn collection(sets: &[(&str, &[&str])]) -> GeneSetCollection {
        GeneSetCollection::from_sets(sets.iter().map(|(name, genes)| {
            GeneSet::new(
                name.to_string(),
                String::new(),
                genes.iter().map(|g| g.to_string()).collect(),
            )
        }))
    }

    #[test]
    fn test_contingency_table_pseudocounts() {
        assert_eq!(contingency_table(2, 3, 2, 5), Ok([[3, 2], [1, 5]]));
    }

    #[test]
    fn test_contingency_table_rejects_negative_cells() {
        // a set larger than the universe
        assert!(contingency_table(0, 1, 10, 3).is_err());
    }

    #[test]
    fn test_fisher_exact_matches_hypergeometric_sum() {
        // pmf over x = 0..=4 is [15, 100, 150, 60, 5] / 330; x = 3 observed
        let (odds, pvalue) = fisher_exact([[3, 2], [1, 5]]).unwrap();
        assert_relative_eq!(odds, 7.5);
        assert_relative_eq!(pvalue, 80.0 / 330.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fisher_exact_symmetric_table() {
        let (odds, pvalue) = fisher_exact([[5, 5], [5, 5]]).unwrap();
        assert_relative_eq!(odds, 1.0);
        assert_relative_eq!(pvalue, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fisher_exact_extreme_table() {
        // only the two extreme tables are as unlikely as the observed one
        let (odds, pvalue) = fisher_exact([[4, 0], [0, 4]]).unwrap();
        assert!(odds.is_infinite());
        assert_relative_eq!(pvalue, 2.0 / 70.0, epsilon = 1e-9);
    }

    #[test]
    fn test_run_overrepresentation() {
        let sets = collection(&[("AB", &["A", "B"]), ("DE", &["D", "E"])]);
        let results =
            run_overrepresentation(&["A", "B", "C"], &sets, &["A", "B", "C", "D", "E"]).unwrap();
        assert_eq!(results.len(), 2);

        let ab = &results[0];
        assert_eq!(ab.gene_set, "AB");
        assert_eq!(
            (ab.overlap, ab.candidate_size, ab.set_size, ab.background_size),
            (2, 3, 2, 5)
        );
        assert_relative_eq!(ab.odds_ratio, 7.5);
        assert_relative_eq!(ab.pval, 80.0 / 330.0, epsilon = 1e-9);

        // table [[1, 4], [3, 3]]
        let de = &results[1];
        assert_eq!(de.overlap, 0);
        assert_relative_eq!(de.odds_ratio, 0.25);
    }

    #[test]
    fn test_candidates_extend_background() {
        let sets = collection(&[("AB", &["A", "B"])]);
        let results = run_overrepresentation(&["A", "B", "C"], &sets, &["D", "E"]).unwrap();
        assert_eq!(results[0].background_size, 5);
        assert_relative_eq!(results[0].odds_ratio, 7.5);
    }

    #[test]
    fn test_empty_candidates() {
        let sets = collection(&[("AB", &["A", "B"])]);
        let empty: [&str; 0] = [];
        assert!(matches!(
            run_overrepresentation(&empty, &sets, &empty),
            Err(InterpretError::EmptyCandidateList)
        ));
    }

    #[test]
    fn test_set_outside_universe_is_invalid() {
        let sets = collection(&[("BIG", &["A", "X1", "X2", "X3", "X4", "X5"])]);
        assert!(matches!(
            run_overrepresentation(&["A"], &sets, &["A", "B"]),
            Err(InterpretError::InvalidContingency { .. })
        ));
    }
}
