pub fn arithmetic_mean(x: &[f64]) -> f64 {
    x.iter().sum::<f64>() / x.len() as f64
}

/// Weighted Kolmogorov-Smirnov enrichment score of a gene set
///
/// `positions` are the ascending ranks of the set's genes in a list of
/// `n_genes`, `hit_weights` the step weight of each of those genes. The score
/// is the running-sum extreme furthest from zero; a tie goes to the negative
/// extreme.
pub fn enrichment_score(positions: &[usize], hit_weights: &[f64], n_genes: usize) -> f64 {
    let n_hits = positions.len();
    if n_hits == 0 {
        return 0.0;
    }

    let total = hit_weights.iter().sum::<f64>();
    let uniform = !(total.is_finite() && total > 0.0);
    let miss_step = if n_genes > n_hits {
        1.0 / (n_genes - n_hits) as f64
    } else {
        0.0
    };

    let mut hit_sum = 0.0;
    let mut max_deviation = 0.0_f64;
    let mut min_deviation = 0.0_f64;
    for (rank, (&position, &weight)) in positions.iter().zip(hit_weights).enumerate() {
        // misses accumulated before this hit
        let miss_sum = (position - rank) as f64 * miss_step;
        min_deviation = min_deviation.min(hit_sum - miss_sum);
        hit_sum += if uniform {
            1.0 / n_hits as f64
        } else {
            weight / total
        };
        max_deviation = max_deviation.max(hit_sum - miss_sum);
    }

    if max_deviation > min_deviation.abs() {
        max_deviation
    } else {
        min_deviation
    }
}

/// Fraction of same-signed null scores at least as extreme as the observed score
///
/// Returns 1.0 when the null holds no score of the observed sign.
pub fn nominal_pvalue(es: f64, null: &[f64]) -> f64 {
    let (tail, extreme) = if es < 0.0 {
        (
            null.iter().filter(|&&x| x < 0.0).count(),
            null.iter().filter(|&&x| x <= es).count(),
        )
    } else {
        (
            null.iter().filter(|&&x| x >= 0.0).count(),
            null.iter().filter(|&&x| x >= es).count(),
        )
    };
    if tail == 0 {
        return 1.0;
    }
    extreme as f64 / tail as f64
}

/// Enrichment score divided by the mean magnitude of same-signed null scores
pub fn normalized_enrichment_score(es: f64, null: &[f64]) -> f64 {
    let same_sign = null
        .iter()
        .filter(|&&x| if es < 0.0 { x < 0.0 } else { x >= 0.0 })
        .map(|x| x.abs())
        .collect::<Vec<_>>();
    let scale = arithmetic_mean(&same_sign);
    if scale > 0.0 {
        es / scale
    } else if es == 0.0 {
        0.0
    } else {
        es.signum()
    }
}
