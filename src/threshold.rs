//! Threshold Estimator (spec.md §4.9).
//!
//! Automatic selection of the flat-clustering cutoff, dispatched over
//! `gt_mode` (spec.md §6). Grounded on `lexstat.py::cluster`'s
//! `guess_threshold` branches; the `nullditem` branch is left empty in the
//! source we distilled from, so it is preserved here as a literal no-op
//! returning the configured default rather than an inferred heuristic
//! (spec.md §9 Open Questions).

use crate::cluster::silhouette_score;
use crate::config::{LexStatConfig, ThresholdMode};

/// One candidate threshold's evaluation: the silhouette-style quality
/// score clustering at that cutoff would produce, pooled across every
/// concept's distance matrix.
fn evaluate_threshold(
    threshold: f64,
    concept_matrices: &[Vec<Vec<f64>>],
    config: &LexStatConfig,
) -> f64 {
    let mut pooled_similarities = Vec::new();
    let mut pooled_clusters = Vec::new();
    let mut offset = 0usize;

    for matrix in concept_matrices {
        let mut cfg = config.clone();
        cfg.threshold = threshold;
        let labels = crate::distance::flat_cluster(matrix, &cfg);

        let n = matrix.len();
        for i in 0..n {
            for j in (i + 1)..n {
                pooled_similarities.push((offset + i, offset + j, 1.0 - matrix[i][j]));
            }
        }

        let mut by_label: ahash::AHashMap<usize, Vec<usize>> = ahash::AHashMap::new();
        for (idx, &label) in labels.iter().enumerate() {
            by_label.entry(label).or_default().push(offset + idx);
        }
        pooled_clusters.extend(by_label.into_values());
        offset += n;
    }

    if pooled_clusters.len() <= 1 {
        return 0.0;
    }
    silhouette_score(&pooled_similarities, &pooled_clusters)
}

/// Scan `gt_trange` (start, end, step) and return the threshold with the
/// best pooled silhouette score over the given matrices.
fn scan_best_threshold(concept_matrices: &[Vec<Vec<f64>>], config: &LexStatConfig) -> f64 {
    let (start, end, step) = config.gt_trange;
    if step <= 0.0 || start >= end {
        return config.threshold;
    }

    let mut best = (config.threshold, f64::NEG_INFINITY);
    let mut t = start;
    while t <= end + 1e-9 {
        let score = evaluate_threshold(t, concept_matrices, config);
        if score > best.1 {
            best = (t, score);
        }
        t += step;
    }
    best.0
}

/// Each concept's own best threshold, scanned independently (spec.md §4.9:
/// "for each concept's matrix, find the t ... maximizing"), shared by
/// "average" (which then means these) and "item" (which keeps them
/// per-concept).
fn per_concept_best_thresholds(concept_matrices: &[Vec<Vec<f64>>], config: &LexStatConfig) -> Vec<f64> {
    concept_matrices
        .iter()
        .map(|matrix| scan_best_threshold(std::slice::from_ref(matrix), config))
        .collect()
}

/// The threshold (or per-concept thresholds) resolved by
/// [`resolve_threshold`].
#[derive(Debug, Clone)]
pub enum ResolvedThreshold {
    /// A single cutoff applied to every concept (average/nulld/nullditem
    /// modes, or `guess_threshold = false`).
    Global(f64),
    /// One cutoff per concept, in the same order as the `concept_matrices`
    /// passed to [`resolve_threshold`] ("item" mode -- spec.md §4.9: "no
    /// averaging, feeding each concept its own t").
    PerConcept(Vec<f64>),
}

impl ResolvedThreshold {
    /// The threshold to use for the concept at `index`, falling back to
    /// `default` if `index` is out of range for a `PerConcept` result.
    pub fn for_concept(&self, index: usize, default: f64) -> f64 {
        match self {
            ResolvedThreshold::Global(t) => *t,
            ResolvedThreshold::PerConcept(ts) => ts.get(index).copied().unwrap_or(default),
        }
    }
}

/// Null-distribution mode: compare the attested pairwise-distance
/// distribution against a reference (random) distance distribution and
/// pick the cutoff roughly halfway between their means -- the point past
/// which a distance is more likely to have come from chance than from a
/// true correspondence (spec.md §4.9 "nulld").
fn nulld_threshold(attested_distances: &[f64], random_distances: &[f64], config: &LexStatConfig) -> f64 {
    if attested_distances.is_empty() || random_distances.is_empty() {
        return config.threshold;
    }
    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let attested_mean = mean(attested_distances);
    let random_mean = mean(random_distances);
    ((attested_mean + random_mean) / 2.0).clamp(0.0, 1.0)
}

/// Resolve the clustering threshold to actually use, per `config.gt_mode`
/// (spec.md §4.9). Returns `config.threshold` unchanged unless
/// `config.guess_threshold` is set.
///
/// "average" scans each concept's own best threshold and means them into a
/// single global cutoff; "item" keeps each concept's own best threshold
/// un-averaged, so the caller must re-cluster each concept with its own
/// entry from the returned [`ResolvedThreshold::PerConcept`].
pub fn resolve_threshold(
    config: &LexStatConfig,
    concept_matrices: &[Vec<Vec<f64>>],
    attested_distances: &[f64],
    random_distances: &[f64],
) -> ResolvedThreshold {
    if !config.guess_threshold {
        return ResolvedThreshold::Global(config.threshold);
    }

    match config.gt_mode {
        ThresholdMode::Average => {
            let per_concept = per_concept_best_thresholds(concept_matrices, config);
            if per_concept.is_empty() {
                ResolvedThreshold::Global(config.threshold)
            } else {
                let mean = per_concept.iter().sum::<f64>() / per_concept.len() as f64;
                ResolvedThreshold::Global(mean)
            }
        }
        ThresholdMode::Item => ResolvedThreshold::PerConcept(per_concept_best_thresholds(concept_matrices, config)),
        ThresholdMode::Nulld => ResolvedThreshold::Global(nulld_threshold(attested_distances, random_distances, config)),
        // Preserved empty branch: falls through to the configured default.
        ThresholdMode::NullditemNoop => ResolvedThreshold::Global(config.threshold),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nullditem_mode_is_a_strict_noop() {
        let mut config = LexStatConfig::default();
        config.guess_threshold = true;
        config.gt_mode = ThresholdMode::NullditemNoop;
        config.threshold = 0.42;
        let resolved = resolve_threshold(&config, &[], &[], &[]);
        assert_eq!(resolved.for_concept(0, config.threshold), 0.42);
    }

    #[test]
    fn guess_threshold_off_returns_configured_value() {
        let mut config = LexStatConfig::default();
        config.guess_threshold = false;
        config.threshold = 0.55;
        let resolved = resolve_threshold(&config, &[], &[], &[]);
        assert_eq!(resolved.for_concept(0, config.threshold), 0.55);
    }

    #[test]
    fn nulld_mode_sits_between_the_two_means() {
        let config = LexStatConfig::default();
        let attested = vec![0.1, 0.2, 0.1];
        let random = vec![0.8, 0.9, 0.85];
        let t = nulld_threshold(&attested, &random, &config);
        assert!(t > 0.1 && t < 0.9);
    }

    #[test]
    fn average_mode_prefers_a_separating_threshold() {
        let mut config = LexStatConfig::default();
        config.gt_trange = (0.1, 0.9, 0.1);
        // Two well-separated pairs: {0,1} close, {2,3} close, cross-pairs far.
        let matrix = vec![
            vec![0.0, 0.1, 0.9, 0.9],
            vec![0.1, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.1],
            vec![0.9, 0.9, 0.1, 0.0],
        ];
        let t = scan_best_threshold(&[matrix], &config);
        assert!(t >= 0.1 && t <= 0.9);
    }

    #[test]
    fn item_mode_keeps_thresholds_per_concept_while_average_pools_them() {
        let mut config = LexStatConfig::default();
        config.guess_threshold = true;
        config.gt_trange = (0.1, 0.9, 0.1);

        // Two concepts with differently-separated matrices.
        let tight = vec![vec![0.0, 0.1], vec![0.1, 0.0]];
        let loose = vec![
            vec![0.0, 0.1, 0.9, 0.9],
            vec![0.1, 0.0, 0.9, 0.9],
            vec![0.9, 0.9, 0.0, 0.1],
            vec![0.9, 0.9, 0.1, 0.0],
        ];
        let matrices = vec![tight, loose];

        config.gt_mode = ThresholdMode::Item;
        let item = resolve_threshold(&config, &matrices, &[], &[]);
        let per_concept = match &item {
            ResolvedThreshold::PerConcept(ts) => ts.clone(),
            ResolvedThreshold::Global(_) => panic!("item mode must not collapse to a single global threshold"),
        };
        assert_eq!(per_concept.len(), matrices.len());

        config.gt_mode = ThresholdMode::Average;
        let average = resolve_threshold(&config, &matrices, &[], &[]);
        match average {
            ResolvedThreshold::Global(mean) => {
                let expected = per_concept.iter().sum::<f64>() / per_concept.len() as f64;
                assert!((mean - expected).abs() < 1e-9);
            }
            ResolvedThreshold::PerConcept(_) => panic!("average mode must collapse to a single global threshold"),
        }
    }
}
