//! Distance & Cluster Stage (spec.md §4.8).
//!
//! Builds a per-concept distance matrix under the configured `Method`,
//! squareforms it, dispatches to the configured flat-clustering algorithm,
//! and folds the result into a running cross-concept cognate-id space by
//! offsetting each concept's local cluster ids by a running maximum.
//! The per-subset dense-matrix expansion and `UnionFind`-based id
//! bookkeeping generalize to the five method/cluster-method combinations
//! spec.md §6 enumerates.

use crate::align::{align, AlignParams};
use crate::cluster::{agglomerative_cluster, link_clustering, logs_transform, mcl_cluster, Linkage, MclParams};
use crate::config::{ClusterMethod, LexStatConfig, Method};
use crate::matrix::Scorer;
use crate::types::{CognateAssignment, SegmentSymbol, WordRecord};

/// Everything needed to score one word pair under any [`Method`]. Callers
/// assemble this once per concept group; `lexstat_scorer` may be `None`
/// when `method != Method::Lexstat`.
pub struct DistanceContext<'a> {
    pub words: &'a [WordRecord],
    pub encoded: &'a ahash::AHashMap<usize, (Vec<SegmentSymbol>, Vec<f64>, String)>,
    pub base_scorer: &'a dyn Scorer,
    pub lexstat_scorer: Option<&'a dyn Scorer>,
    pub custom: Option<&'a dyn Fn(usize, usize) -> f64>,
}

/// Dispatch a single pairwise distance computation to the configured
/// method (spec.md §6 `method`). `sca`/`lexstat` both align; they differ
/// only in which scorer backs the alignment. `edit_dist` is plain token
/// Levenshtein normalized by the longer word's length. `turchin` is the
/// classical binary rule: cognate (distance 0) iff the first sound classes
/// of both words match, else 1.
pub fn method_distance(method: Method, wid_a: usize, wid_b: usize, config: &LexStatConfig, ctx: &DistanceContext) -> f64 {
    match method {
        Method::Sca => aligned_distance(wid_a, wid_b, config, ctx, ctx.base_scorer),
        Method::Lexstat => {
            let scorer = ctx.lexstat_scorer.unwrap_or(ctx.base_scorer);
            aligned_distance(wid_a, wid_b, config, ctx, scorer)
        }
        Method::EditDist => edit_distance(wid_a, wid_b, ctx),
        Method::Turchin => turchin_distance(wid_a, wid_b, ctx),
        Method::Custom => ctx.custom.map(|f| f(wid_a, wid_b)).unwrap_or(1.0),
    }
}

fn aligned_distance(wid_a: usize, wid_b: usize, config: &LexStatConfig, ctx: &DistanceContext, scorer: &dyn Scorer) -> f64 {
    let Some((seq_a, w_a, p_a)) = ctx.encoded.get(&wid_a) else { return 1.0 };
    let Some((seq_b, w_b, p_b)) = ctx.encoded.get(&wid_b) else { return 1.0 };
    let params = AlignParams {
        gop: config.gop as f64,
        scale: config.scale,
        factor: config.factor,
        scorer,
        mode: config.mode,
        restricted_chars: &config.restricted_chars,
        distance: true,
    };
    align(seq_a, seq_b, w_a, w_b, p_a, p_b, &params).score
}

fn word_by_id(words: &[WordRecord], id: usize) -> Option<&WordRecord> {
    words.iter().find(|w| w.id == id)
}

fn edit_distance(wid_a: usize, wid_b: usize, ctx: &DistanceContext) -> f64 {
    let Some(a) = word_by_id(ctx.words, wid_a) else { return 1.0 };
    let Some(b) = word_by_id(ctx.words, wid_b) else { return 1.0 };
    let a = &a.tokens;
    let b = &b.tokens;
    let n = a.len();
    let m = b.len();
    if n == 0 && m == 0 {
        return 0.0;
    }
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in 0..=n {
        dp[i][0] = i;
    }
    for j in 0..=m {
        dp[0][j] = j;
    }
    for i in 1..=n {
        for j in 1..=m {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            dp[i][j] = (dp[i - 1][j] + 1).min(dp[i][j - 1] + 1).min(dp[i - 1][j - 1] + cost);
        }
    }
    dp[n][m] as f64 / n.max(m).max(1) as f64
}

fn turchin_distance(wid_a: usize, wid_b: usize, ctx: &DistanceContext) -> f64 {
    let ca = word_by_id(ctx.words, wid_a).and_then(|w| w.classes.chars().next());
    let cb = word_by_id(ctx.words, wid_b).and_then(|w| w.classes.chars().next());
    if ca.is_some() && ca == cb {
        0.0
    } else {
        1.0
    }
}

/// Expand a pairwise distance function over `word_ids` into a dense
/// symmetric matrix (spec.md §4.8 "squareform").
pub fn build_distance_matrix(word_ids: &[usize], pairwise: impl Fn(usize, usize) -> f64) -> Vec<Vec<f64>> {
    let n = word_ids.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = pairwise(word_ids[i], word_ids[j]);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}

/// Run the configured flat-clustering algorithm over one concept's dense
/// distance matrix, returning local cluster ids in `0..k` (spec.md §4.8).
pub fn flat_cluster(matrix: &[Vec<f64>], config: &LexStatConfig) -> Vec<usize> {
    let n = matrix.len();
    if n == 0 {
        return Vec::new();
    }
    let dist = |i: usize, j: usize| matrix[i][j];

    let groups: Vec<Vec<usize>> = match config.cluster_method {
        ClusterMethod::Upgma => agglomerative_cluster(n, &dist, config.threshold, Linkage::Average),
        ClusterMethod::Single => agglomerative_cluster(n, &dist, config.threshold, Linkage::Single),
        ClusterMethod::Complete => agglomerative_cluster(n, &dist, config.threshold, Linkage::Complete),
        ClusterMethod::Mcl => {
            let sim = |i: usize, j: usize| logs_transform(matrix[i][j]);
            let params = MclParams {
                inflation: config.inflation,
                expansion: config.expansion,
                max_steps: config.max_steps,
                add_self_loops: config.add_self_loops,
            };
            mcl_cluster(n, &sim, &params)
        }
        ClusterMethod::LinkClustering => {
            let mut edges = Vec::new();
            for i in 0..n {
                for j in (i + 1)..n {
                    let sim = 1.0 - matrix[i][j];
                    if sim >= 1.0 - config.threshold {
                        edges.push((i, j, sim));
                    }
                }
            }
            link_clustering(n, &edges, config.link_threshold)
        }
    };

    let mut labels = vec![0usize; n];
    for (cluster_id, members) in groups.iter().enumerate() {
        for &idx in members {
            labels[idx] = cluster_id;
        }
    }
    labels
}

/// Cluster one concept group and fold the local labels into the running
/// global cognate-id space, offsetting by `*next_id` (spec.md §4.8:
/// "class ids are unique across concepts").
pub fn cluster_concept_into(
    word_ids: &[usize],
    matrix: &[Vec<f64>],
    config: &LexStatConfig,
    assignment: &mut CognateAssignment,
    next_id: &mut usize,
) {
    let labels = flat_cluster(matrix, config);
    let local_max = labels.iter().copied().max().map(|m| m + 1).unwrap_or(0);
    for (idx, &wid) in word_ids.iter().enumerate() {
        assignment.insert(wid, *next_id + labels[idx]);
    }
    *next_id += local_max;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: usize, classes: &str) -> WordRecord {
        WordRecord {
            id,
            concept: "hand".into(),
            language_id: 1,
            tokens: classes.chars().map(|c| c.to_string()).collect(),
            sonars: vec![1; classes.len()],
            prostring: "C".repeat(classes.len()),
            classes: classes.into(),
            numbers: vec![],
            weights: vec![1.0; classes.len()],
            duplicate: false,
        }
    }

    #[test]
    fn edit_distance_identical_words_is_zero() {
        let words = vec![word(0, "pat"), word(1, "pat")];
        let encoded = ahash::AHashMap::new();
        let ctx = DistanceContext {
            words: &words,
            encoded: &encoded,
            base_scorer: &crate::matrix::ScoreMatrix::new(-2.0),
            lexstat_scorer: None,
            custom: None,
        };
        assert_eq!(edit_distance(0, 1, &ctx), 0.0);
    }

    #[test]
    fn turchin_distance_binary_rule() {
        let words = vec![word(0, "pat"), word(1, "pad"), word(2, "kas")];
        let encoded = ahash::AHashMap::new();
        let ctx = DistanceContext {
            words: &words,
            encoded: &encoded,
            base_scorer: &crate::matrix::ScoreMatrix::new(-2.0),
            lexstat_scorer: None,
            custom: None,
        };
        assert_eq!(turchin_distance(0, 1, &ctx), 0.0);
        assert_eq!(turchin_distance(0, 2, &ctx), 1.0);
    }

    #[test]
    fn cluster_concept_offsets_ids_across_concepts() {
        let config = LexStatConfig::default();
        let mut assignment = CognateAssignment::default();
        let mut next_id = 0usize;

        // First concept: two singletons (far apart).
        let matrix_a = vec![vec![0.0, 0.9], vec![0.9, 0.0]];
        cluster_concept_into(&[0, 1], &matrix_a, &config, &mut assignment, &mut next_id);
        let first_max = *assignment.values().max().unwrap();

        // Second concept: one pair, clustered together.
        let matrix_b = vec![vec![0.0, 0.05], vec![0.05, 0.0]];
        cluster_concept_into(&[2, 3], &matrix_b, &config, &mut assignment, &mut next_id);

        assert!(assignment[&2] > first_max);
        assert_eq!(assignment[&2], assignment[&3]);
    }
}
