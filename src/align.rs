//! Aligner (spec.md §4.4).
//!
//! Pairwise alignment under four modes with affine-like gap handling,
//! prosodic weighting, a scale-factor bonus for matching prosodic context,
//! and restricted-character secondary-alignment handling.
//!
//! Generalized from a row-filled DP table with traceback (the same shape
//! as a feature-weighted edit-distance recursion) to the affine-gap,
//! four-mode, prosody-weighted recursion described in spec.md §4.4 and §9
//! (Gotoh's algorithm, with three matrices `M`/`gap_a`/`gap_b` per mode).
//! The mode distinction is a tagged variant rather than one monolithic
//! routine: each mode differs only in boundary initialization and how the
//! final cell/path is extracted.

use crate::config::AlignMode;
use crate::matrix::Scorer;
use crate::types::{Alignment, SegmentSymbol};

const NEG_INF: f64 = f64::NEG_INFINITY;

/// Full parameter bundle for one alignment call (spec.md §4.4 operation
/// signature).
pub struct AlignParams<'a> {
    pub gop: f64,
    pub scale: f64,
    pub factor: f64,
    pub scorer: &'a dyn Scorer,
    pub mode: AlignMode,
    pub restricted_chars: &'a str,
    pub distance: bool,
}

#[derive(Clone, Copy)]
enum Move {
    Diag,
    Up,   // consume from A, gap in B
    Left, // consume from B, gap in A
    Start,
}

fn gap_cost(gop: f64, weight: f64, scale: f64, extending: bool, restricted: bool) -> f64 {
    let mut cost = gop * weight;
    if extending {
        cost *= scale;
    }
    if restricted {
        cost *= 2.0;
    }
    cost
}

fn is_restricted(prostring: &[char], pos: usize, restricted_chars: &str) -> bool {
    prostring
        .get(pos)
        .map(|c| restricted_chars.contains(*c))
        .unwrap_or(false)
}

struct Sequences<'a> {
    syms_a: Vec<String>,
    syms_b: Vec<String>,
    w_a: &'a [f64],
    w_b: &'a [f64],
    p_a: Vec<char>,
    p_b: Vec<char>,
}

fn prepare<'a>(
    seq_a: &[SegmentSymbol],
    seq_b: &[SegmentSymbol],
    w_a: &'a [f64],
    w_b: &'a [f64],
    p_a: &str,
    p_b: &str,
) -> Sequences<'a> {
    Sequences {
        syms_a: seq_a.iter().map(|s| s.to_key()).collect(),
        syms_b: seq_b.iter().map(|s| s.to_key()).collect(),
        w_a,
        w_b,
        p_a: p_a.chars().collect(),
        p_b: p_b.chars().collect(),
    }
}

fn match_score(seqs: &Sequences, i: usize, j: usize, params: &AlignParams) -> f64 {
    let mut s = params.scorer.lookup(&seqs.syms_a[i], &seqs.syms_b[j]);
    if seqs.p_a.get(i) == seqs.p_b.get(j) {
        s *= 1.0 + params.factor;
    }
    s
}

/// Core Gotoh-style DP shared by global/local/overlap. `local` floors every
/// cell at 0 and records the global maximum; `free_ends` initializes
/// boundaries to 0 instead of accumulating gap cost, giving overlap its
/// free end-gaps.
fn gotoh_align(
    seqs: &Sequences,
    params: &AlignParams,
    local: bool,
    free_ends: bool,
) -> (Vec<String>, Vec<String>, f64) {
    let n = seqs.syms_a.len();
    let m = seqs.syms_b.len();

    let mut mtx = vec![vec![0.0f64; m + 1]; n + 1];
    let mut gap_a = vec![vec![NEG_INF; m + 1]; n + 1]; // gap in B (consume A)
    let mut gap_b = vec![vec![NEG_INF; m + 1]; n + 1]; // gap in A (consume B)
    let mut trace = vec![vec![Move::Start; m + 1]; n + 1];

    if !local {
        mtx[0][0] = 0.0;
    }

    for i in 1..=n {
        if free_ends {
            mtx[i][0] = 0.0;
            gap_a[i][0] = 0.0;
        } else {
            let restricted = is_restricted(&seqs.p_a, i - 1, params.restricted_chars);
            let extend = i > 1;
            gap_a[i][0] = gap_a[i - 1][0].max(mtx[i - 1][0])
                + gap_cost(params.gop, seqs.w_a[i - 1], params.scale, extend, restricted);
            mtx[i][0] = if local { 0.0f64.max(gap_a[i][0]) } else { gap_a[i][0] };
        }
        trace[i][0] = Move::Up;
    }
    for j in 1..=m {
        if free_ends {
            mtx[0][j] = 0.0;
            gap_b[0][j] = 0.0;
        } else {
            let restricted = is_restricted(&seqs.p_b, j - 1, params.restricted_chars);
            let extend = j > 1;
            gap_b[0][j] = gap_b[0][j - 1].max(mtx[0][j - 1])
                + gap_cost(params.gop, seqs.w_b[j - 1], params.scale, extend, restricted);
            mtx[0][j] = if local { 0.0f64.max(gap_b[0][j]) } else { gap_b[0][j] };
        }
        trace[0][j] = Move::Left;
    }

    let mut best = (0.0f64, 0usize, 0usize);

    for i in 1..=n {
        for j in 1..=m {
            let diag = mtx[i - 1][j - 1] + match_score(seqs, i - 1, j - 1, params);

            let restricted_a = is_restricted(&seqs.p_a, i - 1, params.restricted_chars);
            gap_a[i][j] = (mtx[i - 1][j] + gap_cost(params.gop, seqs.w_a[i - 1], params.scale, false, restricted_a))
                .max(gap_a[i - 1][j] + gap_cost(params.gop, seqs.w_a[i - 1], params.scale, true, restricted_a));

            let restricted_b = is_restricted(&seqs.p_b, j - 1, params.restricted_chars);
            gap_b[i][j] = (mtx[i][j - 1] + gap_cost(params.gop, seqs.w_b[j - 1], params.scale, false, restricted_b))
                .max(gap_b[i][j - 1] + gap_cost(params.gop, seqs.w_b[j - 1], params.scale, true, restricted_b));

            let mut cell = diag.max(gap_a[i][j]).max(gap_b[i][j]);
            let mut mv = if cell == diag {
                Move::Diag
            } else if cell == gap_a[i][j] {
                Move::Up
            } else {
                Move::Left
            };

            if local && cell < 0.0 {
                cell = 0.0;
                mv = Move::Start;
            }

            mtx[i][j] = cell;
            trace[i][j] = mv;

            if local && cell > best.0 {
                best = (cell, i, j);
            }
        }
    }

    let (end_i, end_j, score) = if local {
        (best.1, best.2, best.0)
    } else if free_ends {
        // Free trailing gaps: the optimum may end anywhere on the last row
        // or column.
        let mut best_cell = mtx[n][m];
        let mut bi = n;
        let mut bj = m;
        for j in 0..=m {
            if mtx[n][j] > best_cell {
                best_cell = mtx[n][j];
                bi = n;
                bj = j;
            }
        }
        for i in 0..=n {
            if mtx[i][m] > best_cell {
                best_cell = mtx[i][m];
                bi = i;
                bj = m;
            }
        }
        (bi, bj, best_cell)
    } else {
        (n, m, mtx[n][m])
    };

    let (mut aligned_a, mut aligned_b) = traceback(seqs, &trace, end_i, end_j, local);

    // Pad free trailing/leading regions so both tracks report full length.
    if free_ends {
        pad_overlap_ends(seqs, &mut aligned_a, &mut aligned_b, end_i, end_j);
    } else if local {
        pad_local_ends(seqs, &mut aligned_a, &mut aligned_b, end_i, end_j);
    }

    (aligned_a, aligned_b, score)
}

fn traceback(
    seqs: &Sequences,
    trace: &[Vec<Move>],
    start_i: usize,
    start_j: usize,
    stop_at_zero: bool,
) -> (Vec<String>, Vec<String>) {
    let mut i = start_i;
    let mut j = start_j;
    let mut aligned_a = Vec::new();
    let mut aligned_b = Vec::new();

    loop {
        if i == 0 && j == 0 {
            break;
        }
        if stop_at_zero && matches!(trace.get(i).and_then(|r| r.get(j)), Some(Move::Start)) {
            break;
        }
        match trace[i][j] {
            Move::Diag => {
                aligned_a.push(seqs.syms_a[i - 1].clone());
                aligned_b.push(seqs.syms_b[j - 1].clone());
                i -= 1;
                j -= 1;
            }
            Move::Up => {
                aligned_a.push(seqs.syms_a[i - 1].clone());
                aligned_b.push("-".to_string());
                i -= 1;
            }
            Move::Left => {
                aligned_a.push("-".to_string());
                aligned_b.push(seqs.syms_b[j - 1].clone());
                j -= 1;
            }
            Move::Start => break,
        }
    }

    aligned_a.reverse();
    aligned_b.reverse();
    (aligned_a, aligned_b)
}

fn pad_overlap_ends(
    seqs: &Sequences,
    aligned_a: &mut Vec<String>,
    aligned_b: &mut Vec<String>,
    end_i: usize,
    end_j: usize,
) {
    // Traceback always runs back to (0,0), so only the trailing free gaps
    // past end_i/end_j need to be appended.
    for k in end_i..seqs.syms_a.len() {
        aligned_a.push(seqs.syms_a[k].clone());
        aligned_b.push("-".to_string());
    }
    for k in end_j..seqs.syms_b.len() {
        aligned_a.push("-".to_string());
        aligned_b.push(seqs.syms_b[k].clone());
    }
}

fn pad_local_ends(
    seqs: &Sequences,
    aligned_a: &mut Vec<String>,
    aligned_b: &mut Vec<String>,
    end_i: usize,
    end_j: usize,
) {
    // The traceback stopped at the DP's zero-floor reset, so the window
    // start is recoverable from how many tokens it already consumed.
    let start_i = end_i.saturating_sub(aligned_a.iter().filter(|s| s.as_str() != "-").count());
    let start_j = end_j.saturating_sub(aligned_b.iter().filter(|s| s.as_str() != "-").count());

    let prefix_a = start_i;
    let prefix_b = start_j;
    let suffix_a = seqs.syms_a.len() - end_i;
    let suffix_b = seqs.syms_b.len() - end_j;

    let mut new_a = vec!["-".to_string(); prefix_a];
    let mut new_b = vec!["-".to_string(); prefix_b];
    new_a.append(aligned_a);
    new_b.append(aligned_b);
    new_a.extend(std::iter::repeat("-".to_string()).take(suffix_a));
    new_b.extend(std::iter::repeat("-".to_string()).take(suffix_b));

    *aligned_a = new_a;
    *aligned_b = new_b;
}

/// Dialign mode: maximal-score diagonal runs only; no gap penalty, but no
/// score is gained by skipping through a run (spec.md §4.4). Implemented
/// as a zero-gap-cost longest-weighted-diagonal-chain DP: every row/column
/// skip is free, diagonal steps accumulate `match_score`.
fn dialign_align(seqs: &Sequences, params: &AlignParams) -> (Vec<String>, Vec<String>, f64) {
    let n = seqs.syms_a.len();
    let m = seqs.syms_b.len();
    let mut dp = vec![vec![0.0f64; m + 1]; n + 1];
    let mut trace = vec![vec![Move::Start; m + 1]; n + 1];

    for i in 1..=n {
        for j in 1..=m {
            let diag = dp[i - 1][j - 1] + match_score(seqs, i - 1, j - 1, params);
            let up = dp[i - 1][j];
            let left = dp[i][j - 1];
            let best = diag.max(up).max(left);
            dp[i][j] = best;
            trace[i][j] = if best == diag && diag >= up && diag >= left {
                Move::Diag
            } else if best == up {
                Move::Up
            } else {
                Move::Left
            };
        }
    }

    let (aligned_a, aligned_b) = traceback(seqs, &trace, n, m, false);
    (aligned_a, aligned_b, dp[n][m])
}

fn self_score(syms: &[SegmentSymbol], w: &[f64], prostring: &str, mode: AlignMode, params: &AlignParams) -> f64 {
    let sub = AlignParams {
        gop: params.gop,
        scale: params.scale,
        factor: params.factor,
        scorer: params.scorer,
        mode,
        restricted_chars: params.restricted_chars,
        distance: false,
    };
    align(syms, syms, w, w, prostring, prostring, &sub).score
}

/// Align two segment-symbol sequences under the given mode, returning the
/// aligned sequences (gaps as `"-"`) and either the raw similarity score or
/// (if `params.distance`) the normalized distance in `[0, 1]`.
pub fn align(
    seq_a: &[SegmentSymbol],
    seq_b: &[SegmentSymbol],
    w_a: &[f64],
    w_b: &[f64],
    p_a: &str,
    p_b: &str,
    params: &AlignParams,
) -> Alignment {
    if seq_a.is_empty() || seq_b.is_empty() {
        return align_empty_side(seq_a, seq_b, w_a, w_b, p_a, p_b, params);
    }

    let seqs = prepare(seq_a, seq_b, w_a, w_b, p_a, p_b);

    let (aligned_a, aligned_b, raw_score) = match params.mode {
        AlignMode::Global => gotoh_align(&seqs, params, false, false),
        AlignMode::Overlap => gotoh_align(&seqs, params, false, true),
        AlignMode::Local => gotoh_align(&seqs, params, true, false),
        AlignMode::Dialign => dialign_align(&seqs, params),
    };

    let score = if params.distance {
        let self_a = self_score(seq_a, w_a, p_a, params.mode, params);
        let self_b = self_score(seq_b, w_b, p_b, params.mode, params);
        let denom = self_a.max(self_b);
        if denom <= 0.0 {
            0.0
        } else {
            (1.0 - raw_score / denom).clamp(0.0, 1.0)
        }
    } else {
        raw_score
    };

    Alignment {
        seq_a: aligned_a,
        seq_b: aligned_b,
        score,
    }
}

fn align_empty_side(
    seq_a: &[SegmentSymbol],
    seq_b: &[SegmentSymbol],
    w_a: &[f64],
    w_b: &[f64],
    p_a: &str,
    p_b: &str,
    params: &AlignParams,
) -> Alignment {
    let (nonempty_syms, nonempty_w, nonempty_p, a_is_nonempty) = if seq_a.is_empty() {
        (seq_b, w_b, p_b, false)
    } else {
        (seq_a, w_a, p_a, true)
    };

    let keys: Vec<String> = nonempty_syms.iter().map(|s| s.to_key()).collect();
    let prostring: Vec<char> = nonempty_p.chars().collect();

    let raw_score: f64 = if matches!(params.mode, AlignMode::Local) {
        0.0
    } else {
        keys.iter()
            .enumerate()
            .map(|(k, _)| {
                let restricted = is_restricted(&prostring, k, params.restricted_chars);
                gap_cost(params.gop, nonempty_w[k], params.scale, k > 0, restricted)
            })
            .sum()
    };

    let (aligned_a, aligned_b) = if a_is_nonempty {
        (keys.clone(), vec!["-".to_string(); keys.len()])
    } else {
        (vec!["-".to_string(); keys.len()], keys.clone())
    };

    let score = if params.distance {
        match params.mode {
            AlignMode::Local => 1.0,
            _ => {
                let self_nonempty = self_score(nonempty_syms, nonempty_w, nonempty_p, params.mode, params);
                if self_nonempty <= 0.0 {
                    1.0
                } else {
                    (1.0 - raw_score / self_nonempty).clamp(0.0, 1.0)
                }
            }
        }
    } else {
        raw_score
    };

    Alignment {
        seq_a: aligned_a,
        seq_b: aligned_b,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ScoreMatrix;

    fn syms(lang: u32, classes: &str) -> Vec<SegmentSymbol> {
        classes.chars().map(|c| SegmentSymbol::new(lang, c, 'C')).collect()
    }

    fn toy_scorer() -> ScoreMatrix {
        let mut m = ScoreMatrix::new(-2.0);
        for c in ['p', 'a', 't', 'd', 'x', 'y', 'z', 'q', 'r'] {
            m.set(&format!("1.{c}.C"), &format!("1.{c}.C"), 10.0);
            m.set(&format!("2.{c}.C"), &format!("2.{c}.C"), 10.0);
        }
        m.set("1.p.C", "1.d.C", -1.0);
        m
    }

    fn default_params(scorer: &dyn Scorer, mode: AlignMode, distance: bool) -> AlignParams {
        AlignParams {
            gop: -2.0,
            scale: 0.5,
            factor: 0.3,
            scorer,
            mode,
            restricted_chars: "T_",
            distance,
        }
    }

    #[test]
    fn self_alignment_has_zero_distance() {
        let scorer = toy_scorer();
        let a = syms(1, "pat");
        let params = default_params(&scorer, AlignMode::Global, true);
        let result = align(&a, &a, &[1.0; 3], &[1.0; 3], "CVC", "CVC", &params);
        assert!((result.score - 0.0).abs() < 1e-9);
        assert_eq!(result.seq_a, result.seq_b);
    }

    #[test]
    fn single_substitution_gives_partial_distance() {
        let scorer = toy_scorer();
        let a = syms(1, "pat");
        let b = syms(1, "pad");
        let params = default_params(&scorer, AlignMode::Global, true);
        let result = align(&a, &b, &[1.0; 3], &[1.0; 3], "CVC", "CVC", &params);
        assert!(result.score > 0.0 && result.score < 1.0);
    }

    #[test]
    fn overlap_mode_trailing_gap_is_free() {
        let scorer = toy_scorer();
        let a = syms(1, "kasa");
        let b = syms(1, "kas");
        let params = default_params(&scorer, AlignMode::Overlap, true);
        let result = align(&a, &b, &[1.0; 4], &[1.0; 3], "CVCV", "CVC", &params);
        assert!((result.score - 0.0).abs() < 1e-9);
    }

    #[test]
    fn local_mode_disjoint_sequences_yield_distance_one() {
        let scorer = toy_scorer();
        let a = syms(1, "xyz");
        let b = syms(2, "qqq");
        let params = default_params(&scorer, AlignMode::Local, true);
        let result = align(&a, &b, &[1.0; 3], &[1.0; 3], "CCC", "CCC", &params);
        assert!((result.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_side_local_mode_is_distance_one() {
        let scorer = toy_scorer();
        let a: Vec<SegmentSymbol> = vec![];
        let b = syms(1, "pat");
        let params = default_params(&scorer, AlignMode::Local, true);
        let result = align(&a, &b, &[], &[1.0; 3], "", "CVC", &params);
        assert!((result.score - 1.0).abs() < 1e-9);
        assert_eq!(result.seq_a.iter().filter(|s| s.as_str() != "-").count(), 0);
    }

    #[test]
    fn alignment_mirrors_under_argument_swap() {
        let scorer = toy_scorer();
        let a = syms(1, "pat");
        let b = syms(1, "pad");
        let params = default_params(&scorer, AlignMode::Global, true);
        let ab = align(&a, &b, &[1.0; 3], &[1.0; 3], "CVC", "CVC", &params);
        let ba = align(&b, &a, &[1.0; 3], &[1.0; 3], "CVC", "CVC", &params);
        assert!((ab.score - ba.score).abs() < 1e-9);
    }

    #[test]
    fn local_mode_pads_each_side_by_its_own_trimmed_region() {
        // a = "zap" (n=3), b = "ap" (m=2); the shared local match is a[1..3]
        // vs b[0..2], so a needs a 1-token leading gap and b needs none.
        let scorer = toy_scorer();
        let a = syms(1, "zap");
        let b = syms(1, "ap");
        let params = default_params(&scorer, AlignMode::Local, true);
        let result = align(&a, &b, &[1.0; 3], &[1.0; 2], "CVC", "VC", &params);
        assert_eq!(result.seq_a.len(), 3);
        assert_eq!(result.seq_b.len(), 2);
        assert_eq!(result.seq_b.iter().filter(|s| s.as_str() == "-").count(), 0);
    }
}
