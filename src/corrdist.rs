//! Correspondence Statistics (spec.md §4.5).
//!
//! Accumulates attested sound-correspondence frequencies from real-word
//! alignments, gated either by a preliminary-cognate ref-equality check
//! (`config.preprocessing`) or by a live per-pair alignment-distance
//! threshold (`config.preprocessing_threshold`, reused as the literal
//! `corrdist` threshold parameter per `lexstat.py::_get_corrdist`'s own
//! reuse of that name in its non-preprocessing branch), then folds the
//! per-mode accumulators together with `1/len(modes)` averaging. Grounded
//! on `lexstat.py::_get_corrdist`, generalized from lingpy's in-place
//! dictionary bookkeeping to an explicit accumulator type built over the
//! crate's `PairIndex`/`ScoreMatrix` types.

use ahash::AHashMap;

use crate::align::{align, AlignParams};
use crate::config::{LexStatConfig, ModeSpec};
use crate::matrix::Scorer;
use crate::pairs::PairIndex;
use crate::types::{CognateAssignment, SegmentSymbol};

/// Attested correspondence counts keyed by `(segment_key_a, segment_key_b)`,
/// accumulated per language pair.
#[derive(Debug, Clone, Default)]
pub struct CorrespondenceDist {
    counts: AHashMap<(u32, u32), AHashMap<(String, String), f64>>,
}

impl CorrespondenceDist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, lang_a: u32, lang_b: u32, key_a: &str, key_b: &str) -> f64 {
        let (la, lb, ka, kb) = canonical_order(lang_a, lang_b, key_a, key_b);
        self.counts
            .get(&(la, lb))
            .and_then(|m| m.get(&(ka, kb)))
            .copied()
            .unwrap_or(0.0)
    }

    /// Accumulate `amount` into the counter for `(key_a, key_b)`, usable by
    /// other accumulation passes (e.g. the random-string generator).
    pub fn add_public(&mut self, lang_a: u32, lang_b: u32, key_a: &str, key_b: &str, amount: f64) {
        self.add(lang_a, lang_b, key_a, key_b, amount);
    }

    fn add(&mut self, lang_a: u32, lang_b: u32, key_a: &str, key_b: &str, amount: f64) {
        let (la, lb, ka, kb) = canonical_order(lang_a, lang_b, key_a, key_b);
        *self
            .counts
            .entry((la, lb))
            .or_default()
            .entry((ka, kb))
            .or_insert(0.0) += amount;
    }

    fn merge_averaged(dists: &[CorrespondenceDist]) -> CorrespondenceDist {
        let mut merged = CorrespondenceDist::new();
        let weight = 1.0 / dists.len().max(1) as f64;
        for dist in dists {
            for (&langs, inner) in &dist.counts {
                for (&(ref ka, ref kb), &count) in inner {
                    merged.add(langs.0, langs.1, ka, kb, count * weight);
                }
            }
        }
        merged
    }

    /// Iterate every `((key_a, key_b), count)` recorded for a language
    /// pair.
    pub fn iter_pair(&self, lang_a: u32, lang_b: u32) -> impl Iterator<Item = (&(String, String), &f64)> {
        let key = if lang_a <= lang_b { (lang_a, lang_b) } else { (lang_b, lang_a) };
        self.counts.get(&key).into_iter().flat_map(|m| m.iter())
    }

    /// Number of distinct segment-pair keys recorded for a language pair.
    pub fn pair_count(&self, lang_a: u32, lang_b: u32) -> usize {
        self.iter_pair(lang_a, lang_b).count()
    }
}

fn canonical_order(lang_a: u32, lang_b: u32, key_a: &str, key_b: &str) -> (u32, u32, String, String) {
    if lang_a <= lang_b {
        (lang_a, lang_b, key_a.to_string(), key_b.to_string())
    } else {
        (lang_b, lang_a, key_b.to_string(), key_a.to_string())
    }
}

/// Build the attested-correspondence distribution from real words.
///
/// `encoded` maps word id to its segment-symbol sequence, weight vector,
/// and prosodic string (produced by [`crate::encode::encode_word`]).
/// `preliminary`, when `config.preprocessing` is set, is a preliminary
/// cognate-class assignment (spec.md §4.5: "restricted to pairs flagged as
/// preliminary-cognate, ref equal on both sides"); otherwise each pair is
/// gated by its own live alignment distance against
/// `config.preprocessing_threshold` (the `corrdist` threshold parameter,
/// reusing that field's name per `lexstat.py::_get_corrdist`).
pub fn get_corrdist(
    encoded: &AHashMap<usize, (Vec<SegmentSymbol>, Vec<f64>, String)>,
    pair_index: &PairIndex,
    base_scorer: &dyn Scorer,
    config: &LexStatConfig,
    preliminary: Option<&CognateAssignment>,
) -> CorrespondenceDist {
    let per_mode: Vec<CorrespondenceDist> = config
        .modes
        .iter()
        .map(|mode_spec| accumulate_one_mode(encoded, pair_index, base_scorer, config, mode_spec, preliminary))
        .collect();

    CorrespondenceDist::merge_averaged(&per_mode)
}

fn accumulate_one_mode(
    encoded: &AHashMap<usize, (Vec<SegmentSymbol>, Vec<f64>, String)>,
    pair_index: &PairIndex,
    base_scorer: &dyn Scorer,
    config: &LexStatConfig,
    mode_spec: &ModeSpec,
    preliminary: Option<&CognateAssignment>,
) -> CorrespondenceDist {
    let mut dist = CorrespondenceDist::new();

    for &(lang_a, lang_b) in pair_index.language_pairs() {
        for &(wid_a, wid_b) in pair_index.pairs(lang_a, lang_b) {
            let Some((seq_a, w_a, p_a)) = encoded.get(&wid_a) else { continue };
            let Some((seq_b, w_b, p_b)) = encoded.get(&wid_b) else { continue };

            let params = AlignParams {
                gop: mode_spec.gop as f64,
                scale: mode_spec.scale,
                factor: config.factor,
                scorer: base_scorer,
                mode: mode_spec.mode,
                restricted_chars: &config.restricted_chars,
                distance: true,
            };
            let alignment = align(seq_a, seq_b, w_a, w_b, p_a, p_b, &params);

            let included = match preliminary {
                Some(map) => match (map.get(&wid_a), map.get(&wid_b)) {
                    (Some(ca), Some(cb)) => ca == cb,
                    _ => false,
                },
                None => alignment.score <= config.preprocessing_threshold,
            };
            if !included {
                continue;
            }

            for (ka, kb) in alignment.seq_a.iter().zip(alignment.seq_b.iter()) {
                if ka == "-" && kb == "-" {
                    continue;
                }
                dist.add(lang_a, lang_b, ka, kb, 1.0);
            }
        }
    }

    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::ScoreMatrix;
    use crate::types::WordRecord;

    #[test]
    fn identical_words_accumulate_diagonal_correspondences() {
        let mut base = ScoreMatrix::new(-2.0);
        for c in ['p', 'a', 't'] {
            base.set(&format!("1.{c}.C"), &format!("1.{c}.C"), 10.0);
            base.set(&format!("2.{c}.C"), &format!("2.{c}.C"), 10.0);
        }
        base.set("1.p.C", "2.p.C", 5.0);
        base.set("1.a.C", "2.a.C", 5.0);
        base.set("1.t.C", "2.t.C", 5.0);

        let words = vec![
            WordRecord {
                id: 0,
                concept: "hand".into(),
                language_id: 1,
                tokens: vec!["p".into(), "a".into(), "t".into()],
                sonars: vec![1, 2, 1],
                prostring: "CVC".into(),
                classes: "pat".into(),
                numbers: vec![],
                weights: vec![1.0, 1.0, 1.0],
                duplicate: false,
            },
            WordRecord {
                id: 1,
                concept: "hand".into(),
                language_id: 2,
                tokens: vec!["p".into(), "a".into(), "t".into()],
                sonars: vec![1, 2, 1],
                prostring: "CVC".into(),
                classes: "pat".into(),
                numbers: vec![],
                weights: vec![1.0, 1.0, 1.0],
                duplicate: false,
            },
        ];

        let mut encoded = AHashMap::new();
        encoded.insert(
            0,
            (
                vec![
                    SegmentSymbol::new(1, 'p', 'C'),
                    SegmentSymbol::new(1, 'a', 'C'),
                    SegmentSymbol::new(1, 't', 'C'),
                ],
                vec![1.0, 1.0, 1.0],
                "CVC".to_string(),
            ),
        );
        encoded.insert(
            1,
            (
                vec![
                    SegmentSymbol::new(2, 'p', 'C'),
                    SegmentSymbol::new(2, 'a', 'C'),
                    SegmentSymbol::new(2, 't', 'C'),
                ],
                vec![1.0, 1.0, 1.0],
                "CVC".to_string(),
            ),
        );

        let pair_index = PairIndex::build(&words);
        let mut config = LexStatConfig::default();
        config.preprocessing = false;

        let dist = get_corrdist(&encoded, &pair_index, &base, &config, None);
        assert!(dist.get(1, 2, "1.p.C", "2.p.C") > 0.0);
        assert_eq!(dist.pair_count(1, 2), 3);
    }
}
