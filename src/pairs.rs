//! Pair Index (spec.md §4.3).
//!
//! Builds a stable id set, indexes into it, then works purely over
//! indices -- generalized from string labels to integer word ids over an
//! external arena (spec.md §9 "arena semantics").

use ahash::AHashMap;

use crate::types::WordRecord;

/// Per unordered language pair, the candidate `(word_id_A, word_id_B)`
/// pairs drawn from concepts present in both languages, excluding entries
/// with the duplicate flag set.
#[derive(Debug, Clone, Default)]
pub struct PairIndex {
    pairs: AHashMap<(u32, u32), Vec<(usize, usize)>>,
    self_pairs: AHashMap<u32, Vec<(usize, usize)>>,
}

fn lang_key(a: u32, b: u32) -> (u32, u32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl PairIndex {
    /// Build the index from a word arena, grouping by concept then
    /// crossing languages within each concept. Every pair stores word ids
    /// (`WordRecord::id`), not array positions, matching the id-keyed
    /// arena (`encoded`, `WordRecord::id` lookups) every other stage reads
    /// pairs back against.
    pub fn build(words: &[WordRecord]) -> Self {
        let mut by_concept: AHashMap<&str, Vec<&WordRecord>> = AHashMap::new();
        for w in words {
            if w.duplicate {
                continue;
            }
            by_concept.entry(w.concept.as_str()).or_default().push(w);
        }

        let mut pairs: AHashMap<(u32, u32), Vec<(usize, usize)>> = AHashMap::new();
        let mut self_pairs: AHashMap<u32, Vec<(usize, usize)>> = AHashMap::new();

        for members in by_concept.values() {
            for (pos_i, &wa) in members.iter().enumerate() {
                for &wb in members.iter().skip(pos_i + 1) {
                    if wa.language_id == wb.language_id {
                        self_pairs.entry(wa.language_id).or_default().push((wa.id, wb.id));
                        continue;
                    }
                    let key = lang_key(wa.language_id, wb.language_id);
                    // Store in the canonical (A,B) order matching the key.
                    let entry = if wa.language_id == key.0 {
                        (wa.id, wb.id)
                    } else {
                        (wb.id, wa.id)
                    };
                    pairs.entry(key).or_default().push(entry);
                }
            }
        }

        // Deduplicate: the same (word_id_A, word_id_B) pair should not
        // appear twice even if concepts overlap oddly upstream.
        for v in pairs.values_mut() {
            v.sort_unstable();
            v.dedup();
        }
        for v in self_pairs.values_mut() {
            v.sort_unstable();
            v.dedup();
        }

        Self { pairs, self_pairs }
    }

    /// All cross-language word pairs sharing a concept, neither side
    /// duplicate-flagged.
    pub fn pairs(&self, a: u32, b: u32) -> &[(usize, usize)] {
        self.pairs
            .get(&lang_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Language-internal word pairs (for self-comparison / diagnostics).
    pub fn self_pairs(&self, language: u32) -> &[(usize, usize)] {
        self.self_pairs
            .get(&language)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn language_pairs(&self) -> impl Iterator<Item = &(u32, u32)> {
        self.pairs.keys()
    }

    pub fn is_empty_for(&self, a: u32, b: u32) -> bool {
        self.pairs(a, b).is_empty()
    }

    /// Restrict `self.pairs(a, b)` to the pairs whose `ref_values` (keyed
    /// by word id) lie in `sublist`, used for Swadesh-style restriction
    /// (spec.md §4.3 `subset(sublist, ref)`).
    pub fn subset(
        &self,
        a: u32,
        b: u32,
        ref_values: &AHashMap<usize, String>,
        sublist: &[String],
    ) -> Vec<(usize, usize)> {
        self.pairs(a, b)
            .iter()
            .filter(|(i, _j)| {
                ref_values
                    .get(i)
                    .map(|v| sublist.iter().any(|s| s == v))
                    .unwrap_or(false)
            })
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(id: usize, concept: &str, lang: u32, dup: bool) -> WordRecord {
        WordRecord {
            id,
            concept: concept.to_string(),
            language_id: lang,
            tokens: vec!["a".into()],
            sonars: vec![1],
            prostring: "V".into(),
            classes: "A".into(),
            numbers: vec![],
            weights: vec![1.0],
            duplicate: dup,
        }
    }

    #[test]
    fn builds_cross_language_pairs_per_concept() {
        let words = vec![
            word(0, "hand", 1, false),
            word(1, "hand", 2, false),
            word(2, "foot", 1, false),
            word(3, "foot", 2, false),
        ];
        let idx = PairIndex::build(&words);
        assert_eq!(idx.pairs(1, 2).len(), 2);
    }

    #[test]
    fn excludes_duplicate_flagged_words() {
        let words = vec![word(0, "hand", 1, false), word(1, "hand", 2, true)];
        let idx = PairIndex::build(&words);
        assert!(idx.is_empty_for(1, 2));
    }

    #[test]
    fn same_language_words_go_to_self_pairs() {
        let words = vec![word(0, "hand", 1, false), word(1, "hand", 1, false)];
        let idx = PairIndex::build(&words);
        assert!(idx.is_empty_for(1, 1) || idx.pairs(1, 1).is_empty());
        assert_eq!(idx.self_pairs(1).len(), 1);
    }

    #[test]
    fn subset_is_contained_in_pairs_and_equals_pairs_for_full_sublist() {
        let words = vec![
            word(0, "hand", 1, false),
            word(1, "hand", 2, false),
            word(2, "foot", 1, false),
            word(3, "foot", 2, false),
        ];
        let idx = PairIndex::build(&words);
        let mut refs = AHashMap::new();
        refs.insert(0, "hand".to_string());
        refs.insert(2, "foot".to_string());

        let sub = idx.subset(1, 2, &refs, &["hand".to_string()]);
        assert!(sub.iter().all(|p| idx.pairs(1, 2).contains(p)));
        assert_eq!(sub.len(), 1);

        let full = idx.subset(1, 2, &refs, &["hand".to_string(), "foot".to_string()]);
        assert_eq!(full.len(), idx.pairs(1, 2).len());
    }
}
