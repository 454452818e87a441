//! Segment Encoder (spec.md §4.1).
//!
//! Maps a word's tokens, sound-class string, and prosodic string into
//! `language_id.sound_class.prosody_class` segment symbols plus a per-token
//! prosodic weight vector. Input is already tokenized grapheme-by-grapheme
//! by the caller, so this generalizes a flat grapheme list to the
//! language-tagged triple spec.md §4.1 requires rather than re-segmenting
//! raw strings.

use ahash::AHashMap;

use crate::types::SegmentSymbol;

/// A caller-supplied mapping that collapses the 11 raw prosodic positions
/// into a smaller set. The default collapses to 5 contexts: ascending
/// consonant `C`, descending consonant `c`, vowel `V`, tone `T`, boundary
/// `_` (spec.md §4.1).
#[derive(Debug, Clone)]
pub struct ContextTransform {
    map: AHashMap<char, char>,
}

impl ContextTransform {
    pub fn new(map: AHashMap<char, char>) -> Self {
        Self { map }
    }

    pub fn apply(&self, raw: char) -> char {
        self.map.get(&raw).copied().unwrap_or(raw)
    }

    /// The default 11-way -> 5-way collapse used by LexStat
    /// (`lexstat_transform` in `lexstat.py`).
    pub fn default_transform() -> Self {
        let mut map = AHashMap::new();
        // Ascending consonants
        for c in ['A', 'B', 'C'] {
            map.insert(c, 'C');
        }
        // Descending consonants
        for c in ['L', 'M', 'N'] {
            map.insert(c, 'c');
        }
        // Vowels (nucleus positions)
        for c in ['X', 'Y', 'Z'] {
            map.insert(c, 'V');
        }
        // Tone
        map.insert('T', 'T');
        // Word boundary
        map.insert('_', '_');
        Self::new(map)
    }
}

impl Default for ContextTransform {
    fn default() -> Self {
        Self::default_transform()
    }
}

/// Encode one word's tokens into segment symbols and prosodic weights.
///
/// `sound_classes` and `prostring` must each have one char per token, the
/// same invariant enforced on [`crate::types::WordRecord`].
pub fn encode_word(
    language_id: u32,
    sound_classes: &str,
    prostring: &str,
    weights: &[f64],
    transform: &ContextTransform,
) -> Vec<SegmentSymbol> {
    sound_classes
        .chars()
        .zip(prostring.chars())
        .map(|(cls, raw_ctx)| SegmentSymbol::new(language_id, cls, transform.apply(raw_ctx)))
        .take(weights.len().max(sound_classes.chars().count()))
        .collect()
}

/// Compute prosodic weights from a raw prosodic string, matching the shape
/// of lingpy's `prosodic_weights`: boundary positions get the lowest
/// weight, nucleus positions the highest, a roughly triangular profile in
/// between.
pub fn prosodic_weights(prostring: &str) -> Vec<f64> {
    let chars: Vec<char> = prostring.chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| match c {
            '_' => 0.0,
            'T' => 1.0,
            'X' | 'Y' | 'Z' => 2.0,
            _ => {
                // Ascending consonants ramp up toward the nucleus,
                // descending consonants ramp down from it.
                let mid = n as f64 / 2.0;
                let dist = (i as f64 - mid).abs();
                1.0 + (mid - dist).max(0.0) / mid.max(1.0)
            }
        })
        .collect()
}
