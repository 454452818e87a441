//! Random-string generator (spec.md §4.6).
//!
//! Two interchangeable strategies for producing the "expected by chance"
//! correspondence distribution: a per-language Markov bigram model
//! (`MCPhon`) and a segment-shuffle alternative. The `rands`/`limit`/
//! duplicate-pair bookkeeping follows `lexstat.py::_get_randist`; seeding
//! follows `A-U-Supply-glottisdale`'s own Monte-Carlo sampling via
//! `StdRng::seed_from_u64`.

use ahash::AHashMap;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::align::{align, AlignParams};
use crate::config::{LexStatConfig, ScoringMethod};
use crate::corrdist::CorrespondenceDist;
use crate::matrix::Scorer;
use crate::types::SegmentSymbol;

/// A per-language bigram transition model over `(language, sound_class)`
/// symbols, sampled with `Vec<(char, f64)>` weighted tables built from
/// attested words (spec.md §4.6 "Markov-chain phonotactic random string
/// generation").
#[derive(Debug, Clone, Default)]
pub struct MarkovModel {
    // from-class -> Vec<(to-class, cumulative-weight)>
    transitions: AHashMap<char, Vec<(char, f64)>>,
    start_classes: Vec<char>,
}

impl MarkovModel {
    /// Train a bigram model from a language's attested sound-class strings.
    pub fn train(class_strings: &[&str]) -> Self {
        let mut counts: AHashMap<char, AHashMap<char, f64>> = AHashMap::new();
        let mut start_classes = Vec::new();

        for s in class_strings {
            let chars: Vec<char> = s.chars().collect();
            if let Some(&first) = chars.first() {
                start_classes.push(first);
            }
            for w in chars.windows(2) {
                *counts.entry(w[0]).or_default().entry(w[1]).or_insert(0.0) += 1.0;
            }
        }

        let transitions = counts
            .into_iter()
            .map(|(from, tos)| {
                let mut cum = 0.0;
                let table: Vec<(char, f64)> = tos
                    .into_iter()
                    .map(|(to, n)| {
                        cum += n;
                        (to, cum)
                    })
                    .collect();
                (from, table)
            })
            .collect();

        Self {
            transitions,
            start_classes,
        }
    }

    fn sample_start(&self, rng: &mut StdRng) -> Option<char> {
        self.start_classes.choose(rng).copied()
    }

    fn sample_next(&self, from: char, rng: &mut StdRng) -> Option<char> {
        let table = self.transitions.get(&from)?;
        let total = table.last()?.1;
        if total <= 0.0 {
            return None;
        }
        let roll = rng.gen::<f64>() * total;
        table
            .iter()
            .find(|(_, cum)| roll <= *cum)
            .map(|(c, _)| *c)
            .or_else(|| table.last().map(|(c, _)| *c))
    }

    /// Generate a random sound-class string of `len` sound classes.
    pub fn generate(&self, len: usize, rng: &mut StdRng) -> Option<String> {
        if len == 0 {
            return Some(String::new());
        }
        let mut out = String::new();
        let first = self.sample_start(rng)?;
        out.push(first);
        let mut current = first;
        for _ in 1..len {
            let next = self.sample_next(current, rng).unwrap_or(current);
            out.push(next);
            current = next;
        }
        Some(out)
    }
}

/// One language's random-generation source material: sound-class strings,
/// prosodic strings, and weights, needed to rebuild encoded segment
/// sequences for the generated samples.
pub struct LanguageSample<'a> {
    pub language_id: u32,
    pub class_strings: Vec<&'a str>,
    pub prostrings: Vec<&'a str>,
    pub weights: Vec<&'a [f64]>,
}

/// Result of the random-distribution pass: the accumulated expected
/// distribution plus how many random pairs were actually realized (after
/// duplicate skipping against the `limit`), used downstream for the
/// attested/random bias correction in scorer synthesis (spec.md §4.7, §9).
pub struct RandistResult {
    pub dist: CorrespondenceDist,
    pub included_random: usize,
}

fn encode_generated(
    language_id: u32,
    classes: &str,
    prostring: &str,
) -> Vec<SegmentSymbol> {
    classes
        .chars()
        .zip(prostring.chars().chain(std::iter::repeat('C')))
        .map(|(c, p)| SegmentSymbol::new(language_id, c, p))
        .collect()
}

/// Build the expected (random) correspondence distribution for a language
/// pair, by either Markov sampling or segment shuffling of the attested
/// material (spec.md §4.6).
pub fn get_randist(
    lang_a: &LanguageSample,
    lang_b: &LanguageSample,
    base_scorer: &dyn Scorer,
    config: &LexStatConfig,
    run_offset: u64,
) -> RandistResult {
    let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(run_offset));
    let mut dist = CorrespondenceDist::new();
    let mut seen_pairs: std::collections::HashSet<(String, String)> = std::collections::HashSet::new();
    let mut included = 0usize;
    let mut attempts = 0usize;

    let model_a = MarkovModel::train(&lang_a.class_strings);
    let model_b = MarkovModel::train(&lang_b.class_strings);

    while included < config.rands && attempts < config.limit {
        attempts += 1;

        let (classes_a, prostring_a, w_a) = match config.scoring_method {
            ScoringMethod::Markov => {
                let idx = rng.gen_range(0..lang_a.class_strings.len().max(1));
                let len = lang_a.class_strings.get(idx).map(|s| s.chars().count()).unwrap_or(3);
                let Some(c) = model_a.generate(len, &mut rng) else { continue };
                (c, lang_a.prostrings.get(idx).copied().unwrap_or("C").to_string(), lang_a.weights.get(idx).copied().unwrap_or(&[1.0][..]).to_vec())
            }
            ScoringMethod::Shuffle => {
                let idx = rng.gen_range(0..lang_a.class_strings.len().max(1));
                let mut chars: Vec<char> = lang_a.class_strings.get(idx).copied().unwrap_or("").chars().collect();
                chars.shuffle(&mut rng);
                (chars.into_iter().collect(), lang_a.prostrings.get(idx).copied().unwrap_or("C").to_string(), lang_a.weights.get(idx).copied().unwrap_or(&[1.0][..]).to_vec())
            }
        };

        let (classes_b, prostring_b, w_b) = match config.scoring_method {
            ScoringMethod::Markov => {
                let idx = rng.gen_range(0..lang_b.class_strings.len().max(1));
                let len = lang_b.class_strings.get(idx).map(|s| s.chars().count()).unwrap_or(3);
                let Some(c) = model_b.generate(len, &mut rng) else { continue };
                (c, lang_b.prostrings.get(idx).copied().unwrap_or("C").to_string(), lang_b.weights.get(idx).copied().unwrap_or(&[1.0][..]).to_vec())
            }
            ScoringMethod::Shuffle => {
                let idx = rng.gen_range(0..lang_b.class_strings.len().max(1));
                let mut chars: Vec<char> = lang_b.class_strings.get(idx).copied().unwrap_or("").chars().collect();
                chars.shuffle(&mut rng);
                (chars.into_iter().collect(), lang_b.prostrings.get(idx).copied().unwrap_or("C").to_string(), lang_b.weights.get(idx).copied().unwrap_or(&[1.0][..]).to_vec())
            }
        };

        if classes_a.is_empty() || classes_b.is_empty() {
            continue;
        }

        let key = (classes_a.clone(), classes_b.clone());
        if !seen_pairs.insert(key) {
            continue;
        }

        let seq_a = encode_generated(lang_a.language_id, &classes_a, &prostring_a);
        let seq_b = encode_generated(lang_b.language_id, &classes_b, &prostring_b);

        let params = AlignParams {
            gop: config.gop as f64,
            scale: config.scale,
            factor: config.factor,
            scorer: base_scorer,
            mode: config.mode,
            restricted_chars: &config.restricted_chars,
            distance: false,
        };
        let alignment = align(&seq_a, &seq_b, &w_a, &w_b, &prostring_a, &prostring_b, &params);

        for (ka, kb) in alignment.seq_a.iter().zip(alignment.seq_b.iter()) {
            if ka == "-" && kb == "-" {
                continue;
            }
            dist.add_public(lang_a.language_id, lang_b.language_id, ka, kb, 1.0);
        }
        included += 1;
    }

    RandistResult {
        dist,
        included_random: included,
    }
}
