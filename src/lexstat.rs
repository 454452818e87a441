//! Top-level orchestration (spec.md §5 operation pipeline): ingest a word
//! list, encode it, build the pair index, synthesize the LexStat scorer,
//! and run the distance/cluster stage -- the same call sequence
//! `lexstat.py::LexStat.__init__` / `get_scorer` / `cluster` drives,
//! reassembled here from the crate's own modules instead of lingpy's
//! in-place `Wordlist` dictionary mutation.

use ahash::AHashMap;
use log::{info, warn};

use crate::config::{LexStatConfig, Method};
use crate::corrdist::{get_corrdist, CorrespondenceDist};
use crate::distance::{build_distance_matrix, cluster_concept_into, method_distance, DistanceContext};
use crate::encode::{encode_word, prosodic_weights, ContextTransform};
use crate::error::{IngestReport, LexStatError, Result};
use crate::matrix::{BaseScorer, Scorer, SoundClassModel};
use crate::pairs::PairIndex;
use crate::random_gen::{get_randist, LanguageSample};
use crate::scorer::ScorerCache;
use crate::threshold::{resolve_threshold, ResolvedThreshold};
use crate::types::{CognateAssignment, SegmentSymbol, WordRecord};

type Encoded = AHashMap<usize, (Vec<SegmentSymbol>, Vec<f64>, String)>;

/// The LexStat computational kernel: owns the word arena, derived
/// encodings, pair index, and caches needed across the scorer-synthesis
/// and clustering stages (spec.md §3, §6).
pub struct LexStat {
    words: Vec<WordRecord>,
    config: LexStatConfig,
    transform: ContextTransform,
    pair_index: PairIndex,
    encoded: Encoded,
    base_scorer: BaseScorer,
    scorer_cache: ScorerCache,
    attested: Option<CorrespondenceDist>,
    random: Option<CorrespondenceDist>,
}

impl LexStat {
    /// Ingest a word list: validate each record (kind-(1) malformed-input
    /// failures are collected, not fatal), encode survivors into segment
    /// symbols, and build the pair index. Mirrors
    /// `lexstat.py::LexStat.__init__`'s wordlist-loading pass (spec.md §7
    /// kind (1)).
    pub fn ingest(
        mut words: Vec<WordRecord>,
        sound_class_model: &dyn SoundClassModel,
        config: LexStatConfig,
    ) -> Result<(Self, IngestReport)> {
        config.validate()?;

        let mut report = IngestReport::default();
        words.retain(|w| match w.validate() {
            Ok(()) => true,
            Err(reason) => {
                warn!("dropping malformed word {}: {reason}", w.id);
                report.push(w.id, reason);
                false
            }
        });

        let transform = ContextTransform::default();
        let language_ids: Vec<u32> = {
            let mut ids: Vec<u32> = words.iter().map(|w| w.language_id).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        };

        let mut encoded: Encoded = AHashMap::new();
        for w in &words {
            let weights = if w.weights.iter().all(|&x| x == 0.0) {
                prosodic_weights(&w.prostring)
            } else {
                w.weights.clone()
            };
            let syms = encode_word(w.language_id, &w.classes, &w.prostring, &weights, &transform);
            encoded.insert(w.id, (syms, weights, w.prostring.clone()));
        }

        let prosody_classes: Vec<char> = ['C', 'c', 'V', 'T', '_'].to_vec();
        let base_scorer = BaseScorer::from_sound_class_model(sound_class_model, &language_ids, &prosody_classes, config.gop as f64);

        let pair_index = PairIndex::build(&words);

        info!("ingested {} words across {} languages", words.len(), language_ids.len());

        Ok((
            Self {
                words,
                config,
                transform,
                pair_index,
                encoded,
                base_scorer,
                scorer_cache: ScorerCache::new(),
                attested: None,
                random: None,
            },
            report,
        ))
    }

    pub fn words(&self) -> &[WordRecord] {
        &self.words
    }

    /// When `config.preprocessing` is set, run a preliminary clustering
    /// (`config.preprocessing_method` at `config.preprocessing_threshold`)
    /// and return its word-id -> class-id assignment, used by
    /// `get_corrdist` to restrict attested-distribution input to
    /// preliminary-cognate pairs (spec.md §4.5, "ref equal on both sides").
    fn preliminary_assignment(&mut self) -> Result<Option<CognateAssignment>> {
        if !self.config.preprocessing {
            return Ok(None);
        }
        let saved_threshold = self.config.threshold;
        self.config.threshold = self.config.preprocessing_threshold;
        // Lexstat as a preprocessing method would recurse back into
        // get_scorer before the attested/random distributions exist.
        let method = match self.config.preprocessing_method {
            Method::Lexstat => Method::Sca,
            other => other,
        };
        let result = self.cluster(method);
        self.config.threshold = saved_threshold;
        result.map(Some)
    }

    pub fn config(&self) -> &LexStatConfig {
        &self.config
    }

    /// Build the attested and random correspondence distributions (spec.md
    /// §4.5, §4.6) and synthesize a derived scorer per language pair
    /// (spec.md §4.7). A no-op if already computed and `config.force` is
    /// false (spec.md §6, §9).
    pub fn get_scorer(&mut self) -> Result<()> {
        if self.attested.is_some() && self.random.is_some() && !self.config.force {
            return Ok(());
        }

        let preliminary = self.preliminary_assignment()?;

        let attested = get_corrdist(
            &self.encoded,
            &self.pair_index,
            &self.base_scorer,
            &self.config,
            preliminary.as_ref(),
        );

        let mut random = CorrespondenceDist::new();
        for (run, &(lang_a, lang_b)) in self.pair_index.language_pairs().enumerate() {
            let sample_a = self.language_sample(lang_a);
            let sample_b = self.language_sample(lang_b);
            if sample_a.class_strings.is_empty() || sample_b.class_strings.is_empty() {
                warn!("insufficient data to build a random sample for language pair ({lang_a}, {lang_b})");
                continue;
            }
            let result = get_randist(&sample_a, &sample_b, &self.base_scorer, &self.config, run as u64);
            for (pair, &count) in result.dist.iter_pair(lang_a, lang_b) {
                // Bias correction: scale the random count to account for
                // any shortfall between the requested `rands` and what was
                // actually realized after duplicate/limit bookkeeping
                // (spec.md §9: preserved exactly, not re-derived).
                let included_attested = self.pair_index.pairs(lang_a, lang_b).len().max(1) as f64;
                let included_random = result.included_random.max(1) as f64;
                let corrected = count * included_attested / included_random;
                random.add_public(lang_a, lang_b, &pair.0, &pair.1, corrected);
            }
        }

        self.attested = Some(attested);
        self.random = Some(random);
        Ok(())
    }

    fn language_sample(&self, language_id: u32) -> LanguageSample {
        let mut class_strings = Vec::new();
        let mut prostrings = Vec::new();
        let mut weights = Vec::new();
        for w in &self.words {
            if w.language_id == language_id {
                class_strings.push(w.classes.as_str());
                prostrings.push(w.prostring.as_str());
                weights.push(w.weights.as_slice());
            }
        }
        LanguageSample {
            language_id,
            class_strings,
            prostrings,
            weights,
        }
    }

    /// Fetch (synthesizing and caching if needed) the scorer for one
    /// language pair.
    pub fn scorer_for(&mut self, lang_a: u32, lang_b: u32) -> Result<&dyn Scorer> {
        let alphabet_a = self.language_alphabet(lang_a);
        let alphabet_b = self.language_alphabet(lang_b);
        let average_gop = self.average_gop();
        let attested = self.attested.as_ref().ok_or_else(|| {
            LexStatError::InvalidParameter("get_scorer must be called before scorer_for".into())
        })?;
        let random = self.random.as_ref().ok_or_else(|| {
            LexStatError::InvalidParameter("get_scorer must be called before scorer_for".into())
        })?;
        Ok(self.scorer_cache.get_or_synthesize(
            lang_a,
            lang_b,
            &alphabet_a,
            &alphabet_b,
            attested,
            random,
            &self.base_scorer,
            average_gop,
            &self.config,
        ))
    }

    /// Every segment-symbol key attested in `language_id`'s words (lingpy's
    /// `self.freqs[taxon]`), used as the row/column alphabet for that
    /// language's side of a synthesized pair scorer (spec.md §4.7).
    fn language_alphabet(&self, language_id: u32) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        for w in &self.words {
            if w.language_id != language_id {
                continue;
            }
            if let Some((syms, _, _)) = self.encoded.get(&w.id) {
                for s in syms {
                    seen.insert(s.to_key());
                }
            }
        }
        seen.into_iter().collect()
    }

    /// Mean gap-open across `config.modes` (spec.md §4.7's "average_gop"),
    /// used as the blended "sim" term for any symbol pair touching a gap.
    fn average_gop(&self) -> f64 {
        let modes = &self.config.modes;
        if modes.is_empty() {
            return self.config.gop as f64;
        }
        modes.iter().map(|m| m.gop as f64).sum::<f64>() / modes.len() as f64
    }

    /// Run the distance/cluster stage over every concept (spec.md §4.8),
    /// producing a single cross-concept cognate-class assignment.
    ///
    /// Distance matrices are built for every concept first; only then is
    /// the clustering threshold resolved (spec.md §4.9) and the actual
    /// flat-clustering pass run, so `config.guess_threshold` has a real
    /// effect on the returned assignment rather than being computed and
    /// discarded.
    pub fn cluster(&mut self, method: Method) -> Result<CognateAssignment> {
        if matches!(method, Method::Lexstat) {
            self.get_scorer()?;
        }

        let mut by_concept: AHashMap<&str, Vec<usize>> = AHashMap::new();
        for w in &self.words {
            if w.duplicate {
                continue;
            }
            by_concept.entry(w.concept.as_str()).or_default().push(w.id);
        }

        let mut assignment = CognateAssignment::default();
        let mut next_id = 0usize;

        let mut concepts: Vec<&&str> = by_concept.keys().collect();
        concepts.sort();

        // Pass 1: build each multi-word concept's distance matrix. Singleton
        // concepts need no clustering and get their class id immediately.
        let mut concept_matrices: Vec<(Vec<usize>, Vec<Vec<f64>>)> = Vec::new();
        let mut attested_distances = Vec::new();

        for concept in concepts {
            let word_ids = &by_concept[concept];
            if word_ids.len() < 2 {
                for &wid in word_ids {
                    assignment.insert(wid, next_id);
                    next_id += 1;
                }
                continue;
            }

            let attested = self.attested.as_ref();
            let random = self.random.as_ref();
            let words = &self.words;
            let encoded = &self.encoded;
            let base_scorer = &self.base_scorer;
            let config = &self.config;
            let average_gop = self.average_gop();

            let alphabet_of = |language_id: u32| -> Vec<String> {
                let mut seen = std::collections::BTreeSet::new();
                for w in words.iter().filter(|w| w.language_id == language_id) {
                    if let Some((syms, _, _)) = encoded.get(&w.id) {
                        for s in syms {
                            seen.insert(s.to_key());
                        }
                    }
                }
                seen.into_iter().collect()
            };

            let pairwise = |wid_a: usize, wid_b: usize| -> f64 {
                let la = words.iter().find(|w| w.id == wid_a).map(|w| w.language_id).unwrap_or(0);
                let lb = words.iter().find(|w| w.id == wid_b).map(|w| w.language_id).unwrap_or(0);

                let scorer: Box<dyn Scorer> = if matches!(method, Method::Lexstat) {
                    match (attested, random) {
                        (Some(a), Some(r)) => {
                            let alphabet_a = alphabet_of(la);
                            let alphabet_b = alphabet_of(lb);
                            Box::new(crate::scorer::synthesize_pair_scorer(
                                la,
                                lb,
                                &alphabet_a,
                                &alphabet_b,
                                a,
                                r,
                                base_scorer,
                                average_gop,
                                config,
                            ))
                        }
                        _ => Box::new(base_scorer.matrix().clone()),
                    }
                } else {
                    Box::new(base_scorer.matrix().clone())
                };

                let ctx = DistanceContext {
                    words,
                    encoded,
                    base_scorer,
                    lexstat_scorer: Some(scorer.as_ref()),
                    custom: None,
                };
                method_distance(method, wid_a, wid_b, config, &ctx)
            };

            let matrix = build_distance_matrix(word_ids, pairwise);
            for row in &matrix {
                attested_distances.extend(row.iter().copied());
            }
            concept_matrices.push((word_ids.clone(), matrix));
        }

        // Resolve the threshold (possibly per-concept) before clustering.
        let resolved = if self.config.guess_threshold {
            let all_matrices: Vec<Vec<Vec<f64>>> = concept_matrices.iter().map(|(_, m)| m.clone()).collect();
            let random_distances = if matches!(self.config.gt_mode, crate::config::ThresholdMode::Nulld) {
                self.null_distance_sample(method)
            } else {
                Vec::new()
            };
            let resolved = resolve_threshold(&self.config, &all_matrices, &attested_distances, &random_distances);
            info!("guessed clustering threshold: {resolved:?}");
            resolved
        } else {
            ResolvedThreshold::Global(self.config.threshold)
        };

        // Pass 2: flat-cluster every concept at its resolved threshold.
        for (idx, (word_ids, matrix)) in concept_matrices.iter().enumerate() {
            let threshold = resolved.for_concept(idx, self.config.threshold);
            if threshold == self.config.threshold {
                cluster_concept_into(word_ids, matrix, &self.config, &mut assignment, &mut next_id);
            } else {
                let mut cfg = self.config.clone();
                cfg.threshold = threshold;
                cluster_concept_into(word_ids, matrix, &cfg, &mut assignment, &mut next_id);
            }
        }

        Ok(assignment)
    }

    /// Empirical null distribution for `gt_mode == nulld`: align each real
    /// word against a random *different* word drawn from the same
    /// language-pair's pair list and collect the resulting distances
    /// (spec.md §4.9 "nulld").
    fn null_distance_sample(&mut self, method: Method) -> Vec<f64> {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(0xE1D1));
        let mut samples = Vec::new();

        let language_pairs: Vec<(u32, u32)> = self.pair_index.language_pairs().copied().collect();
        for (lang_a, lang_b) in language_pairs {
            let pairs = self.pair_index.pairs(lang_a, lang_b).to_vec();
            if pairs.len() < 2 {
                continue;
            }
            for &(wid_a, _) in &pairs {
                let Some(&(_, other_b)) = pairs.choose(&mut rng) else { continue };
                let distance = self.pairwise_distance(wid_a, other_b, method);
                samples.push(distance);
            }
        }

        samples
    }

    fn pairwise_distance(&self, wid_a: usize, wid_b: usize, method: Method) -> f64 {
        let words = &self.words;
        let encoded = &self.encoded;
        let base_scorer = &self.base_scorer;
        let config = &self.config;

        let la = words.iter().find(|w| w.id == wid_a).map(|w| w.language_id).unwrap_or(0);
        let lb = words.iter().find(|w| w.id == wid_b).map(|w| w.language_id).unwrap_or(0);

        let scorer: Box<dyn Scorer> = if matches!(method, Method::Lexstat) {
            match (&self.attested, &self.random) {
                (Some(a), Some(r)) => {
                    let alphabet_a = self.language_alphabet(la);
                    let alphabet_b = self.language_alphabet(lb);
                    let average_gop = self.average_gop();
                    Box::new(crate::scorer::synthesize_pair_scorer(
                        la, lb, &alphabet_a, &alphabet_b, a, r, base_scorer, average_gop, config,
                    ))
                }
                _ => Box::new(base_scorer.matrix().clone()),
            }
        } else {
            Box::new(base_scorer.matrix().clone())
        };

        let ctx = DistanceContext {
            words,
            encoded,
            base_scorer,
            lexstat_scorer: Some(scorer.as_ref()),
            custom: None,
        };
        method_distance(method, wid_a, wid_b, config, &ctx)
    }
}
