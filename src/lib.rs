//! LexStat Core: sound-correspondence scoring and cognate-clustering kernel.
//!
//! Provides Python bindings via PyO3 for:
//! - Segment encoding and pairwise alignment (global/local/overlap/dialign)
//! - Attested/random sound-correspondence statistics and scorer synthesis
//! - Flat cognate clustering (UPGMA/single/complete/MCL/link-clustering)
//! - Automatic threshold estimation

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

pub mod align;
pub mod cluster;
pub mod config;
pub mod corrdist;
pub mod distance;
pub mod encode;
pub mod error;
pub mod lexstat;
pub mod matrix;
pub mod pairs;
pub mod random_gen;
pub mod scorer;
pub mod threshold;
pub mod types;

use config::{AlignMode, ClusterMethod, LexStatConfig, Method, ModeSpec, ScoringMethod, ThresholdMode};
use error::LexStatError;
use lexstat::LexStat as LexStatCore;
use matrix::SoundClassModel;
use types::WordRecord;

impl From<LexStatError> for PyErr {
    fn from(err: LexStatError) -> Self {
        PyValueError::new_err(err.to_string())
    }
}

/// A minimal ASJP-style sound-class substitution model, standing in for a
/// caller-supplied `Model` until one is passed in from the Python side
/// (spec.md §6 "sound_class_model").
struct AsjpSoundClasses;

impl SoundClassModel for AsjpSoundClasses {
    fn score(&self, a: char, b: char) -> f64 {
        if a == b {
            10.0
        } else if CLASSES.contains(&a) && CLASSES.contains(&b) {
            -1.0
        } else {
            -2.0
        }
    }

    fn classes(&self) -> &[char] {
        &CLASSES
    }
}

const CLASSES: [char; 30] = [
    'p', 'b', 'f', 'v', 'm', 'w', 't', 'd', 's', 'z', 'c', 'n', 'r', 'l', 'S', 'Z', 'C', 'j', 'T',
    'y', 'k', 'g', 'x', 'N', 'q', 'G', 'X', 'h', '7', '4',
];

fn parse_align_mode(s: &str) -> PyResult<AlignMode> {
    match s {
        "global" => Ok(AlignMode::Global),
        "local" => Ok(AlignMode::Local),
        "overlap" => Ok(AlignMode::Overlap),
        "dialign" => Ok(AlignMode::Dialign),
        other => Err(PyValueError::new_err(format!("unknown align mode: {other}"))),
    }
}

fn parse_method(s: &str) -> PyResult<Method> {
    match s {
        "sca" => Ok(Method::Sca),
        "lexstat" => Ok(Method::Lexstat),
        "edit-dist" => Ok(Method::EditDist),
        "turchin" => Ok(Method::Turchin),
        "custom" => Ok(Method::Custom),
        other => Err(PyValueError::new_err(format!("unknown method: {other}"))),
    }
}

fn parse_cluster_method(s: &str) -> PyResult<ClusterMethod> {
    match s {
        "upgma" => Ok(ClusterMethod::Upgma),
        "single" => Ok(ClusterMethod::Single),
        "complete" => Ok(ClusterMethod::Complete),
        "mcl" => Ok(ClusterMethod::Mcl),
        "link_clustering" => Ok(ClusterMethod::LinkClustering),
        other => Err(PyValueError::new_err(format!("unknown cluster method: {other}"))),
    }
}

fn parse_scoring_method(s: &str) -> PyResult<ScoringMethod> {
    match s {
        "markov" => Ok(ScoringMethod::Markov),
        "shuffle" => Ok(ScoringMethod::Shuffle),
        other => Err(PyValueError::new_err(format!("unknown scoring method: {other}"))),
    }
}

fn parse_gt_mode(s: &str) -> PyResult<ThresholdMode> {
    match s {
        "average" => Ok(ThresholdMode::Average),
        "item" => Ok(ThresholdMode::Item),
        "nulld" => Ok(ThresholdMode::Nulld),
        "nullditem" => Ok(ThresholdMode::NullditemNoop),
        other => Err(PyValueError::new_err(format!("unknown gt_mode: {other}"))),
    }
}

/// Python-visible word record (spec.md §6 word-list ingestion surface).
#[derive(FromPyObject)]
struct PyWordInput {
    id: usize,
    concept: String,
    language_id: u32,
    tokens: Vec<String>,
    sonars: Vec<i8>,
    prostring: String,
    classes: String,
    weights: Vec<f64>,
    duplicate: bool,
}

fn build_config(
    method: &str,
    cluster_method: &str,
    mode: &str,
    threshold: f64,
    gop: i32,
    scale: f64,
    factor: f64,
    restricted_chars: &str,
    scoring_method: &str,
    runs: usize,
    rands: usize,
    preprocessing: bool,
    preprocessing_threshold: f64,
    guess_threshold: bool,
    gt_mode: &str,
    inflation: f64,
    expansion: u32,
    max_steps: usize,
    link_threshold: f64,
    force: bool,
    seed: u64,
) -> PyResult<LexStatConfig> {
    let mut config = LexStatConfig::default();
    config.method = parse_method(method)?;
    config.cluster_method = parse_cluster_method(cluster_method)?;
    config.mode = parse_align_mode(mode)?;
    config.modes = vec![ModeSpec::new(config.mode, gop, scale)];
    config.threshold = threshold;
    config.gop = gop;
    config.scale = scale;
    config.factor = factor;
    config.restricted_chars = restricted_chars.to_string();
    config.scoring_method = parse_scoring_method(scoring_method)?;
    config.runs = runs;
    config.rands = rands;
    config.preprocessing = preprocessing;
    config.preprocessing_threshold = preprocessing_threshold;
    config.guess_threshold = guess_threshold;
    config.gt_mode = parse_gt_mode(gt_mode)?;
    config.inflation = inflation;
    config.expansion = expansion;
    config.max_steps = max_steps;
    config.link_threshold = link_threshold;
    config.force = force;
    config.seed = seed;
    config.validate()?;
    Ok(config)
}

/// The Python-facing LexStat handle (spec.md §5 operation pipeline):
/// ingest once, call `get_scorer`, then `cluster` as many times as needed
/// with different methods.
#[pyclass]
struct PyLexStat {
    inner: LexStatCore,
}

#[pymethods]
impl PyLexStat {
    #[new]
    #[pyo3(signature = (
        words,
        method = "sca",
        cluster_method = "upgma",
        mode = "overlap",
        threshold = 0.7,
        gop = -2,
        scale = 0.5,
        factor = 0.3,
        restricted_chars = "T_",
        scoring_method = "markov",
        runs = 1000,
        rands = 1000,
        preprocessing = true,
        preprocessing_threshold = 0.45,
        guess_threshold = false,
        gt_mode = "average",
        inflation = 2.0,
        expansion = 2,
        max_steps = 1000,
        link_threshold = 0.5,
        force = false,
        seed = 1234,
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        words: Vec<PyWordInput>,
        method: &str,
        cluster_method: &str,
        mode: &str,
        threshold: f64,
        gop: i32,
        scale: f64,
        factor: f64,
        restricted_chars: &str,
        scoring_method: &str,
        runs: usize,
        rands: usize,
        preprocessing: bool,
        preprocessing_threshold: f64,
        guess_threshold: bool,
        gt_mode: &str,
        inflation: f64,
        expansion: u32,
        max_steps: usize,
        link_threshold: f64,
        force: bool,
        seed: u64,
    ) -> PyResult<(Self, PyIngestReport)> {
        let config = build_config(
            method,
            cluster_method,
            mode,
            threshold,
            gop,
            scale,
            factor,
            restricted_chars,
            scoring_method,
            runs,
            rands,
            preprocessing,
            preprocessing_threshold,
            guess_threshold,
            gt_mode,
            inflation,
            expansion,
            max_steps,
            link_threshold,
            force,
            seed,
        )?;

        let records: Vec<WordRecord> = words
            .into_iter()
            .map(|w| WordRecord {
                id: w.id,
                concept: w.concept,
                language_id: w.language_id,
                tokens: w.tokens,
                sonars: w.sonars,
                prostring: w.prostring,
                classes: w.classes,
                numbers: vec![],
                weights: w.weights,
                duplicate: w.duplicate,
            })
            .collect();

        let model = AsjpSoundClasses;
        let (inner, report) = LexStatCore::ingest(records, &model, config)?;
        Ok((
            Self { inner },
            PyIngestReport {
                failures: report.failures.into_iter().map(|e| e.to_string()).collect(),
            },
        ))
    }

    fn get_scorer(&mut self) -> PyResult<()> {
        self.inner.get_scorer()?;
        Ok(())
    }

    fn cluster(&mut self, method: &str) -> PyResult<std::collections::HashMap<usize, usize>> {
        let method = parse_method(method)?;
        let assignment = self.inner.cluster(method)?;
        Ok(assignment.into_iter().collect())
    }

    fn word_count(&self) -> usize {
        self.inner.words().len()
    }
}

#[pyclass]
struct PyIngestReport {
    #[pyo3(get)]
    failures: Vec<String>,
}

#[pymodule]
fn lexstat_core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyLexStat>()?;
    m.add_class::<PyIngestReport>()?;
    Ok(())
}

