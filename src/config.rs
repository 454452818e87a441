//! Configuration options recognized by the LexStat kernel (spec.md §6).
//!
//! Defaults mirror the `rcParams` defaults recovered from
//! `lingpy.compare.lexstat.LexStat` (`examples/original_source/lingpy/compare/lexstat.py`).

use serde::{Deserialize, Serialize};

/// Pairwise alignment mode (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlignMode {
    Global,
    Local,
    Overlap,
    Dialign,
}

/// Distance engine selected for the distance/cluster stage (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    Sca,
    Lexstat,
    EditDist,
    Turchin,
    Custom,
}

/// Flat-clustering algorithm (spec.md §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterMethod {
    Upgma,
    Single,
    Complete,
    Mcl,
    LinkClustering,
}

/// Random-distribution generation strategy (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoringMethod {
    Markov,
    Shuffle,
}

/// Automatic threshold-selection mode (spec.md §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdMode {
    Average,
    Item,
    Nulld,
    /// The source (`lexstat.py::cluster`) leaves this branch empty; we
    /// preserve the no-op fallthrough to the default threshold rather than
    /// inferring intent (spec.md §9 Open Questions).
    NullditemNoop,
}

/// One `(mode, gop, scale)` triple used for scorer synthesis (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeSpec {
    pub mode: AlignMode,
    pub gop: i32,
    pub scale: f64,
}

impl ModeSpec {
    pub fn new(mode: AlignMode, gop: i32, scale: f64) -> Self {
        Self { mode, gop, scale }
    }
}

/// The full parameter set recognized by the kernel (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexStatConfig {
    pub method: Method,
    pub cluster_method: ClusterMethod,
    pub mode: AlignMode,
    pub modes: Vec<ModeSpec>,
    pub threshold: f64,
    pub gop: i32,
    pub scale: f64,
    pub factor: f64,
    pub restricted_chars: String,
    pub ratio: (i32, i32),
    pub vscale: f64,
    pub scoring_method: ScoringMethod,
    pub runs: usize,
    pub rands: usize,
    pub limit: usize,
    pub preprocessing: bool,
    pub preprocessing_method: Method,
    pub preprocessing_threshold: f64,
    pub subset: bool,
    pub guess_threshold: bool,
    pub gt_mode: ThresholdMode,
    pub gt_trange: (f64, f64, f64),
    pub inflation: f64,
    pub expansion: u32,
    pub max_steps: usize,
    pub add_self_loops: bool,
    pub link_threshold: f64,
    pub force: bool,
    pub seed: u64,
}

impl Default for LexStatConfig {
    fn default() -> Self {
        Self {
            method: Method::Sca,
            cluster_method: ClusterMethod::Upgma,
            mode: AlignMode::Overlap,
            modes: vec![
                ModeSpec::new(AlignMode::Global, -2, 0.5),
                ModeSpec::new(AlignMode::Local, -1, 0.5),
            ],
            threshold: 0.7,
            gop: -2,
            scale: 0.5,
            factor: 0.3,
            restricted_chars: "T_".to_string(),
            ratio: (3, 2),
            vscale: 0.5,
            scoring_method: ScoringMethod::Markov,
            runs: 1000,
            rands: 1000,
            limit: 10_000,
            preprocessing: true,
            preprocessing_method: Method::Sca,
            preprocessing_threshold: 0.45,
            subset: false,
            guess_threshold: false,
            gt_mode: ThresholdMode::Average,
            gt_trange: (0.4, 0.6, 0.02),
            inflation: 2.0,
            expansion: 2,
            max_steps: 1000,
            add_self_loops: true,
            link_threshold: 0.5,
            force: false,
            seed: 1234,
        }
    }
}

impl LexStatConfig {
    /// Validate kind-(2) errors: unknown method/mode, empty `modes`, or a
    /// `ratio` that sums to zero (spec.md §7).
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::LexStatError;
        if self.modes.is_empty() {
            return Err(LexStatError::InvalidParameter("modes list must not be empty".into()));
        }
        if self.ratio.0 + self.ratio.1 == 0 {
            return Err(LexStatError::InvalidParameter("ratio must not sum to zero".into()));
        }
        if self.runs == 0 {
            return Err(LexStatError::InvalidParameter("runs must be positive".into()));
        }
        Ok(())
    }

    /// The parameter-signature string used to memoize the derived scorer:
    /// repeated `get_scorer` calls with an identical signature and
    /// `force == false` are no-ops (spec.md §6, §9).
    pub fn signature(&self) -> String {
        let modestring: Vec<String> = self
            .modes
            .iter()
            .map(|m| format!("{:?}-{}-{:.2}", m.mode, m.gop.abs(), m.scale))
            .collect();
        format!(
            "{}:{}_{:.2}_{}_{:.2}_{}_{:.2}_{}_{:?}_{}:{:?}:{}",
            self.ratio.0,
            self.ratio.1,
            self.vscale,
            self.runs,
            self.preprocessing_threshold,
            modestring.join(":"),
            self.factor,
            self.restricted_chars,
            self.scoring_method,
            self.preprocessing,
            self.cluster_method,
            self.gop,
        )
    }

    /// Serialize to a config file format, for the caller to persist a run's
    /// parameters alongside its output (spec.md §6 ambient configuration).
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| crate::error::LexStatError::InvalidParameter(format!("config serialization failed: {e}")))
    }

    /// Load a configuration previously written by [`LexStatConfig::to_json`],
    /// then run the usual kind-(2) validation over it.
    pub fn from_json(text: &str) -> crate::error::Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| crate::error::LexStatError::InvalidParameter(format!("config parse failed: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(LexStatConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_modes_is_invalid_parameter() {
        let mut cfg = LexStatConfig::default();
        cfg.modes.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_sum_ratio_is_invalid_parameter() {
        let mut cfg = LexStatConfig::default();
        cfg.ratio = (1, -1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn signature_is_stable_for_identical_config() {
        let a = LexStatConfig::default();
        let b = LexStatConfig::default();
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn signature_differs_on_param_change() {
        let a = LexStatConfig::default();
        let mut b = LexStatConfig::default();
        b.vscale = 0.9;
        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn json_round_trip_preserves_signature() {
        let mut cfg = LexStatConfig::default();
        cfg.threshold = 0.6;
        let text = cfg.to_json().unwrap();
        let restored = LexStatConfig::from_json(&text).unwrap();
        assert_eq!(cfg.signature(), restored.signature());
    }

    #[test]
    fn from_json_rejects_malformed_text() {
        assert!(LexStatConfig::from_json("not json").is_err());
    }
}
