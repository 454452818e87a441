//! Error kinds for the LexStat kernel (spec.md §7).
//!
//! Kind (1) malformed input is batch-reportable and recoverable by the
//! caller via a cleaned-copy re-ingest. Kind (2) invalid parameter is fatal
//! to the call. Kinds (3)-(5) are logged and downgraded in place rather
//! than propagated -- they never reach this enum's call sites, only the
//! `log::warn!` call sites in `corrdist.rs`/`random_gen.rs`/`scorer.rs`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexStatError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexStatError {
    #[error("malformed input for word {id}: {reason}")]
    MalformedInput { id: usize, reason: String },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("no non-duplicate pairs for language pair ({0}, {1})")]
    InsufficientData(u32, u32),

    #[error("requested {requested} runs exceeds population {population}; downgraded to full enumeration")]
    DegenerateSample { requested: usize, population: usize },

    #[error("non-finite score for segment pair ({0}, {1}); replaced with sentinel -90")]
    NumericalGuard(String, String),
}

/// A batch report of kind-(1) malformed-input failures, collected while
/// ingesting a word list so the caller can drop offenders and re-ingest
/// rather than aborting the whole load.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub failures: Vec<LexStatError>,
}

impl IngestReport {
    pub fn push(&mut self, id: usize, reason: impl Into<String>) {
        self.failures.push(LexStatError::MalformedInput {
            id,
            reason: reason.into(),
        });
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_report_tracks_failures() {
        let mut report = IngestReport::default();
        assert!(report.is_clean());
        report.push(3, "empty tokens");
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 1);
    }

    #[test]
    fn error_messages_are_stable() {
        let e = LexStatError::InsufficientData(1, 2);
        assert_eq!(e.to_string(), "no non-duplicate pairs for language pair (1, 2)");
    }
}
