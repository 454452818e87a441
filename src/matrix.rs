//! Score matrix and the `Scorer` capability (spec.md §3, §4.2, §9 "Scorer as
//! sum type"). Base and derived scorers share one lookup operation and are
//! stored as the same matrix-backed structure; custom external scorers plug
//! in via the same trait.

use ahash::AHashMap;

/// A lookup `seg x seg -> f64` used as the substitution score in alignment.
/// Implemented by [`ScoreMatrix`] (both base and LexStat-derived) and by
/// any caller-supplied custom scorer.
pub trait Scorer {
    fn lookup(&self, a: &str, b: &str) -> f64;
    fn gap_open(&self) -> f64;
}

/// A dense score matrix over a growable set of segment-symbol keys
/// (spec.md §3: "a dense N×N matrix of floats over the set of all segment
/// symbols encountered, with a hash from symbol to row index").
///
/// Uses the same `AHashMap<String, usize>` row-index pattern as other
/// keyed lookups in this crate, generalized from graph nodes to matrix
/// rows/cols.
#[derive(Debug, Clone)]
pub struct ScoreMatrix {
    index: AHashMap<String, usize>,
    keys: Vec<String>,
    data: Vec<Vec<f64>>,
    default_gap_open: f64,
}

impl ScoreMatrix {
    pub fn new(default_gap_open: f64) -> Self {
        Self {
            index: AHashMap::new(),
            keys: Vec::new(),
            data: Vec::new(),
            default_gap_open,
        }
    }

    /// Ensure `key` has a row/col in the matrix, growing it symmetrically.
    pub fn ensure(&mut self, key: &str) -> usize {
        if let Some(&i) = self.index.get(key) {
            return i;
        }
        let i = self.keys.len();
        self.index.insert(key.to_string(), i);
        self.keys.push(key.to_string());
        for row in self.data.iter_mut() {
            row.push(0.0);
        }
        self.data.push(vec![0.0; self.keys.len()]);
        i
    }

    pub fn set(&mut self, a: &str, b: &str, value: f64) {
        let ia = self.ensure(a);
        let ib = self.ensure(b);
        self.data[ia][ib] = value;
        self.data[ib][ia] = value;
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        Some(self.data[ia][ib])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Invariant check: the matrix is symmetric (spec.md §8).
    pub fn is_symmetric(&self) -> bool {
        for (i, row) in self.data.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if (v - self.data[j][i]).abs() > 1e-9 {
                    return false;
                }
            }
        }
        true
    }
}

impl Scorer for ScoreMatrix {
    fn lookup(&self, a: &str, b: &str) -> f64 {
        self.get(a, b).unwrap_or(self.default_gap_open)
    }

    fn gap_open(&self) -> f64 {
        self.default_gap_open
    }
}

/// External interface (spec.md §6): the minimal sound-class substitution
/// model the base scorer is built from, standing in for lingpy's `Model`
/// class.
pub trait SoundClassModel {
    fn score(&self, class_a: char, class_b: char) -> f64;
    fn classes(&self) -> &[char];
}

/// The base scorer: populated once from the sound-class model, ignoring
/// language and prosody (spec.md §4.2). Used directly by the `sca` method
/// and as the starting point for LexStat scorer synthesis.
#[derive(Debug, Clone)]
pub struct BaseScorer {
    matrix: ScoreMatrix,
}

impl BaseScorer {
    /// Populate a symmetric matrix over every `(language, class, prosody)`
    /// symbol key a caller intends to use, scored purely by sound-class
    /// substitution (language and prosody are ignored for the base score,
    /// per spec.md §4.2).
    pub fn from_sound_class_model(
        model: &dyn SoundClassModel,
        language_ids: &[u32],
        prosody_classes: &[char],
        gap_open: f64,
    ) -> Self {
        let mut matrix = ScoreMatrix::new(gap_open);
        let mut keys: Vec<(u32, char, char)> = Vec::new();
        for &lang in language_ids {
            for &cls in model.classes() {
                for &pros in prosody_classes {
                    keys.push((lang, cls, pros));
                }
            }
            keys.push((lang, 'X', '-'));
        }

        for (i, &(la, ca, pa)) in keys.iter().enumerate() {
            for &(lb, cb, pb) in keys.iter().skip(i) {
                let key_a = format!("{la}.{ca}.{pa}");
                let key_b = format!("{lb}.{cb}.{pb}");
                let score = if ca == 'X' || cb == 'X' {
                    gap_open
                } else {
                    model.score(ca, cb)
                };
                matrix.set(&key_a, &key_b, score);
            }
        }
        Self { matrix }
    }

    pub fn matrix(&self) -> &ScoreMatrix {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut ScoreMatrix {
        &mut self.matrix
    }
}

impl Scorer for BaseScorer {
    fn lookup(&self, a: &str, b: &str) -> f64 {
        self.matrix.lookup(a, b)
    }

    fn gap_open(&self) -> f64 {
        self.matrix.gap_open()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ToySoundClasses;
    impl SoundClassModel for ToySoundClasses {
        fn score(&self, a: char, b: char) -> f64 {
            if a == b {
                10.0
            } else {
                -1.0
            }
        }
        fn classes(&self) -> &[char] {
            &['P', 'A', 'T']
        }
    }

    #[test]
    fn score_matrix_grows_symmetrically() {
        let mut m = ScoreMatrix::new(-2.0);
        m.set("1.P.C", "1.A.V", 3.0);
        assert_eq!(m.get("1.P.C", "1.A.V"), Some(3.0));
        assert_eq!(m.get("1.A.V", "1.P.C"), Some(3.0));
        assert!(m.is_symmetric());
    }

    #[test]
    fn missing_key_falls_back_to_gap_open() {
        let m = ScoreMatrix::new(-2.0);
        assert_eq!(m.lookup("x", "y"), -2.0);
    }

    #[test]
    fn base_scorer_diagonal_equals_self_substitution() {
        let model = ToySoundClasses;
        let base = BaseScorer::from_sound_class_model(&model, &[1], &['C', 'V'], -2.0);
        assert_eq!(base.lookup("1.P.C", "1.P.C"), 10.0);
        assert!(base.matrix().is_symmetric());
    }

    #[test]
    fn base_scorer_is_language_and_prosody_agnostic() {
        let model = ToySoundClasses;
        let base = BaseScorer::from_sound_class_model(&model, &[1, 2], &['C', 'V'], -2.0);
        assert_eq!(base.lookup("1.P.C", "2.P.V"), 10.0);
    }
}
