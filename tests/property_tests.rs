use proptest::prelude::*;

use lexstat_core::align::{align, AlignParams};
use lexstat_core::cluster::logs_transform;
use lexstat_core::config::{AlignMode, LexStatConfig};
use lexstat_core::matrix::{Scorer, ScoreMatrix};
use lexstat_core::types::SegmentSymbol;

const SOUNDS: [char; 8] = ['p', 'a', 't', 'm', 'n', 'o', 's', 'k'];

fn toy_scorer() -> ScoreMatrix {
    let mut m = ScoreMatrix::new(-2.0);
    for c in SOUNDS {
        m.set(&format!("1.{c}.C"), &format!("1.{c}.C"), 10.0);
    }
    m
}

fn syms(classes: &str) -> Vec<SegmentSymbol> {
    classes.chars().map(|c| SegmentSymbol::new(1, c, 'C')).collect()
}

fn sound_string(len: usize) -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(&SOUNDS[..]), 1..=len).prop_map(|cs| cs.into_iter().collect())
}

proptest! {
    #[test]
    fn aligned_distance_stays_within_unit_interval(a in sound_string(6), b in sound_string(6)) {
        let scorer = toy_scorer();
        let wa = vec![1.0; a.chars().count()];
        let wb = vec![1.0; b.chars().count()];
        let pa: String = "C".repeat(a.chars().count());
        let pb: String = "C".repeat(b.chars().count());

        for mode in [AlignMode::Global, AlignMode::Local, AlignMode::Overlap, AlignMode::Dialign] {
            let params = AlignParams {
                gop: -2.0,
                scale: 0.5,
                factor: 0.3,
                scorer: &scorer as &dyn Scorer,
                mode,
                restricted_chars: "",
                distance: true,
            };
            let alignment = align(&syms(&a), &syms(&b), &wa, &wb, &pa, &pb, &params);
            prop_assert!(alignment.score >= 0.0 && alignment.score <= 1.0 + 1e-9);
        }
    }

    #[test]
    fn aligned_distance_is_symmetric_under_argument_swap(a in sound_string(6), b in sound_string(6)) {
        let scorer = toy_scorer();
        let wa = vec![1.0; a.chars().count()];
        let wb = vec![1.0; b.chars().count()];
        let pa: String = "C".repeat(a.chars().count());
        let pb: String = "C".repeat(b.chars().count());

        for mode in [AlignMode::Global, AlignMode::Local, AlignMode::Dialign] {
            let params = AlignParams {
                gop: -2.0,
                scale: 0.5,
                factor: 0.3,
                scorer: &scorer as &dyn Scorer,
                mode,
                restricted_chars: "",
                distance: true,
            };
            let forward = align(&syms(&a), &syms(&b), &wa, &wb, &pa, &pb, &params);
            let backward = align(&syms(&b), &syms(&a), &wb, &wa, &pb, &pa, &params);
            prop_assert!((forward.score - backward.score).abs() < 1e-9);
        }
    }

    #[test]
    fn logs_transform_is_monotonically_decreasing(x in 0.0f64..0.999, y in 0.0f64..0.999) {
        prop_assume!(x < y);
        prop_assert!(logs_transform(x) > logs_transform(y));
    }

    #[test]
    fn config_signature_round_trips_through_json(threshold in 0.0f64..1.0, vscale in 0.0f64..1.0) {
        let mut config = LexStatConfig::default();
        config.threshold = threshold;
        config.vscale = vscale;
        let text = config.to_json().unwrap();
        let restored = LexStatConfig::from_json(&text).unwrap();
        prop_assert_eq!(config.signature(), restored.signature());
    }
}
