use lexstat_core::config::{LexStatConfig, Method};
use lexstat_core::lexstat::LexStat;
use lexstat_core::matrix::SoundClassModel;
use lexstat_core::types::WordRecord;

struct AsjpLike;

impl SoundClassModel for AsjpLike {
    fn score(&self, a: char, b: char) -> f64 {
        if a == b {
            10.0
        } else {
            -1.0
        }
    }

    fn classes(&self) -> &[char] {
        &['p', 'a', 't', 'm', 'n', 'k', 'o', 's', 'r']
    }
}

fn word(id: usize, concept: &str, lang: u32, classes: &str, prostring: &str) -> WordRecord {
    let n = classes.chars().count();
    WordRecord {
        id,
        concept: concept.to_string(),
        language_id: lang,
        tokens: classes.chars().map(|c| c.to_string()).collect(),
        sonars: vec![5; n],
        prostring: prostring.to_string(),
        classes: classes.to_string(),
        numbers: vec![],
        weights: vec![0.0; n],
        duplicate: false,
    }
}

fn toy_wordlist() -> Vec<WordRecord> {
    vec![
        word(0, "hand", 1, "pat", "CVC"),
        word(1, "hand", 2, "pat", "CVC"),
        word(2, "hand", 3, "mok", "CVC"),
        word(3, "water", 1, "nos", "CVC"),
        word(4, "water", 2, "nos", "CVC"),
        word(5, "water", 3, "kor", "CVC"),
    ]
}

#[test]
fn ingest_encodes_every_well_formed_word() {
    let words = toy_wordlist();
    let model = AsjpLike;
    let config = LexStatConfig::default();
    let (lexstat, report) = LexStat::ingest(words, &model, config).unwrap();
    assert!(report.is_clean());
    assert_eq!(lexstat.words().len(), 6);
}

#[test]
fn ingest_reports_malformed_words_without_aborting() {
    let mut words = toy_wordlist();
    words.push(WordRecord {
        id: 99,
        concept: "broken".into(),
        language_id: 1,
        tokens: vec!["p".into(), "a".into()],
        sonars: vec![5],
        prostring: "CV".into(),
        classes: "PA".into(),
        numbers: vec![],
        weights: vec![0.0, 0.0],
        duplicate: false,
    });
    let model = AsjpLike;
    let config = LexStatConfig::default();
    let (lexstat, report) = LexStat::ingest(words, &model, config).unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(lexstat.words().len(), 6);
}

#[test]
fn edit_dist_clustering_groups_identical_cognates() {
    let words = toy_wordlist();
    let model = AsjpLike;
    let config = LexStatConfig::default();
    let (mut lexstat, _) = LexStat::ingest(words, &model, config).unwrap();

    let assignment = lexstat.cluster(Method::EditDist).unwrap();
    assert_eq!(assignment[&0], assignment[&1]);
    assert_ne!(assignment[&0], assignment[&2]);
    assert_eq!(assignment[&3], assignment[&4]);
}

#[test]
fn lexstat_method_runs_end_to_end_pipeline() {
    let _ = env_logger::builder().is_test(true).try_init();

    let words = toy_wordlist();
    let model = AsjpLike;
    let mut config = LexStatConfig::default();
    config.runs = 50;
    config.rands = 50;
    let (mut lexstat, _) = LexStat::ingest(words, &model, config).unwrap();

    lexstat.get_scorer().unwrap();
    let first = lexstat.cluster(Method::Lexstat).unwrap();
    let second = lexstat.cluster(Method::Lexstat).unwrap();
    assert_eq!(first.len(), second.len());
    assert_eq!(first[&0], first[&1]);
}

#[test]
fn config_round_trips_through_json() {
    let mut config = LexStatConfig::default();
    config.threshold = 0.65;
    let text = config.to_json().unwrap();
    let restored = LexStatConfig::from_json(&text).unwrap();
    assert_eq!(config.signature(), restored.signature());
}
