// End-to-end tests for the label pipeline.
//
// Each test builds a real `HtsPhonemizer` over a temporary cache directory
// and runs `set_up` through label writing, the engine backend, re-alignment
// and extraction. The uniform backend stands in for an acoustic engine: it
// writes a timing label with a fixed duration per phoneme, which is enough
// to check that vowel onsets are pinned to note starts regardless of what
// the engine predicts.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cantor_g2p::{G2pDictionary, SymbolClasses};
use cantor_hts::backend::{EngineBackend, ScoreRequest, UniformBackend};
use cantor_hts::cache::{CacheState, PhonemeTiming};
use cantor_hts::error::EngineError;
use cantor_hts::label::read_label_file;
use cantor_hts::phonemizer::PhonemizerSettings;
use cantor_hts::phrase::{PhraseContext, build_phrase};
use cantor_hts::score::group_notes;
use cantor_hts::{HtsPhonemizer, NoteGroup, ScoreNote, TimeAxis};

fn dictionary() -> G2pDictionary {
    G2pDictionary::builder()
        .add_symbol("a", true)
        .add_symbol("i", true)
        .add_symbol("k", false)
        .add_symbol("s", false)
        .add_symbol("pau", false)
        .add_entry("ka", ["k", "a"])
        .add_entry("ki", ["k", "i"])
        .add_entry("kai", ["k", "a", "i"])
        .add_entry("saki", ["s", "a", "k", "i"])
        .build()
}

fn phonemizer(cache_dir: &Path, backend: Box<dyn EngineBackend>) -> HtsPhonemizer {
    HtsPhonemizer::new(
        "pipeline-test",
        PhonemizerSettings {
            cache_dir: cache_dir.to_path_buf(),
            ..Default::default()
        },
        Arc::new(dictionary()),
        SymbolClasses::default(),
        backend,
    )
}

fn notes(lyrics: &[&str]) -> Vec<ScoreNote> {
    lyrics
        .iter()
        .enumerate()
        .map(|(i, lyric)| ScoreNote::new(lyric, 480 * i as i32, 480, 60 + i as i32))
        .collect()
}

/// Phoneme symbols of every lead group, in order.
fn sung_symbols(phonemizer: &HtsPhonemizer, groups: &[NoteGroup]) -> Vec<String> {
    groups
        .iter()
        .filter(|g| g.first().is_some_and(|n| !n.is_continuation()))
        .flat_map(|g| phonemizer.process(g).unwrap().to_vec())
        .map(|t| t.symbol)
        .collect()
}

fn cache_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

// ---------------------------------------------------------------------------
// Test scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_ka_ki() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(120)));
    let groups = group_notes(&notes(&["ka", "ki"]));
    let report = phonemizer.set_up(&groups, &TimeAxis::default(), 0);
    assert_eq!(report.failed, 0);
    assert_eq!(sung_symbols(&phonemizer, &groups), vec!["k", "a", "k", "i"]);
}

#[test]
fn test_vowel_extension_does_not_duplicate() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(120)));
    let groups = group_notes(&notes(&["ka", "+~a", "ki"]));
    assert_eq!(groups.len(), 2);
    phonemizer.set_up(&groups, &TimeAxis::default(), 0);
    assert_eq!(sung_symbols(&phonemizer, &groups), vec!["k", "a", "k", "i"]);
}

#[test]
fn test_vowels_land_on_note_starts() {
    let root = tempfile::tempdir().unwrap();
    let axis = TimeAxis::new(480, 150.0, 3, 4).with_tempo(1440, 90.0);
    for phoneme_ms in [30, 250] {
        let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(phoneme_ms)));
        let groups = group_notes(&notes(&["ka", "saki", "+", "ki", "ka"]));
        phonemizer.set_up(&groups, &axis, 0);

        let ka = phonemizer.process(&groups[0]).unwrap();
        assert_eq!(ka[1], PhonemeTiming::new("a", 0));
        assert!(ka[0].position < 0, "onset consonant precedes the note");

        // `saki` spans two notes; its second vowel lands on the second note.
        let saki = phonemizer.process(&groups[1]).unwrap();
        let symbols: Vec<&str> = saki.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["s", "a", "k", "i"]);
        assert_eq!(saki[1].position, 0);
        assert_eq!(saki[3].position, 480);

        for group in &groups[2..] {
            let timings = phonemizer.process(group).unwrap();
            assert_eq!(timings.last().unwrap().position, 0, "{}", group[0].lyric);
        }
        std::fs::remove_dir_all(root.path()).unwrap();
        std::fs::create_dir_all(root.path()).unwrap();
    }
}

#[test]
fn test_labels_are_left_in_cache() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(100)));
    let groups = group_notes(&notes(&["ka", "ki"]));
    phonemizer.set_up(&groups, &TimeAxis::default(), 0);

    let dirs = cache_dirs(root.path());
    assert_eq!(dirs.len(), 1);
    let name = dirs[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("lab-") && name.ends_with("_htstemp"), "{name}");

    let full = read_label_file(&dirs[0].join("full_score.lab")).unwrap();
    let symbols: Vec<&str> = full.iter().map(|e| e.symbol()).collect();
    assert_eq!(symbols, vec!["pau", "k", "a", "k", "i", "pau"]);
    assert!(full.iter().all(|e| e.label.contains("/E:") && e.label.contains("/J:")));
    // Times are in 100 ns units: the leading pause is one 2000 ms bar.
    assert_eq!(full[0].end, 20_000_000);
    assert_eq!(read_label_file(&dirs[0].join("mono_timing.lab")).unwrap().len(), 6);
}

#[test]
fn test_set_up_twice_reuses_cache() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(100)));
    let groups = group_notes(&notes(&["ka", "ki"]));
    phonemizer.set_up(&groups, &TimeAxis::default(), 0);
    let first: Vec<PhonemeTiming> = phonemizer.process(&groups[1]).unwrap().to_vec();

    phonemizer.set_up(&groups, &TimeAxis::default(), 0);
    assert_eq!(phonemizer.cache_state(), CacheState::Ready);
    assert_eq!(phonemizer.process(&groups[1]).unwrap(), first.as_slice());
    assert_eq!(cache_dirs(root.path()).len(), 1);
}

#[test]
fn test_continuation_edit_gets_fresh_cache() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(UniformBackend::new(100)));

    let extended = group_notes(&[ScoreNote::new("kai", 0, 480, 60), ScoreNote::new("+~", 480, 480, 62)]);
    let first = phonemizer.set_up(&extended, &TimeAxis::default(), 0);
    assert_eq!(first.failed, 0);

    // `+~` re-sings `a`; a plain `+` moves on to `i`, so the phoneme count changes.
    let plain = group_notes(&[ScoreNote::new("kai", 0, 480, 60), ScoreNote::new("+", 480, 480, 62)]);
    let second = phonemizer.set_up(&plain, &TimeAxis::default(), 0);
    assert_eq!(second.failed, 0);
    assert_eq!(cache_dirs(root.path()).len(), 2);
    let symbols: Vec<String> = phonemizer
        .process(&plain[0])
        .unwrap()
        .iter()
        .map(|t| t.symbol.clone())
        .collect();
    assert_eq!(symbols, vec!["k", "a", "i"]);
}

#[test]
fn test_plain_continuation_is_not_a_slur() {
    let axis = TimeAxis::default();
    let g2p = dictionary();
    let classes = SymbolClasses::default();
    let backend = UniformBackend::new(100);
    let ctx = PhraseContext {
        time_axis: &axis,
        g2p: &g2p,
        classes: &classes,
        backend: &backend,
        lang: "JPN",
        key: 0,
        pause_symbol: "pau",
    };
    let groups = group_notes(&[ScoreNote::new("saki", 0, 480, 60), ScoreNote::new("+", 480, 480, 62)]);
    let built = build_phrase(&ctx, &groups).unwrap();
    let ki = built.phrase.note(2).unwrap();
    assert_eq!(ki.note().symbols().collect::<Vec<_>>(), vec!["k", "i"]);
    assert!(!ki.note().is_slur);
    assert_eq!(ki.e()[25], "0");
    assert_eq!(built.phrase.note(1).unwrap().e()[26], "0");
}

/// Fails any phrase containing the lyric `ki`.
struct PickyBackend(UniformBackend);

impl EngineBackend for PickyBackend {
    fn name(&self) -> &'static str {
        "picky"
    }

    fn send_score(&self, request: &ScoreRequest<'_>) -> Result<PathBuf, EngineError> {
        if request.groups.iter().flatten().any(|n| n.lyric == "ki") {
            return Err(EngineError::Rejected("no ki".to_string()));
        }
        self.0.send_score(request)
    }
}

#[test]
fn test_failed_phrase_is_isolated() {
    let root = tempfile::tempdir().unwrap();
    let mut phonemizer = phonemizer(root.path(), Box::new(PickyBackend(UniformBackend::new(100))));
    // A gap between the notes makes two sentences.
    let groups = vec![
        vec![ScoreNote::new("ka", 0, 480, 60)],
        vec![ScoreNote::new("ki", 960, 480, 60)],
    ];
    let report = phonemizer.set_up(&groups, &TimeAxis::default(), 0);
    assert_eq!((report.phrases, report.failed), (2, 1));
    assert_eq!(phonemizer.process(&groups[0]).unwrap().len(), 2);
    assert_eq!(
        phonemizer.process_or_error_phoneme(&groups[1]),
        vec![PhonemeTiming::new("error", 0)]
    );
}
