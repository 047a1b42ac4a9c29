// Phrase segmentation, phrase assembly, and timing extraction.
//
// A track's note groups are split into sentences wherever the notes are not
// contiguous. Each sentence becomes one `HtsPhrase`:
//
//   [pau, one bar] [syllables of group 0] ... [syllables of group n] [pau, one bar]
//
// Phrase-relative milliseconds start at 0 at the beginning of the leading
// pause. While assembling, we record an `AlignmentPoint` at the first vowel
// of every syllable (or its first phoneme if it has no vowel) and a final
// one at the end of the trailing pause. The flat phoneme range of each group
// is kept so that, after `timing::realign`, every group's phonemes can be
// turned back into tick offsets from the group's lead note.
//
// Engine invocation sits between `build_phrase` and `extract_timings` and
// lives in `phonemizer.rs`.

use crate::backend::EngineBackend;
use crate::cache::PhonemeTiming;
use crate::context::{HtsNote, HtsPhrase};
use crate::error::PhraseError;
use crate::score::{NoteGroup, ScoreNote};
use crate::syllable::{Syllable, SyllableBuilder, is_vowel_extension};
use crate::time_axis::TimeAxis;
use crate::timing::AlignmentPoint;
use cantor_g2p::{G2p, NULL_SYMBOL, PhonemeType, SymbolClasses};
use std::ops::Range;
use tracing::warn;

/// Everything phrase assembly needs besides the notes.
#[derive(Clone, Copy)]
pub struct PhraseContext<'a> {
    pub time_axis: &'a TimeAxis,
    pub g2p: &'a dyn G2p,
    pub classes: &'a SymbolClasses,
    pub backend: &'a dyn EngineBackend,
    pub lang: &'a str,
    pub key: i32,
    pub pause_symbol: &'a str,
}

impl PhraseContext<'_> {
    pub fn classify(&self, symbol: &str) -> PhonemeType {
        if symbol == NULL_SYMBOL {
            PhonemeType::Null
        } else if self.g2p.is_vowel(symbol) {
            PhonemeType::Vowel
        } else {
            self.classes.classify(symbol)
        }
    }

    /// A note carrying the time-axis fields shared by sung notes and pads.
    fn timed_note(&self, symbols: &[String], position: i32, duration: i32) -> HtsNote {
        let axis = self.time_axis;
        let signature = axis.time_signature_at_tick(position);
        let bar_beat = axis.tick_to_bar_beat(position);
        HtsNote {
            position_ticks: position,
            duration_ticks: duration,
            beat_per_bar: signature.beat_per_bar,
            beat_unit: signature.beat_unit,
            position_bar: bar_beat.bar,
            position_beat: bar_beat.beat,
            key: self.key,
            bpm: axis.bpm_at_tick(position),
            ..HtsNote::with_symbols(symbols, |s| self.classify(s))
        }
    }

    fn pad_note(&self, position: i32, duration: i32, start_ms: i32, end_ms: i32) -> HtsNote {
        HtsNote {
            start_ms,
            end_ms,
            is_rest: true,
            ..self.timed_note(&[self.pause_symbol.to_string()], position, duration)
        }
    }
}

/// Split note groups into sentences at every gap between notes.
pub fn split_sentences(groups: Vec<NoteGroup>) -> Vec<Vec<NoteGroup>> {
    let mut sentences: Vec<Vec<NoteGroup>> = Vec::new();
    for group in groups {
        let contiguous = match (sentences.last().and_then(|s| s.last()), group.first()) {
            (Some(prev), Some(first)) => prev.last().is_some_and(|n| n.end() == first.position),
            _ => false,
        };
        match sentences.last_mut() {
            Some(sentence) if contiguous => sentence.push(group),
            _ => sentences.push(vec![group]),
        }
    }
    sentences
}

/// An assembled phrase plus the bookkeeping needed to map engine timing
/// back onto the score.
#[derive(Debug, Clone)]
pub struct BuiltPhrase {
    pub phrase: HtsPhrase,
    pub anchors: Vec<AlignmentPoint>,
    /// Flat phoneme range per input group; `None` if the group was skipped.
    pub group_ranges: Vec<Option<Range<usize>>>,
    pub start_tick: i32,
    pub lead_ms: i32,
    pub sentence_dur_ms: i32,
}

fn round_ms(ms: f64) -> i32 {
    ms.round() as i32
}

pub fn build_phrase(ctx: &PhraseContext<'_>, groups: &[NoteGroup]) -> Result<BuiltPhrase, PhraseError> {
    let (Some(first), Some(last)) = (
        groups.iter().find_map(|g| g.first()),
        groups.iter().rev().find_map(|g| g.last()),
    ) else {
        return Err(PhraseError::Empty);
    };
    let axis = ctx.time_axis;
    let start_tick = first.position;
    let end_tick = last.end();
    let lead_ticks = axis.bar_length_ticks(start_tick);
    let tail_ticks = axis.bar_length_ticks(end_tick);
    let lead_ms = round_ms(axis.ms_between(start_tick - lead_ticks, start_tick));
    let tail_ms = round_ms(axis.ms_between(end_tick, end_tick + tail_ticks));
    let sentence_dur_ms = lead_ms + round_ms(axis.ms_between(start_tick, end_tick)) + tail_ms;

    let mut notes = vec![ctx.pad_note(start_tick - lead_ticks, lead_ticks, 0, lead_ms)];
    let mut phoneme_count = 1;
    let mut anchors = Vec::new();
    let mut group_ranges = Vec::with_capacity(groups.len());
    let builder = SyllableBuilder::new(ctx.g2p, ctx.pause_symbol);

    for group in groups {
        let syllables = match builder.build(group) {
            Ok(syllables) => syllables,
            Err(e) => {
                let lyric = group.first().map_or("", |n| n.lyric.as_str());
                warn!(lyric, error = %e, "skipping note group");
                group_ranges.push(None);
                continue;
            }
        };
        let range_start = phoneme_count;
        for syllable in &syllables {
            let note = make_note(ctx, syllable, group, start_tick, lead_ms);
            anchors.push(AlignmentPoint::new(
                phoneme_count + note.first_vowel_index(),
                note.start_ms as f64,
            ));
            phoneme_count += note.phonemes.len();
            notes.push(note);
        }
        group_ranges.push(Some(range_start..phoneme_count));
    }

    notes.push(ctx.pad_note(end_tick, tail_ticks, sentence_dur_ms - tail_ms, sentence_dur_ms));
    phoneme_count += 1;
    anchors.push(AlignmentPoint::new(phoneme_count, sentence_dur_ms as f64));

    Ok(BuiltPhrase {
        phrase: HtsPhrase::new(notes, axis.resolution),
        anchors,
        group_ranges,
        start_tick,
        lead_ms,
        sentence_dur_ms,
    })
}

fn make_note(
    ctx: &PhraseContext<'_>,
    syllable: &Syllable,
    group: &[ScoreNote],
    start_tick: i32,
    lead_ms: i32,
) -> HtsNote {
    let axis = ctx.time_axis;
    let source = &syllable.note;
    let mut note = ctx.timed_note(&syllable.symbols, source.position, source.duration);
    note.start_ms = round_ms(axis.ms_between(start_tick, source.position)) + lead_ms;
    note.end_ms = round_ms(axis.ms_between(start_tick, source.end())) + lead_ms;
    note.tone = source.tone;
    note.is_slur = is_vowel_extension(source);
    note.is_rest = note.phonemes.iter().all(|p| p.kind.is_rest());
    if !note.is_rest {
        note.lang = ctx.lang.to_string();
    }
    ctx.backend.customize_note(&mut note, source);
    ctx.backend.customize_phonemes(&mut note.phonemes, group);
    note
}

/// Turn re-aligned positions (phrase ms, one per phoneme) into per-group
/// phoneme timings keyed by lead-note position.
pub fn extract_timings(
    built: &BuiltPhrase,
    groups: &[NoteGroup],
    positions: &[f64],
    time_axis: &TimeAxis,
) -> Vec<(i32, Vec<PhonemeTiming>)> {
    let origin_ms = time_axis.tick_to_ms(built.start_tick) - built.lead_ms as f64;
    let mut results = Vec::new();
    for (group, range) in groups.iter().zip(&built.group_ranges) {
        let (Some(lead), Some(range)) = (group.first(), range) else {
            continue;
        };
        if lead.is_continuation() {
            continue;
        }
        let timings = range
            .clone()
            .filter_map(|flat| {
                let phoneme = built.phrase.phoneme(flat)?.phoneme();
                let ms = *positions.get(flat)?;
                (!phoneme.symbol.is_empty()).then(|| {
                    PhonemeTiming::new(
                        phoneme.symbol.clone(),
                        time_axis.ms_to_tick(origin_ms + ms) - lead.position,
                    )
                })
            })
            .collect();
        results.push((lead.position, timings));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UniformBackend;
    use crate::score::group_notes;
    use cantor_g2p::G2pDictionary;

    fn dict() -> G2pDictionary {
        G2pDictionary::builder()
            .add_symbol("a", true)
            .add_symbol("i", true)
            .add_symbol("k", false)
            .add_symbol("pau", false)
            .add_entry("ka", ["k", "a"])
            .add_symbol("s", false)
            .add_entry("ki", ["k", "i"])
            .add_entry("kai", ["k", "a", "i"])
            .add_entry("saki", ["s", "a", "k", "i"])
            .add_entry("r", ["pau"])
            .build()
    }

    struct Fixture {
        axis: TimeAxis,
        g2p: G2pDictionary,
        classes: SymbolClasses,
        backend: UniformBackend,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                axis: TimeAxis::default(),
                g2p: dict(),
                classes: SymbolClasses::default(),
                backend: UniformBackend::new(100),
            }
        }

        fn ctx(&self) -> PhraseContext<'_> {
            PhraseContext {
                time_axis: &self.axis,
                g2p: &self.g2p,
                classes: &self.classes,
                backend: &self.backend,
                lang: "JPN",
                key: 0,
                pause_symbol: "pau",
            }
        }
    }

    fn ka_ki() -> Vec<NoteGroup> {
        vec![
            vec![ScoreNote::new("ka", 1920, 480, 60)],
            vec![ScoreNote::new("ki", 2400, 480, 62)],
        ]
    }

    #[test]
    fn test_split_sentences() {
        let groups = vec![
            vec![ScoreNote::new("ka", 0, 480, 60)],
            vec![ScoreNote::new("ki", 480, 480, 60), ScoreNote::new("+", 960, 480, 60)],
            vec![ScoreNote::new("ka", 1600, 480, 60)],
            vec![ScoreNote::new("ki", 2080, 480, 60)],
        ];
        let sentences = split_sentences(groups);
        assert_eq!(sentences.len(), 2);
        assert_eq!(sentences[0].len(), 2);
        assert_eq!(sentences[1][0][0].position, 1600);
        assert!(split_sentences(Vec::new()).is_empty());
    }

    #[test]
    fn test_build_phrase_layout() {
        let fixture = Fixture::new();
        let built = build_phrase(&fixture.ctx(), &ka_ki()).unwrap();
        let notes = built.phrase.notes();
        assert_eq!(notes.len(), 4);
        // One 4/4 bar at 120 bpm is 2000 ms.
        assert_eq!(built.lead_ms, 2000);
        assert_eq!(built.sentence_dur_ms, 5000);
        assert_eq!((notes[0].start_ms, notes[0].end_ms), (0, 2000));
        assert_eq!(notes[0].position_ticks, 0);
        assert_eq!((notes[1].start_ms, notes[1].end_ms), (2000, 2500));
        assert_eq!((notes[2].start_ms, notes[2].end_ms), (2500, 3000));
        assert_eq!((notes[3].start_ms, notes[3].end_ms), (3000, 5000));
        assert!(notes[0].is_rest && notes[3].is_rest);
        assert_eq!(notes[1].lang, "JPN");
        assert_eq!(notes[1].position_bar, 1);
        assert_eq!(
            built.anchors,
            vec![
                AlignmentPoint::new(2, 2000.0),
                AlignmentPoint::new(4, 2500.0),
                AlignmentPoint::new(6, 5000.0),
            ]
        );
        assert_eq!(built.group_ranges, vec![Some(1..3), Some(3..5)]);
        let symbols: Vec<&str> = built
            .phrase
            .phoneme_views()
            .map(|v| v.phoneme().symbol.as_str())
            .collect();
        assert_eq!(symbols, vec!["pau", "k", "a", "k", "i", "pau"]);
    }

    #[test]
    fn test_rest_lyric_becomes_rest_note() {
        let fixture = Fixture::new();
        let groups = vec![
            vec![ScoreNote::new("ka", 0, 480, 60)],
            vec![ScoreNote::new("R", 480, 480, 60)],
        ];
        let built = build_phrase(&fixture.ctx(), &groups).unwrap();
        let rest = &built.phrase.notes()[2];
        assert!(rest.is_rest);
        assert!(rest.lang.is_empty());
    }

    #[test]
    fn test_slur_flag_marks_only_vowel_extensions() {
        let fixture = Fixture::new();
        let groups = group_notes(&[ScoreNote::new("saki", 0, 480, 60), ScoreNote::new("+", 480, 480, 62)]);
        let built = build_phrase(&fixture.ctx(), &groups).unwrap();
        let ki = &built.phrase.notes()[2];
        let symbols: Vec<&str> = ki.phonemes.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["k", "i"]);
        assert!(!ki.is_slur, "a plain continuation starts a new syllable");

        let groups = group_notes(&[
            ScoreNote::new("kai", 0, 480, 60),
            ScoreNote::new("+~", 480, 480, 62),
            ScoreNote::new("+", 960, 480, 64),
        ]);
        let built = build_phrase(&fixture.ctx(), &groups).unwrap();
        let slurs: Vec<bool> = built.phrase.notes().iter().map(|n| n.is_slur).collect();
        assert_eq!(slurs, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_empty_group_is_skipped() {
        let fixture = Fixture::new();
        let mut groups = ka_ki();
        groups.insert(1, Vec::new());
        let built = build_phrase(&fixture.ctx(), &groups).unwrap();
        assert_eq!(built.group_ranges[1], None);
        assert_eq!(built.phrase.phoneme_count(), 6);
        assert!(matches!(build_phrase(&fixture.ctx(), &[]), Err(PhraseError::Empty)));
    }

    #[test]
    fn test_extract_timings() {
        let fixture = Fixture::new();
        let groups = ka_ki();
        let built = build_phrase(&fixture.ctx(), &groups).unwrap();
        // Consonants start 50 ms before their vowels.
        let positions = [1000.0, 1950.0, 2000.0, 2450.0, 2500.0, 3000.0];
        let results = extract_timings(&built, &groups, &positions, &fixture.axis);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1920);
        assert_eq!(
            results[0].1,
            vec![PhonemeTiming::new("k", -48), PhonemeTiming::new("a", 0)]
        );
        assert_eq!(results[1].0, 2400);
        assert_eq!(results[1].1[0], PhonemeTiming::new("k", -48));
    }
}
