// HTS context feature model: phonemes, notes, and the phrase that owns them.
//
// The acoustic models consume one label line per phoneme, and each line
// describes a five-phoneme window, the previous/current/next note, and
// phrase-level counts. This module computes those feature arrays.
//
// Ownership is a flat arena: `HtsPhrase` owns its `HtsNote`s, each note owns
// its `HtsPhoneme`s. Neighbour and parent access go through lightweight index
// views (`NoteView`, `PhonemeView`) built on the phrase's lookup tables, so
// there are no back-pointers and no reference cycles. Phoneme neighbours run
// across note boundaries; phoneme *positions* are counted within a note.
//
// Construction is two-pass. Callers build every `HtsNote` (syllable builder
// output plus padding rests), let the engine backend customize them, then
// hand the list to `HtsPhrase::new`, which links indices, sentence
// durations, measure positions and accent distances exactly once. Every
// accessor after that is a pure read, so calling it twice yields the same
// array.
//
// Array sizes and slot meanings are fixed; `label.rs` joins them with the
// separator strings of the label grammar.

use crate::tone::{octave_num, tone_name, write_int};
use cantor_g2p::{NULL_SYMBOL, PhonemeType};
use smallvec::SmallVec;

pub const P_FIELDS: usize = 16;
pub const SYLLABLE_FIELDS: usize = 5;
/// `/D:` and `/F:` carry the first slots of the neighbouring note's `/E:`.
pub const NEIGHBOR_NOTE_FIELDS: usize = 9;
pub const E_FIELDS: usize = 60;
pub const PHRASE_FIELDS: usize = 2;
pub const J_FIELDS: usize = 3;

fn null_fields<const N: usize>() -> [String; N] {
    std::array::from_fn(|_| NULL_SYMBOL.to_string())
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}

fn centiseconds(ms: i32) -> i32 {
    (ms + 5) / 10
}

// ---------------------------------------------------------------------------
// Phoneme
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtsPhoneme {
    pub symbol: String,
    pub kind: PhonemeType,
    /// Backend annotation slots. `xx` unless a backend sets them.
    pub flag1: String,
    pub flag2: String,
    /// 1-based position within the note, forward and backward.
    pub position: usize,
    pub position_backward: usize,
    /// `None` for vowels and when no vowel precedes/follows within the note.
    pub distance_from_previous_vowel: Option<usize>,
    pub distance_to_next_vowel: Option<usize>,
}

impl HtsPhoneme {
    /// Expand a syllable's symbols into phonemes with in-note positions and
    /// vowel distances.
    pub fn expand<F>(symbols: &[String], classify: F) -> SmallVec<[HtsPhoneme; 4]>
    where
        F: Fn(&str) -> PhonemeType,
    {
        let len = symbols.len();
        let mut phonemes: SmallVec<[HtsPhoneme; 4]> = symbols
            .iter()
            .enumerate()
            .map(|(i, symbol)| HtsPhoneme {
                symbol: symbol.clone(),
                kind: classify(symbol),
                flag1: NULL_SYMBOL.to_string(),
                flag2: NULL_SYMBOL.to_string(),
                position: i + 1,
                position_backward: len - i,
                distance_from_previous_vowel: None,
                distance_to_next_vowel: None,
            })
            .collect();

        let mut prev_vowel = None;
        for i in 0..len {
            if phonemes[i].kind == PhonemeType::Vowel {
                prev_vowel = Some(i);
            } else if let Some(v) = prev_vowel {
                phonemes[i].distance_from_previous_vowel = Some(i - v);
            }
        }
        let mut next_vowel = None;
        for i in (0..len).rev() {
            if phonemes[i].kind == PhonemeType::Vowel {
                next_vowel = Some(i);
            } else if let Some(v) = next_vowel {
                phonemes[i].distance_to_next_vowel = Some(v - i);
            }
        }
        phonemes
    }

    pub fn is_vowel(&self) -> bool {
        self.kind == PhonemeType::Vowel
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

/// Accumulated distance in notes, milliseconds and ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Distance {
    pub notes: i32,
    pub ms: i32,
    pub ticks: i32,
}

impl Distance {
    fn advance(&mut self, note: &HtsNote) {
        self.notes += 1;
        self.ms += note.duration_ms();
        self.ticks += note.duration_ticks;
    }
}

/// One sung syllable (or padding rest) in HTS terms.
///
/// Times are milliseconds relative to the start of the padded phrase.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HtsNote {
    pub start_ms: i32,
    pub end_ms: i32,
    pub position_ticks: i32,
    pub duration_ticks: i32,
    pub beat_per_bar: i32,
    pub beat_unit: i32,
    pub position_bar: i32,
    pub position_beat: i32,
    pub key: i32,
    pub bpm: f64,
    pub tone: i32,
    pub is_slur: bool,
    pub is_rest: bool,
    /// Empty for rests.
    pub lang: String,
    pub lang_dependent: Option<String>,
    pub accent: Option<String>,
    pub phonemes: SmallVec<[HtsPhoneme; 4]>,

    // Derived by `HtsPhrase::new`; overwritten on link.
    pub index: usize,
    pub index_backwards: usize,
    pub sentence_start_ms: i32,
    pub sentence_dur_ms: i32,
    pub sentence_start_ticks: i32,
    pub sentence_dur_ticks: i32,
    pub measure_forward: Option<Distance>,
    pub measure_backward: Option<Distance>,
    pub measure_total_ms: i32,
    pub accent_forward: Option<Distance>,
    pub accent_backward: Option<Distance>,
}

impl HtsNote {
    pub fn with_symbols<F>(symbols: &[String], classify: F) -> Self
    where
        F: Fn(&str) -> PhonemeType,
    {
        HtsNote {
            phonemes: HtsPhoneme::expand(symbols, classify),
            ..Default::default()
        }
    }

    pub fn duration_ms(&self) -> i32 {
        self.end_ms - self.start_ms
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.phonemes.iter().map(|p| p.symbol.as_str())
    }

    /// Index of the first vowel phoneme, or 0 if there is none.
    pub fn first_vowel_index(&self) -> usize {
        self.phonemes.iter().position(HtsPhoneme::is_vowel).unwrap_or(0)
    }

    pub fn has_accent(&self) -> bool {
        self.accent.as_deref().is_some_and(|a| !a.is_empty())
    }

    /// This note's syllable summary (`/B:`).
    pub fn b(&self) -> [String; SYLLABLE_FIELDS] {
        [
            self.phonemes.len().to_string(),
            "1".to_string(),
            "1".to_string(),
            if self.lang.is_empty() {
                NULL_SYMBOL.to_string()
            } else {
                self.lang.clone()
            },
            self.lang_dependent
                .clone()
                .unwrap_or_else(|| NULL_SYMBOL.to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Phrase
// ---------------------------------------------------------------------------

/// Note and phoneme counts of a phrase, as seen from its neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhraseSummary {
    pub note_count: usize,
    pub phoneme_count: usize,
}

impl PhraseSummary {
    fn fields(&self) -> [String; PHRASE_FIELDS] {
        [self.note_count.to_string(), self.phoneme_count.to_string()]
    }
}

#[derive(Debug, Clone)]
pub struct HtsPhrase {
    pub resolution: i32,
    pub total_phrases: usize,
    pub total_notes: usize,
    pub total_phonemes: usize,
    pub prev: Option<PhraseSummary>,
    pub next: Option<PhraseSummary>,
    notes: Vec<HtsNote>,
    /// flat phoneme index -> (note index, index within note)
    phoneme_owner: Vec<(usize, usize)>,
    /// note index -> flat index of its first phoneme
    phoneme_offsets: Vec<usize>,
}

impl HtsPhrase {
    pub fn new(notes: Vec<HtsNote>, resolution: i32) -> Self {
        let mut phrase = HtsPhrase {
            resolution,
            total_phrases: 1,
            total_notes: 0,
            total_phonemes: 0,
            prev: None,
            next: None,
            notes,
            phoneme_owner: Vec::new(),
            phoneme_offsets: Vec::new(),
        };
        phrase.link();
        phrase
    }

    fn link(&mut self) {
        self.phoneme_owner.clear();
        self.phoneme_offsets.clear();
        for (n, note) in self.notes.iter().enumerate() {
            self.phoneme_offsets.push(self.phoneme_owner.len());
            self.phoneme_owner
                .extend((0..note.phonemes.len()).map(|p| (n, p)));
        }
        self.total_notes = self.notes.len();
        self.total_phonemes = self.phoneme_owner.len();

        let (start_ms, end_ms, start_ticks, end_ticks) =
            match (self.notes.first(), self.notes.last()) {
                (Some(first), Some(last)) => (
                    first.start_ms,
                    last.end_ms,
                    first.position_ticks,
                    last.position_ticks + last.duration_ticks,
                ),
                _ => (0, 0, 0, 0),
            };
        let count = self.notes.len();
        for (i, note) in self.notes.iter_mut().enumerate() {
            note.index = i;
            note.index_backwards = count - 1 - i;
            note.sentence_start_ms = start_ms;
            note.sentence_dur_ms = end_ms - start_ms;
            note.sentence_start_ticks = start_ticks;
            note.sentence_dur_ticks = end_ticks - start_ticks;
        }

        self.link_measures();
        self.link_accents();
    }

    /// Position of each note within its run of same-bar notes.
    fn link_measures(&mut self) {
        for group in self
            .notes
            .chunk_by_mut(|a, b| a.position_bar == b.position_bar)
        {
            let total_ms: i32 = group.iter().map(HtsNote::duration_ms).sum();
            let mut forward = Distance::default();
            for note in group.iter_mut() {
                note.measure_forward = Some(forward);
                note.measure_total_ms = total_ms;
                forward.advance(note);
            }
            let mut backward = Distance::default();
            for note in group.iter_mut().rev() {
                note.measure_backward = Some(backward);
                backward.advance(note);
            }
        }
    }

    /// Distance to the nearest accent in each direction. Rests reset the
    /// counter, accents reset and start it, other notes only count once an
    /// accent has been seen.
    fn link_accents(&mut self) {
        fn step(note: &HtsNote, counter: &mut Distance) -> Option<Distance> {
            if note.is_rest {
                *counter = Distance::default();
                return None;
            }
            if note.has_accent() {
                *counter = Distance::default();
            } else if counter.notes == 0 {
                return None;
            }
            let recorded = *counter;
            counter.advance(note);
            Some(recorded)
        }

        let mut counter = Distance::default();
        for note in self.notes.iter_mut() {
            note.accent_forward = step(note, &mut counter);
        }
        let mut counter = Distance::default();
        for note in self.notes.iter_mut().rev() {
            note.accent_backward = step(note, &mut counter);
        }
    }

    pub fn notes(&self) -> &[HtsNote] {
        &self.notes
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn phoneme_count(&self) -> usize {
        self.phoneme_owner.len()
    }

    pub fn note(&self, index: usize) -> Option<NoteView<'_>> {
        (index < self.notes.len()).then_some(NoteView {
            phrase: self,
            index,
        })
    }

    pub fn note_views(&self) -> impl Iterator<Item = NoteView<'_>> {
        (0..self.notes.len()).map(move |index| NoteView {
            phrase: self,
            index,
        })
    }

    pub fn phoneme(&self, flat: usize) -> Option<PhonemeView<'_>> {
        (flat < self.phoneme_owner.len()).then_some(PhonemeView { phrase: self, flat })
    }

    pub fn phoneme_views(&self) -> impl Iterator<Item = PhonemeView<'_>> {
        (0..self.phoneme_owner.len()).map(move |flat| PhonemeView { phrase: self, flat })
    }

    /// Flat index of a note's first phoneme.
    pub fn first_phoneme_of(&self, note: usize) -> Option<usize> {
        self.phoneme_offsets.get(note).copied()
    }

    pub fn summary(&self) -> PhraseSummary {
        PhraseSummary {
            note_count: self.notes.len(),
            phoneme_count: self.phoneme_owner.len(),
        }
    }

    /// Ticks per 96th note, at least 1.
    fn ticks_per_96th(&self) -> i32 {
        (self.resolution / 24).max(1)
    }

    /// Tick count in 96th notes, rounded to nearest.
    pub fn ninety_sixths(&self, ticks: i32) -> i32 {
        let unit = self.ticks_per_96th();
        (ticks + unit / 2).div_euclid(unit)
    }

    fn bar_count(&self) -> i32 {
        match (self.notes.first(), self.notes.last()) {
            (Some(first), Some(last)) => last.position_bar - first.position_bar + 1,
            _ => 0,
        }
    }

    /// Previous phrase summary (`/G:`).
    pub fn g(&self) -> [String; PHRASE_FIELDS] {
        self.prev.map(|s| s.fields()).unwrap_or_else(null_fields)
    }

    /// This phrase's note and phoneme counts (`/H:`).
    pub fn h(&self) -> [String; PHRASE_FIELDS] {
        self.summary().fields()
    }

    /// Next phrase summary (`/I:`).
    pub fn i(&self) -> [String; PHRASE_FIELDS] {
        self.next.map(|s| s.fields()).unwrap_or_else(null_fields)
    }

    /// Notes per bar, phonemes per bar, phrase count (`/J:`).
    pub fn j(&self) -> [String; J_FIELDS] {
        let bars = self.bar_count();
        let per_bar = |total: usize| {
            if bars > 0 {
                (total as i64 / bars as i64).to_string()
            } else {
                NULL_SYMBOL.to_string()
            }
        };
        [
            per_bar(self.total_notes),
            per_bar(self.total_phonemes),
            self.total_phrases.to_string(),
        ]
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct NoteView<'a> {
    phrase: &'a HtsPhrase,
    index: usize,
}

impl<'a> NoteView<'a> {
    pub fn note(&self) -> &'a HtsNote {
        &self.phrase.notes[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phrase(&self) -> &'a HtsPhrase {
        self.phrase
    }

    pub fn prev(&self) -> Option<NoteView<'a>> {
        self.index
            .checked_sub(1)
            .and_then(|i| self.phrase.note(i))
    }

    pub fn next(&self) -> Option<NoteView<'a>> {
        self.phrase.note(self.index + 1)
    }

    /// Previous note's syllable summary (`/A:`).
    pub fn a(&self) -> [String; SYLLABLE_FIELDS] {
        self.prev()
            .map(|n| n.note().b())
            .unwrap_or_else(null_fields)
    }

    pub fn b(&self) -> [String; SYLLABLE_FIELDS] {
        self.note().b()
    }

    /// Next note's syllable summary (`/C:`).
    pub fn c(&self) -> [String; SYLLABLE_FIELDS] {
        self.next()
            .map(|n| n.note().b())
            .unwrap_or_else(null_fields)
    }

    /// Leading slots of the previous note's `/E:` (`/D:`).
    pub fn d(&self) -> [String; NEIGHBOR_NOTE_FIELDS] {
        match self.prev() {
            Some(prev) => leading(prev.e()),
            None => null_fields(),
        }
    }

    /// Leading slots of the next note's `/E:` (`/F:`).
    pub fn f(&self) -> [String; NEIGHBOR_NOTE_FIELDS] {
        match self.next() {
            Some(next) => leading(next.e()),
            None => null_fields(),
        }
    }

    /// Semitone interval to a neighbouring note, `p0` when either side is
    /// unpitched or the neighbour is a rest.
    fn interval_to(&self, other: Option<NoteView<'a>>) -> String {
        let note = self.note();
        match other.map(|o| o.note()) {
            Some(o) if note.tone > 0 && o.tone > 0 && !o.is_rest => write_int(o.tone - note.tone),
            _ => "p0".to_string(),
        }
    }

    /// The note context (`/E:`).
    pub fn e(&self) -> [String; E_FIELDS] {
        let note = self.note();
        let phrase = self.phrase;
        let sixths = |ticks: i32| phrase.ninety_sixths(ticks).to_string();
        let mut e: [String; E_FIELDS] = null_fields();

        if !note.is_rest {
            if let Some(name) = tone_name(note.tone) {
                e[0] = name;
            }
            if let Some(octave) = octave_num(note.tone) {
                e[1] = octave;
            }
        }
        e[2] = note.key.to_string();
        e[3] = format!("{}/{}", note.beat_per_bar, note.beat_unit);
        e[4] = note.bpm.to_string();
        e[5] = "1".to_string();
        e[6] = centiseconds(note.duration_ms()).to_string();
        e[7] = sixths(note.duration_ticks);

        let percent = |ms: i32| {
            if note.measure_total_ms > 0 {
                (ms as i64 * 100 / note.measure_total_ms as i64).to_string()
            } else {
                NULL_SYMBOL.to_string()
            }
        };
        if let Some(m) = note.measure_forward {
            e[9] = m.notes.to_string();
            e[11] = centiseconds(m.ms).to_string();
            e[13] = sixths(m.ticks);
            e[15] = percent(m.ms);
        }
        if let Some(m) = note.measure_backward {
            e[10] = m.notes.to_string();
            e[12] = centiseconds(m.ms).to_string();
            e[14] = sixths(m.ticks);
            e[16] = percent(m.ms);
        }

        if note.index > 0 {
            e[17] = note.index.to_string();
        }
        if note.index_backwards > 0 {
            e[18] = note.index_backwards.to_string();
        }
        let start_ms = note.start_ms - note.sentence_start_ms;
        e[19] = ((start_ms + 50) / 100).to_string();
        e[20] = ((note.sentence_dur_ms - start_ms + 50) / 100).to_string();
        let start_ticks = note.position_ticks - note.sentence_start_ticks;
        e[21] = sixths(start_ticks);
        e[22] = sixths(note.sentence_dur_ticks - start_ticks);
        if note.sentence_dur_ms > 0 {
            let elapsed = start_ms as i64 * 100 / note.sentence_dur_ms as i64;
            e[23] = elapsed.to_string();
            e[24] = (100 - elapsed).to_string();
        }

        let prev = self.prev();
        let next = self.next();
        e[25] = flag(note.is_slur && prev.is_some_and(|p| !p.note().is_rest));
        e[26] = flag(next.is_some_and(|n| !n.note().is_rest && n.note().is_slur));
        e[27] = "n".to_string();

        if let Some(a) = note.accent_backward {
            e[28] = a.notes.to_string();
            e[30] = centiseconds(a.ms).to_string();
            e[32] = sixths(a.ticks);
        }
        if let Some(a) = note.accent_forward {
            e[29] = a.notes.to_string();
            e[31] = centiseconds(a.ms).to_string();
            e[33] = sixths(a.ticks);
        }

        e[56] = self.interval_to(prev);
        e[57] = self.interval_to(next);
        e
    }

    pub fn g(&self) -> [String; PHRASE_FIELDS] {
        self.phrase.g()
    }

    pub fn h(&self) -> [String; PHRASE_FIELDS] {
        self.phrase.h()
    }

    pub fn i(&self) -> [String; PHRASE_FIELDS] {
        self.phrase.i()
    }

    pub fn j(&self) -> [String; J_FIELDS] {
        self.phrase.j()
    }
}

fn leading<const N: usize>(e: [String; E_FIELDS]) -> [String; N] {
    let mut iter = e.into_iter();
    std::array::from_fn(|_| iter.next().unwrap_or_else(|| NULL_SYMBOL.to_string()))
}

#[derive(Debug, Clone, Copy)]
pub struct PhonemeView<'a> {
    phrase: &'a HtsPhrase,
    flat: usize,
}

impl<'a> PhonemeView<'a> {
    pub fn index(&self) -> usize {
        self.flat
    }

    pub fn phoneme(&self) -> &'a HtsPhoneme {
        let (note, local) = self.phrase.phoneme_owner[self.flat];
        &self.phrase.notes[note].phonemes[local]
    }

    pub fn note(&self) -> NoteView<'a> {
        NoteView {
            phrase: self.phrase,
            index: self.phrase.phoneme_owner[self.flat].0,
        }
    }

    pub fn prev(&self) -> Option<PhonemeView<'a>> {
        self.flat.checked_sub(1).and_then(|i| self.phrase.phoneme(i))
    }

    pub fn next(&self) -> Option<PhonemeView<'a>> {
        self.phrase.phoneme(self.flat + 1)
    }

    pub fn before_prev(&self) -> Option<PhonemeView<'a>> {
        self.prev().and_then(|p| p.prev())
    }

    pub fn after_next(&self) -> Option<PhonemeView<'a>> {
        self.next().and_then(|n| n.next())
    }

    /// The five-phoneme window and in-note position (`p0..p15`).
    pub fn p(&self) -> [String; P_FIELDS] {
        let me = self.phoneme();
        let window = [
            self.before_prev(),
            self.prev(),
            Some(*self),
            self.next(),
            self.after_next(),
        ];
        let symbol = |v: &Option<PhonemeView<'a>>| {
            v.map(|v| v.phoneme().symbol.clone())
                .unwrap_or_else(|| NULL_SYMBOL.to_string())
        };
        let flag1 = |v: &Option<PhonemeView<'a>>| {
            v.map(|v| v.phoneme().flag1.clone())
                .unwrap_or_else(|| NULL_SYMBOL.to_string())
        };
        let distance = |d: Option<usize>| {
            d.map(|d| d.to_string())
                .unwrap_or_else(|| NULL_SYMBOL.to_string())
        };
        [
            me.kind.code().to_string(),
            symbol(&window[0]),
            symbol(&window[1]),
            symbol(&window[2]),
            symbol(&window[3]),
            symbol(&window[4]),
            flag1(&window[0]),
            flag1(&window[1]),
            flag1(&window[2]),
            flag1(&window[3]),
            flag1(&window[4]),
            me.position.to_string(),
            me.position_backward.to_string(),
            distance(me.distance_from_previous_vowel),
            distance(me.distance_to_next_vowel),
            me.flag2.clone(),
        ]
    }

    /// Phrase-level fields are only written on pause phonemes.
    fn pause_only(&self, fields: [String; PHRASE_FIELDS]) -> [String; PHRASE_FIELDS] {
        if self.phoneme().kind == PhonemeType::Pause {
            fields
        } else {
            null_fields()
        }
    }

    pub fn a(&self) -> [String; SYLLABLE_FIELDS] {
        self.note().a()
    }

    pub fn b(&self) -> [String; SYLLABLE_FIELDS] {
        self.note().b()
    }

    pub fn c(&self) -> [String; SYLLABLE_FIELDS] {
        self.note().c()
    }

    pub fn d(&self) -> [String; NEIGHBOR_NOTE_FIELDS] {
        self.note().d()
    }

    pub fn e(&self) -> [String; E_FIELDS] {
        self.note().e()
    }

    pub fn f(&self) -> [String; NEIGHBOR_NOTE_FIELDS] {
        self.note().f()
    }

    pub fn g(&self) -> [String; PHRASE_FIELDS] {
        self.pause_only(self.phrase.g())
    }

    pub fn h(&self) -> [String; PHRASE_FIELDS] {
        self.pause_only(self.phrase.h())
    }

    pub fn i(&self) -> [String; PHRASE_FIELDS] {
        self.pause_only(self.phrase.i())
    }

    pub fn j(&self) -> [String; J_FIELDS] {
        self.phrase.j()
    }
}
