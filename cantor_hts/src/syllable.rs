// Syllable builder: one note group in, one or more syllables out.
//
// A note group is a lyric note plus its continuation notes. The lyric is
// resolved to phoneme symbols, then those symbols are split into syllables
// (one vowel each) and each syllable is paired with exactly one note:
//
// 1. Resolve symbols: phonetic hint -> dictionary lookup of the lowercased
//    lyric -> the lyric itself read as symbols -> a single pause.
// 2. Apply vowel extensions: a `+~` / `+*` continuation note re-sings the
//    current vowel, any other continuation note moves on to the next vowel.
// 3. Reconcile note count against vowel count: too few notes splits the last
//    note, too many merges the tail into one note. Durations are conserved.
// 4. Cut syllables: the first takes everything up to its vowel, each later
//    one takes the consonant cluster before its vowel, and consonants after
//    the last vowel go to the final syllable.
//
// A symbol list with no vowel treats its last symbol as the vowel.

use crate::error::SyllableError;
use crate::score::ScoreNote;
use cantor_g2p::G2p;

/// Continuation lyric used for notes synthesized by splitting.
const SPLIT_LYRIC: &str = "+";
/// Split durations are rounded down to this many ticks.
const SPLIT_GRANULARITY: i32 = 15;

/// `+~` and `+*` continuation notes extend the previous vowel.
pub fn is_vowel_extension(note: &ScoreNote) -> bool {
    note.lyric.starts_with("+~") || note.lyric.starts_with("+*")
}

/// Phoneme symbols sung on one note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Syllable {
    pub symbols: Vec<String>,
    pub note: ScoreNote,
}

pub struct SyllableBuilder<'a> {
    g2p: &'a dyn G2p,
    pause_symbol: &'a str,
}

impl<'a> SyllableBuilder<'a> {
    pub fn new(g2p: &'a dyn G2p, pause_symbol: &'a str) -> Self {
        SyllableBuilder { g2p, pause_symbol }
    }

    fn valid_symbols(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .filter(|s| self.g2p.is_valid_symbol(s))
            .map(str::to_string)
            .collect()
    }

    /// Phoneme symbols for a lead note. Never empty.
    pub fn resolve_symbols(&self, note: &ScoreNote) -> Vec<String> {
        let hint = note
            .phonetic_hint
            .as_deref()
            .filter(|h| !h.trim().is_empty());
        if let Some(hint) = hint {
            let symbols = self.valid_symbols(hint);
            if symbols.is_empty() {
                return vec![self.pause_symbol.to_string()];
            }
            return symbols;
        }
        if let Some(symbols) = self.g2p.query(&note.lyric.to_lowercase())
            && !symbols.is_empty()
        {
            return symbols;
        }
        let symbols = self.valid_symbols(&note.lyric);
        if !symbols.is_empty() {
            return symbols;
        }
        vec![self.pause_symbol.to_string()]
    }

    /// Indices of vowels, or the last index if there are none.
    pub fn vowel_indices(&self, symbols: &[String]) -> Vec<usize> {
        let vowels: Vec<usize> = symbols
            .iter()
            .enumerate()
            .filter(|(_, s)| self.g2p.is_vowel(s))
            .map(|(i, _)| i)
            .collect();
        if vowels.is_empty() && !symbols.is_empty() {
            return vec![symbols.len() - 1];
        }
        vowels
    }

    /// Re-walk the symbols against the group's notes, repeating the current
    /// vowel for each vowel-extension note.
    pub fn apply_extensions(&self, symbols: &[String], notes: &[ScoreNote]) -> Vec<String> {
        let vowels = self.vowel_indices(symbols);
        let Some(&first) = vowels.first() else {
            return symbols.to_vec();
        };
        let mut extended = symbols[..=first].to_vec();
        let mut current = 0;
        for note in notes.iter().skip(1) {
            if current + 1 >= vowels.len() {
                break;
            }
            if is_vowel_extension(note) {
                extended.push(symbols[vowels[current]].clone());
            } else {
                let prev = vowels[current];
                current += 1;
                extended.extend_from_slice(&symbols[prev + 1..=vowels[current]]);
            }
        }
        extended.extend_from_slice(&symbols[vowels[current] + 1..]);
        extended
    }

    pub fn build(&self, group: &[ScoreNote]) -> Result<Vec<Syllable>, SyllableError> {
        let lead = group.first().ok_or(SyllableError::EmptyGroup)?;
        let symbols = self.resolve_symbols(lead);
        let symbols = self.apply_extensions(&symbols, group);
        let vowels = self.vowel_indices(&symbols);

        let notes = if group.len() < vowels.len() {
            handle_not_enough_notes(group, vowels.len())
        } else if group.len() > vowels.len() {
            handle_excess_notes(group, vowels.len())
        } else {
            group.to_vec()
        };
        if notes.len() < vowels.len() {
            return Err(SyllableError::NotEnoughNotes {
                expected: vowels.len(),
                actual: notes.len(),
            });
        }

        let first_vowel = vowels[0];
        let mut syllables = vec![Syllable {
            symbols: symbols[..=first_vowel].to_vec(),
            note: notes[0].clone(),
        }];
        let mut cluster = Vec::new();
        for (i, symbol) in symbols.iter().enumerate().skip(first_vowel + 1) {
            if vowels.contains(&i) {
                cluster.push(symbol.clone());
                syllables.push(Syllable {
                    symbols: std::mem::take(&mut cluster),
                    note: notes[syllables.len()].clone(),
                });
            } else {
                cluster.push(symbol.clone());
            }
        }
        if let Some(last) = syllables.last_mut() {
            last.symbols.extend(cluster);
        }
        Ok(syllables)
    }
}

/// Keep all notes but the last, then split the last into enough pieces to
/// reach `vowel_count`. Pieces after the first are continuation notes.
pub fn handle_not_enough_notes(notes: &[ScoreNote], vowel_count: usize) -> Vec<ScoreNote> {
    let Some((last, head)) = notes.split_last() else {
        return Vec::new();
    };
    let pieces = vowel_count.saturating_sub(head.len()).max(1);
    let piece = last.duration / pieces as i32 / SPLIT_GRANULARITY * SPLIT_GRANULARITY;
    let mut result = head.to_vec();
    let mut position = last.position;
    for i in 0..pieces {
        let duration = if i + 1 == pieces {
            last.duration - piece * (pieces as i32 - 1)
        } else {
            piece
        };
        let mut note = if i == 0 {
            last.clone()
        } else {
            ScoreNote {
                lyric: SPLIT_LYRIC.to_string(),
                phonetic_hint: None,
                ..last.clone()
            }
        };
        note.position = position;
        note.duration = duration;
        position += duration;
        result.push(note);
    }
    result
}

/// Keep the first `vowel_count - 1` notes and merge the rest into one note
/// that keeps the first merged note's lyric, hint and tone.
pub fn handle_excess_notes(notes: &[ScoreNote], vowel_count: usize) -> Vec<ScoreNote> {
    let keep = vowel_count.saturating_sub(1).min(notes.len());
    let mut result = notes[..keep].to_vec();
    if let Some(lead) = notes.get(keep) {
        result.push(ScoreNote {
            duration: notes[keep..].iter().map(|n| n.duration).sum(),
            ..lead.clone()
        });
    }
    result
}
