// Core phoneme types: symbol classification and JSON dictionary records.
//
// These types are shared by the dictionary (which only needs to know whether
// a symbol is a vowel) and by the HTS context model in `cantor_hts` (which
// writes a one-letter phoneme type into every label line).
//
// The type hierarchy is:
// - `PhonemeType`: the label-level class of a symbol (v, c, p, s, b, xx)
// - `SymbolClasses`: the per-voicebank symbol sets used to classify symbols
// - `SymbolDef`: a symbol as stored in JSON (symbol + type string)
// - `EntryDef`: a grapheme entry as stored in JSON (grapheme + phonemes)
//
// Sets are `BTreeSet`s so that iteration order (and therefore any derived
// dictionary) is deterministic.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The HTS label sentinel for "not applicable".
pub const NULL_SYMBOL: &str = "xx";

/// Classification of a phoneme symbol as written in the label's `p0` slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhonemeType {
    Vowel,
    Consonant,
    Pause,
    Silence,
    Break,
    /// Devoiced symbol. Acoustic models only know v/c/p/s/b, so this is
    /// written as a consonant.
    Unvoiced,
    /// The `xx` placeholder symbol.
    Null,
}

impl PhonemeType {
    /// The code written into the label.
    pub fn code(self) -> &'static str {
        match self {
            PhonemeType::Vowel => "v",
            PhonemeType::Consonant | PhonemeType::Unvoiced => "c",
            PhonemeType::Pause => "p",
            PhonemeType::Silence => "s",
            PhonemeType::Break => "b",
            PhonemeType::Null => NULL_SYMBOL,
        }
    }

    /// Pauses, silences and breaks all make the enclosing note a rest.
    pub fn is_rest(self) -> bool {
        matches!(
            self,
            PhonemeType::Pause | PhonemeType::Silence | PhonemeType::Break
        )
    }
}

/// Symbol sets for one voicebank.
///
/// Membership tests are exact string matches, except that rest detection is
/// case-insensitive (lyrics like `PAU` or `Sil` still count as rests).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolClasses {
    #[serde(default)]
    pub vowels: BTreeSet<String>,
    #[serde(default = "default_pauses")]
    pub pauses: BTreeSet<String>,
    #[serde(default = "default_silences")]
    pub silences: BTreeSet<String>,
    #[serde(default = "default_breaks")]
    pub breaks: BTreeSet<String>,
    #[serde(default)]
    pub unvoiced: BTreeSet<String>,
}

fn set_of(symbols: &[&str]) -> BTreeSet<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

fn default_pauses() -> BTreeSet<String> {
    set_of(&["pau"])
}

fn default_silences() -> BTreeSet<String> {
    set_of(&["sil"])
}

fn default_breaks() -> BTreeSet<String> {
    set_of(&["br"])
}

impl Default for SymbolClasses {
    fn default() -> Self {
        SymbolClasses {
            vowels: BTreeSet::new(),
            pauses: default_pauses(),
            silences: default_silences(),
            breaks: default_breaks(),
            unvoiced: BTreeSet::new(),
        }
    }
}

impl SymbolClasses {
    /// Default rest symbols plus the given vowels.
    pub fn with_vowels<I, S>(vowels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        SymbolClasses {
            vowels: vowels.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Classify a symbol. Checked in order: null, vowel, pause, silence,
    /// break, unvoiced; anything else is a consonant.
    pub fn classify(&self, symbol: &str) -> PhonemeType {
        if symbol == NULL_SYMBOL {
            return PhonemeType::Null;
        }
        if self.vowels.contains(symbol) {
            return PhonemeType::Vowel;
        }
        if self.pauses.contains(symbol) {
            return PhonemeType::Pause;
        }
        if self.silences.contains(symbol) {
            return PhonemeType::Silence;
        }
        if self.breaks.contains(symbol) {
            return PhonemeType::Break;
        }
        if self.unvoiced.contains(symbol) {
            return PhonemeType::Unvoiced;
        }
        PhonemeType::Consonant
    }

    /// True if the symbol (compared lowercase) is a pause, silence or break.
    pub fn is_rest_symbol(&self, symbol: &str) -> bool {
        let lower = symbol.to_lowercase();
        self.pauses.contains(&lower) || self.silences.contains(&lower) || self.breaks.contains(&lower)
    }
}

/// A symbol definition as stored in a JSON dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolDef {
    pub symbol: String,
    /// `"vowel"` marks a vowel; any other value is treated as non-vowel
    /// (`"consonant"`, `"stop"`, `"semivowel"`, ...).
    #[serde(rename = "type")]
    pub kind: String,
}

impl SymbolDef {
    pub fn is_vowel(&self) -> bool {
        self.kind.eq_ignore_ascii_case("vowel")
    }
}

/// A grapheme entry as stored in a JSON dictionary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDef {
    pub grapheme: String,
    pub phonemes: Vec<String>,
}
