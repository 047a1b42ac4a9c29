// NEUTRINO-style phone tables and conf files.
//
// A voicebank ships two text files describing its phoneme inventory:
//
// - a *table* (`japanese.utf_8.table`): one `grapheme ph1 ph2 ...` line per
//   lyric, whitespace separated;
// - a *conf* (`japanese.utf_8.conf`): `KEY="a,b,c"` lines naming symbol
//   classes (`VOWELS`, `PAUSES`, `SILENCES`, `BREAK`, `PHONEME_CL`,
//   `UNVOICED`) and lyric suffixes (`VOWEL_REDUCTION`, `MACRON`).
//
// This module only parses text; reading the files is the caller's job (see
// `cantor_hts::config`). `PhoneTable::to_dictionary()` compiles both into a
// `G2pDictionary`, deriving extra entries for every vowel-reduction suffix
// (the entry with its vowels dropped) and every macron suffix (the entry
// with its vowels sung again). The derived macron graphemes are reported by
// `macron_lyrics()` so the label writer can flag them.

use crate::dictionary::G2pDictionary;
use crate::error::DictionaryError;
use crate::types::SymbolClasses;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

pub const VOWELS: &str = "VOWELS";
pub const PAUSES: &str = "PAUSES";
pub const SILENCES: &str = "SILENCES";
pub const BREAK: &str = "BREAK";
pub const CONSONANTS: &str = "PHONEME_CL";
pub const UNVOICED: &str = "UNVOICED";
pub const VOWEL_REDUCTION: &str = "VOWEL_REDUCTION";
pub const MACRON: &str = "MACRON";

/// Lyrics the editor commonly uses for rests, mapped onto rest symbols.
const REST_ALIASES: &[(&str, &str)] = &[("R", "pau"), ("-", "pau"), ("SP", "pau"), ("AP", "br")];

/// Parsed table entries plus conf keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneTable {
    entries: BTreeMap<String, Vec<String>>,
    conf: BTreeMap<String, Vec<String>>,
}

impl Default for PhoneTable {
    fn default() -> Self {
        let mut conf = BTreeMap::new();
        conf.insert(SILENCES.to_string(), vec!["sil".to_string()]);
        conf.insert(PAUSES.to_string(), vec!["pau".to_string()]);
        conf.insert(BREAK.to_string(), vec!["br".to_string()]);
        PhoneTable {
            entries: BTreeMap::new(),
            conf,
        }
    }
}

impl PhoneTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a table from text, starting from the default conf.
    pub fn from_table_str(text: &str) -> Result<Self, DictionaryError> {
        let mut table = PhoneTable::new();
        table.merge_table_str(text)?;
        Ok(table)
    }

    /// Add every `grapheme ph1 ph2 ...` line. Blank lines are ignored.
    pub fn merge_table_str(&mut self, text: &str) -> Result<(), DictionaryError> {
        for (i, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let Some(grapheme) = parts.next() else {
                continue;
            };
            let phonemes: Vec<String> = parts.map(str::to_string).collect();
            if phonemes.is_empty() {
                return Err(DictionaryError::EmptyEntry {
                    line: i + 1,
                    grapheme: grapheme.to_string(),
                });
            }
            self.entries.insert(grapheme.to_string(), phonemes);
        }
        Ok(())
    }

    /// Merge `KEY="a,b,c"` lines. Lines without `=` (comments, headers) are
    /// skipped; a later key replaces an earlier one.
    pub fn merge_conf_str(&mut self, text: &str) -> Result<(), DictionaryError> {
        for (i, line) in text.lines().enumerate() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.starts_with('#') {
                continue;
            }
            if key.is_empty() {
                return Err(DictionaryError::MalformedConf {
                    line: i + 1,
                    text: line.to_string(),
                });
            }
            let values = value
                .trim()
                .trim_matches('"')
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .collect();
            self.conf.insert(key.to_string(), values);
        }
        Ok(())
    }

    pub fn add_entry(&mut self, grapheme: &str, phonemes: &[&str]) {
        self.entries.insert(
            grapheme.to_string(),
            phonemes.iter().map(|p| p.to_string()).collect(),
        );
    }

    /// Map the editor's rest lyrics (`R`, `-`, `SP`, `AP`) to rest symbols.
    pub fn add_rest_aliases(&mut self) {
        for (lyric, symbol) in REST_ALIASES {
            self.add_entry(lyric, &[*symbol]);
        }
    }

    pub fn entry(&self, grapheme: &str) -> Option<&[String]> {
        self.entries.get(grapheme).map(Vec::as_slice)
    }

    /// Values of a conf key, or an empty slice if absent.
    pub fn conf_values(&self, key: &str) -> &[String] {
        self.conf.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn macron_suffixes(&self) -> &[String] {
        self.conf_values(MACRON)
    }

    fn conf_set(&self, key: &str) -> BTreeSet<String> {
        self.conf_values(key).iter().cloned().collect()
    }

    /// Symbol classes declared by the conf. `VOWELS` is required.
    pub fn symbol_classes(&self) -> Result<SymbolClasses, DictionaryError> {
        if !self.conf.contains_key(VOWELS) {
            return Err(DictionaryError::MissingConfKey(VOWELS));
        }
        Ok(SymbolClasses {
            vowels: self.conf_set(VOWELS),
            pauses: self.conf_set(PAUSES),
            silences: self.conf_set(SILENCES),
            breaks: self.conf_set(BREAK),
            unvoiced: self.conf_set(UNVOICED),
        })
    }

    /// Compile into a dictionary, including derived vowel-reduction and
    /// macron entries.
    pub fn to_dictionary(&self) -> Result<G2pDictionary, DictionaryError> {
        let classes = self.symbol_classes()?;
        let mut builder = G2pDictionary::builder();

        for key in [VOWELS, PAUSES, SILENCES, BREAK, CONSONANTS, UNVOICED] {
            for symbol in self.conf_values(key) {
                builder.add_symbol(symbol, classes.vowels.contains(symbol));
            }
        }
        for phonemes in self.entries.values() {
            for symbol in phonemes {
                builder.add_symbol(symbol, classes.vowels.contains(symbol));
            }
        }

        for (grapheme, phonemes) in &self.entries {
            builder.add_entry(grapheme, phonemes.iter().cloned());
        }
        for (grapheme, phonemes) in &self.entries {
            for suffix in self.conf_values(VOWEL_REDUCTION) {
                let reduced: Vec<String> = phonemes
                    .iter()
                    .filter(|p| !classes.vowels.contains(*p))
                    .cloned()
                    .collect();
                if reduced.is_empty() {
                    continue;
                }
                builder.add_entry(&format!("{grapheme}{suffix}"), reduced);
            }
            for suffix in self.macron_suffixes() {
                if let Some(extended) = macron_phonemes(phonemes, &classes) {
                    builder.add_entry(&format!("{grapheme}{suffix}"), extended);
                }
            }
        }

        let dictionary = builder.build();
        if dictionary.entry_count() == 0 {
            warn!("phone table compiled to an empty dictionary");
        }
        debug!(
            entries = dictionary.entry_count(),
            symbols = dictionary.symbol_count(),
            "compiled phone table"
        );
        Ok(dictionary)
    }

    /// Graphemes produced by appending a macron suffix to a table entry that
    /// has at least one vowel.
    pub fn macron_lyrics(&self) -> BTreeSet<String> {
        let vowels = self.conf_set(VOWELS);
        let mut lyrics = BTreeSet::new();
        for (grapheme, phonemes) in &self.entries {
            if !phonemes.iter().any(|p| vowels.contains(p)) {
                continue;
            }
            for suffix in self.macron_suffixes() {
                lyrics.insert(format!("{grapheme}{suffix}"));
            }
        }
        lyrics
    }
}

/// The entry's phonemes followed by its vowels again, or `None` if it has no
/// vowels.
fn macron_phonemes(phonemes: &[String], classes: &SymbolClasses) -> Option<Vec<String>> {
    let vowels: Vec<String> = phonemes
        .iter()
        .filter(|p| classes.vowels.contains(*p))
        .cloned()
        .collect();
    if vowels.is_empty() {
        return None;
    }
    let mut extended = phonemes.to_vec();
    extended.extend(vowels);
    Some(extended)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::G2p;

    const TABLE: &str = "ka k a\nki k i\n\nN N\n";
    const CONF: &str = "# voicebank conf\nVOWELS=\"a,i,u,e,o\"\nPHONEME_CL=\"cl\"\nVOWEL_REDUCTION=\"'\"\nMACRON=\"ー\"\n";

    fn sample() -> PhoneTable {
        let mut table = PhoneTable::from_table_str(TABLE).unwrap();
        table.merge_conf_str(CONF).unwrap();
        table
    }

    #[test]
    fn test_table_parsing() {
        let table = sample();
        assert_eq!(table.entry("ka").unwrap(), &["k", "a"]);
        assert_eq!(table.entry("N").unwrap(), &["N"]);
        assert!(table.entry("").is_none());
    }

    #[test]
    fn test_conf_defaults_and_override() {
        let table = sample();
        assert_eq!(table.conf_values(PAUSES), &["pau"]);
        assert_eq!(table.conf_values(VOWELS).len(), 5);
        assert!(table.conf_values("NOPE").is_empty());
    }

    #[test]
    fn test_empty_table_entry_is_error() {
        let err = PhoneTable::from_table_str("ka k a\nzz\n").unwrap_err();
        assert!(matches!(err, DictionaryError::EmptyEntry { line: 2, .. }));
    }

    #[test]
    fn test_conf_without_key_is_error() {
        let mut table = PhoneTable::new();
        let err = table.merge_conf_str("=\"a\"").unwrap_err();
        assert!(matches!(err, DictionaryError::MalformedConf { line: 1, .. }));
    }

    #[test]
    fn test_missing_vowels_key() {
        let table = PhoneTable::from_table_str(TABLE).unwrap();
        assert!(matches!(
            table.to_dictionary(),
            Err(DictionaryError::MissingConfKey(VOWELS))
        ));
    }

    #[test]
    fn test_derived_entries() {
        let dict = sample().to_dictionary().unwrap();
        assert_eq!(dict.query("ka'"), Some(vec!["k".to_string()]));
        assert_eq!(
            dict.query("kaー"),
            Some(vec!["k".to_string(), "a".to_string(), "a".to_string()])
        );
        // `N` has no vowel: no reduced or macron form.
        assert_eq!(dict.query("Nー"), None);
        assert!(dict.is_vowel("a"));
        assert!(dict.is_valid_symbol("cl"));
        assert!(!dict.is_vowel("pau"));
    }

    #[test]
    fn test_macron_lyrics() {
        let lyrics = sample().macron_lyrics();
        assert!(lyrics.contains("kaー"));
        assert!(lyrics.contains("kiー"));
        assert!(!lyrics.contains("Nー"));
    }

    #[test]
    fn test_rest_aliases() {
        let mut table = sample();
        table.add_rest_aliases();
        let dict = table.to_dictionary().unwrap();
        assert_eq!(dict.query("R"), Some(vec!["pau".to_string()]));
        assert_eq!(dict.query("AP"), Some(vec!["br".to_string()]));
        let classes = table.symbol_classes().unwrap();
        assert!(classes.is_rest_symbol("br"));
    }
}
