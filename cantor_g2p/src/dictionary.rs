// In-memory grapheme-to-phoneme dictionary.
//
// A `G2pDictionary` is a closed map from lowercase graphemes (lyrics) to
// phoneme sequences, plus the set of symbols the voicebank knows and which of
// them are vowels. It is built incrementally with `G2pDictionaryBuilder`
// (used by `phonetable.rs` when compiling NEUTRINO-style tables) or loaded in
// one go from JSON via `G2pDictionary::from_json()`, following the same
// JSON-string-in, typed-struct-out pattern as the config loaders in
// `cantor_hts`.
//
// BTreeMaps keep iteration order stable, so two dictionaries built from the
// same input compare equal and dump identically.

use crate::G2p;
use crate::error::DictionaryError;
use crate::types::{EntryDef, SymbolDef};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The top-level JSON structure for a dictionary file.
#[derive(Debug, Deserialize)]
struct DictionaryFile {
    #[serde(default)]
    symbols: Vec<SymbolDef>,
    #[serde(default)]
    entries: Vec<EntryDef>,
}

/// A loaded dictionary. Queries never fail; unknown graphemes return `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct G2pDictionary {
    /// symbol -> is_vowel
    symbols: BTreeMap<String, bool>,
    entries: BTreeMap<String, Vec<String>>,
}

impl G2pDictionary {
    pub fn builder() -> G2pDictionaryBuilder {
        G2pDictionaryBuilder::default()
    }

    /// Parse a dictionary from a JSON string.
    ///
    /// ```json
    /// { "symbols": [{"symbol": "a", "type": "vowel"}],
    ///   "entries": [{"grapheme": "ka", "phonemes": ["k", "a"]}] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, DictionaryError> {
        let file: DictionaryFile = serde_json::from_str(json)?;
        let mut builder = G2pDictionary::builder();
        for def in &file.symbols {
            builder.add_symbol(&def.symbol, def.is_vowel());
        }
        for entry in file.entries {
            builder.add_entry(&entry.grapheme, entry.phonemes);
        }
        let dictionary = builder.build();
        debug!(
            symbols = dictionary.symbols.len(),
            entries = dictionary.entries.len(),
            "loaded g2p dictionary from json"
        );
        Ok(dictionary)
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.entries.is_empty()
    }
}

impl G2p for G2pDictionary {
    fn query(&self, grapheme: &str) -> Option<Vec<String>> {
        self.entries.get(grapheme).cloned()
    }

    fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    fn is_vowel(&self, symbol: &str) -> bool {
        self.symbols.get(symbol).copied().unwrap_or(false)
    }
}

/// Incremental builder. Later calls for the same key overwrite earlier ones.
#[derive(Debug, Default)]
pub struct G2pDictionaryBuilder {
    symbols: BTreeMap<String, bool>,
    entries: BTreeMap<String, Vec<String>>,
}

impl G2pDictionaryBuilder {
    pub fn add_symbol(&mut self, symbol: &str, is_vowel: bool) -> &mut Self {
        self.symbols.insert(symbol.to_string(), is_vowel);
        self
    }

    pub fn add_entry<I, S>(&mut self, grapheme: &str, phonemes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.insert(
            grapheme.to_string(),
            phonemes.into_iter().map(Into::into).collect(),
        );
        self
    }

    pub fn build(&self) -> G2pDictionary {
        G2pDictionary {
            symbols: self.symbols.clone(),
            entries: self.entries.clone(),
        }
    }
}
