// Grapheme-to-phoneme resolution for Cantor HTS label generation.
//
// Supplies phoneme sequences for lyric strings and tells the label writer
// which symbols are vowels. Used by `cantor_hts` (syllable building and
// phoneme classification). Pure string processing: no file discovery, no
// engine knowledge.
//
// Architecture:
// - `types.rs`: `PhonemeType`, `SymbolClasses`, JSON record types
// - `dictionary.rs`: `G2pDictionary` + builder, JSON loading
// - `phonetable.rs`: NEUTRINO-style table/conf parsing and compilation
// - `error.rs`: `DictionaryError`
// - `lib.rs` (this file): the `G2p` trait and `G2pFallbacks`
//
// Every `G2p` implementation is `Send + Sync` so phonemizers holding one can
// be driven from the rayon render pool.

pub mod dictionary;
pub mod error;
pub mod phonetable;
pub mod types;

// Re-export key types at crate root for convenience.
pub use dictionary::{G2pDictionary, G2pDictionaryBuilder};
pub use error::DictionaryError;
pub use phonetable::PhoneTable;
pub use types::{EntryDef, NULL_SYMBOL, PhonemeType, SymbolClasses, SymbolDef};

use std::sync::Arc;

/// A grapheme-to-phoneme resolver.
pub trait G2p: Send + Sync {
    /// Phonemes for a (lowercased) grapheme, or `None` if unknown.
    fn query(&self, grapheme: &str) -> Option<Vec<String>>;

    fn is_valid_symbol(&self, symbol: &str) -> bool;

    fn is_vowel(&self, symbol: &str) -> bool;
}

/// An ordered chain of resolvers. `query` returns the first hit; symbol
/// checks succeed if any member accepts the symbol.
#[derive(Clone, Default)]
pub struct G2pFallbacks {
    members: Vec<Arc<dyn G2p>>,
}

impl G2pFallbacks {
    pub fn new(members: Vec<Arc<dyn G2p>>) -> Self {
        G2pFallbacks { members }
    }

    pub fn push(&mut self, g2p: Arc<dyn G2p>) {
        self.members.push(g2p);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl std::fmt::Debug for G2pFallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("G2pFallbacks")
            .field("members", &self.members.len())
            .finish()
    }
}

impl G2p for G2pFallbacks {
    fn query(&self, grapheme: &str) -> Option<Vec<String>> {
        self.members.iter().find_map(|g2p| g2p.query(grapheme))
    }

    fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.members.iter().any(|g2p| g2p.is_valid_symbol(symbol))
    }

    fn is_vowel(&self, symbol: &str) -> bool {
        self.members.iter().any(|g2p| g2p.is_vowel(symbol))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict(entries: &[(&str, &[&str])], vowels: &[&str], consonants: &[&str]) -> Arc<dyn G2p> {
        let mut builder = G2pDictionary::builder();
        for v in vowels {
            builder.add_symbol(v, true);
        }
        for c in consonants {
            builder.add_symbol(c, false);
        }
        for (grapheme, phonemes) in entries {
            builder.add_entry(grapheme, phonemes.iter().copied());
        }
        Arc::new(builder.build())
    }

    #[test]
    fn test_fallbacks_first_hit_wins() {
        let primary = dict(&[("ka", &["k", "a"])], &["a"], &["k"]);
        let secondary = dict(&[("ka", &["g", "a"]), ("sa", &["s", "a"])], &["a"], &["g", "s"]);
        let chain = G2pFallbacks::new(vec![primary, secondary]);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.query("ka"), Some(vec!["k".to_string(), "a".to_string()]));
        assert_eq!(chain.query("sa"), Some(vec!["s".to_string(), "a".to_string()]));
        assert_eq!(chain.query("ta"), None);
    }

    #[test]
    fn test_fallbacks_symbol_checks_any_member() {
        let primary = dict(&[], &["a"], &["k"]);
        let secondary = dict(&[], &["i"], &["s"]);
        let chain = G2pFallbacks::new(vec![primary, secondary]);
        assert!(chain.is_vowel("i"));
        assert!(chain.is_valid_symbol("s"));
        assert!(!chain.is_valid_symbol("t"));
    }

    #[test]
    fn test_empty_fallbacks() {
        let chain = G2pFallbacks::default();
        assert!(chain.is_empty());
        assert_eq!(chain.query("a"), None);
        assert!(!chain.is_vowel("a"));
    }
}
