// Errors raised while loading grapheme-to-phoneme data.
//
// Loading is the only fallible part of this crate: queries on a built
// dictionary never fail, they return `None` for unknown graphemes. Callers in
// `cantor_hts` treat every variant here as non-fatal (log, then continue
// with an empty dictionary).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("malformed dictionary JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table line {line}: grapheme `{grapheme}` has no phonemes")]
    EmptyEntry { line: usize, grapheme: String },

    #[error("conf line {line}: expected KEY=\"a,b,c\", got `{text}`")]
    MalformedConf { line: usize, text: String },

    #[error("conf is missing required key {0}")]
    MissingConfKey(&'static str),
}
