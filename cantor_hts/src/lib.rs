// Cantor HTS: full-context label generation and timing re-alignment for
// singing synthesis engines.
//
// Turns editor notes (lyric, tick position, duration, tone) into HTS
// full-context score labels, hands them to an acoustic engine, and maps the
// engine's per-phoneme durations back onto the score so every syllable's
// first vowel lands exactly on its note start.
//
// Architecture:
// - tone.rs: Tone names and `p`/`m` signed integer encoding
// - time_axis.rs: Tick <-> ms conversion across tempo and signature changes
// - score.rs: Editor notes, note groups, JSON score files
// - syllable.rs: Note group -> syllables (symbol lookup, extensions, note
//   count reconciliation)
// - context.rs: HTS context model (phoneme / note / phrase feature arrays)
// - label.rs: Label line grammar, label writing and parsing
// - timing.rs: Anchor-preserving stretch of engine durations
// - phrase.rs: Sentence splitting, phrase assembly with padding, timing
//   extraction
// - lab_cache.rs: Content-hashed per-phrase cache directories
// - cache.rs: Per-phonemizer result cache (Idle -> SettingUp -> Ready)
// - backend.rs: Engine backends (NEUTRINO, ENUNU, uniform) and runners
// - phonemizer.rs: `HtsPhonemizer` set-up / process entry points, engine lock
// - render.rs: Parallel multi-track set-up
// - voicebank.rs: Non-fatal dictionary loading
// - config.rs: JSON configuration and phonemizer construction
// - error.rs: Error enums for each stage
//
// Grapheme-to-phoneme lookup lives in the `cantor_g2p` crate.

pub mod backend;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod lab_cache;
pub mod label;
pub mod phonemizer;
pub mod phrase;
pub mod render;
pub mod score;
pub mod syllable;
pub mod time_axis;
pub mod timing;
pub mod tone;
pub mod voicebank;

pub use config::HtsConfig;
pub use phonemizer::{CancelFlag, HtsPhonemizer};
pub use score::{NoteGroup, Score, ScoreNote};
pub use time_axis::TimeAxis;
