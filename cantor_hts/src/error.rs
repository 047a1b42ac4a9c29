// Error types for label generation, engine invocation and timing lookup.
//
// Failures are isolated per phrase (see `phonemizer.rs`): a `PhraseError`
// abandons one sentence and is logged with its cache hash, never touching
// results cached for other sentences. `PhonemizerError` is what a caller of
// `HtsPhonemizer::process` sees when asking for a group `set_up` did not
// cover. `ConfigError` and `EngineError::UnsupportedPlatform` are the only
// errors raised before any phrase is processed.

use crate::cache::CacheState;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SyllableError {
    #[error("note group is empty")]
    EmptyGroup,

    #[error("not enough extension notes, {} more expected", .expected - .actual)]
    NotEnoughNotes { expected: usize, actual: usize },
}

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("I/O error on label {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("label line {line}: expected `start end label`, got `{text}`")]
    Malformed { line: usize, text: String },

    #[error("label line {line}: end time {end} precedes start time {start}")]
    NegativeDuration { line: usize, start: i64, end: i64 },
}

impl LabelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AlignmentError {
    #[error("no alignment anchors")]
    NoAnchors,

    #[error("anchor at phoneme {index} is past the end ({len} phonemes)")]
    AnchorOutOfRange { index: usize, len: usize },

    #[error("anchor {position} goes backwards in phoneme order")]
    AnchorsOutOfOrder { position: usize },
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{engine} is not supported on this platform ({platform})")]
    UnsupportedPlatform {
        engine: &'static str,
        platform: &'static str,
    },

    #[error("failed to start {}: {source}", .executable.display())]
    Spawn {
        executable: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} exited with {status}: {stderr}", .executable.display())]
    ProcessFailed {
        executable: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("engine rejected request: {0}")]
    Rejected(String),

    #[error("engine response carried no timing result")]
    MissingResult,

    #[error("malformed engine response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Label(#[from] LabelError),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum PhraseError {
    #[error("phrase has no notes")]
    Empty,

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("engine produced no timing file at {}", .path.display())]
    MissingTiming { path: PathBuf },

    #[error("timing label has {actual} phonemes, score label has {expected}")]
    PhonemeCountMismatch { expected: usize, actual: usize },

    #[error("cancelled")]
    Cancelled,

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Label(#[from] LabelError),

    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

impl PhraseError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhonemizerError {
    #[error("timing results are not ready (cache is {0:?})")]
    NotReady(CacheState),

    #[error("results can only be stored during set-up (cache is {0:?})")]
    NotSettingUp(CacheState),

    #[error("no timing result for note at tick {position}")]
    NoResult { position: i32 },

    #[error("empty note group")]
    EmptyGroup,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("engine `{0}` needs {1}")]
    MissingSetting(&'static str, &'static str),

    #[error(transparent)]
    Engine(#[from] EngineError),
}
