// Per-phonemizer timing result cache.
//
// `set_up` clears the cache, fills it one phrase at a time, then marks it
// ready; `process` reads it. Keys are the tick position of each group's lead
// note. The state machine turns an out-of-order call into an error instead
// of a silent miss.

use crate::error::PhonemizerError;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheState {
    #[default]
    Idle,
    SettingUp,
    Ready,
}

/// A phoneme and its start, in ticks relative to the lead note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemeTiming {
    pub symbol: String,
    pub position: i32,
}

impl PhonemeTiming {
    pub fn new(symbol: impl Into<String>, position: i32) -> Self {
        PhonemeTiming {
            symbol: symbol.into(),
            position,
        }
    }
}

#[derive(Debug, Default)]
pub struct ResultCache {
    state: CacheState,
    results: FxHashMap<i32, Vec<PhonemeTiming>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> CacheState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drop all results and start a new set-up pass.
    pub fn begin(&mut self) {
        self.results.clear();
        self.state = CacheState::SettingUp;
    }

    pub fn insert(&mut self, position: i32, timings: Vec<PhonemeTiming>) -> Result<(), PhonemizerError> {
        if self.state != CacheState::SettingUp {
            return Err(PhonemizerError::NotSettingUp(self.state));
        }
        self.results.insert(position, timings);
        Ok(())
    }

    pub fn finish(&mut self) {
        self.state = CacheState::Ready;
    }

    pub fn get(&self, position: i32) -> Result<&[PhonemeTiming], PhonemizerError> {
        if self.state != CacheState::Ready {
            return Err(PhonemizerError::NotReady(self.state));
        }
        self.results
            .get(&position)
            .map(Vec::as_slice)
            .ok_or(PhonemizerError::NoResult { position })
    }
}
