// HTS label phonemizer: the set-up / process entry points.
//
// `HtsPhonemizer::set_up` runs once per part. It splits the part's note
// groups into sentences and runs each through the full pipeline:
//
//   adjust (backend) -> build phrase -> write labels -> engine -> realign
//   -> extract per-group timings -> store in the result cache
//
// `process` then answers per-group queries from the cache. A sentence that
// fails anywhere is logged with its cache hash and singer and leaves no
// entries; its groups read back as errors, and `process_or_error_phoneme`
// turns those into a single visible `error` phoneme.
//
// Engine calls go through a process-wide lock, since the external engines
// cannot run concurrently. Cancellation is checked only before and after the
// engine call; an engine run that has started always finishes.
//
// See also: `phrase.rs` for phrase assembly, `render.rs` for running several
// phonemizers in parallel.

use crate::backend::{EngineBackend, ScoreRequest};
use crate::cache::{CacheState, PhonemeTiming, ResultCache};
use crate::error::{PhonemizerError, PhraseError};
use crate::lab_cache::{PhraseCacheDir, hash_phrase};
use crate::label::{durations_ms, read_label_file, write_full_label, write_mono_label};
use crate::phrase::{PhraseContext, build_phrase, extract_timings, split_sentences};
use crate::score::{NoteGroup, ScoreNote};
use crate::time_axis::TimeAxis;
use crate::timing::realign;
use cantor_g2p::{G2p, SymbolClasses};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Shared cancellation signal for a render pass.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), PhraseError> {
        if self.is_cancelled() {
            Err(PhraseError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonemizerSettings {
    pub lang: String,
    pub cache_dir: PathBuf,
    pub pause_symbol: String,
    pub error_symbol: String,
}

impl Default for PhonemizerSettings {
    fn default() -> Self {
        PhonemizerSettings {
            lang: "JPN".to_string(),
            cache_dir: std::env::temp_dir().join("cantor_hts"),
            pause_symbol: "pau".to_string(),
            error_symbol: "error".to_string(),
        }
    }
}

/// Counts from one `set_up` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetUpReport {
    pub phrases: usize,
    pub failed: usize,
}

pub struct HtsPhonemizer {
    singer: String,
    settings: PhonemizerSettings,
    g2p: Arc<dyn G2p>,
    classes: SymbolClasses,
    backend: Box<dyn EngineBackend>,
    cache: ResultCache,
    cancel: CancelFlag,
}

impl HtsPhonemizer {
    pub fn new(
        singer: &str,
        settings: PhonemizerSettings,
        g2p: Arc<dyn G2p>,
        classes: SymbolClasses,
        backend: Box<dyn EngineBackend>,
    ) -> Self {
        HtsPhonemizer {
            singer: singer.to_string(),
            settings,
            g2p,
            classes,
            backend,
            cache: ResultCache::new(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn singer(&self) -> &str {
        &self.singer
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn cache_state(&self) -> CacheState {
        self.cache.state()
    }

    /// Run every sentence of a part through the engine and cache the
    /// resulting timings. Clears results from any previous pass.
    pub fn set_up(&mut self, groups: &[NoteGroup], time_axis: &TimeAxis, key: i32) -> SetUpReport {
        self.cache.begin();
        let mut report = SetUpReport::default();
        for sentence in split_sentences(groups.to_vec()) {
            report.phrases += 1;
            let hash = hash_phrase(&sentence);
            match self.process_phrase(sentence, time_axis, key) {
                Ok(results) => {
                    for (position, timings) in results {
                        if let Err(e) = self.cache.insert(position, timings) {
                            error!(%hash, singer = %self.singer, error = %e, "dropping phrase result");
                        }
                    }
                }
                Err(PhraseError::Cancelled) => {
                    report.failed += 1;
                    info!(%hash, singer = %self.singer, "phrase cancelled");
                }
                Err(e) => {
                    report.failed += 1;
                    error!(%hash, singer = %self.singer, backend = self.backend.name(), error = %e, "phrase failed");
                }
            }
        }
        self.cache.finish();
        debug!(
            singer = %self.singer,
            phrases = report.phrases,
            failed = report.failed,
            groups = self.cache.len(),
            "set-up finished"
        );
        report
    }

    fn process_phrase(
        &self,
        mut groups: Vec<NoteGroup>,
        time_axis: &TimeAxis,
        key: i32,
    ) -> Result<Vec<(i32, Vec<PhonemeTiming>)>, PhraseError> {
        let cache = PhraseCacheDir::new(&self.settings.cache_dir, hash_phrase(&groups));
        self.backend.adjust_phrase(&mut groups, self.g2p.as_ref());

        let ctx = PhraseContext {
            time_axis,
            g2p: self.g2p.as_ref(),
            classes: &self.classes,
            backend: self.backend.as_ref(),
            lang: &self.settings.lang,
            key,
            pause_symbol: &self.settings.pause_symbol,
        };
        let built = build_phrase(&ctx, &groups)?;

        cache.create()?;
        write_full_label(&built.phrase, &cache.full_score())?;
        write_mono_label(&built.phrase, &cache.mono_score())?;
        debug!(hash = %cache.hash, phonemes = built.phrase.phoneme_count(), "score labels written");

        self.cancel.check()?;
        let timing_path = {
            let _engine = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            self.backend.send_score(&ScoreRequest {
                cache: &cache,
                groups: &groups,
            })?
        };
        self.cancel.check()?;

        if !timing_path.exists() {
            return Err(PhraseError::MissingTiming { path: timing_path });
        }
        let timing = read_label_file(&timing_path)?;
        let expected = built.phrase.phoneme_count();
        if timing.len() != expected {
            return Err(PhraseError::PhonemeCountMismatch {
                expected,
                actual: timing.len(),
            });
        }
        let positions = realign(&durations_ms(&timing), &built.anchors)?;
        Ok(extract_timings(&built, &groups, &positions, time_axis))
    }

    /// Cached timings for the group led by `group[0]`.
    pub fn process(&self, group: &[ScoreNote]) -> Result<&[PhonemeTiming], PhonemizerError> {
        let lead = group.first().ok_or(PhonemizerError::EmptyGroup)?;
        self.cache.get(lead.position)
    }

    /// Like `process`, but a failure becomes a single error phoneme at the
    /// note start.
    pub fn process_or_error_phoneme(&self, group: &[ScoreNote]) -> Vec<PhonemeTiming> {
        match self.process(group) {
            Ok(timings) => timings.to_vec(),
            Err(e) => {
                warn!(singer = %self.singer, error = %e, "no timing for note group");
                vec![PhonemeTiming::new(self.settings.error_symbol.clone(), 0)]
            }
        }
    }
}
