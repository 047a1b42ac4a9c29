// Engine backends: the per-engine hooks of the label pipeline.
//
// The phrase pipeline in `phrase.rs` is engine-agnostic. Everything that
// differs between engines goes through `EngineBackend`:
//
// - `adjust_phrase` rewrites note groups before syllables are built
// - `customize_note` / `customize_phonemes` fill engine-specific label slots
// - `send_score` turns a written score label into a timing label path
//
// Implementations:
// - `NeutrinoBackend`: runs the NEUTRINO executable through an
//   `EngineRunner` (a blocking `std::process::Command` in production).
// - `EnunuBackend`: asks a companion process for timing through a
//   `TimingClient`, parses its JSON reply and copies the reported timing
//   file into the phrase cache directory.
// - `UniformBackend`: writes a timing label with a fixed duration per
//   phoneme; no external engine. Used for previews and tests.
//
// Every backend skips the engine when the phrase's timing file is already in
// its cache directory. Engine calls are serialized by the caller
// (`phonemizer.rs`), never here.

use crate::context::{HtsNote, HtsPhoneme};
use crate::error::EngineError;
use crate::label::{TIME_UNITS_PER_MS, read_label_file};
use crate::lab_cache::PhraseCacheDir;
use crate::score::{NoteGroup, ScoreNote};
use cantor_g2p::G2p;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// What a backend needs to synthesize timing for one phrase.
#[derive(Debug, Clone, Copy)]
pub struct ScoreRequest<'a> {
    pub cache: &'a PhraseCacheDir,
    pub groups: &'a [NoteGroup],
}

impl ScoreRequest<'_> {
    /// Tone shift of the phrase's first note.
    pub fn tone_shift(&self) -> i32 {
        self.groups
            .first()
            .and_then(|g| g.first())
            .map_or(0, |n| n.tone_shift)
    }
}

pub trait EngineBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn adjust_phrase(&self, _groups: &mut [NoteGroup], _g2p: &dyn G2p) {}

    fn customize_note(&self, _note: &mut HtsNote, _source: &ScoreNote) {}

    fn customize_phonemes(&self, _phonemes: &mut [HtsPhoneme], _notes: &[ScoreNote]) {}

    /// Run the engine on `request.cache.full_score()` (and the mono score)
    /// and return the path of the timing label it produced.
    fn send_score(&self, request: &ScoreRequest<'_>) -> Result<PathBuf, EngineError>;
}

// ---------------------------------------------------------------------------
// Uniform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UniformBackend {
    pub phoneme_ms: u32,
}

impl UniformBackend {
    pub fn new(phoneme_ms: u32) -> Self {
        UniformBackend {
            phoneme_ms: phoneme_ms.max(1),
        }
    }
}

impl EngineBackend for UniformBackend {
    fn name(&self) -> &'static str {
        "uniform"
    }

    fn send_score(&self, request: &ScoreRequest<'_>) -> Result<PathBuf, EngineError> {
        let timing = request.cache.mono_timing();
        if timing.exists() {
            debug!(path = %timing.display(), "reusing cached timing");
            return Ok(timing);
        }
        let score = read_label_file(&request.cache.mono_score())?;
        let step = i64::from(self.phoneme_ms) * TIME_UNITS_PER_MS;
        let mut text = String::new();
        for (i, entry) in score.iter().enumerate() {
            let start = i as i64 * step;
            let _ = writeln!(text, "{} {} {}", start, start + step, entry.symbol());
        }
        std::fs::write(&timing, text).map_err(|e| EngineError::io(&timing, e))?;
        Ok(timing)
    }
}

// ---------------------------------------------------------------------------
// NEUTRINO
// ---------------------------------------------------------------------------

/// Blocking executable invocation.
pub trait EngineRunner: Send + Sync {
    fn run(&self, executable: &Path, args: &[String]) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl EngineRunner for ProcessRunner {
    fn run(&self, executable: &Path, args: &[String]) -> Result<(), EngineError> {
        info!(executable = %executable.display(), ?args, "running engine");
        let output = Command::new(executable)
            .args(args)
            .output()
            .map_err(|source| EngineError::Spawn {
                executable: executable.to_path_buf(),
                source,
            })?;
        for line in String::from_utf8_lossy(&output.stdout).lines() {
            debug!("{line}");
        }
        if !output.status.success() {
            return Err(EngineError::ProcessFailed {
                executable: executable.to_path_buf(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

const NEUTRINO: &str = "NEUTRINO";

fn neutrino_executable_name() -> Result<&'static str, EngineError> {
    if cfg!(target_os = "windows") {
        Ok("NEUTRINO.exe")
    } else if cfg!(any(target_os = "macos", target_os = "linux")) {
        Ok("NEUTRINO")
    } else {
        Err(EngineError::UnsupportedPlatform {
            engine: NEUTRINO,
            platform: std::env::consts::OS,
        })
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub struct NeutrinoBackend {
    executable: PathBuf,
    model_dir: PathBuf,
    voicebank_hash: String,
    num_threads: usize,
    macron_suffixes: Vec<String>,
    macron_lyrics: BTreeSet<String>,
    runner: Box<dyn EngineRunner>,
}

impl NeutrinoBackend {
    /// Fails on platforms NEUTRINO does not ship for.
    pub fn new(
        install_dir: &Path,
        model_dir: &Path,
        runner: Box<dyn EngineRunner>,
    ) -> Result<Self, EngineError> {
        let executable = install_dir.join("bin").join(neutrino_executable_name()?);
        Ok(NeutrinoBackend {
            executable,
            model_dir: model_dir.to_path_buf(),
            voicebank_hash: "0000000000000000".to_string(),
            num_threads: 1,
            macron_suffixes: Vec::new(),
            macron_lyrics: BTreeSet::new(),
            runner,
        })
    }

    pub fn with_voicebank_hash(mut self, hash: u64) -> Self {
        self.voicebank_hash = format!("{hash:016x}");
        self
    }

    pub fn with_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    /// Macron suffixes (`MACRON` in the conf) and the derived macron lyrics.
    pub fn with_macrons(mut self, suffixes: &[String], lyrics: BTreeSet<String>) -> Self {
        self.macron_suffixes = suffixes.to_vec();
        self.macron_lyrics = lyrics;
        self
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn args(&self, request: &ScoreRequest<'_>) -> Vec<String> {
        let dir = &request.cache.dir;
        let f0 = dir.join(format!("{}_tmp.f0", self.voicebank_hash));
        let melspec = dir.join(format!("{}_tmp.melspec", self.voicebank_hash));
        let mut model_dir = path_arg(&self.model_dir);
        if !model_dir.ends_with(std::path::MAIN_SEPARATOR) {
            model_dir.push(std::path::MAIN_SEPARATOR);
        }
        let mut args = vec![
            path_arg(&request.cache.full_score()),
            path_arg(&request.cache.mono_timing()),
            path_arg(&f0),
            path_arg(&melspec),
            model_dir,
        ];
        args.extend(
            ["-a", "-p", "1", "-n", "1", "-k"]
                .into_iter()
                .map(str::to_string),
        );
        args.push(request.tone_shift().to_string());
        args.push("-o".to_string());
        args.push(self.num_threads.to_string());
        args.push("-m".to_string());
        args.push("-t".to_string());
        args
    }
}

impl EngineBackend for NeutrinoBackend {
    fn name(&self) -> &'static str {
        NEUTRINO
    }

    /// A lyric that is only a macron suffix sings the previous group's vowel.
    fn adjust_phrase(&self, groups: &mut [NoteGroup], g2p: &dyn G2p) {
        for i in 1..groups.len() {
            let is_macron = groups[i]
                .first()
                .is_some_and(|n| self.macron_suffixes.contains(&n.lyric));
            if !is_macron {
                continue;
            }
            let vowel = groups[i - 1]
                .first()
                .and_then(|prev| g2p.query(&prev.lyric.to_lowercase()))
                .and_then(|symbols| symbols.into_iter().find(|s| g2p.is_vowel(s)));
            if let (Some(vowel), Some(lead)) = (vowel, groups[i].first_mut()) {
                debug!(from = %lead.lyric, to = %vowel, "macron lyric");
                lead.lyric = vowel;
            }
        }
    }

    fn customize_note(&self, note: &mut HtsNote, source: &ScoreNote) {
        if note.is_rest || note.is_slur {
            return;
        }
        let macron = self.macron_lyrics.contains(&source.lyric);
        note.lang_dependent = Some(if macron { "1" } else { "0" }.to_string());
    }

    fn customize_phonemes(&self, phonemes: &mut [HtsPhoneme], _notes: &[ScoreNote]) {
        for phoneme in phonemes {
            if matches!(phoneme.kind.code(), "v" | "c") {
                phoneme.flag1 = "00".to_string();
            }
        }
    }

    fn send_score(&self, request: &ScoreRequest<'_>) -> Result<PathBuf, EngineError> {
        let timing = request.cache.mono_timing();
        if timing.exists() {
            debug!(path = %timing.display(), "reusing cached timing");
            return Ok(timing);
        }
        self.runner.run(&self.executable, &self.args(request))?;
        Ok(timing)
    }
}

// ---------------------------------------------------------------------------
// ENUNU
// ---------------------------------------------------------------------------

/// Sends a request to the companion process and returns its JSON reply.
pub trait TimingClient: Send + Sync {
    fn send(&self, request: &[String]) -> Result<String, EngineError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingResult {
    pub path_full_timing: String,
    #[serde(default)]
    pub path_mono_timing: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimingResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<TimingResult>,
}

/// Seconds the companion process may spend on one request.
const ENUNU_TIMEOUT: &str = "600";

pub struct EnunuBackend {
    voicebank_hash: String,
    client: Box<dyn TimingClient>,
}

impl EnunuBackend {
    pub fn new(voicebank_hash: u64, client: Box<dyn TimingClient>) -> Self {
        EnunuBackend {
            voicebank_hash: format!("{voicebank_hash:016x}"),
            client,
        }
    }
}

impl EngineBackend for EnunuBackend {
    fn name(&self) -> &'static str {
        "ENUNU"
    }

    fn send_score(&self, request: &ScoreRequest<'_>) -> Result<PathBuf, EngineError> {
        let timing = request.cache.full_timing();
        if timing.exists() {
            debug!(path = %timing.display(), "reusing cached timing");
            return Ok(timing);
        }
        let args = [
            "timing".to_string(),
            path_arg(&request.cache.full_score()),
            String::new(),
            self.voicebank_hash.clone(),
            ENUNU_TIMEOUT.to_string(),
        ];
        let reply = self.client.send(&args)?;
        let response: TimingResponse = serde_json::from_str(&reply)?;
        if let Some(error) = response.error {
            return Err(EngineError::Rejected(error));
        }
        let result = response.result.ok_or(EngineError::MissingResult)?;
        let reported = PathBuf::from(result.path_full_timing);
        if reported != timing {
            std::fs::copy(&reported, &timing).map_err(|e| EngineError::io(&reported, e))?;
        }
        Ok(timing)
    }
}
