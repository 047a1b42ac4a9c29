// Phonemizer configuration, loaded from JSON.
//
// Every field has a default, so a partial file (or `{}`) loads. The config
// names the voicebank files, the cache root, and which engine backend to
// build. `build_phonemizer` wires a voicebank, settings and backend into a
// ready `HtsPhonemizer`.
//
// The ENUNU backend needs a caller-supplied `TimingClient`, so it cannot be
// built from a config file alone; construct `EnunuBackend` directly instead.

use crate::backend::{EngineBackend, NeutrinoBackend, ProcessRunner, UniformBackend};
use crate::error::ConfigError;
use crate::phonemizer::{HtsPhonemizer, PhonemizerSettings};
use crate::voicebank::{Voicebank, VoicebankConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Uniform,
    Neutrino,
    Enunu,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    pub install_dir: Option<PathBuf>,
    pub model_dir: Option<PathBuf>,
    pub num_threads: usize,
    /// Per-phoneme duration for the uniform backend.
    pub uniform_phoneme_ms: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            kind: EngineKind::Uniform,
            install_dir: None,
            model_dir: None,
            num_threads: 1,
            uniform_phoneme_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HtsConfig {
    pub lang: String,
    pub cache_dir: PathBuf,
    pub pause_symbol: String,
    pub error_symbol: String,
    pub engine: EngineConfig,
    pub voicebank: VoicebankConfig,
}

impl Default for HtsConfig {
    fn default() -> Self {
        let settings = PhonemizerSettings::default();
        HtsConfig {
            lang: settings.lang,
            cache_dir: settings.cache_dir,
            pause_symbol: settings.pause_symbol,
            error_symbol: settings.error_symbol,
            engine: EngineConfig::default(),
            voicebank: VoicebankConfig::default(),
        }
    }
}

impl HtsConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn settings(&self) -> PhonemizerSettings {
        PhonemizerSettings {
            lang: self.lang.clone(),
            cache_dir: self.cache_dir.clone(),
            pause_symbol: self.pause_symbol.clone(),
            error_symbol: self.error_symbol.clone(),
        }
    }

    pub fn build_backend(&self, voicebank: &Voicebank) -> Result<Box<dyn EngineBackend>, ConfigError> {
        let engine = &self.engine;
        match engine.kind {
            EngineKind::Uniform => Ok(Box::new(UniformBackend::new(engine.uniform_phoneme_ms))),
            EngineKind::Neutrino => {
                let install_dir = engine
                    .install_dir
                    .as_deref()
                    .ok_or(ConfigError::MissingSetting("neutrino", "install_dir"))?;
                let model_dir = engine
                    .model_dir
                    .as_deref()
                    .ok_or(ConfigError::MissingSetting("neutrino", "model_dir"))?;
                let backend = NeutrinoBackend::new(install_dir, model_dir, Box::new(ProcessRunner))?
                    .with_voicebank_hash(voicebank.name_hash())
                    .with_threads(engine.num_threads)
                    .with_macrons(&voicebank.macron_suffixes, voicebank.macron_lyrics.clone());
                Ok(Box::new(backend))
            }
            EngineKind::Enunu => Err(ConfigError::MissingSetting("enunu", "a timing client")),
        }
    }

    /// Load the voicebank and build a phonemizer for it.
    pub fn build_phonemizer(&self) -> Result<HtsPhonemizer, ConfigError> {
        let voicebank = Voicebank::load(&self.voicebank);
        let backend = self.build_backend(&voicebank)?;
        Ok(HtsPhonemizer::new(
            &voicebank.name,
            self.settings(),
            Arc::new(voicebank.dictionary),
            voicebank.classes,
            backend,
        ))
    }
}
