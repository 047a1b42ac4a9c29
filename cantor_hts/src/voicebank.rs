// Voicebank dictionary loading.
//
// A voicebank provides phoneme knowledge in one of two forms: a JSON
// dictionary (`G2pDictionary::from_json`), or a NEUTRINO-style table + conf
// pair (`PhoneTable`). Loading never fails: a missing or malformed file is
// logged and the voicebank falls back to whatever loaded, possibly an empty
// dictionary, in which case every lyric resolves to a pause.
//
// See also: `config.rs` (`VoicebankConfig` names the files), `backend.rs`
// (NEUTRINO needs the macron lists gathered here).

use cantor_g2p::{G2pDictionary, PhoneTable, SymbolClasses};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoicebankConfig {
    pub name: String,
    /// JSON dictionary. Takes precedence over table/conf when both are set.
    pub dictionary: Option<PathBuf>,
    pub table: Option<PathBuf>,
    pub conf: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct Voicebank {
    pub name: String,
    pub dictionary: G2pDictionary,
    pub classes: SymbolClasses,
    pub macron_suffixes: Vec<String>,
    pub macron_lyrics: BTreeSet<String>,
}

fn read(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            error!(path = %path.display(), error = %e, "failed to read dictionary file");
            None
        }
    }
}

impl Voicebank {
    pub fn load(config: &VoicebankConfig) -> Self {
        let mut voicebank = Voicebank {
            name: config.name.clone(),
            ..Default::default()
        };
        if let Some(path) = &config.dictionary {
            voicebank.load_json(path);
        } else if config.table.is_some() || config.conf.is_some() {
            voicebank.load_table(config.table.as_deref(), config.conf.as_deref());
        }
        info!(
            singer = %voicebank.name,
            symbols = voicebank.dictionary.symbol_count(),
            entries = voicebank.dictionary.entry_count(),
            "voicebank loaded"
        );
        voicebank
    }

    fn load_json(&mut self, path: &Path) {
        let Some(text) = read(path) else { return };
        match G2pDictionary::from_json(&text) {
            Ok(dictionary) => self.dictionary = dictionary,
            Err(e) => error!(path = %path.display(), error = %e, "failed to load dictionary"),
        }
    }

    fn load_table(&mut self, table: Option<&Path>, conf: Option<&Path>) {
        let mut phone_table = PhoneTable::new();
        if let Some(path) = conf
            && let Some(text) = read(path)
            && let Err(e) = phone_table.merge_conf_str(&text)
        {
            error!(path = %path.display(), error = %e, "failed to parse conf");
        }
        if let Some(path) = table
            && let Some(text) = read(path)
            && let Err(e) = phone_table.merge_table_str(&text)
        {
            error!(path = %path.display(), error = %e, "failed to parse table");
        }
        phone_table.add_rest_aliases();

        match phone_table.to_dictionary() {
            Ok(dictionary) => self.dictionary = dictionary,
            Err(e) => {
                error!(singer = %self.name, error = %e, "failed to build dictionary");
                return;
            }
        }
        if let Ok(classes) = phone_table.symbol_classes() {
            self.classes = classes;
        }
        self.macron_suffixes = phone_table.macron_suffixes().to_vec();
        self.macron_lyrics = phone_table.macron_lyrics();
    }

    /// 64-bit hash of the voicebank name, used to name engine scratch files.
    pub fn name_hash(&self) -> u64 {
        let digest = Sha256::digest(self.name.as_bytes());
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cantor_g2p::{G2p, PhonemeType};

    const CONF: &str = "VOWELS=\"a,i\"\nPHONEME_CL=\"cl\"\nMACRON=\"ー\"\n";
    const TABLE: &str = "か k a\nき k i\n";

    #[test]
    fn test_load_table_and_conf() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("japanese.utf_8.table");
        let conf = dir.path().join("japanese.utf_8.conf");
        std::fs::write(&table, TABLE).unwrap();
        std::fs::write(&conf, CONF).unwrap();
        let voicebank = Voicebank::load(&VoicebankConfig {
            name: "test".to_string(),
            dictionary: None,
            table: Some(table),
            conf: Some(conf),
        });
        assert_eq!(voicebank.dictionary.query("か"), Some(vec!["k".to_string(), "a".to_string()]));
        assert_eq!(voicebank.dictionary.query("r"), None);
        assert_eq!(voicebank.dictionary.query("R"), Some(vec!["pau".to_string()]));
        assert!(voicebank.dictionary.is_vowel("a"));
        assert_eq!(voicebank.classes.classify("pau"), PhonemeType::Pause);
        assert_eq!(voicebank.macron_suffixes, vec!["ー".to_string()]);
        assert!(voicebank.macron_lyrics.contains("かー"));
    }

    #[test]
    fn test_missing_files_fall_back_to_empty() {
        let voicebank = Voicebank::load(&VoicebankConfig {
            name: "ghost".to_string(),
            dictionary: Some(PathBuf::from("/nonexistent/dict.json")),
            ..Default::default()
        });
        assert!(voicebank.dictionary.is_empty());
    }

    #[test]
    fn test_malformed_json_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.json");
        std::fs::write(&path, "{ not json").unwrap();
        let voicebank = Voicebank::load(&VoicebankConfig {
            dictionary: Some(path),
            ..Default::default()
        });
        assert!(voicebank.dictionary.is_empty());
    }

    #[test]
    fn test_name_hash_is_stable() {
        let a = Voicebank {
            name: "singer".to_string(),
            ..Default::default()
        };
        let b = a.clone();
        assert_eq!(a.name_hash(), b.name_hash());
        let c = Voicebank {
            name: "other".to_string(),
            ..Default::default()
        };
        assert_ne!(a.name_hash(), c.name_hash());
    }
}
