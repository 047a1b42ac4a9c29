// Per-phrase cache directories on disk.
//
// Each phrase gets a directory `lab-{hash}_htstemp` under the configured
// cache root, where `hash` is a 64-bit content hash of every note in the
// phrase, continuation notes included. Identical phrases map to the same directory, so an engine backend
// that finds its timing file already present can skip the engine call.

use crate::error::PhraseError;
use crate::score::NoteGroup;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

pub const FULL_SCORE: &str = "full_score.lab";
pub const FULL_TIMING: &str = "full_timing.lab";
pub const MONO_SCORE: &str = "mono_score.lab";
pub const MONO_TIMING: &str = "mono_timing.lab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PhraseHash(pub u64);

impl fmt::Display for PhraseHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

fn update_str(hasher: &mut Sha256, text: &str) {
    hasher.update((text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}

/// Hash of (lyric, hint, tone shift, position, duration) over every note of
/// every group. Group boundaries are hashed too.
pub fn hash_phrase(groups: &[NoteGroup]) -> PhraseHash {
    let mut hasher = Sha256::new();
    for group in groups {
        hasher.update((group.len() as u64).to_le_bytes());
    }
    for note in groups.iter().flatten() {
        update_str(&mut hasher, &note.lyric);
        match &note.phonetic_hint {
            Some(hint) => {
                hasher.update([1u8]);
                update_str(&mut hasher, hint);
            }
            None => hasher.update([0u8]),
        }
        hasher.update(note.tone_shift.to_le_bytes());
        hasher.update(note.position.to_le_bytes());
        hasher.update(note.duration.to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    PhraseHash(u64::from_be_bytes(head))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhraseCacheDir {
    pub hash: PhraseHash,
    pub dir: PathBuf,
}

impl PhraseCacheDir {
    pub fn new(cache_root: &Path, hash: PhraseHash) -> Self {
        PhraseCacheDir {
            hash,
            dir: cache_root.join(format!("lab-{hash}_htstemp")),
        }
    }

    pub fn full_score(&self) -> PathBuf {
        self.dir.join(FULL_SCORE)
    }

    pub fn full_timing(&self) -> PathBuf {
        self.dir.join(FULL_TIMING)
    }

    pub fn mono_score(&self) -> PathBuf {
        self.dir.join(MONO_SCORE)
    }

    pub fn mono_timing(&self) -> PathBuf {
        self.dir.join(MONO_TIMING)
    }

    /// Create the directory if missing.
    pub fn create(&self) -> Result<(), PhraseError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| PhraseError::io(&self.dir, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreNote;

    fn groups() -> Vec<NoteGroup> {
        vec![
            vec![ScoreNote::new("ka", 0, 480, 60), ScoreNote::new("+~a", 480, 480, 62)],
            vec![ScoreNote::new("ki", 960, 480, 64)],
        ]
    }

    #[test]
    fn test_hash_is_stable_and_content_sensitive() {
        let base = hash_phrase(&groups());
        assert_eq!(base, hash_phrase(&groups()));

        let mut moved = groups();
        moved[1][0].position = 1000;
        assert_ne!(base, hash_phrase(&moved));

        let mut hinted = groups();
        hinted[0][0] = hinted[0][0].clone().with_hint("k a");
        assert_ne!(base, hash_phrase(&hinted));

        let mut shifted = groups();
        shifted[0][0].tone_shift = 1;
        assert_ne!(base, hash_phrase(&shifted));

        let mut extended = groups();
        extended[0][1].duration = 240;
        assert_ne!(base, hash_phrase(&extended));

        let mut plain = groups();
        plain[0][1].lyric = "+".to_string();
        assert_ne!(base, hash_phrase(&plain));
    }

    #[test]
    fn test_length_prefix_separates_fields() {
        let a = vec![vec![ScoreNote::new("ab", 0, 1, 60)], vec![ScoreNote::new("c", 0, 1, 60)]];
        let b = vec![vec![ScoreNote::new("a", 0, 1, 60)], vec![ScoreNote::new("bc", 0, 1, 60)]];
        assert_ne!(hash_phrase(&a), hash_phrase(&b));
    }

    #[test]
    fn test_cache_dir_layout() {
        let root = tempfile::tempdir().unwrap();
        let dir = PhraseCacheDir::new(root.path(), PhraseHash(0xab));
        assert_eq!(dir.dir.file_name().unwrap(), "lab-00000000000000ab_htstemp");
        assert_eq!(dir.mono_timing().file_name().unwrap(), MONO_TIMING);
        dir.create().unwrap();
        dir.create().unwrap();
        assert!(dir.dir.is_dir());
        assert_eq!(dir.full_score().parent(), Some(dir.dir.as_path()));
    }
}
