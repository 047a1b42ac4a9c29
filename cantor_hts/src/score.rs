// Editor-side score model: notes, note groups, and the JSON score file.
//
// A `ScoreNote` is one note as the editor sees it (lyric, tick position,
// duration, MIDI tone). Notes are processed in *groups*: a lyric note plus
// the `+`-prefixed continuation notes that follow it. The syllable builder
// works on one group at a time, and timing results are keyed by the tick
// position of each group's lead note.
//
// `Score` is only used by the `hts-label` binary and the integration tests;
// library callers pass note groups and a `TimeAxis` directly.

use crate::time_axis::TimeAxis;
use serde::{Deserialize, Serialize};

/// A lyric note plus its continuation notes.
pub type NoteGroup = Vec<ScoreNote>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreNote {
    pub lyric: String,
    /// Space-separated phoneme symbols overriding dictionary lookup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phonetic_hint: Option<String>,
    pub position: i32,
    pub duration: i32,
    pub tone: i32,
    #[serde(default)]
    pub tone_shift: i32,
}

impl ScoreNote {
    pub fn new(lyric: &str, position: i32, duration: i32, tone: i32) -> Self {
        ScoreNote {
            lyric: lyric.to_string(),
            phonetic_hint: None,
            position,
            duration,
            tone,
            tone_shift: 0,
        }
    }

    pub fn with_hint(mut self, hint: &str) -> Self {
        self.phonetic_hint = Some(hint.to_string());
        self
    }

    pub fn end(&self) -> i32 {
        self.position + self.duration
    }

    /// Continuation notes (`+`, `+~a`, `+*`) attach to the previous group.
    pub fn is_continuation(&self) -> bool {
        self.lyric.starts_with('+')
    }
}

/// Group a flat, position-ordered note list. A continuation note with no
/// preceding group starts its own.
pub fn group_notes(notes: &[ScoreNote]) -> Vec<NoteGroup> {
    let mut groups: Vec<NoteGroup> = Vec::new();
    for note in notes {
        match groups.last_mut() {
            Some(group) if note.is_continuation() => group.push(note.clone()),
            _ => groups.push(vec![note.clone()]),
        }
    }
    groups
}

/// A score as loaded by the command-line tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    #[serde(default)]
    pub time_axis: TimeAxis,
    #[serde(default)]
    pub key: i32,
    pub notes: Vec<ScoreNote>,
}

impl Score {
    /// Parse a score from a JSON string. Notes are sorted by position.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut score: Score = serde_json::from_str(json)?;
        score.time_axis.normalize();
        score.notes.sort_by_key(|n| n.position);
        Ok(score)
    }

    pub fn groups(&self) -> Vec<NoteGroup> {
        group_notes(&self.notes)
    }
}
