// Label file writer and reader.
//
// Writes one full-context line per phoneme (`full_score.lab`) and one
// `start end symbol` line per phoneme (`mono_score.lab`), and reads back the
// timing labels an engine produces, which may be in either form. Times on
// disk are 100-nanosecond units: note milliseconds times 10000.
//
// The separator strings below are the label grammar. Each one holds the
// characters written *between* consecutive fields of its group, so a group
// of N fields has N-1 separators. Acoustic models parse these positionally;
// do not reorder them.

use crate::context::{
    E_FIELDS, HtsPhrase, J_FIELDS, NEIGHBOR_NOTE_FIELDS, P_FIELDS, PHRASE_FIELDS, PhonemeView,
    SYLLABLE_FIELDS,
};
use crate::error::LabelError;
use std::fmt::Write as _;
use std::path::Path;

/// Milliseconds to label time units.
pub const TIME_UNITS_PER_MS: i64 = 10_000;

pub const P_SEPARATORS: &str = "@^-+=_%^_~-![$]";
pub const A_SEPARATORS: &str = "--@~";
pub const B_SEPARATORS: &str = "__@|";
pub const C_SEPARATORS: &str = "++@&";
pub const D_SEPARATORS: &str = "!#$%|&;-";
pub const E_SEPARATORS: &str = "]^=~!@#+]$|[&]=^~#_;$&%[|]-^+~=@$!%#||-&&+[;];~~^^@[#=!~+!^";
pub const F_SEPARATORS: &str = "##-$$+%;";
pub const PHRASE_SEPARATORS: &str = "_";
pub const J_SEPARATORS: &str = "~@";

/// Interleave fields with single-character separators.
pub fn join_fields(out: &mut String, fields: &[String], separators: &str) {
    let mut seps = separators.chars();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(seps.next().unwrap_or('_'));
        }
        out.push_str(field);
    }
}

/// One full-context label line, without a trailing newline.
pub fn dump_phoneme(view: PhonemeView<'_>) -> String {
    let note = view.note().note();
    let mut line = String::with_capacity(512);
    let _ = write!(
        line,
        "{} {} ",
        note.start_ms as i64 * TIME_UNITS_PER_MS,
        note.end_ms as i64 * TIME_UNITS_PER_MS
    );
    join_fields(&mut line, &view.p(), P_SEPARATORS);
    line.push_str("/A:");
    join_fields(&mut line, &view.a(), A_SEPARATORS);
    line.push_str("/B:");
    join_fields(&mut line, &view.b(), B_SEPARATORS);
    line.push_str("/C:");
    join_fields(&mut line, &view.c(), C_SEPARATORS);
    line.push_str("/D:");
    join_fields(&mut line, &view.d(), D_SEPARATORS);
    line.push_str("/E:");
    join_fields(&mut line, &view.e(), E_SEPARATORS);
    line.push_str("/F:");
    join_fields(&mut line, &view.f(), F_SEPARATORS);
    line.push_str("/G:");
    join_fields(&mut line, &view.g(), PHRASE_SEPARATORS);
    line.push_str("/H:");
    join_fields(&mut line, &view.h(), PHRASE_SEPARATORS);
    line.push_str("/I:");
    join_fields(&mut line, &view.i(), PHRASE_SEPARATORS);
    line.push_str("/J:");
    join_fields(&mut line, &view.j(), J_SEPARATORS);
    line
}

pub fn full_label(phrase: &HtsPhrase) -> String {
    let mut text = String::new();
    for view in phrase.phoneme_views() {
        text.push_str(&dump_phoneme(view));
        text.push('\n');
    }
    text
}

pub fn mono_label(phrase: &HtsPhrase) -> String {
    let mut text = String::new();
    for view in phrase.phoneme_views() {
        let note = view.note().note();
        let _ = writeln!(
            text,
            "{} {} {}",
            note.start_ms as i64 * TIME_UNITS_PER_MS,
            note.end_ms as i64 * TIME_UNITS_PER_MS,
            view.phoneme().symbol
        );
    }
    text
}

pub fn write_full_label(phrase: &HtsPhrase, path: &Path) -> Result<(), LabelError> {
    std::fs::write(path, full_label(phrase)).map_err(|e| LabelError::io(path, e))
}

pub fn write_mono_label(phrase: &HtsPhrase, path: &Path) -> Result<(), LabelError> {
    std::fs::write(path, mono_label(phrase)).map_err(|e| LabelError::io(path, e))
}

/// One parsed label line. Times are in label units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelEntry {
    pub start: i64,
    pub end: i64,
    pub label: String,
}

impl LabelEntry {
    /// The phoneme symbol: the label itself for mono labels, `p3` for
    /// full-context labels.
    pub fn symbol(&self) -> &str {
        let Some((_, rest)) = self.label.split_once('@') else {
            return &self.label;
        };
        let current = rest
            .split_once('^')
            .and_then(|(_, rest)| rest.split_once('-'))
            .and_then(|(_, rest)| rest.split_once('+'))
            .map(|(current, _)| current);
        current.unwrap_or(&self.label)
    }

    pub fn duration_ms(&self) -> f64 {
        (self.end - self.start) as f64 / TIME_UNITS_PER_MS as f64
    }
}

pub fn parse_label(text: &str) -> Result<Vec<LabelEntry>, LabelError> {
    let mut entries = Vec::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || LabelError::Malformed {
            line: i + 1,
            text: line.to_string(),
        };
        let mut parts = line.splitn(3, char::is_whitespace);
        let start: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(malformed)?;
        let end: i64 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(malformed)?;
        let label = parts.next().map(str::trim).unwrap_or_default();
        if label.is_empty() {
            return Err(malformed());
        }
        if end < start {
            return Err(LabelError::NegativeDuration {
                line: i + 1,
                start,
                end,
            });
        }
        entries.push(LabelEntry {
            start,
            end,
            label: label.to_string(),
        });
    }
    Ok(entries)
}

pub fn read_label_file(path: &Path) -> Result<Vec<LabelEntry>, LabelError> {
    let text = std::fs::read_to_string(path).map_err(|e| LabelError::io(path, e))?;
    parse_label(&text)
}

pub fn durations_ms(entries: &[LabelEntry]) -> Vec<f64> {
    entries.iter().map(LabelEntry::duration_ms).collect()
}

const _: () = {
    assert!(P_SEPARATORS.len() == P_FIELDS - 1);
    assert!(A_SEPARATORS.len() == SYLLABLE_FIELDS - 1);
    assert!(D_SEPARATORS.len() == NEIGHBOR_NOTE_FIELDS - 1);
    assert!(E_SEPARATORS.len() == E_FIELDS - 1);
    assert!(PHRASE_SEPARATORS.len() == PHRASE_FIELDS - 1);
    assert!(J_SEPARATORS.len() == J_FIELDS - 1);
};
