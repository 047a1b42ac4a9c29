// Tone and integer formatting helpers for HTS labels.
//
// HTS labels spell pitches with flats only (`Db4`, never `C#4`) and write
// signed integers with a letter prefix (`p3`, `m2`, `p0`) because `-` is a
// field separator in the label grammar. Tone numbers are MIDI-style:
// 60 = C4.

/// Pitch-class names as written in labels.
pub const KEYS_IN_OCTAVE: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Pitch class for a note name, accepting both `#` and `b` spellings.
pub fn name_in_octave(name: &str) -> Option<i32> {
    let pc = match name {
        "C" => 0,
        "C#" | "Db" => 1,
        "D" => 2,
        "D#" | "Eb" => 3,
        "E" => 4,
        "F" => 5,
        "F#" | "Gb" => 6,
        "G" => 7,
        "G#" | "Ab" => 8,
        "A" => 9,
        "A#" | "Bb" => 10,
        "B" => 11,
        _ => return None,
    };
    Some(pc)
}

/// Label name for a tone, e.g. 60 -> `C4`. `None` for negative tones.
pub fn tone_name(tone: i32) -> Option<String> {
    if tone < 0 {
        return None;
    }
    let pc = tone.rem_euclid(12) as usize;
    Some(format!("{}{}", KEYS_IN_OCTAVE[pc], tone / 12 - 1))
}

/// Pitch class (0..=11) of a tone as a string. `None` for negative tones.
pub fn octave_num(tone: i32) -> Option<String> {
    if tone < 0 {
        return None;
    }
    Some(tone.rem_euclid(12).to_string())
}

/// Parse a note name such as `C4`, `C#4` or `Bb-1` into a tone number.
pub fn name_to_tone(name: &str) -> Option<i32> {
    let mut chars = name.chars();
    let first = chars.next()?.len_utf8();
    let split = match chars.next() {
        Some('#') | Some('b') => first + 1,
        Some(_) => first,
        None => return None,
    };
    let (pitch, octave) = name.split_at(split);
    let octave: i32 = octave.parse().ok()?;
    Some(12 * (octave + 1) + name_in_octave(pitch)?)
}

/// Write an integer with `p` for non-negative and `m` for negative values.
pub fn write_int(value: i32) -> String {
    let sign = if value >= 0 { 'p' } else { 'm' };
    format!("{sign}{}", value.unsigned_abs())
}

/// Inverse of `write_int`.
pub fn read_int(text: &str) -> Option<i32> {
    let (negative, digits) = match text.as_bytes().first()? {
        b'p' => (false, &text[1..]),
        b'm' => (true, &text[1..]),
        _ => return None,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude: i64 = digits.parse().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    i32::try_from(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_names() {
        assert_eq!(tone_name(60).as_deref(), Some("C4"));
        assert_eq!(tone_name(61).as_deref(), Some("Db4"));
        assert_eq!(tone_name(0).as_deref(), Some("C-1"));
        assert_eq!(tone_name(-1), None);
        assert_eq!(octave_num(70).as_deref(), Some("10"));
    }

    #[test]
    fn test_name_to_tone() {
        assert_eq!(name_to_tone("C4"), Some(60));
        assert_eq!(name_to_tone("C#4"), Some(61));
        assert_eq!(name_to_tone("Db4"), Some(61));
        assert_eq!(name_to_tone("B-1"), Some(11));
        assert_eq!(name_to_tone("H4"), None);
        assert_eq!(name_to_tone("C"), None);
        assert_eq!(name_to_tone(""), None);
    }

    #[test]
    fn test_tone_name_roundtrip() {
        for tone in 0..128 {
            let name = tone_name(tone).unwrap();
            assert_eq!(name_to_tone(&name), Some(tone), "tone {tone} via {name}");
        }
    }

    #[test]
    fn test_write_int() {
        assert_eq!(write_int(0), "p0");
        assert_eq!(write_int(7), "p7");
        assert_eq!(write_int(-12), "m12");
        assert_eq!(write_int(i32::MIN), "m2147483648");
    }

    #[test]
    fn test_read_int_inverts_write_int() {
        for n in [-1000, -13, -1, 0, 1, 2, 99, i32::MAX, i32::MIN] {
            assert_eq!(read_int(&write_int(n)), Some(n));
        }
        assert_eq!(read_int("x1"), None);
        assert_eq!(read_int("p"), None);
        assert_eq!(read_int("m-3"), None);
        assert_eq!(read_int(""), None);
    }
}
