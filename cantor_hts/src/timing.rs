// Timing re-alignment: map engine-predicted phoneme durations onto the
// score's anchor positions.
//
// The engine returns one duration per phoneme, in its own sense of time.
// The score fixes where each syllable's first vowel must start (an
// `AlignmentPoint`), plus a final point at the end of the phrase. Between two
// consecutive anchors the engine durations are scaled linearly so the window
// ends exactly on the next anchor; everything before the first anchor keeps
// its engine durations and is laid out so it ends on that anchor.
//
// The result is one absolute millisecond start position per phoneme.

use crate::error::AlignmentError;

/// A phoneme index whose start must land on `ms`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignmentPoint {
    pub phoneme_index: usize,
    pub ms: f64,
}

impl AlignmentPoint {
    pub fn new(phoneme_index: usize, ms: f64) -> Self {
        AlignmentPoint { phoneme_index, ms }
    }
}

/// Scale `durations` by `ratio` and lay them out so the last one ends at
/// `end_ms`. Returns the start position of each duration.
pub fn stretch(durations: &[f64], ratio: f64, end_ms: f64) -> Vec<f64> {
    let total: f64 = durations.iter().sum::<f64>() * ratio;
    let mut position = end_ms - total;
    durations
        .iter()
        .map(|d| {
            let start = position;
            position += d * ratio;
            start
        })
        .collect()
}

fn validate(len: usize, anchors: &[AlignmentPoint]) -> Result<(), AlignmentError> {
    if anchors.is_empty() {
        return Err(AlignmentError::NoAnchors);
    }
    for (position, pair) in anchors.windows(2).enumerate() {
        if pair[1].phoneme_index < pair[0].phoneme_index {
            return Err(AlignmentError::AnchorsOutOfOrder {
                position: position + 1,
            });
        }
    }
    if let Some(bad) = anchors.iter().find(|a| a.phoneme_index > len) {
        return Err(AlignmentError::AnchorOutOfRange {
            index: bad.phoneme_index,
            len,
        });
    }
    Ok(())
}

/// Absolute start position (ms) of every phoneme after re-alignment.
pub fn realign(durations: &[f64], anchors: &[AlignmentPoint]) -> Result<Vec<f64>, AlignmentError> {
    validate(durations.len(), anchors)?;
    let mut positions = Vec::with_capacity(durations.len());

    let first = anchors[0];
    positions.extend(stretch(&durations[..first.phoneme_index], 1.0, first.ms));

    for pair in anchors.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let window = &durations[a.phoneme_index..b.phoneme_index];
        if window.is_empty() {
            continue;
        }
        let span = b.ms - a.ms;
        let sum: f64 = window.iter().sum();
        if sum > 0.0 {
            positions.extend(stretch(window, span / sum, b.ms));
        } else {
            let even = vec![span / window.len() as f64; window.len()];
            positions.extend(stretch(&even, 1.0, b.ms));
        }
    }

    // Phonemes past the last anchor keep engine timing.
    let last = anchors[anchors.len() - 1];
    let tail = &durations[last.phoneme_index..];
    let tail_sum: f64 = tail.iter().sum();
    positions.extend(stretch(tail, 1.0, last.ms + tail_sum));

    Ok(positions)
}
