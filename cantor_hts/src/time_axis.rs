// Tick <-> millisecond conversion with tempo and time-signature changes.
//
// Positions in a score are integer ticks (`resolution` ticks per quarter
// note, 480 by default). Label times are milliseconds, so every note passes
// through `TimeAxis` on the way out, and every re-aligned phoneme position
// passes back through it on the way in.
//
// Tempo changes are keyed by tick, time-signature changes by bar. The first
// tempo and the first time signature also govern negative ticks, which occur
// for the one-bar padding rest placed before a phrase that starts at tick 0.

use serde::{Deserialize, Serialize};

pub const DEFAULT_RESOLUTION: i32 = 480;
pub const DEFAULT_BPM: f64 = 120.0;

const DEFAULT_TEMPOS: [TempoChange; 1] = [TempoChange {
    tick: 0,
    bpm: DEFAULT_BPM,
}];
const DEFAULT_SIGNATURES: [TimeSignature; 1] = [TimeSignature {
    bar: 0,
    beat_per_bar: 4,
    beat_unit: 4,
}];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TempoChange {
    pub tick: i32,
    pub bpm: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    /// Bar at which this signature takes effect.
    #[serde(default)]
    pub bar: i32,
    pub beat_per_bar: i32,
    pub beat_unit: i32,
}

impl TimeSignature {
    pub fn beat_length_ticks(&self, resolution: i32) -> i32 {
        (resolution * 4 / self.beat_unit.max(1)).max(1)
    }

    pub fn bar_length_ticks(&self, resolution: i32) -> i32 {
        self.beat_per_bar.max(1) * self.beat_length_ticks(resolution)
    }
}

/// Bar/beat coordinates of a tick. All fields are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarBeat {
    pub bar: i32,
    pub beat: i32,
    pub remaining_ticks: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeAxis {
    pub resolution: i32,
    pub tempos: Vec<TempoChange>,
    pub time_signatures: Vec<TimeSignature>,
}

impl Default for TimeAxis {
    fn default() -> Self {
        TimeAxis {
            resolution: DEFAULT_RESOLUTION,
            tempos: DEFAULT_TEMPOS.to_vec(),
            time_signatures: DEFAULT_SIGNATURES.to_vec(),
        }
    }
}

impl TimeAxis {
    /// A constant-tempo axis.
    pub fn new(resolution: i32, bpm: f64, beat_per_bar: i32, beat_unit: i32) -> Self {
        TimeAxis {
            resolution,
            tempos: vec![TempoChange { tick: 0, bpm }],
            time_signatures: vec![TimeSignature {
                bar: 0,
                beat_per_bar,
                beat_unit,
            }],
        }
    }

    pub fn with_tempo(mut self, tick: i32, bpm: f64) -> Self {
        self.tempos.retain(|t| t.tick != tick);
        self.tempos.push(TempoChange { tick, bpm });
        self.tempos.sort_by_key(|t| t.tick);
        self
    }

    pub fn with_time_signature(mut self, bar: i32, beat_per_bar: i32, beat_unit: i32) -> Self {
        self.time_signatures.retain(|s| s.bar != bar);
        self.time_signatures.push(TimeSignature {
            bar,
            beat_per_bar,
            beat_unit,
        });
        self.time_signatures.sort_by_key(|s| s.bar);
        self
    }

    /// Sort changes and drop unusable tempos. Call after deserializing.
    pub fn normalize(&mut self) {
        if self.resolution <= 0 {
            self.resolution = DEFAULT_RESOLUTION;
        }
        self.tempos.retain(|t| t.bpm.is_finite() && t.bpm > 0.0);
        self.tempos.sort_by_key(|t| t.tick);
        self.time_signatures
            .retain(|s| s.beat_per_bar > 0 && s.beat_unit > 0);
        self.time_signatures.sort_by_key(|s| s.bar);
    }

    fn tempo_list(&self) -> &[TempoChange] {
        if self.tempos.is_empty() {
            &DEFAULT_TEMPOS
        } else {
            &self.tempos
        }
    }

    fn signature_list(&self) -> &[TimeSignature] {
        if self.time_signatures.is_empty() {
            &DEFAULT_SIGNATURES
        } else {
            &self.time_signatures
        }
    }

    fn ms_per_tick(&self, bpm: f64) -> f64 {
        60_000.0 / (bpm * self.resolution as f64)
    }

    /// Start tick of each tempo segment. The first segment starts at 0 and
    /// extends backwards.
    fn tempo_start(index: usize, tempo: &TempoChange) -> i32 {
        if index == 0 { 0 } else { tempo.tick }
    }

    pub fn tick_to_ms(&self, tick: i32) -> f64 {
        let tempos = self.tempo_list();
        let mut ms = 0.0;
        for (i, tempo) in tempos.iter().enumerate() {
            let start = Self::tempo_start(i, tempo);
            let mpt = self.ms_per_tick(tempo.bpm);
            match tempos.get(i + 1) {
                Some(next) if tick > next.tick => {
                    ms += (next.tick - start) as f64 * mpt;
                }
                _ => return ms + (tick - start) as f64 * mpt,
            }
        }
        ms
    }

    /// Nearest tick to an absolute millisecond position.
    pub fn ms_to_tick(&self, ms: f64) -> i32 {
        let tempos = self.tempo_list();
        let mut acc = 0.0;
        for (i, tempo) in tempos.iter().enumerate() {
            let start = Self::tempo_start(i, tempo);
            let mpt = self.ms_per_tick(tempo.bpm);
            if let Some(next) = tempos.get(i + 1) {
                let segment = (next.tick - start) as f64 * mpt;
                if ms > acc + segment {
                    acc += segment;
                    continue;
                }
            }
            return start + ((ms - acc) / mpt).round() as i32;
        }
        0
    }

    pub fn ms_between(&self, start_tick: i32, end_tick: i32) -> f64 {
        self.tick_to_ms(end_tick) - self.tick_to_ms(start_tick)
    }

    pub fn ticks_between_ms(&self, start_ms: f64, end_ms: f64) -> i32 {
        self.ms_to_tick(end_ms) - self.ms_to_tick(start_ms)
    }

    pub fn bpm_at_tick(&self, tick: i32) -> f64 {
        let tempos = self.tempo_list();
        tempos
            .iter()
            .rev()
            .find(|t| t.tick <= tick)
            .unwrap_or(&tempos[0])
            .bpm
    }

    /// `(start tick, signature)` for each signature segment.
    fn signature_segments(&self) -> Vec<(i32, TimeSignature)> {
        let signatures = self.signature_list();
        let mut segments = Vec::with_capacity(signatures.len());
        let mut start_tick = 0;
        let mut start_bar = signatures[0].bar.min(0);
        let mut prev: Option<TimeSignature> = None;
        for sig in signatures {
            if let Some(prev) = prev {
                start_tick += (sig.bar - start_bar) * prev.bar_length_ticks(self.resolution);
                start_bar = sig.bar;
            }
            let mut sig = *sig;
            if prev.is_none() {
                sig.bar = start_bar;
            }
            segments.push((start_tick, sig));
            prev = Some(sig);
        }
        segments
    }

    fn segment_at_tick(&self, tick: i32) -> (i32, TimeSignature) {
        let segments = self.signature_segments();
        segments
            .iter()
            .rev()
            .find(|(start, _)| *start <= tick)
            .copied()
            .unwrap_or(segments[0])
    }

    pub fn time_signature_at_tick(&self, tick: i32) -> TimeSignature {
        self.segment_at_tick(tick).1
    }

    pub fn tick_to_bar_beat(&self, tick: i32) -> BarBeat {
        let (start, sig) = self.segment_at_tick(tick);
        let bar_len = sig.bar_length_ticks(self.resolution);
        let beat_len = sig.beat_length_ticks(self.resolution);
        let offset = tick - start;
        let in_bar = offset.rem_euclid(bar_len);
        BarBeat {
            bar: sig.bar + offset.div_euclid(bar_len),
            beat: in_bar / beat_len,
            remaining_ticks: in_bar % beat_len,
        }
    }

    /// Length in ticks of the bar containing `tick`.
    pub fn bar_length_ticks(&self, tick: i32) -> i32 {
        self.time_signature_at_tick(tick)
            .bar_length_ticks(self.resolution)
    }
}
