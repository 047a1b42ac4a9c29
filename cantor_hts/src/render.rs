// Multi-track set-up driver.
//
// Each track has its own phonemizer (singer, backend, cache) and note
// groups. Tracks are set up in parallel on the rayon pool; label writing and
// re-alignment overlap across tracks, while the engine calls themselves are
// still serialized by the engine lock in `phonemizer.rs`.

use crate::phonemizer::{HtsPhonemizer, SetUpReport};
use crate::score::NoteGroup;
use crate::time_axis::TimeAxis;
use rayon::prelude::*;
use tracing::info;

pub struct TrackJob {
    pub phonemizer: HtsPhonemizer,
    pub groups: Vec<NoteGroup>,
    pub key: i32,
}

/// Set up every track. Reports come back in track order.
pub fn render_tracks(jobs: &mut [TrackJob], time_axis: &TimeAxis) -> Vec<SetUpReport> {
    let reports: Vec<SetUpReport> = jobs
        .par_iter_mut()
        .map(|job| job.phonemizer.set_up(&job.groups, time_axis, job.key))
        .collect();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    info!(tracks = jobs.len(), failed, "render pass finished");
    reports
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::UniformBackend;
    use crate::phonemizer::PhonemizerSettings;
    use crate::score::ScoreNote;
    use cantor_g2p::{G2pDictionary, SymbolClasses};
    use std::sync::Arc;

    fn job(cache_dir: std::path::PathBuf, lyric: &str, tone: i32) -> TrackJob {
        let g2p = G2pDictionary::builder()
            .add_symbol("a", true)
            .add_symbol("i", true)
            .add_symbol("k", false)
            .add_entry("ka", ["k", "a"])
            .add_entry("ki", ["k", "i"])
            .build();
        let settings = PhonemizerSettings {
            cache_dir,
            ..Default::default()
        };
        TrackJob {
            phonemizer: HtsPhonemizer::new(
                lyric,
                settings,
                Arc::new(g2p),
                SymbolClasses::default(),
                Box::new(UniformBackend::new(80)),
            ),
            groups: vec![
                vec![ScoreNote::new(lyric, 0, 480, tone)],
                vec![ScoreNote::new(lyric, 480, 480, tone)],
            ],
            key: 0,
        }
    }

    #[test]
    fn test_render_tracks_in_parallel() {
        let dir = tempfile::tempdir().unwrap();
        let mut jobs: Vec<TrackJob> = (0..4)
            .map(|i| {
                let lyric = if i % 2 == 0 { "ka" } else { "ki" };
                job(dir.path().join(format!("track{i}")), lyric, 60 + i)
            })
            .collect();
        let reports = render_tracks(&mut jobs, &TimeAxis::default());
        assert_eq!(reports.len(), 4);
        assert!(reports.iter().all(|r| r.phrases == 1 && r.failed == 0));
        let second = jobs[1].phonemizer.process(&jobs[1].groups[1]).unwrap();
        assert_eq!(second[1].symbol, "i");
        assert_eq!(second[1].position, 0);
    }
}
