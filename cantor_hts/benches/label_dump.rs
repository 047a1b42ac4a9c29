// Benchmarks for phrase assembly and full-context label serialization.
//
// Builds a long contiguous phrase (alternating `ka` / `saki` groups) and
// measures `build_phrase` and `full_label` separately. Every label line
// recomputes its note's `/E:` array and both neighbours' for `/D:` and
// `/F:`, so label dumping dominates on long phrases.
//
// Run with: cargo bench -p cantor_hts --bench label_dump

use cantor_g2p::{G2pDictionary, SymbolClasses};
use cantor_hts::backend::UniformBackend;
use cantor_hts::label::full_label;
use cantor_hts::phrase::{PhraseContext, build_phrase};
use cantor_hts::score::{NoteGroup, ScoreNote, group_notes};
use cantor_hts::time_axis::TimeAxis;
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

fn dictionary() -> G2pDictionary {
    G2pDictionary::builder()
        .add_symbol("a", true)
        .add_symbol("i", true)
        .add_symbol("k", false)
        .add_symbol("s", false)
        .add_entry("ka", ["k", "a"])
        .add_entry("saki", ["s", "a", "k", "i"])
        .build()
}

fn groups(count: usize) -> Vec<NoteGroup> {
    let mut notes = Vec::new();
    let mut position = 0;
    for i in 0..count {
        if i % 2 == 0 {
            notes.push(ScoreNote::new("ka", position, 240, 60 + (i % 12) as i32));
            position += 240;
        } else {
            notes.push(ScoreNote::new("saki", position, 240, 62));
            notes.push(ScoreNote::new("+", position + 240, 240, 64));
            position += 480;
        }
    }
    group_notes(&notes)
}

fn bench_label_dump(c: &mut Criterion) {
    let axis = TimeAxis::default().with_tempo(9600, 140.0);
    let g2p = dictionary();
    let classes = SymbolClasses::default();
    let backend = UniformBackend::new(100);
    let ctx = PhraseContext {
        time_axis: &axis,
        g2p: &g2p,
        classes: &classes,
        backend: &backend,
        lang: "JPN",
        key: 0,
        pause_symbol: "pau",
    };

    let mut group = c.benchmark_group("label_dump");
    for count in [16, 128, 512] {
        let input = groups(count);
        group.bench_with_input(BenchmarkId::new("build_phrase", count), &input, |b, input| {
            b.iter(|| build_phrase(&ctx, black_box(input)))
        });
        let built = match build_phrase(&ctx, &input) {
            Ok(built) => built,
            Err(e) => panic!("phrase failed to build: {e}"),
        };
        group.bench_with_input(BenchmarkId::new("full_label", count), &built, |b, built| {
            b.iter(|| full_label(black_box(&built.phrase)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_label_dump);
criterion_main!(benches);
