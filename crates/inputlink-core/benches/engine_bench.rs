//! Criterion benchmarks for the per-tick input state machines.
//!
//! Every tick runs a full diff over the tracked key set, a sequence update,
//! and an ordering-buffer flush, so these must stay far below the tick
//! interval (50 ms by default) even when many keys are held.
//!
//! Run with:
//! ```bash
//! cargo bench --package inputlink-core --bench engine_bench
//! ```

use std::collections::BTreeSet;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use inputlink_core::{DiffTracker, EventOrderingBuffer, KeyCode, SequenceDetector};

/// A short typing burst with chords, used as a repeating tick script.
fn script() -> Vec<BTreeSet<KeyCode>> {
    use KeyCode::*;
    let ticks: [&[KeyCode]; 8] = [
        &[LeftShift],
        &[LeftShift, H],
        &[H],
        &[],
        &[LeftControl, LeftShift, T],
        &[LeftControl, T],
        &[LeftControl, LeftShift, T],
        &[],
    ];
    ticks.iter().map(|t| t.iter().copied().collect()).collect()
}

fn bench_diff_idle(c: &mut Criterion) {
    let mut tracker = DiffTracker::new();
    let empty = BTreeSet::new();
    c.bench_function("diff/idle", |b| {
        b.iter(|| black_box(tracker.diff(black_box(&empty))))
    });
}

fn bench_diff_all_keys_held(c: &mut Criterion) {
    let all: BTreeSet<KeyCode> = KeyCode::TRACKED.iter().copied().collect();
    let mut tracker = DiffTracker::new();
    tracker.diff(&all);
    c.bench_function("diff/all_held", |b| {
        b.iter(|| black_box(tracker.diff(black_box(&all))))
    });
}

fn bench_full_tick_pipeline(c: &mut Criterion) {
    let ticks = script();
    let mut diff = DiffTracker::new();
    let mut seq = SequenceDetector::new();
    let mut buffer = EventOrderingBuffer::default();
    let mut i = 0usize;

    c.bench_function("pipeline/scripted_chords", |b| {
        b.iter(|| {
            let sample = &ticks[i % ticks.len()];
            i += 1;
            for t in diff.diff(sample).transitions {
                buffer.push(t);
            }
            black_box(buffer.flush_if_ready());
            black_box(seq.update(diff.pressed(), diff.press_order()));
        })
    });
}

criterion_group!(
    benches,
    bench_diff_idle,
    bench_diff_all_keys_held,
    bench_full_tick_pipeline
);
criterion_main!(benches);
