//! Criterion benchmarks for the voice renderer.
//!
//! Run with: cargo bench -p polyvox-voice

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use polyvox_core::{DspUnit, ParamTable, UnitFactory};
use polyvox_units::UnitRegistry;
use polyvox_voice::{ReleasePolicy, VoicePool, VoiceRenderer, VoiceScope};

const SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZES: &[usize] = &[64, 256, 1024];
const POLYPHONY: &[usize] = &[1, 8, 32];

fn renderer(unit: &str, voices: usize, max_frames: usize) -> (Arc<VoicePool>, VoiceRenderer) {
    let registry = UnitRegistry::new();
    let factory = registry.factory(unit).expect("registered unit");
    let units: Vec<Box<dyn DspUnit>> = (0..voices)
        .map(|_| factory.create_instance().expect("instance"))
        .collect();
    let table = Arc::new(ParamTable::build(units[0].as_ref()).expect("table"));
    let pool = Arc::new(VoicePool::new(table, voices).expect("pool"));
    let renderer = VoiceRenderer::new(
        Arc::clone(&pool),
        units,
        SAMPLE_RATE,
        max_frames,
        ReleasePolicy::default(),
    )
    .expect("renderer");
    (pool, renderer)
}

// ============================================================================
// Full polyphony render
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("Render");

    for unit in ["organ", "pluck"] {
        for &voices in POLYPHONY {
            for &block in BLOCK_SIZES {
                let (pool, mut renderer) = renderer(unit, voices, block);
                for v in 0..voices {
                    pool.allocate_by_pitch(48 + v as u8, 100);
                }
                let mut left = vec![0.0f32; block];
                let mut right = vec![0.0f32; block];

                group.bench_with_input(
                    BenchmarkId::new(format!("{unit}/{voices}v"), block),
                    &block,
                    |b, &size| {
                        b.iter(|| {
                            renderer.render(size, &[], &mut [&mut left, &mut right]);
                            black_box(left[0])
                        })
                    },
                );
            }
        }
    }

    group.finish();
}

// ============================================================================
// Control path under render
// ============================================================================

fn bench_parameter_churn(c: &mut Criterion) {
    let (pool, mut renderer) = renderer("organ", 8, 256);
    let handles: Vec<_> = (0..8).map(|v| pool.allocate_by_pitch(60 + v, 100)).collect();
    let mut left = vec![0.0f32; 256];
    let mut right = vec![0.0f32; 256];

    c.bench_function("Render/organ/8v/overlay_churn", |b| {
        let mut tick = 0u32;
        b.iter(|| {
            tick = tick.wrapping_add(1);
            let value = (tick % 100) as f32 / 100.0;
            let _ = pool.set_value("/organ/brightness", value, VoiceScope::Global);
            let h = handles[(tick % 8) as usize];
            let _ = pool.set_value("/organ/pan", value, VoiceScope::Voice(h));
            renderer.render(256, &[], &mut [&mut left, &mut right]);
            black_box(left[0])
        })
    });
}

criterion_group!(benches, bench_render, bench_parameter_churn);
criterion_main!(benches);
