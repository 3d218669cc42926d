use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgba, RgbaImage};
use lens_core::OrbConfig;
use lens_match::{score_descriptors, FeatureExtractor, MatchConfig, MatchEngine, SpriteLibrary};

/// Blocky pseudo-random sprite, roughly the corner density of an item icon
fn create_sprite(seed: u32) -> DynamicImage {
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let mut cells = Vec::with_capacity(256);
    for _ in 0..256 {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        cells.push(Rgba([state as u8, (state >> 8) as u8, (state >> 16) as u8, 255]));
    }
    DynamicImage::ImageRgba8(RgbaImage::from_fn(100, 100, |x, y| {
        cells[((y * 16 / 100) * 16 + x * 16 / 100) as usize]
    }))
}

fn create_extractor() -> Arc<FeatureExtractor> {
    let cfg = OrbConfig {
        n_threads: 1, // Single-threaded for consistent benchmarks
        ..OrbConfig::default()
    };
    Arc::new(FeatureExtractor::new(cfg).expect("default config is valid"))
}

fn bench_extraction(c: &mut Criterion) {
    let extractor = create_extractor();
    let sprite = create_sprite(7);

    c.bench_function("extract_capture", |b| {
        b.iter(|| black_box(extractor.extract(black_box(&sprite)).unwrap()))
    });
}

fn bench_entry_scoring(c: &mut Criterion) {
    let extractor = create_extractor();
    let cfg = MatchConfig::default();
    let library = extractor.extract(&create_sprite(1)).unwrap();
    let capture = extractor.extract(&create_sprite(1)).unwrap();

    let (Some(des1), Some(des2)) = (library.matchable(), capture.matchable()) else {
        return;
    };

    c.bench_function("score_descriptors", |b| {
        b.iter(|| black_box(score_descriptors(black_box(des1), black_box(des2), &cfg)))
    });
}

/// Full detection against libraries of growing size
fn bench_detect(c: &mut Criterion) {
    let extractor = create_extractor();
    let engine = MatchEngine::new(Arc::clone(&extractor), MatchConfig::default());
    let capture = create_sprite(3);

    let mut group = c.benchmark_group("detect");
    group.sample_size(20);

    for &size in &[10u32, 50, 200] {
        let library = SpriteLibrary::from_images(
            (0..size).map(|seed| (format!("sprite-{seed:03}"), create_sprite(seed))),
            &extractor,
        );

        group.bench_with_input(BenchmarkId::from_parameter(size), &library, |b, library| {
            b.iter(|| black_box(engine.detect(black_box(&capture), library)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extraction, bench_entry_scoring, bench_detect);
criterion_main!(benches);
