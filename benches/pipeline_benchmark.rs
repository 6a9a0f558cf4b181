//! Benchmarks for freeports extraction performance.
//!
//! Run with: cargo bench
//!
//! These benchmarks run the bundled formats over synthetic page blocks.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use freeports::format::matching::{prefix_similarity, ratio};
use freeports::format::value::to_float;
use freeports::{BBox, FormatRegistry, PdfBlock, Targets};

/// Creates EURIZON-style blocks: one anchor and `rows` holdings lines per page.
fn create_blocks(pages: u32, rows: usize) -> Vec<PdfBlock> {
    let mut blocks = Vec::new();
    for page in 1..=pages {
        blocks.push(
            PdfBlock::text(page, BBox::new(40.0, 40.0, 400.0, 52.0), "PORTFOLIO AS AT 31/12/2023")
                .with_font("Frutiger-Black"),
        );
        for i in 0..rows {
            let y = 80.0 + 12.0 * i as f32;
            let content = format!(
                "{}.000\tISSUER {} {}% 01/06/2030\tEUR\t{}.250,00\t0,{:02}",
                i + 1,
                i,
                i % 7,
                i * 3 + 100,
                i % 100
            );
            blocks.push(
                PdfBlock::text(page, BBox::new(40.0, y, 550.0, y + 9.0), content)
                    .with_font("Frutiger-Light"),
            );
        }
    }
    blocks
}

/// Benchmark the full pipeline at various document sizes.
fn bench_pipeline(c: &mut Criterion) {
    let registry = FormatRegistry::with_defaults().unwrap();
    let format = registry.get("EURIZON").unwrap();
    let mut group = c.benchmark_group("pipeline");

    for pages in [1, 10, 50].iter() {
        let blocks = create_blocks(*pages, 40);
        group.bench_function(format!("{}_pages", pages), |b| {
            b.iter(|| format.run(black_box(&blocks), &Targets::default()).unwrap());
        });
    }

    group.finish();
}

/// Benchmark target filtering, which scores every block against every name.
fn bench_targets(c: &mut Criterion) {
    let registry = FormatRegistry::with_defaults().unwrap();
    let format = registry.get("EURIZON").unwrap();
    let blocks = create_blocks(10, 40);
    let targets = Targets::new((0..50).map(|i| format!("Issuer {}", i * 7)));

    c.bench_function("pipeline_with_targets", |b| {
        b.iter(|| format.run(black_box(&blocks), &targets).unwrap());
    });
}

/// Benchmark the text primitives used by every stage.
fn bench_primitives(c: &mut Criterion) {
    c.bench_function("to_float", |b| {
        b.iter(|| to_float(black_box("12.345.678,90")));
    });

    c.bench_function("similarity", |b| {
        b.iter(|| {
            ratio(black_box("portfolio as at"), black_box("portfolio as at 31/12/2023"))
                + prefix_similarity(black_box("leonardo spa"), black_box("leonardo"))
        });
    });
}

criterion_group!(benches, bench_pipeline, bench_targets, bench_primitives);
criterion_main!(benches);
