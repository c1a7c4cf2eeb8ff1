//! Benchmarks for report rendering.

use clinidoc::core::{GenerationKind, StageKind, Task};
use clinidoc::report::{ReportBuilder, RunReport};
use clinidoc::testing::sample_fields;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build_report(kinds: usize) -> RunReport {
    let builder = ReportBuilder::new("protocol.txt", "/out");
    let mut extraction = Task::new(StageKind::Extraction, 0);
    extraction.start().unwrap();
    extraction.complete("/out/extracted_fields.json").unwrap();
    builder.record(extraction).unwrap();
    builder.set_fields(sample_fields()).unwrap();

    for i in 0..kinds {
        let kind = GenerationKind::new(format!("doc_{i}")).unwrap();
        let mut task = Task::new(StageKind::Generation(kind), i + 1);
        task.start().unwrap();
        if i % 3 == 0 {
            task.fail("service timeout").unwrap();
        } else {
            task.complete(format!("/out/DOC_{i}.md")).unwrap();
        }
        builder.record(task).unwrap();
    }
    builder.finalize().unwrap()
}

fn report_benchmark(c: &mut Criterion) {
    let small = build_report(4);
    let large = build_report(64);

    c.bench_function("to_structured_4", |b| b.iter(|| black_box(small.to_structured())));
    c.bench_function("to_narrative_4", |b| b.iter(|| black_box(small.to_narrative())));
    c.bench_function("to_structured_64", |b| b.iter(|| black_box(large.to_structured())));
    c.bench_function("to_narrative_64", |b| b.iter(|| black_box(large.to_narrative())));
}

criterion_group!(benches, report_benchmark);
criterion_main!(benches);
