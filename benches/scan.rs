use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use tally::scan::{count_occurrences, scan_partitioned, scan_spans};
use tally::types::Corpus;

fn generate_text(size: usize) -> Vec<u8> {
    let words = [
        "the ", "quick ", "brown ", "fox ", "jumps ", "over ", "lazy ", "dog\n",
        "alice ", "bob ", "server ", "request ", "response\n", "error ", "data ",
        "cache ", "index ", "search ", "query ", "result\n",
    ];
    let mut text = Vec::with_capacity(size);
    let mut i = 0;
    while text.len() < size {
        text.extend_from_slice(words[i % words.len()].as_bytes());
        i += 1;
    }
    text.truncate(size);
    text
}

fn bench_serial(c: &mut Criterion) {
    let mut group = c.benchmark_group("serial");
    for size in [10_000, 100_000, 1_000_000] {
        let text = generate_text(size);
        group.bench_with_input(BenchmarkId::new("bytes", size), &text, |b, text| {
            b.iter(|| count_occurrences(black_box(text), black_box(b"the")));
        });
    }
    group.finish();
}

fn bench_partitioned(c: &mut Criterion) {
    let corpus = Corpus::new(generate_text(1_000_000));
    let lines = corpus.lines();
    let mut group = c.benchmark_group("partitioned");

    for workers in [1, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::new("lines", workers), &workers, |b, &w| {
            b.iter(|| scan_partitioned(black_box(&lines), b"the", w));
        });
        group.bench_with_input(BenchmarkId::new("spans", workers), &workers, |b, &w| {
            b.iter(|| scan_spans(black_box(corpus.bytes()), b"the", w));
        });
    }
    group.finish();
}

fn bench_patterns(c: &mut Criterion) {
    let text = generate_text(1_000_000);
    let mut group = c.benchmark_group("pattern");
    for pattern in ["e", "fox", "server request response"] {
        group.bench_with_input(
            BenchmarkId::new("serial", pattern),
            pattern.as_bytes(),
            |b, pat| b.iter(|| count_occurrences(black_box(&text), black_box(pat))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_serial, bench_partitioned, bench_patterns);
criterion_main!(benches);
