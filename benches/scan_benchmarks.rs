use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use log_search_agent::services::{LineReconstructor, RuleMatcher, TimeWindowSampler, TimestampParser};
use log_search_agent::{ContentRule, MatchMode};
use std::io::Cursor;

fn create_log_text(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            format!(
                "2024-01-10 23:{:02}:{:02} INFO GET /api/orders/{} 200 {}ms\n",
                (i / 60) % 60,
                i % 60,
                i,
                i % 250
            )
        })
        .collect()
}

fn bench_line_reconstruction(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_reconstruction");

    for lines in &[1_000usize, 10_000] {
        let text = create_log_text(*lines);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("default_buffer", lines), &text, |b, text| {
            b.iter(|| {
                let count = LineReconstructor::new(Cursor::new(text.as_bytes()))
                    .filter_map(|line| line.ok())
                    .count();
                black_box(count)
            })
        });
    }

    group.finish();
}

fn bench_rule_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule_matching");

    let sampler = TimeWindowSampler::new(TimestampParser::new(&[1, 2], "2006-01-02 15:04:05"), " ", false);
    let rows: Vec<Vec<String>> = create_log_text(1_000)
        .lines()
        .map(|line| sampler.tokenize(line))
        .collect();

    let cases = [
        ("exact", vec![ContentRule::new("INFO", MatchMode::Exact, 3)]),
        ("substring", vec![ContentRule::new("orders", MatchMode::Substring, 0)]),
        ("regex", vec![ContentRule::new(r"^\d{2}ms$", MatchMode::Regex, 7)]),
    ];

    for (name, rules) in cases {
        let matcher = RuleMatcher::new(&rules);
        group.bench_function(name, |b| {
            b.iter(|| {
                let hits = rows.iter().filter(|tokens| matcher.matches(tokens)).count();
                black_box(hits)
            })
        });
    }

    group.finish();
}

fn bench_timestamp_parsing(c: &mut Criterion) {
    let parser = TimestampParser::new(&[1, 2], "2006-01-02 15:04:05");
    c.bench_function("timestamp_parse", |b| {
        b.iter(|| black_box(parser.parse_text(black_box("2024-01-10 23:59:00"))))
    });
}

criterion_group!(
    benches,
    bench_line_reconstruction,
    bench_rule_matching,
    bench_timestamp_parsing
);
criterion_main!(benches);
