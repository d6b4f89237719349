//! Resolution benchmarks.
//!
//! Measures:
//! - Deep recursion through `if/3` guards and arithmetic builtins
//! - Index lookup throughput over many stored facts
//! - Generic vs specialized list traversal

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use detalion::prelude::*;

const COUNTDOWN: &str = r#"[
    ["/detalion#clause", ["countdown", {"id": 0}],
        ["/detalion#if",
            ["/detalion#=", {"id": 0}, 0],
            ["/detalion#true"],
            ["/detalion#conj",
                ["/detalion#minus", {"id": 0}, 1, {"id": 1}],
                ["countdown", {"id": 1}]]]]
]"#;

const LEN: &str = r#"[
    ["/detalion#clause", ["len", {"id": 0}, {"id": 1}],
        ["/detalion#if",
            ["/detalion#=", {"id": 0}, ["[]"]],
            ["/detalion#=", {"id": 1}, 0],
            ["/detalion#conj",
                ["/detalion#=", {"id": 0}, [".", {"id": 2}, {"id": 3}]],
                ["/detalion#conj",
                    ["len", {"id": 3}, {"id": 4}],
                    ["/detalion#plus", {"id": 4}, 1, {"id": 1}]]]]],
    ["/detalion#lift", {"id": 0}, {"id": 0}, ["[]"]]
]"#;

fn engine_with(source: &str, config: EngineConfig) -> Engine {
    let mut engine = Engine::new(config).unwrap();
    engine.load_program(&Program::from_json(source).unwrap());
    engine
}

fn bench_countdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("countdown");
    for depth in [100i64, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || engine_with(COUNTDOWN, EngineConfig::default()),
                |mut engine| {
                    let goal = Term::compound("countdown", vec![Term::int(depth)]);
                    black_box(engine.call(&goal).unwrap())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut engine = Engine::new(EngineConfig::default()).unwrap();
    for i in 0..1_000 {
        let key = Term::compound(&format!("k{i}"), vec![Term::int(i)]);
        engine.store_clause(&Clause::fact(Term::compound("fact", vec![key])));
    }
    let pattern = Term::compound(
        names::CLAUSE,
        vec![
            Term::compound("fact", vec![Term::compound("k500", vec![Term::int(500)])]),
            Term::atom(names::WILDCARD),
        ],
    );
    c.bench_function("lookup/1000_facts", |b| {
        b.iter(|| black_box(engine.find_most_specific(&pattern).unwrap()))
    });
}

fn bench_len(c: &mut Criterion) {
    let list = Term::list((0..200).map(Term::int).collect::<Vec<_>>());
    let mut group = c.benchmark_group("len_200");
    for (label, config) in [
        ("generic", EngineConfig::default()),
        ("specialized", EngineConfig::default().with_specialization(1)),
    ] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || {
                    let mut engine = engine_with(LEN, config.clone());
                    let n = engine.var().unwrap();
                    (engine, n)
                },
                |(mut engine, n)| {
                    let goal = Term::compound("len", vec![list.clone(), n]);
                    black_box(engine.call(&goal).unwrap())
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

criterion_group!(benches, bench_countdown, bench_lookup, bench_len);
criterion_main!(benches);
