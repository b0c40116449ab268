//! Benchmarks for graph execution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dagflow::prelude::*;
use std::sync::Arc;

fn fanout_graph(width: usize) -> StepGraph {
    let mut builder = GraphBuilder::new("bench");
    builder.add_step(StepSpec::new("source", Arc::new(NoOpStep::new())));

    let mut workers = Vec::new();
    for i in 0..width {
        let name = format!("worker_{i}");
        builder.add_step(
            StepSpec::new(&name, Arc::new(NoOpStep::new())).with_predecessor("source"),
        );
        workers.push(name);
    }
    builder.add_step(
        StepSpec::new("sink", Arc::new(NoOpStep::new())).with_predecessors(workers),
    );
    builder.build()
}

fn graph_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("tokio runtime");

    let small = fanout_graph(4);
    c.bench_function("fanout_4", |b| {
        b.iter(|| {
            let run = rt.block_on(small.run(RunContext::new())).expect("run");
            black_box(run.is_complete())
        });
    });

    let wide = fanout_graph(32);
    c.bench_function("fanout_32", |b| {
        b.iter(|| {
            let run = rt.block_on(wide.run(RunContext::new())).expect("run");
            black_box(run.is_complete())
        });
    });
}

criterion_group!(benches, graph_benchmark);
criterion_main!(benches);
