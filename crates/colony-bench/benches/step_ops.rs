//! Criterion micro-benchmarks for one worker step: sync, access, flush.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use serde_json::json;

use colony_batch::Batches;
use colony_bench::reference_profile;
use colony_state::{GroupSchema, GroupState};

const AGENTS: usize = 10_000;

/// Benchmark: first sync of both batches (marker parse + vector decode).
fn bench_sync(c: &mut Criterion) {
    let profile = reference_profile(AGENTS);
    let (agents, msgs) = profile.segments().unwrap();

    c.bench_function("sync_10k_agents", |b| {
        b.iter(|| {
            let mut agent_batches = Batches::default();
            let mut msg_batches = Batches::default();
            agent_batches.sync(&agents, &profile.agent_schema).unwrap();
            msg_batches.sync(&msgs, &profile.msg_schema).unwrap();
            black_box((agent_batches.len(), msg_batches.len()));
        });
    });
}

/// Benchmark: full load of every field after sync.
fn bench_load_missing(c: &mut Criterion) {
    let profile = reference_profile(AGENTS);
    let (agents, msgs) = profile.segments().unwrap();
    let schema = GroupSchema::new(profile.agent_schema.clone()).unwrap();

    c.bench_function("load_missing_10k_agents", |b| {
        b.iter_batched(
            || (Batches::default(), Batches::default()),
            |(mut agent_batches, mut msg_batches)| {
                let agent = agent_batches.sync(&agents, schema.agent()).unwrap();
                let msg = msg_batches.sync(&msgs, schema.msg()).unwrap();
                let mut group = GroupState::new(Arc::clone(&schema), agent, msg).unwrap();
                group.load_missing().unwrap();
                black_box(group.n_agents());
            },
            BatchSize::SmallInput,
        );
    });
}

/// Benchmark: read-modify-write of one field across every agent, reusing
/// one row view.
fn bench_agent_loop(c: &mut Criterion) {
    let profile = reference_profile(AGENTS);
    let (agents, msgs) = profile.segments().unwrap();
    let schema = GroupSchema::new(profile.agent_schema.clone()).unwrap();
    let mut agent_batches = Batches::default();
    let mut msg_batches = Batches::default();
    let agent = agent_batches.sync(&agents, schema.agent()).unwrap();
    let msg = msg_batches.sync(&msgs, schema.msg()).unwrap();
    let mut group = GroupState::new(Arc::clone(&schema), agent, msg).unwrap();
    group.load("health").unwrap();
    let n = group.n_agents();

    c.bench_function("modify_health_10k_agents", |b| {
        b.iter(|| {
            let mut view = group.get_agent(0);
            for i in 0..n {
                view.rebind(i);
                view.modify("health", |hp| json!(hp.as_i64().unwrap_or(0) + 1))
                    .unwrap();
            }
        });
    });
}

/// Benchmark: flush of two touched agent fields plus outboxes.
fn bench_flush(c: &mut Criterion) {
    let profile = reference_profile(AGENTS);
    let (agents, msgs) = profile.segments().unwrap();
    let schema = GroupSchema::new(profile.agent_schema.clone()).unwrap();
    let mut agent_batches = Batches::default();
    let mut msg_batches = Batches::default();
    let agent = agent_batches.sync(&agents, schema.agent()).unwrap();
    let msg = msg_batches.sync(&msgs, schema.msg()).unwrap();
    let mut group = GroupState::new(Arc::clone(&schema), agent, msg).unwrap();
    group.load("health").unwrap();
    group.load("memory").unwrap();
    {
        let mut view = group.get_agent(0);
        for i in (0..AGENTS).step_by(10) {
            view.rebind(i);
            view.add_message("agent-0", "ping", &json!({"i": i})).unwrap();
        }
    }

    c.bench_function("flush_10k_agents", |b| {
        b.iter(|| {
            let changes = group.flush_changes().unwrap();
            black_box(changes.agent.len() + changes.msg.len());
        });
    });
}

criterion_group!(
    benches,
    bench_sync,
    bench_load_missing,
    bench_agent_loop,
    bench_flush
);
criterion_main!(benches);
