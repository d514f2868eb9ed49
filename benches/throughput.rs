use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use ranklog::{
    engine::ranked_class::RankedClass,
    mutation::Mutation,
    participant::Participant,
    persist::{memory::MemoryStore, MutationStore},
    types::{Average, Participation, QueueKind, Scope},
};

fn class(n: u32, limit: u32) -> RankedClass {
    let scope = Scope::new(1, 1);
    let entries = (1..=n)
        .map(|i| Participant {
            id: u64::from(i),
            scope,
            member_ref: format!("m{i}"),
            rank: 0,
            order: i,
            average: Average::from_thousandths(10_000 - (i * 7) % 5_000),
            participation: Participation::Yes,
            champion_label: if i % 25 == 0 { "kampioen".to_string() } else { String::new() },
        })
        .collect();
    let mut class = RankedClass::new(scope, Some(limit), entries);
    class.seed();
    class
}

fn bench_withdraw_confirm(c: &mut Criterion) {
    let mut group = c.benchmark_group("withdraw_confirm");
    for n in [64u32, 512, 4_096] {
        let base = class(n, n / 4);
        group.bench_with_input(BenchmarkId::from_parameter(n), &base, |b, base| {
            b.iter(|| {
                let mut class = base.clone();
                for id in (1..=u64::from(n)).step_by(8) {
                    class.withdraw(id).expect("withdraw");
                }
                for id in (1..=u64::from(n)).step_by(8) {
                    class.confirm(id).expect("confirm");
                }
            });
        });
    }
    group.finish();
}

fn bench_cut_round_trip(c: &mut Criterion) {
    let base = class(4_096, 256);
    c.bench_function("cut_round_trip_4k", |b| {
        b.iter(|| {
            let mut class = base.clone();
            class.apply_cut(Some(1_024));
            class.apply_cut(Some(256));
        });
    });
}

fn bench_enqueue(c: &mut Criterion) {
    c.bench_function("memory_enqueue_10k", |b| {
        b.iter(|| {
            let log = MemoryStore::new().mutation_log(QueueKind::Ranking);
            for i in 0..10_000u64 {
                let new = Mutation::Withdraw { participant: i }.to_new(None).expect("encode");
                log.enqueue(new).expect("enqueue");
            }
        });
    });
}

criterion_group!(benches, bench_withdraw_confirm, bench_cut_round_trip, bench_enqueue);
criterion_main!(benches);
