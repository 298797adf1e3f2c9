//! Benchmarks for the conversion entry points across share granularities.
//!
//! Run with: cargo bench -p reflect-math

use alloy_primitives::U256;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reflect_math::{
    get_deliver_shares, get_transfer_all_shares, get_transfer_shares, Balance, BasisPoints,
    Shares,
};

const SUPPLY: u128 = 1_000_000_000_000_000_000;

/// Ledger with `2^shift` shares per balance unit: sender 1/2, receiver 1/4.
fn ledger(shift: u32) -> (Balance, Shares, Shares, Shares) {
    let total = U256::from(SUPPLY) << (shift as usize);
    (
        Balance::from(SUPPLY),
        Shares::new(total),
        Shares::new(total / U256::from(2u64)),
        Shares::new(total / U256::from(4u64)),
    )
}

fn fee() -> BasisPoints {
    BasisPoints::new(30).unwrap()
}

fn bench_transfer(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");

    for shift in [0u32, 30, 64].iter() {
        let (supply, total, from, to) = ledger(*shift);
        let amount = Balance::from(SUPPLY / 1_000);

        group.bench_with_input(BenchmarkId::new("two_party", shift), shift, |b, _| {
            b.iter(|| {
                get_transfer_shares(
                    black_box(amount),
                    black_box(fee()),
                    black_box(supply),
                    black_box(total),
                    black_box(from),
                    black_box(to),
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("transfer_all", shift), shift, |b, _| {
            b.iter(|| {
                get_transfer_all_shares(
                    black_box(fee()),
                    black_box(supply),
                    black_box(total),
                    black_box(from),
                    black_box(to),
                )
            });
        });
    }

    group.finish();
}

fn bench_deliver(c: &mut Criterion) {
    let mut group = c.benchmark_group("deliver");

    for shift in [0u32, 30, 64].iter() {
        let (supply, total, from, _) = ledger(*shift);
        let amount = Balance::from(SUPPLY / 1_000);

        group.bench_with_input(BenchmarkId::new("deliver", shift), shift, |b, _| {
            b.iter(|| {
                get_deliver_shares(
                    black_box(amount),
                    black_box(supply),
                    black_box(total),
                    black_box(from),
                )
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_transfer, bench_deliver);
criterion_main!(benches);
