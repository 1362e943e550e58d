use criterion::{criterion_group, criterion_main};
use lib::bench::main as bench_main;

criterion_group!(benches, bench_main);
criterion_main!(benches);
