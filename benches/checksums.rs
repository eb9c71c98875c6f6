//! Benchmarks for checksum calculations.

use affs_recover::{block_sum, boot_sum, normal_sum, verify_checksum};

fn main() {
    divan::main();
}

fn varied(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + 13) % 256) as u8).collect()
}

#[divan::bench(args = [512, 1024, 4096, 32768])]
fn bench_block_sum(bencher: divan::Bencher, size: usize) {
    let buf = varied(size);
    bencher.bench_local(|| divan::black_box(block_sum(divan::black_box(&buf))));
}

#[divan::bench]
fn bench_normal_sum_512(bencher: divan::Bencher) {
    let buf = varied(512);
    bencher.bench_local(|| divan::black_box(normal_sum(divan::black_box(&buf), 20)));
}

#[divan::bench]
fn bench_verify_checksum_512(bencher: divan::Bencher) {
    let mut buf = varied(512);
    let sum = normal_sum(&buf, 20);
    buf[20..24].copy_from_slice(&sum.to_be_bytes());
    bencher.bench_local(|| divan::black_box(verify_checksum(divan::black_box(&buf))));
}

#[divan::bench]
fn bench_boot_sum(bencher: divan::Bencher) {
    let buf = varied(1024);
    bencher.bench_local(|| divan::black_box(boot_sum(divan::black_box(&buf))));
}
