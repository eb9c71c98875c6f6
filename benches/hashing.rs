//! Benchmarks for name hashing and comparison.

use affs_recover::{hash_name, names_equal};

fn main() {
    divan::main();
}

#[divan::bench(args = [false, true])]
fn bench_hash_name_short(bencher: divan::Bencher, intl: bool) {
    let name = b"test";
    bencher.bench_local(|| divan::black_box(hash_name(divan::black_box(name), intl, 72)));
}

#[divan::bench(args = [false, true])]
fn bench_hash_name_max_len(bencher: divan::Bencher, intl: bool) {
    let name = b"a_thirty_byte_long_amiga_name_";
    bencher.bench_local(|| divan::black_box(hash_name(divan::black_box(name), intl, 72)));
}

#[divan::bench]
fn bench_hash_name_large_table(bencher: divan::Bencher) {
    let name = b"very_long_filename_test.txt";
    bencher.bench_local(|| divan::black_box(hash_name(divan::black_box(name), false, 8136)));
}

#[divan::bench(args = [false, true])]
fn bench_names_equal_match(bencher: divan::Bencher, intl: bool) {
    let a = b"very_long_filename_test.txt";
    let b = b"VERY_LONG_FILENAME_TEST.TXT";
    bencher.bench_local(|| {
        divan::black_box(names_equal(divan::black_box(a), divan::black_box(b), intl))
    });
}

#[divan::bench]
fn bench_names_equal_length_mismatch(bencher: divan::Bencher) {
    let a = b"test";
    let b = b"testing";
    bencher.bench_local(|| {
        divan::black_box(names_equal(divan::black_box(a), divan::black_box(b), false))
    });
}
