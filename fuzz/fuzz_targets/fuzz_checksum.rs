#![no_main]

use affs_recover::{block_sum, boot_sum, normal_sum, verify_checksum, verify_summed_longs};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 24 {
        return;
    }

    let _ = block_sum(data);
    let _ = verify_checksum(data);
    let _ = verify_summed_longs(data, (data.len() / 4) as u32);

    // A block with its stored checksum replaced by the computed one must verify.
    let len = data.len() & !3;
    let mut block = data[..len].to_vec();
    let sum = normal_sum(&block, 20);
    block[20..24].copy_from_slice(&sum.to_be_bytes());
    assert!(verify_checksum(&block));

    let _ = boot_sum(data);
});
