#![no_main]

use affs_recover::{RawBlock, Record, classify, read_symlink_target};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() < 512 {
        return;
    }

    for size in [512usize, 1024, 2048] {
        if data.len() < size {
            break;
        }
        let block = RawBlock::new(0, data[..size].to_vec());
        let _ = block.checksum_valid();

        if classify(&block).is_ok() {
            if let Ok(record) = Record::decode(&block) {
                let _ = record.kind();
            }
            let _ = read_symlink_target(&block);
        }
    }
});
