#![no_main]

use affs_recover::Disk;
use libfuzzer_sys::fuzz_target;

// Declared sizes in fuzzed headers can be huge; only pull a bounded number
// of chunks per file.
const MAX_ENTRIES: usize = 256;
const MAX_CHUNKS: usize = 64;

fuzz_target!(|data: &[u8]| {
    let Ok(disk) = Disk::open(data) else {
        return;
    };

    for n in 0..disk.partitions().len() {
        let Ok(part) = disk.partition(n) else {
            continue;
        };
        let Ok(root) = part.root() else {
            continue;
        };

        for item in root.walk().take(MAX_ENTRIES) {
            let Ok((path, entry)) = item else {
                continue;
            };
            let _ = entry.name_str();
            let _ = affs_recover::decode_name(&entry.comment);

            if entry.is_file() {
                if let Ok(file) = root.open_file(&path) {
                    let mut stream = file.chunks();
                    for chunk in stream.by_ref().take(MAX_CHUNKS) {
                        let _ = chunk.data.len();
                    }
                    let _ = stream.into_report().into_error();
                }
            } else if entry.is_symlink() {
                let _ = root.read_link(&path);
            } else if entry.is_dir() {
                let _ = root.cd(&path);
            }
        }

        let _ = root.cd("..");
    }
});
