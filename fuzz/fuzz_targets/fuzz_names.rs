#![no_main]

use affs_recover::{decode_name, encode_name, hash_name, names_equal};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let len = (data[0] as usize % 31).min(data.len() - 1);
    let name = &data[1..1 + len];

    for table_size in [72usize, 200, 8136] {
        assert!(hash_name(name, false, table_size) < table_size);
        assert!(hash_name(name, true, table_size) < table_size);
    }

    assert!(names_equal(name, name, false));
    assert!(names_equal(name, name, true));

    let rest = &data[1 + len..];
    if !rest.is_empty() {
        let _ = names_equal(name, rest, true);
    }

    let text = decode_name(name);
    let _ = encode_name(&text);
});
