#![no_main]
use libfuzzer_sys::fuzz_target;
use rolldelta::delta::format::{self, DecodeOptions, MAGIC};

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must only ever produce errors, never panics.
    let opts = DecodeOptions {
        max_target_len: 1 << 22,
        ..DecodeOptions::default()
    };
    let _ = format::decode_delta_with(data, &opts);

    // Behind a valid magic the parser gets much further.
    let mut framed = MAGIC.to_vec();
    framed.extend_from_slice(data);
    let _ = format::read_header(&framed);
    let _ = format::decode_delta_with(&framed, &opts);
});
