#![no_main]
use libfuzzer_sys::fuzz_target;
use rolldelta::codec::Codec;
use rolldelta::delta::format::{self, FormatOptions};
use rolldelta::delta::{self, OpStats};
use rolldelta::hash::config::IndexConfig;

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    // Control bytes: block size, probe/candidate caps, format flags.
    let block_size = 3 + (data[0] as usize % 62);
    let caps = data[1];
    let control = data[2];
    let target = &data[3..];

    let cfg = IndexConfig {
        name: "fuzz",
        block_size,
        max_probes: (caps & 0x0F) as usize,
        max_candidates: (caps >> 4) as usize,
    };
    let ops = delta::encode_with_config(target, cfg).unwrap();
    assert_eq!(OpStats::from_ops(&ops).covered(), target.len());
    assert_eq!(delta::replay(&ops, target).unwrap(), target);

    let name = ["none", "zlib", "lzma", "none"][(control >> 1 & 0x03) as usize];
    let codec = Codec::from_name(name).unwrap_or_default();
    let opts = FormatOptions {
        checksum: control & 1 != 0,
        codec,
    };
    let mut bytes = Vec::new();
    format::write_delta(&ops, target, &opts, &mut bytes).unwrap();
    assert_eq!(format::decode_delta(&bytes).unwrap(), target);
});
