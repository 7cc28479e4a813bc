use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rolldelta::codec::Codec;
use rolldelta::delta::format::{self, DecodeError, DecodeOptions, FormatOptions};
use rolldelta::delta::{self, DeltaEncoder, Op, OpStats};
use rolldelta::hash::config::{self, IndexConfig};
use rolldelta::io::{EncodeOptions, decode_file, encode_file};

fn letters(seed: u64, n: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.random_range(b'a'..=b'z')).collect()
}

fn noise(seed: u64, n: usize) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut v = vec![0u8; n];
    rng.fill(&mut v[..]);
    v
}

/// A document with shared boilerplate, edits and some noise.
fn document(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let boiler = letters(seed + 1, 700);
    let mut out = Vec::new();
    for section in 0..30 {
        out.extend_from_slice(format!("== section {section} ==\n").as_bytes());
        let cut = rng.random_range(100..boiler.len());
        out.extend_from_slice(&boiler[..cut]);
        if section % 3 == 0 {
            out.extend_from_slice(&noise(seed + section, 40));
        }
    }
    out
}

fn roundtrip(target: &[u8], cfg: IndexConfig) -> Vec<Op> {
    let ops = delta::encode_with_config(target, cfg).unwrap();
    assert_eq!(delta::replay(&ops, target).unwrap(), target);
    ops
}

#[test]
fn shorter_than_block_is_single_add() {
    let target = letters(1, 15);
    assert_eq!(
        roundtrip(&target, IndexConfig::default()),
        vec![Op::Add {
            target_offset: 0,
            length: 15
        }]
    );
}

#[test]
fn identical_halves_are_one_add_and_one_copy() {
    let half = letters(2, 4096);
    let mut target = half.clone();
    target.extend_from_slice(&half);
    assert_eq!(
        roundtrip(&target, IndexConfig::default()),
        vec![
            Op::Add {
                target_offset: 0,
                length: 4096
            },
            Op::Copy {
                source_offset: 0,
                length: 4096
            },
        ]
    );
}

#[test]
fn random_bytes_are_all_literal() {
    let target = noise(3, 20_000);
    let ops = roundtrip(&target, IndexConfig::default());
    let stats = OpStats::from_ops(&ops);
    assert_eq!(stats.copies, 0);
    assert_eq!(stats.literal_bytes, target.len());
}

#[test]
fn ops_are_contiguous_and_copies_point_backwards() {
    let target = document(4);
    for level in 0..=9 {
        let ops = roundtrip(&target, config::config_for_level(level));
        let mut pos = 0usize;
        for op in &ops {
            match *op {
                Op::Add { target_offset, .. } => assert_eq!(target_offset, pos),
                Op::Copy { source_offset, .. } => assert!(source_offset < pos),
            }
            assert!(!op.is_empty());
            pos += op.len();
        }
        assert_eq!(pos, target.len());
    }
}

#[test]
fn documents_shrink_under_every_block_size() {
    let target = document(5);
    for w in [3usize, 8, 16, 32, 64] {
        let cfg = IndexConfig::default().with_block_size(w);
        let stats = OpStats::from_ops(&roundtrip(&target, cfg));
        assert!(
            stats.copied_bytes > target.len() / 2,
            "block {w}: {stats:?}"
        );
    }
}

#[test]
fn encoder_is_reusable() {
    let enc = DeltaEncoder::new(config::THOROUGH).unwrap();
    let a = document(6);
    let b = document(7);
    assert_eq!(enc.encode(&a).unwrap(), enc.encode(&a).unwrap());
    assert_eq!(delta::replay(&enc.encode(&b).unwrap(), &b).unwrap(), b);
}

#[test]
fn serialized_roundtrip_for_each_codec() {
    let target = document(8);
    let mut codecs = vec![Codec::None];
    #[cfg(feature = "zlib")]
    codecs.push(Codec::Zlib { level: 6 });
    #[cfg(feature = "lzma")]
    codecs.push(Codec::Lzma);

    for codec in codecs {
        for checksum in [false, true] {
            let opts = FormatOptions {
                checksum,
                codec: codec.clone(),
            };
            let bytes = delta::encode_delta(&target, IndexConfig::default(), &opts).unwrap();
            assert!(bytes.len() < target.len(), "{codec:?}");
            assert_eq!(delta::decode_delta(&bytes).unwrap(), target, "{codec:?}");
        }
    }
}

#[test]
fn corrupted_literal_fails_checksum() {
    let target = noise(9, 500);
    let opts = FormatOptions::default();
    let mut bytes = delta::encode_delta(&target, IndexConfig::default(), &opts).unwrap();
    let mid = bytes.len() - 100;
    bytes[mid] ^= 0x01;
    assert!(matches!(
        delta::decode_delta(&bytes),
        Err(DecodeError::ChecksumMismatch { .. })
    ));
    let lax = DecodeOptions {
        verify_checksum: false,
        ..DecodeOptions::default()
    };
    let decoded = format::decode_delta_with(&bytes, &lax).unwrap();
    assert_eq!(decoded.len(), target.len());
    assert_ne!(decoded, target);
}

#[test]
fn header_describes_stream() {
    let target = document(10);
    let ops = delta::encode(&target).unwrap();
    let bytes = delta::encode_delta(&target, IndexConfig::default(), &FormatOptions::default())
        .unwrap();
    let header = delta::read_header(&bytes).unwrap();
    assert_eq!(header.target_len, target.len());
    assert_eq!(header.op_count, ops.len());
    assert_eq!(header.checksum, Some(format::adler32(&target)));
    assert_eq!(header.codec_id, None);
}

#[test]
fn file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.txt");
    let packed = dir.path().join("doc.rdl");
    let output = dir.path().join("doc.out");
    let target = document(11);
    std::fs::write(&input, &target).unwrap();

    let enc = encode_file(&input, &packed, &EncodeOptions::from_level(9)).unwrap();
    assert!(enc.delta_size < enc.target_size);
    let dec = decode_file(&packed, &output).unwrap();
    assert_eq!(dec.output_size, enc.target_size);
    assert_eq!(std::fs::read(&output).unwrap(), target);
}

#[cfg(feature = "parallel")]
#[test]
fn batch_encoding_matches_sequential() {
    let inputs: Vec<Vec<u8>> = (20..28).map(document).collect();
    let batch = delta::encoder::encode_batch(&inputs).unwrap();
    for (input, ops) in inputs.iter().zip(batch) {
        assert_eq!(ops, delta::encode(input).unwrap());
    }
}
