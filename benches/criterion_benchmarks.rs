use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rolldelta::delta::format::{self, FormatOptions};
use rolldelta::delta::{self, encoder};
use rolldelta::hash::config::{self, IndexConfig};
use rolldelta::hash::{BlockHashIndex, RollingHash};
use std::fs;
use std::path::Path;

fn gen_data(size: usize, seed: u64) -> Vec<u8> {
    let mut s = seed;
    let mut out = Vec::with_capacity(size);
    for _ in 0..size {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        out.push((s >> 33) as u8);
    }
    out
}

/// `copies` near-identical versions of one random base, back to back.
fn versions(size: usize, copies: usize, stride: usize, seed: u64) -> Vec<u8> {
    let base = gen_data(size / copies, seed);
    let mut out = Vec::with_capacity(size);
    for v in 0..copies {
        let mut version = base.clone();
        for i in (v..version.len()).step_by(stride.max(1)) {
            version[i] = version[i].wrapping_add(v as u8);
        }
        out.extend_from_slice(&version);
    }
    out
}

fn write_ratio_snapshot() {
    let target = versions(2 * 1024 * 1024, 8, 4096, 123);
    let mut csv = String::from("level,profile,delta_bytes,target_bytes,ratio\n");
    for level in 0u32..=9 {
        let cfg = config::config_for_level(level);
        let delta = format::encode_delta(&target, cfg, &FormatOptions::default()).unwrap();
        let ratio = delta.len() as f64 / target.len() as f64;
        csv.push_str(&format!(
            "{level},{},{},{},{ratio}\n",
            cfg.name,
            delta.len(),
            target.len()
        ));
    }
    let out_dir = Path::new("target/criterion/custom_reports");
    let _ = fs::create_dir_all(out_dir);
    let _ = fs::write(out_dir.join("ratio_snapshot.csv"), csv);
}

fn bench_rolling_hash(c: &mut Criterion) {
    let mut g = c.benchmark_group("rolling_hash");
    let data = gen_data(1024 * 1024, 1);
    g.throughput(Throughput::Bytes(data.len() as u64));
    for w in [16usize, 64] {
        let rh = RollingHash::new(w).unwrap();
        g.bench_with_input(BenchmarkId::from_parameter(w), &w, |b, &w| {
            b.iter(|| {
                let mut h = rh.hash(&data);
                for i in 0..data.len() - w {
                    h = rh.roll(h, black_box(&data), i);
                }
                black_box(h);
            });
        });
    }
    g.finish();
}

fn bench_index_build(c: &mut Criterion) {
    let mut g = c.benchmark_group("index_build");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let data = gen_data(size, 2);
        let rh = RollingHash::new(16).unwrap();
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut idx = BlockHashIndex::new(&data).unwrap();
                for off in (0..=data.len() - 16).step_by(16) {
                    idx.add_hash(off, rh.hash(&data[off..])).unwrap();
                }
                black_box(idx.last_indexed_block());
            });
        });
    }
    g.finish();
}

fn bench_encoding_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("encoding_speed_mb_s");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let target = versions(size, 4, 1024, 3);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(delta::encode(black_box(&target)).unwrap()));
        });
    }
    g.finish();
}

fn bench_decoding_speed(c: &mut Criterion) {
    let mut g = c.benchmark_group("decoding_speed");
    for size in [64 * 1024usize, 1024 * 1024, 8 * 1024 * 1024] {
        let target = versions(size, 4, 2048, 4);
        let bytes =
            format::encode_delta(&target, IndexConfig::default(), &FormatOptions::default())
                .unwrap();
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(format::decode_delta(black_box(&bytes)).unwrap()));
        });
    }
    g.finish();
}

fn bench_ratio_vs_level(c: &mut Criterion) {
    write_ratio_snapshot();
    let mut g = c.benchmark_group("encode_vs_level");
    let target = versions(2 * 1024 * 1024, 8, 4096, 5);
    for level in [0u32, 5, 9] {
        let enc = encoder::DeltaEncoder::new(config::config_for_level(level)).unwrap();
        g.bench_with_input(BenchmarkId::from_parameter(level), &level, |b, _| {
            b.iter(|| black_box(enc.encode(&target).unwrap().len()));
        });
    }
    g.finish();
}

fn bench_block_size(c: &mut Criterion) {
    let mut g = c.benchmark_group("encode_vs_block_size");
    let target = versions(1024 * 1024, 4, 512, 6);
    for w in [8usize, 16, 32, 64, 128] {
        let cfg = IndexConfig::default().with_block_size(w);
        g.bench_with_input(BenchmarkId::from_parameter(w), &w, |b, _| {
            b.iter(|| black_box(delta::encode_with_config(&target, cfg).unwrap()));
        });
    }
    g.finish();
}

fn bench_real_world_scenarios(c: &mut Criterion) {
    let mut g = c.benchmark_group("real_world_scenarios");
    let scenarios = [
        ("backup_generations", 4 * 1024 * 1024usize, 8usize, 1024usize),
        ("document_versioning", 512 * 1024, 16, 256),
        ("vm_image_like", 8 * 1024 * 1024, 2, 4096),
        ("unique_payload", 2 * 1024 * 1024, 1, 1),
    ];

    for (name, size, copies, stride) in scenarios {
        let target = versions(size, copies, stride, size as u64);
        g.throughput(Throughput::Bytes(size as u64));
        g.bench_function(name, |b| {
            b.iter(|| {
                let bytes =
                    format::encode_delta(&target, IndexConfig::default(), &FormatOptions::default())
                        .unwrap();
                black_box(format::decode_delta(&bytes).unwrap());
            });
        });
    }
    g.finish();
}

criterion_group!(
    benches,
    bench_rolling_hash,
    bench_index_build,
    bench_encoding_speed,
    bench_decoding_speed,
    bench_ratio_vs_level,
    bench_block_size,
    bench_real_world_scenarios
);
criterion_main!(benches);
