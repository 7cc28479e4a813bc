// File-level helpers for delta encoding/decoding.
//
// The block index needs the whole target in memory, so the target is read
// in full; the delta and the rebuilt output go through buffered writers.
// With the `file-io` feature, SHA-256 digests of the target (on encode) and
// of the output (on decode) are reported so callers can compare them.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

#[cfg(feature = "file-io")]
use sha2::Digest;
use thiserror::Error;

use crate::delta::encoder::DeltaEncoder;
use crate::delta::format::{self, DecodeError, DecodeOptions, FormatOptions};
use crate::delta::ops::OpStats;
use crate::error::MatchError;
use crate::hash::config::{self, IndexConfig};

const BUF_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Options and stats
// ---------------------------------------------------------------------------

/// Options for `encode_file`.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Index/matcher profile.
    pub config: IndexConfig,
    /// Serialization options.
    pub format: FormatOptions,
}

impl EncodeOptions {
    /// Options using the profile for compression `level` (0-9).
    pub fn from_level(level: u32) -> Self {
        Self {
            config: config::config_for_level(level),
            ..Self::default()
        }
    }
}

/// Statistics returned by `encode_file()`.
#[derive(Debug, Clone)]
pub struct EncodeStats {
    pub target_size: u64,
    pub delta_size: u64,
    pub ops: OpStats,
    /// SHA-256 of the target (with `file-io`).
    pub target_sha256: Option<[u8; 32]>,
}

/// Statistics returned by `decode_file()`.
#[derive(Debug, Clone)]
pub struct DecodeStats {
    pub delta_size: u64,
    pub output_size: u64,
    pub ops: OpStats,
    /// SHA-256 of the rebuilt output (with `file-io`).
    pub output_sha256: Option<[u8; 32]>,
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("encode error: {0}")]
    Match(#[from] MatchError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

#[cfg(feature = "file-io")]
fn sha256(data: &[u8]) -> Option<[u8; 32]> {
    Some(sha2::Sha256::digest(data).into())
}

#[cfg(not(feature = "file-io"))]
fn sha256(_data: &[u8]) -> Option<[u8; 32]> {
    None
}

/// Lower-case hex of a digest, for display.
pub fn hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    digest.iter().fold(String::with_capacity(digest.len() * 2), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

// ---------------------------------------------------------------------------
// encode_file / decode_file
// ---------------------------------------------------------------------------

/// Encode the file at `target_path` against itself, writing the delta to
/// `delta_path`.
pub fn encode_file(
    target_path: &Path,
    delta_path: &Path,
    opts: &EncodeOptions,
) -> Result<EncodeStats, IoError> {
    let target = std::fs::read(target_path)?;
    let ops = DeltaEncoder::new(opts.config)?.encode(&target)?;

    let mut delta = Vec::new();
    format::write_delta(&ops, &target, &opts.format, &mut delta)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(delta_path)?);
    writer.write_all(&delta)?;
    writer.flush()?;

    Ok(EncodeStats {
        target_size: target.len() as u64,
        delta_size: delta.len() as u64,
        ops: OpStats::from_ops(&ops),
        target_sha256: sha256(&target),
    })
}

/// Decode the delta at `delta_path`, writing the target to `output_path`.
pub fn decode_file(delta_path: &Path, output_path: &Path) -> Result<DecodeStats, IoError> {
    decode_file_with(delta_path, output_path, &DecodeOptions::default())
}

pub fn decode_file_with(
    delta_path: &Path,
    output_path: &Path,
    opts: &DecodeOptions,
) -> Result<DecodeStats, IoError> {
    let delta = std::fs::read(delta_path)?;
    let (parsed, output) = format::decode_parsed(&delta, opts)?;

    let mut writer = BufWriter::with_capacity(BUF_SIZE, File::create(output_path)?);
    writer.write_all(&output)?;
    writer.flush()?;

    Ok(DecodeStats {
        delta_size: delta.len() as u64,
        output_size: output.len() as u64,
        ops: OpStats::from_ops(&parsed.ops),
        output_sha256: sha256(&output),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
