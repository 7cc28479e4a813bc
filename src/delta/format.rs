// Serialized delta format.
//
// Layout:
//
//   magic       4 bytes   "RDL1"
//   flags       1 byte    FormatFlags
//   codec id    1 byte    only with LITERALS_COMPRESSED
//   target_len  varint
//   checksum    4 bytes   big-endian Adler-32 of the target, only with CHECKSUM
//   op_count    varint
//   records     op_count times:
//                 0x01 ADD   varint length, then the literal bytes unless
//                            LITERALS_COMPRESSED
//                 0x02 COPY  varint source_offset, varint length
//   literals    only with LITERALS_COMPRESSED:
//                 varint compressed_len, compressed bytes
//
// ADD records carry no offset: an ADD always lands at the current end of
// output, and its literals follow those of the previous ADD.

use std::io;
use std::sync::Arc;

use bitflags::bitflags;
use log::debug;
use thiserror::Error;

use super::encoder::DeltaEncoder;
use super::ops::{Op, OpStats, ReplayError, apply_copy, output_buffer};
use super::varint::{self, VarIntError};
use crate::codec::{self, CompressBackend, Codec};
use crate::error::MatchError;
use crate::hash::config::IndexConfig;

pub const MAGIC: [u8; 4] = *b"RDL1";

/// Default cap on the target length a delta may declare (1 GiB).
pub const DEFAULT_MAX_TARGET_LEN: usize = 1 << 30;

pub const TAG_ADD: u8 = 0x01;
pub const TAG_COPY: u8 = 0x02;

bitflags! {
    /// Header flag byte.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatFlags: u8 {
        /// Adler-32 of the target follows `target_len`.
        const CHECKSUM = 0x01;
        /// ADD literals are stored as one compressed section at the end.
        const LITERALS_COMPRESSED = 0x02;
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("not a delta (bad magic)")]
    BadMagic,

    #[error("unknown flag bits {0:#04x}")]
    UnknownFlags(u8),

    #[error("unknown record tag {tag:#04x} at byte {at}")]
    UnknownTag { tag: u8, at: usize },

    #[error("delta truncated")]
    Truncated,

    #[error(transparent)]
    VarInt(#[from] VarIntError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("target length mismatch: header says {expected}, ops produce {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("checksum mismatch: expected {expected:#010X}, got {actual:#010X}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("target length {len} exceeds limit {limit}")]
    TooLarge { len: usize, limit: usize },

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("{extra} bytes of trailing data")]
    TrailingData { extra: usize },
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Write-side options.
#[derive(Debug, Clone)]
pub struct FormatOptions {
    /// Store an Adler-32 of the target.
    pub checksum: bool,
    /// Literal compression.
    pub codec: Codec,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            checksum: true,
            codec: Codec::None,
        }
    }
}

/// Read-side options.
#[derive(Clone)]
pub struct DecodeOptions {
    /// Check the stored Adler-32, if any.
    pub verify_checksum: bool,
    /// Refuse deltas whose target is longer than this.  The decoder holds
    /// the whole target in memory, so this bounds what a delta can make it
    /// allocate.
    pub max_target_len: usize,
    /// Backend for a codec id the built-in registry does not know.
    pub custom: Option<Arc<dyn CompressBackend>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksum: true,
            max_target_len: DEFAULT_MAX_TARGET_LEN,
            custom: None,
        }
    }
}

impl std::fmt::Debug for DecodeOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("verify_checksum", &self.verify_checksum)
            .field("max_target_len", &self.max_target_len)
            .field("custom", &self.custom.as_ref().map(|b| b.id()))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Adler-32
// ---------------------------------------------------------------------------

/// Adler-32 of `data`.
pub fn adler32(data: &[u8]) -> u32 {
    #[cfg(feature = "adler32")]
    {
        let mut hasher = simd_adler32::Adler32::new();
        hasher.write(data);
        hasher.finish()
    }
    #[cfg(not(feature = "adler32"))]
    {
        const MOD_ADLER: u32 = 65521;
        let mut a: u32 = 1;
        let mut b: u32 = 0;
        for &byte in data {
            a = (a + u32::from(byte)) % MOD_ADLER;
            b = (b + a) % MOD_ADLER;
        }
        (b << 16) | a
    }
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

fn invalid_ops(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

/// Serialize `ops` for `target` into `out`.
///
/// `ops` must rebuild `target` exactly; ADD literals are read from `target`.
pub fn write_delta(
    ops: &[Op],
    target: &[u8],
    opts: &FormatOptions,
    out: &mut Vec<u8>,
) -> io::Result<()> {
    let stats = OpStats::from_ops(ops);
    if stats.covered() != target.len() {
        return Err(invalid_ops(format!(
            "ops cover {} bytes, target has {}",
            stats.covered(),
            target.len()
        )));
    }

    let mut literals = Vec::with_capacity(stats.literal_bytes);
    for op in ops {
        if let Op::Add {
            target_offset,
            length,
        } = *op
        {
            let span = target_offset
                .checked_add(length)
                .and_then(|end| target.get(target_offset..end))
                .ok_or_else(|| {
                    invalid_ops(format!("ADD {target_offset}+{length} outside target"))
                })?;
            literals.extend_from_slice(span);
        }
    }

    let compressed = match opts.codec.backend() {
        Some(backend) => {
            codec::compress_literals(backend.as_ref(), &literals)?.map(|c| (backend.id(), c))
        }
        None => None,
    };

    let mut flags = FormatFlags::empty();
    flags.set(FormatFlags::CHECKSUM, opts.checksum);
    flags.set(FormatFlags::LITERALS_COMPRESSED, compressed.is_some());

    let start = out.len();
    out.extend_from_slice(&MAGIC);
    out.push(flags.bits());
    if let Some((id, _)) = &compressed {
        out.push(*id);
    }
    varint::push_usize(out, target.len());
    if opts.checksum {
        out.extend_from_slice(&adler32(target).to_be_bytes());
    }
    varint::push_usize(out, ops.len());

    let mut lit = 0usize;
    for op in ops {
        match *op {
            Op::Add { length, .. } => {
                out.push(TAG_ADD);
                varint::push_usize(out, length);
                if compressed.is_none() {
                    out.extend_from_slice(&literals[lit..lit + length]);
                }
                lit += length;
            }
            Op::Copy {
                source_offset,
                length,
            } => {
                out.push(TAG_COPY);
                varint::push_usize(out, source_offset);
                varint::push_usize(out, length);
            }
        }
    }

    if let Some((id, section)) = compressed {
        varint::push_usize(out, section.len());
        out.extend_from_slice(&section);
        debug!(
            "literals compressed with {}: {} -> {} bytes",
            codec::name_for_id(id),
            literals.len(),
            section.len()
        );
    }

    debug!(
        "wrote delta: {} ops, {} bytes for a {} byte target",
        ops.len(),
        out.len() - start,
        target.len()
    );
    Ok(())
}

/// Encode `target` against itself and serialize the result.
pub fn encode_delta(
    target: &[u8],
    config: IndexConfig,
    opts: &FormatOptions,
) -> Result<Vec<u8>, EncodeError> {
    let ops = DeltaEncoder::new(config)?.encode(target)?;
    let mut out = Vec::new();
    write_delta(&ops, target, opts, &mut out)?;
    Ok(out)
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        let b = *self.data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        Ok(b)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated);
        }
        let s = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn varint(&mut self) -> Result<usize, DecodeError> {
        match varint::read_usize(&self.data[self.pos..]) {
            Ok((v, used)) => {
                self.pos += used;
                Ok(v)
            }
            Err(VarIntError::Truncated) => Err(DecodeError::Truncated),
            Err(e) => Err(e.into()),
        }
    }
}

/// Fixed part of a delta, before the op records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaHeader {
    pub flags: FormatFlags,
    /// Literal codec id, present iff `LITERALS_COMPRESSED`.
    pub codec_id: Option<u8>,
    pub target_len: usize,
    pub checksum: Option<u32>,
    pub op_count: usize,
    /// Encoded header size in bytes.
    pub header_len: usize,
}

fn parse_header(r: &mut Reader<'_>) -> Result<DeltaHeader, DecodeError> {
    if r.take(MAGIC.len())? != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let raw = r.byte()?;
    let flags = FormatFlags::from_bits(raw)
        .ok_or(DecodeError::UnknownFlags(raw & !FormatFlags::all().bits()))?;
    let codec_id = if flags.contains(FormatFlags::LITERALS_COMPRESSED) {
        Some(r.byte()?)
    } else {
        None
    };
    let target_len = r.varint()?;
    let checksum = if flags.contains(FormatFlags::CHECKSUM) {
        let b = r.take(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    } else {
        None
    };
    let op_count = r.varint()?;
    Ok(DeltaHeader {
        flags,
        codec_id,
        target_len,
        checksum,
        op_count,
        header_len: r.pos,
    })
}

/// Parse only the header of a delta.
pub fn read_header(data: &[u8]) -> Result<DeltaHeader, DecodeError> {
    parse_header(&mut Reader::new(data))
}

/// A parsed delta: header, ops and the (decompressed) literal bytes of all
/// ADD ops in order.
#[derive(Debug, Clone)]
pub struct ParsedDelta {
    pub header: DeltaHeader,
    pub ops: Vec<Op>,
    pub literals: Vec<u8>,
}

/// Parse a delta into ops and literals without rebuilding the target.
pub fn parse_ops(data: &[u8]) -> Result<ParsedDelta, DecodeError> {
    parse_ops_with(data, &DecodeOptions::default())
}

pub fn parse_ops_with(data: &[u8], opts: &DecodeOptions) -> Result<ParsedDelta, DecodeError> {
    let mut r = Reader::new(data);
    let header = parse_header(&mut r)?;
    if header.target_len > opts.max_target_len {
        return Err(DecodeError::TooLarge {
            len: header.target_len,
            limit: opts.max_target_len,
        });
    }
    let compressed = header.codec_id.is_some();

    // Every record takes at least two bytes.
    if header.op_count > r.remaining() / 2 {
        return Err(DecodeError::Truncated);
    }
    let mut ops = Vec::with_capacity(header.op_count);
    let mut literals = Vec::new();
    let mut literal_len = 0usize;
    let mut produced = 0usize;

    for _ in 0..header.op_count {
        let at = r.pos;
        let op = match r.byte()? {
            TAG_ADD => {
                let length = r.varint()?;
                if !compressed {
                    literals.extend_from_slice(r.take(length)?);
                }
                literal_len += length;
                Op::Add {
                    target_offset: produced,
                    length,
                }
            }
            TAG_COPY => {
                let source_offset = r.varint()?;
                let length = r.varint()?;
                Op::Copy {
                    source_offset,
                    length,
                }
            }
            tag => return Err(DecodeError::UnknownTag { tag, at }),
        };
        produced = produced
            .checked_add(op.len())
            .filter(|&n| n <= header.target_len)
            .ok_or(DecodeError::LengthMismatch {
                expected: header.target_len,
                actual: produced.saturating_add(op.len()),
            })?;
        ops.push(op);
    }

    if produced != header.target_len {
        return Err(DecodeError::LengthMismatch {
            expected: header.target_len,
            actual: produced,
        });
    }

    if let Some(id) = header.codec_id {
        let section_len = r.varint()?;
        let section = r.take(section_len)?;
        let backend = match &opts.custom {
            Some(custom) if custom.id() == id => Arc::clone(custom),
            _ => codec::backend_for_id(id)?,
        };
        literals = backend.decompress(section, literal_len)?;
        if literals.len() != literal_len {
            return Err(DecodeError::InvalidInput(format!(
                "literal section holds {} bytes, ADD ops need {}",
                literals.len(),
                literal_len
            )));
        }
    }

    if r.remaining() != 0 {
        return Err(DecodeError::TrailingData {
            extra: r.remaining(),
        });
    }

    Ok(ParsedDelta {
        header,
        ops,
        literals,
    })
}

/// Rebuild a target from ops and the concatenated ADD literals.
pub fn rebuild(ops: &[Op], literals: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut out = output_buffer(ops);
    let mut lit = 0usize;
    for op in ops {
        match *op {
            Op::Add { length, .. } => {
                let span = literals
                    .get(lit..lit.saturating_add(length))
                    .ok_or(DecodeError::Truncated)?;
                out.extend_from_slice(span);
                lit += length;
            }
            Op::Copy {
                source_offset,
                length,
            } => apply_copy(&mut out, source_offset, length)?,
        }
    }
    Ok(out)
}

/// Decode a delta back into its target.
pub fn decode_delta(data: &[u8]) -> Result<Vec<u8>, DecodeError> {
    decode_delta_with(data, &DecodeOptions::default())
}

pub fn decode_delta_with(data: &[u8], opts: &DecodeOptions) -> Result<Vec<u8>, DecodeError> {
    decode_parsed(data, opts).map(|(_, target)| target)
}

/// Decode a delta, returning its parsed form alongside the target.
pub fn decode_parsed(
    data: &[u8],
    opts: &DecodeOptions,
) -> Result<(ParsedDelta, Vec<u8>), DecodeError> {
    let parsed = parse_ops_with(data, opts)?;
    let target = rebuild(&parsed.ops, &parsed.literals)?;

    if opts.verify_checksum
        && let Some(expected) = parsed.header.checksum
    {
        let actual = adler32(&target);
        if actual != expected {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }
    }
    Ok((parsed, target))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
