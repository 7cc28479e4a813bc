// Literal-section compression.
//
// The delta format stores ADD literals either inline or, when a codec is
// selected and actually shrinks them, as one compressed section after the
// op records.  The section carries a codec id so the decoder can pick the
// matching backend:
//
//   0 = none (never written; a delta without compression has no codec byte)
//   1 = zlib (flate2, feature `zlib`)
//   2 = LZMA (lzma-rs, feature `lzma`)
//
// Custom backends plug in through `CompressBackend` and should use ids above
// the built-in range.

use std::io;
use std::sync::{Arc, OnceLock};

use crate::delta::format::DecodeError;

pub const NONE_ID: u8 = 0;
pub const ZLIB_ID: u8 = 1;
pub const LZMA_ID: u8 = 2;

/// Minimum section size worth compressing.
const MIN_COMPRESS_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// CompressBackend trait
// ---------------------------------------------------------------------------

/// A whole-buffer compressor for the literal section.
///
/// # Implementing a custom backend
///
/// ```no_run
/// use rolldelta::codec::CompressBackend;
/// use rolldelta::delta::format::DecodeError;
///
/// struct Reverse;
///
/// impl CompressBackend for Reverse {
///     fn id(&self) -> u8 { 200 }
///     fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
///         Ok(data.iter().rev().copied().collect())
///     }
///     fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
///         if data.len() > limit {
///             return Err(DecodeError::InvalidInput("too long".into()));
///         }
///         Ok(data.iter().rev().copied().collect())
///     }
/// }
/// ```
pub trait CompressBackend: Send + Sync {
    /// Id stored in the delta header.
    fn id(&self) -> u8;

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Inflate `data`, producing at most `limit` bytes.  `limit` is the
    /// literal length the delta's ops account for; output past it is an
    /// error, and must be detected without materializing it.
    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError>;

    /// Whether `data` is worth handing to `compress`. Default: 32 bytes or more.
    fn should_compress(&self, data: &[u8]) -> bool {
        data.len() >= MIN_COMPRESS_SIZE
    }
}

// ---------------------------------------------------------------------------
// Backends
// ---------------------------------------------------------------------------

fn overrun(codec: &str, limit: usize) -> DecodeError {
    DecodeError::InvalidInput(format!("{codec} literals inflate past {limit} bytes"))
}

/// Writer that refuses to grow past `limit` bytes.
#[cfg(feature = "lzma")]
struct BoundedSink {
    buf: Vec<u8>,
    limit: usize,
    overflowed: bool,
}

#[cfg(feature = "lzma")]
impl io::Write for BoundedSink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.len() > self.limit - self.buf.len() {
            self.overflowed = true;
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "decompressed literals exceed limit",
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Passthrough backend; `should_compress` is always false.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl CompressBackend for NoCompression {
    fn id(&self) -> u8 {
        NONE_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        if data.len() > limit {
            return Err(overrun("none", limit));
        }
        Ok(data.to_vec())
    }

    fn should_compress(&self, _data: &[u8]) -> bool {
        false
    }
}

/// Zlib stream (deflate with zlib header and trailer).
#[cfg(feature = "zlib")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: flate2::Compression,
}

#[cfg(feature = "zlib")]
impl ZlibBackend {
    /// Zlib backend at `level` (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }
}

#[cfg(feature = "zlib")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(6)
    }
}

#[cfg(feature = "zlib")]
impl CompressBackend for ZlibBackend {
    fn id(&self) -> u8 {
        ZLIB_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        let mut output = Vec::new();
        ZlibDecoder::new(data)
            .take((limit as u64).saturating_add(1))
            .read_to_end(&mut output)
            .map_err(|e| DecodeError::InvalidInput(format!("zlib literals: {e}")))?;
        if output.len() > limit {
            return Err(overrun("zlib", limit));
        }
        Ok(output)
    }
}

/// LZMA "alone" stream via lzma-rs.
#[cfg(feature = "lzma")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma")]
impl CompressBackend for LzmaBackend {
    fn id(&self) -> u8 {
        LZMA_ID
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut io::Cursor::new(data), &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, DecodeError> {
        let mut output = BoundedSink {
            buf: Vec::new(),
            limit,
            overflowed: false,
        };
        // The dictionary buffer fills before anything reaches the sink, so
        // it needs the same bound.
        let options = lzma_rs::decompress::Options {
            memlimit: Some(limit),
            ..Default::default()
        };
        lzma_rs::lzma_decompress_with_options(
            &mut io::BufReader::new(data),
            &mut output,
            &options,
        )
        .map_err(|e| {
            if output.overflowed {
                overrun("LZMA", limit)
            } else {
                DecodeError::InvalidInput(format!("LZMA literals: {e}"))
            }
        })?;
        Ok(output.buf)
    }
}

// ---------------------------------------------------------------------------
// Codec selection (encode side)
// ---------------------------------------------------------------------------

/// Literal compression to apply when writing a delta.
#[derive(Clone, Default)]
pub enum Codec {
    #[default]
    None,
    #[cfg(feature = "zlib")]
    Zlib { level: u32 },
    #[cfg(feature = "lzma")]
    Lzma,
    /// Caller-provided backend.  Decoding needs the same backend passed via
    /// `DecodeOptions::custom`.
    Custom(Arc<dyn CompressBackend>),
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            #[cfg(feature = "zlib")]
            Self::Zlib { level } => write!(f, "Zlib {{ level: {level} }}"),
            #[cfg(feature = "lzma")]
            Self::Lzma => write!(f, "Lzma"),
            Self::Custom(b) => write!(f, "Custom(id={})", b.id()),
        }
    }
}

impl Codec {
    /// Backend for this codec, or `None` when literals stay inline.
    pub fn backend(&self) -> Option<Arc<dyn CompressBackend>> {
        match self {
            Self::None => None,
            #[cfg(feature = "zlib")]
            Self::Zlib { level } => Some(Arc::new(ZlibBackend::new(*level))),
            #[cfg(feature = "lzma")]
            Self::Lzma => Some(Arc::new(LzmaBackend)),
            Self::Custom(b) => Some(Arc::clone(b)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Short name used by the CLI and `inspect`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            #[cfg(feature = "zlib")]
            Self::Zlib { .. } => "zlib",
            #[cfg(feature = "lzma")]
            Self::Lzma => "lzma",
            Self::Custom(_) => "custom",
        }
    }

    /// Parse a codec name.  Names of codecs compiled out are rejected.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Self::None),
            #[cfg(feature = "zlib")]
            "zlib" => Some(Self::Zlib { level: 6 }),
            #[cfg(feature = "lzma")]
            "lzma" => Some(Self::Lzma),
            _ => None,
        }
    }
}

/// Name of the built-in codec with `id`, for display.
pub fn name_for_id(id: u8) -> &'static str {
    match id {
        NONE_ID => "none",
        ZLIB_ID => "zlib",
        LZMA_ID => "lzma",
        _ => "custom",
    }
}

/// Names of the codecs compiled into this build.
pub fn available() -> Vec<&'static str> {
    registry().iter().map(|b| name_for_id(b.id())).collect()
}

// ---------------------------------------------------------------------------
// Decode-side registry
// ---------------------------------------------------------------------------

fn registry() -> &'static [Arc<dyn CompressBackend>] {
    static REGISTRY: OnceLock<Vec<Arc<dyn CompressBackend>>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut backends: Vec<Arc<dyn CompressBackend>> = vec![Arc::new(NoCompression)];
        #[cfg(feature = "zlib")]
        backends.push(Arc::new(ZlibBackend::default()));
        #[cfg(feature = "lzma")]
        backends.push(Arc::new(LzmaBackend));
        backends
    })
}

/// Built-in backend for a codec id read from a delta header.
pub fn backend_for_id(id: u8) -> Result<Arc<dyn CompressBackend>, DecodeError> {
    if let Some(b) = registry().iter().find(|b| b.id() == id) {
        return Ok(Arc::clone(b));
    }
    match id {
        ZLIB_ID => Err(DecodeError::Unsupported(
            "zlib literals require the 'zlib' feature".into(),
        )),
        LZMA_ID => Err(DecodeError::Unsupported(
            "LZMA literals require the 'lzma' feature".into(),
        )),
        _ => Err(DecodeError::Unsupported(format!("unknown codec id {id}"))),
    }
}

/// Compress `data`, or `None` when the backend declines or the result is
/// not smaller.
pub fn compress_literals(
    backend: &dyn CompressBackend,
    data: &[u8],
) -> io::Result<Option<Vec<u8>>> {
    if !backend.should_compress(data) {
        return Ok(None);
    }
    let compressed = backend.compress(data)?;
    Ok((compressed.len() < data.len()).then_some(compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(n: usize) -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(n)
            .collect()
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_roundtrip() {
        let b = ZlibBackend::default();
        let data = text(2048);
        let c = b.compress(&data).unwrap();
        assert!(c.len() < data.len());
        assert_eq!(b.decompress(&c, data.len()).unwrap(), data);
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn lzma_roundtrip() {
        let b = LzmaBackend;
        let data = text(2048);
        let c = b.compress(&data).unwrap();
        assert!(c.len() < data.len());
        assert_eq!(b.decompress(&c, data.len()).unwrap(), data);
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn corrupt_zlib_is_invalid_input() {
        let err = ZlibBackend::default().decompress(b"not zlib at all", 64).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidInput(_)));
    }

    #[cfg(feature = "zlib")]
    #[test]
    fn zlib_output_capped_at_limit() {
        let b = ZlibBackend::default();
        let bomb = b.compress(&vec![0u8; 4 << 20]).unwrap();
        assert!(bomb.len() < 8 * 1024);
        assert!(matches!(
            b.decompress(&bomb, 1000),
            Err(DecodeError::InvalidInput(msg)) if msg.contains("past 1000")
        ));
        assert_eq!(b.decompress(&bomb, 4 << 20).unwrap().len(), 4 << 20);
    }

    #[cfg(feature = "lzma")]
    #[test]
    fn lzma_output_capped_at_limit() {
        let b = LzmaBackend;
        let bomb = b.compress(&vec![0u8; 1 << 20]).unwrap();
        assert!(matches!(
            b.decompress(&bomb, 1000),
            Err(DecodeError::InvalidInput(_))
        ));
        assert_eq!(b.decompress(&bomb, 1 << 20).unwrap().len(), 1 << 20);
    }

    #[test]
    fn passthrough_respects_limit() {
        assert_eq!(NoCompression.decompress(b"abc", 3).unwrap(), b"abc");
        assert!(NoCompression.decompress(b"abcd", 3).is_err());
    }

    #[test]
    fn no_compression_declines() {
        assert!(!NoCompression.should_compress(&text(4096)));
        assert_eq!(compress_literals(&NoCompression, &text(4096)).unwrap(), None);
    }

    #[test]
    fn small_or_incompressible_kept() {
        struct Grow;
        impl CompressBackend for Grow {
            fn id(&self) -> u8 {
                201
            }
            fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
                let mut v = data.to_vec();
                v.push(0);
                Ok(v)
            }
            fn decompress(&self, data: &[u8], _limit: usize) -> Result<Vec<u8>, DecodeError> {
                Ok(data[..data.len() - 1].to_vec())
            }
        }
        assert_eq!(compress_literals(&Grow, b"tiny").unwrap(), None);
        assert_eq!(compress_literals(&Grow, &text(100)).unwrap(), None);
    }

    #[test]
    fn registry_dispatch() {
        assert_eq!(backend_for_id(NONE_ID).unwrap().id(), NONE_ID);
        #[cfg(feature = "zlib")]
        assert_eq!(backend_for_id(ZLIB_ID).unwrap().id(), ZLIB_ID);
        #[cfg(feature = "lzma")]
        assert_eq!(backend_for_id(LZMA_ID).unwrap().id(), LZMA_ID);
        assert!(matches!(
            backend_for_id(99),
            Err(DecodeError::Unsupported(_))
        ));
        assert!(available().contains(&"none"));
    }

    #[test]
    fn codec_names() {
        assert!(Codec::from_name("none").is_some_and(|c| !c.is_enabled()));
        assert!(Codec::from_name("brotli").is_none());
        #[cfg(feature = "zlib")]
        {
            let c = Codec::from_name("zlib").unwrap();
            assert_eq!(c.name(), "zlib");
            assert_eq!(c.backend().unwrap().id(), ZLIB_ID);
        }
        #[cfg(feature = "lzma")]
        assert_eq!(Codec::from_name("lzma").unwrap().name(), "lzma");
        assert_eq!(name_for_id(LZMA_ID), "lzma");
        assert_eq!(name_for_id(77), "custom");
    }
}
