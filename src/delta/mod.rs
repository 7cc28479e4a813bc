// Delta encoding on top of the block index.
//
// - `ops`: ADD/COPY instructions and replay
// - `encoder`: the self-referential scan producing ops
// - `varint` + `format`: the serialized op stream

pub mod encoder;
pub mod format;
pub mod ops;
pub mod varint;

pub use encoder::{DeltaEncoder, encode, encode_with_config};
pub use format::{
    DEFAULT_MAX_TARGET_LEN, DecodeError, DecodeOptions, EncodeError, FormatFlags, FormatOptions,
    decode_delta, decode_parsed, encode_delta, read_header, write_delta,
};
pub use ops::{Op, OpStats, ReplayError, replay};
