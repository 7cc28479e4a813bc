//! Rolldelta: rolling-hash block matching and self-referential delta
//! encoding.
//!
//! The crate provides:
//! - A polynomial rolling hash and a chained block hash index (`hash`)
//! - An encoder that turns a buffer into ADD/COPY ops against itself, plus
//!   a compact serialized form of those ops (`delta`)
//! - Optional literal compression (`codec`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```no_run
//! use rolldelta::delta::{self, Op};
//!
//! let mut target = b"0123456789abcdef-0123456789abcdef".to_vec();
//! target.extend_from_slice(&target.clone());
//!
//! let ops = delta::encode(&target).unwrap();
//! assert!(ops.iter().any(|op| matches!(op, Op::Copy { .. })));
//! assert_eq!(delta::replay(&ops, &target).unwrap(), target);
//!
//! let bytes = delta::encode_delta(&target, Default::default(), &Default::default()).unwrap();
//! assert_eq!(delta::decode_delta(&bytes).unwrap(), target);
//! ```

pub mod codec;
pub mod delta;
pub mod error;
pub mod hash;
pub mod io;

#[cfg(feature = "cli")]
pub mod cli;

pub use error::MatchError;
