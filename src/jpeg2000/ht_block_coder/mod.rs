//! High-Throughput block coding (ISO/IEC 15444-15), cleanup pass only.
//!
//! - `tables`: UVLC and CxtVLC lookup tables.
//! - `mel`: adaptive run-length coding of quad significance.
//! - `mag_sgn`: forward bit-stuffed MagSgn stream.
//! - `vlc`: reverse bit-stuffed VLC stream.
//! - `coder` / `encoder`: the quad-pair scan for decoding and encoding.

pub mod coder;
pub mod encoder;
pub mod mag_sgn;
pub mod mel;
pub mod tables;
pub mod vlc;

pub use coder::{HTBlockCoder, ht_cleanup_decode};
pub use encoder::{CleanupSegment, HTBlockEncoder, htj2k_cleanup_encode, terminate_mel_vlc};
