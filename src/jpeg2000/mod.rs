//! JPEG 2000 High-Throughput codeblock coding (ISO/IEC 15444-15)
//!
//! - `codeblock`: the codeblock model, its coding parameters and reusable buffers.
//! - `quantization`: conversion between wavelet coefficients and sign-magnitude samples.
//! - `ht_block_coder`: the cleanup pass encoder and decoder.
//! - `block_codec`: coefficient-level encode/decode of whole codeblocks.

pub mod block_codec;
pub mod codeblock;
pub mod ht_block_coder;
pub mod quantization;
