//! HTJ2K (JPEG 2000 Part 15) cleanup-pass codeblock coding.
//!
//! The crate encodes and decodes single codeblocks: MEL run-length coding of
//! quad significance, context-adaptive VLC and UVLC codes in a reverse
//! bitstream, and raw magnitude/sign bits in a forward bitstream.

pub mod constants;
pub mod container;
pub mod error;
pub mod jpeg2000;

pub use container::BlockFile;
pub use error::HtError;
pub use jpeg2000::block_codec::{
    BlockCodec, DecodeJob, EncodeJob, EncodedBlock, decode_blocks, encode_blocks,
};
pub use jpeg2000::codeblock::{
    CodeBlock, CodeBlockStyle, CodingParameters, ContextTrace, Region, SegmentLengths,
    SubbandOrientation, TransformKind,
};
pub use jpeg2000::ht_block_coder::{ht_cleanup_decode, htj2k_cleanup_encode};
pub use jpeg2000::quantization::WaveletSample;
