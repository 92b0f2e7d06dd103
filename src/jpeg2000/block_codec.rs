//! Coefficient-level encoding and decoding of whole codeblocks.
//!
//! [`BlockCodec`] sits between a wavelet pipeline and the cleanup pass coder:
//! it quantizes coefficients into sign-magnitude samples, applies the ROI
//! max-shift, runs the coder and keeps its buffers for the next codeblock.

use log::{debug, warn};

use super::codeblock::{BlockBuffers, CodeBlock, CodingParameters, Region};
use super::ht_block_coder::{ht_cleanup_decode, htj2k_cleanup_encode};
use super::quantization::{
    WaveletSample, from_sign_magnitude, roi_downshift, roi_upshift, to_sign_magnitude,
};
use crate::error::HtError;

/// Result of encoding one codeblock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedBlock {
    /// The cleanup segment, empty when no pass was coded.
    pub data: Vec<u8>,
    pub num_passes_total: u8,
    /// Byte length of every coded pass.
    pub pass_lengths: Vec<u32>,
    /// Number of magnitude bit-planes that carry information.
    pub num_bps: u8,
    pub num_zbp: u8,
}

/// One codeblock to encode in a batch.
#[derive(Debug, Clone, Copy)]
pub struct EncodeJob<'a, T> {
    pub coefficients: &'a [T],
    pub stride: usize,
    pub width: u32,
    pub height: u32,
    pub params: CodingParameters,
    /// Samples inside the region of interest, laid out like `coefficients`.
    pub roi_mask: Option<&'a [bool]>,
}

/// One codeblock to decode in a batch.
#[derive(Debug, Clone)]
pub struct DecodeJob<'a> {
    pub segments: Vec<&'a [u8]>,
    pub num_passes: u8,
    pub num_zbp: u8,
    pub params: CodingParameters,
    pub width: u32,
    pub height: u32,
}

fn check_layout(len: usize, stride: usize, width: u32, height: u32) -> Result<(), HtError> {
    if stride < width as usize {
        return Err(HtError::InvalidArgumentStride);
    }
    if len < (height as usize).saturating_sub(1) * stride + width as usize {
        return Err(HtError::InvalidArgumentSize);
    }
    Ok(())
}

/// Reusable codeblock encoder/decoder.
#[derive(Debug, Default)]
pub struct BlockCodec {
    buffers: Option<BlockBuffers>,
    coded: Vec<u8>,
}

impl BlockCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn codeblock(
        &mut self,
        width: u32,
        height: u32,
        params: &CodingParameters,
    ) -> Result<CodeBlock, HtError> {
        let buffers = self.buffers.take().unwrap_or_default();
        CodeBlock::with_buffers(Region::from_size(width, height), *params, buffers)
    }

    /// Encode `height` rows of `width` coefficients, `stride` apart.
    ///
    /// With an ROI mask, samples inside the region are shifted up by the
    /// ROI shift of `params`; every other sample must then stay below
    /// `2^roi_shift`.
    pub fn encode<T: WaveletSample>(
        &mut self,
        coefficients: &[T],
        stride: usize,
        params: &CodingParameters,
        width: u32,
        height: u32,
        roi_mask: Option<&[bool]>,
    ) -> Result<EncodedBlock, HtError> {
        let mut block = self.codeblock(width, height, params)?;
        let result = fill_samples(&mut block, coefficients, stride, roi_mask)
            .and_then(|()| htj2k_cleanup_encode(&mut block, params.roi_shift))
            .map(|_| {
                let bits = params.m_b + params.roi_shift;
                EncodedBlock {
                    data: block.compressed_data().to_vec(),
                    num_passes_total: block.num_passes,
                    pass_lengths: block.pass_length[..block.num_passes as usize].to_vec(),
                    num_bps: bits - block.num_zbp,
                    num_zbp: block.num_zbp,
                }
            });
        self.buffers = Some(block.into_buffers());
        result
    }

    /// Decode a codeblock whose cleanup segment is the concatenation of
    /// `segments` into `out`.
    ///
    /// A block with no passes or no bytes decodes to zeros. When decoding
    /// fails the block is written as zeros and the error is returned, so a
    /// caller can carry on with the remaining codeblocks.
    #[allow(clippy::too_many_arguments)]
    pub fn decode<T: WaveletSample>(
        &mut self,
        segments: &[&[u8]],
        num_passes: u8,
        num_zbp: u8,
        params: &CodingParameters,
        width: u32,
        height: u32,
        out: &mut [T],
        stride: usize,
    ) -> Result<(), HtError> {
        check_layout(out.len(), stride, width, height)?;
        let mut block = self.codeblock(width, height, params)?;

        self.coded.clear();
        for segment in segments {
            self.coded.extend_from_slice(segment);
        }
        let result = decode_into(&mut block, &self.coded, num_passes, num_zbp);
        match result {
            Ok(()) => {
                let p_lsb = params.p_lsb();
                for y in 0..height as usize {
                    let row = block.samples().row(y);
                    for (x, &word) in row.iter().enumerate() {
                        let (negative, magnitude) = from_sign_magnitude(word, p_lsb);
                        let magnitude = roi_downshift(magnitude, params.roi_shift);
                        out[y * stride + x] =
                            T::dequantize(negative, magnitude, params.transform, params.step_size);
                    }
                }
            }
            Err(e) => {
                warn!("codeblock {}x{} failed to decode: {}", width, height, e);
                for y in 0..height as usize {
                    out[y * stride..y * stride + width as usize].fill(T::default());
                }
            }
        }
        self.buffers = Some(block.into_buffers());
        result
    }

    fn encode_job<T: WaveletSample>(&mut self, job: &EncodeJob<'_, T>) -> Result<EncodedBlock, HtError> {
        self.encode(
            job.coefficients,
            job.stride,
            &job.params,
            job.width,
            job.height,
            job.roi_mask,
        )
    }

    fn decode_job<T: WaveletSample>(&mut self, job: &DecodeJob<'_>) -> Result<Vec<T>, HtError> {
        let mut out = vec![T::default(); job.width as usize * job.height as usize];
        self.decode(
            &job.segments,
            job.num_passes,
            job.num_zbp,
            &job.params,
            job.width,
            job.height,
            &mut out,
            job.width as usize,
        )?;
        Ok(out)
    }
}

fn fill_samples<T: WaveletSample>(
    block: &mut CodeBlock,
    coefficients: &[T],
    stride: usize,
    roi_mask: Option<&[bool]>,
) -> Result<(), HtError> {
    let (width, height) = (block.width(), block.height());
    check_layout(coefficients.len(), stride, width, height)?;
    if let Some(mask) = roi_mask {
        check_layout(mask.len(), stride, width, height)?;
    }
    let params = *block.params();
    let p_lsb = params.p_lsb();
    let roi_shift = params.roi_shift;

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * stride + x as usize;
            let (negative, magnitude) = coefficients[idx].quantize(params.transform, params.step_size);
            if magnitude >= 1 << params.m_b {
                return Err(HtError::InvalidArgumentBitDepth);
            }
            let magnitude = if roi_mask.is_some_and(|mask| mask[idx]) {
                roi_upshift(magnitude, roi_shift)
            } else {
                if roi_shift > 0 && magnitude >= 1 << roi_shift {
                    return Err(HtError::InvalidArgumentRoiShift);
                }
                magnitude
            };
            block.set_sample(x, y, to_sign_magnitude(negative && magnitude != 0, magnitude, p_lsb));
        }
    }
    Ok(())
}

fn decode_into(block: &mut CodeBlock, coded: &[u8], num_passes: u8, num_zbp: u8) -> Result<(), HtError> {
    block.num_passes = num_passes;
    block.num_zbp = num_zbp;
    block.pass_length[0] = coded.len() as u32;
    block.length = coded.len() as u32;
    let p_lsb = block.params().p_lsb();
    if num_passes == 0 || coded.is_empty() {
        debug!("codeblock {}x{}: nothing coded", block.width(), block.height());
        return ht_cleanup_decode(block, p_lsb, 0, 0, 0);
    }
    block.set_compressed_data(coded, 0)?;
    let lengths = block.split_cleanup_segment()?;
    ht_cleanup_decode(block, p_lsb, lengths.lcup, lengths.pcup, lengths.scup)
}

/// Encode independent codeblocks, in parallel with the `parallel` feature.
pub fn encode_blocks<T: WaveletSample>(jobs: &[EncodeJob<'_, T>]) -> Vec<Result<EncodedBlock, HtError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        jobs.par_iter()
            .map_init(BlockCodec::new, |codec, job| codec.encode_job(job))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut codec = BlockCodec::new();
        jobs.iter().map(|job| codec.encode_job(job)).collect()
    }
}

/// Decode independent codeblocks into `width * height` coefficient vectors,
/// in parallel with the `parallel` feature.
pub fn decode_blocks<T: WaveletSample>(jobs: &[DecodeJob<'_>]) -> Vec<Result<Vec<T>, HtError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        jobs.par_iter()
            .map_init(BlockCodec::new, |codec, job| codec.decode_job(job))
            .collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        let mut codec = BlockCodec::new();
        jobs.iter().map(|job| codec.decode_job(job)).collect()
    }
}
