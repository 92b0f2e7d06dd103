use log::{debug, trace};

use crate::constants::{QUAD_OFFSETS, STATE_NEGATIVE, STATE_SIGNIFICANT};
use crate::error::HtError;
use crate::jpeg2000::codeblock::{CodeBlock, ContextTrace, SampleBuffer, SegmentLengths, StateGrid};
use crate::jpeg2000::ht_block_coder::mag_sgn::MagSgnDecoder;
use crate::jpeg2000::ht_block_coder::mel::MelDecoder;
use crate::jpeg2000::ht_block_coder::tables::{UVLC_INITIAL, UVLC_NON_INITIAL, VLC_TABLES};
use crate::jpeg2000::ht_block_coder::vlc::VlcDecoder;

/// Exponent of a non-zero magnitude, `ceil(log2(mu)) + 1`.
pub(crate) fn exponent(mu: u32) -> u32 {
    32 - (2 * mu - 1).leading_zeros()
}

/// Residual exponent offset predictor for a quad.
pub(crate) fn kappa(states: &StateGrid, x: usize, y: usize, rho: u16, initial: bool) -> u32 {
    if initial || rho.count_ones() < 2 {
        1
    } else {
        (states.max_exponent_above(x, y) as u32).saturating_sub(1).max(1)
    }
}

/// High Throughput Block Coder (HTJ2K Part 15), cleanup pass decoder.
/// Holds the three bitstream readers of one codeblock segment.
pub struct HTBlockCoder<'a> {
    mel: MelDecoder<'a>,
    vlc: VlcDecoder<'a>,
    magsgn: MagSgnDecoder<'a>,
    width: usize,
    height: usize,
    p_lsb: u32,
    /// Number of coded magnitude bit-planes.
    k_max: u32,
}

impl<'a> HTBlockCoder<'a> {
    pub fn new(
        data: &'a [u8],
        lengths: SegmentLengths,
        width: usize,
        height: usize,
        p_lsb: u8,
        num_zbp: u8,
    ) -> Result<Self, HtError> {
        lengths.validate(data.len())?;
        if p_lsb == 0 || p_lsb as u32 + num_zbp as u32 > 31 {
            return Err(HtError::InvalidArgumentBitDepth);
        }
        let SegmentLengths { lcup, pcup, scup } = lengths;
        Ok(Self {
            mel: MelDecoder::new(data, lcup, scup),
            vlc: VlcDecoder::new(data, lcup, scup),
            magsgn: MagSgnDecoder::new(&data[..pcup], 0xFF),
            width,
            height,
            p_lsb: p_lsb as u32,
            k_max: 31 - p_lsb as u32 - num_zbp as u32,
        })
    }

    /// Decodes an entire codeblock into sign-magnitude samples.
    /// `samples` and `states` must be zeroed.
    pub fn decode_block(
        &mut self,
        samples: &mut SampleBuffer,
        states: &mut StateGrid,
        mut trace: Option<&mut ContextTrace>,
    ) -> Result<(), HtError> {
        for y in (0..self.height).step_by(2) {
            let initial = y == 0;
            for x in (0..self.width).step_by(4) {
                let t0 = self.decode_quad_vlc(states, x, y, initial, trace.as_deref_mut())?;
                let t1 = if x + 2 < self.width {
                    self.decode_quad_vlc(states, x + 2, y, initial, trace.as_deref_mut())?
                } else {
                    0
                };

                let (u0, u1) = self.decode_u_offsets(t0, t1, initial)?;
                let big_u0 = kappa(states, x, y, (t0 >> 4) & 0xF, initial) + u0;
                let big_u1 = kappa(states, x + 2, y, (t1 >> 4) & 0xF, initial) + u1;
                if big_u0 > self.k_max + 1 || big_u1 > self.k_max + 1 {
                    return Err(HtError::MagnitudeOverflow);
                }

                if t0 != 0 {
                    self.decode_quad_magsgn(samples, states, x, y, t0, big_u0, trace.as_deref_mut())?;
                }
                if t1 != 0 {
                    self.decode_quad_magsgn(samples, states, x + 2, y, t1, big_u1, trace.as_deref_mut())?;
                }
            }
        }
        Ok(())
    }

    /// Decode the CxtVLC codeword of one quad and mark its significant samples.
    /// Returns the packed table entry, or 0 for a quad skipped by MEL.
    fn decode_quad_vlc(
        &mut self,
        states: &mut StateGrid,
        x: usize,
        y: usize,
        initial: bool,
        trace: Option<&mut ContextTrace>,
    ) -> Result<u16, HtError> {
        let context = states.quad_context(x, y, initial);
        if let Some(trace) = trace {
            trace.significance.push(context);
        }
        if context == 0 && !self.mel.decode() {
            return Ok(0);
        }

        let table = if initial { 0 } else { 1 };
        let bits = self.vlc.fetch() & 0x7F;
        let entry = VLC_TABLES.decode[table][(context as usize) << 7 | bits as usize];
        let length = (entry & 7) as u32;
        if length == 0 {
            return Err(HtError::InvalidCodeword);
        }
        self.vlc.advance(length)?;

        let rho = (entry >> 4) & 0xF;
        for (i, &(dx, dy)) in QUAD_OFFSETS.iter().enumerate() {
            if rho & (1 << i) != 0 && x + dx < self.width && y + dy < self.height {
                states.apply((x + dx) as isize, (y + dy) as isize, |s| *s = STATE_SIGNIFICANT);
            }
        }
        Ok(entry)
    }

    /// Decode the UVLC residual offsets `u_q` of a quad pair.
    fn decode_u_offsets(&mut self, t0: u16, t1: u16, initial: bool) -> Result<(u32, u32), HtError> {
        let mut mode = ((t0 >> 3) & 1) | ((t1 >> 3) & 1) << 1;
        let table: &[u16] = if initial {
            // Both quads carry offsets: one MEL event says whether both exceed 2.
            if mode == 3 && self.mel.decode() {
                mode = 4;
            }
            &UVLC_INITIAL
        } else {
            &UVLC_NON_INITIAL
        };
        let mut entry = table[(mode as usize) << 6 | (self.vlc.fetch() & 0x3F) as usize] as u32;

        self.vlc.advance(entry & 7)?;
        entry >>= 3;
        let suffix_len = entry & 0xF;
        let suffix = self.vlc.fetch() & ((1u32 << suffix_len) - 1);
        self.vlc.advance(suffix_len)?;
        entry >>= 4;
        let first_len = entry & 7;
        entry >>= 3;
        let u0 = (entry & 7) + (suffix & ((1 << first_len) - 1));
        let u1 = (entry >> 3) + (suffix >> first_len);
        Ok((u0, u1))
    }

    /// Read the magnitude and sign bits of the significant samples of a quad.
    #[allow(clippy::too_many_arguments)]
    fn decode_quad_magsgn(
        &mut self,
        samples: &mut SampleBuffer,
        states: &mut StateGrid,
        x: usize,
        y: usize,
        entry: u16,
        big_u: u32,
        mut trace: Option<&mut ContextTrace>,
    ) -> Result<(), HtError> {
        let rho = (entry >> 4) & 0xF;
        let e_1 = (entry >> 8) & 0xF;
        let e_k = entry >> 12;
        for (i, &(dx, dy)) in QUAD_OFFSETS.iter().enumerate() {
            if rho & (1 << i) == 0 {
                continue;
            }
            let bits = self.magsgn.fetch() as u64;
            let m = big_u - ((e_k >> i) & 1) as u32;
            self.magsgn.advance(m)?;

            let v = (bits & ((1u64 << m) - 1)) | (((e_1 >> i) & 1) as u64) << m;
            let mu = (v >> 1) + 1;
            if mu >= 1u64 << self.k_max {
                return Err(HtError::MagnitudeOverflow);
            }
            let negative = (v & 1) as u32;

            let (sx, sy) = (x + dx, y + dy);
            if sx >= self.width || sy >= self.height {
                continue;
            }
            if let Some(trace) = trace.as_deref_mut() {
                trace.sign.push(states.sign_context(sx, sy).0);
            }
            let mu = mu as u32;
            samples.set(sx, sy, negative << 31 | mu << self.p_lsb);
            let sign_bit = if negative != 0 { STATE_NEGATIVE } else { 0 };
            states.apply(sx as isize, sy as isize, |s| {
                *s = STATE_SIGNIFICANT | sign_bit | exponent(mu) as u8
            });
        }
        Ok(())
    }
}

/// Decode the cleanup pass of `block`.
///
/// `lcup`, `pcup` and `scup` describe the segment held by the block; `Scup`
/// must already have been extracted (see [`CodeBlock::split_cleanup_segment`]).
/// A block without passes or bytes decodes to all zeros. On failure the
/// samples are left zeroed.
pub fn ht_cleanup_decode(
    block: &mut CodeBlock,
    p_lsb: u8,
    lcup: usize,
    pcup: usize,
    scup: usize,
) -> Result<(), HtError> {
    block.reset_for_decode();
    if block.num_passes == 0 || lcup == 0 {
        trace!("codeblock {}x{}: no coded data", block.width, block.height);
        return Ok(());
    }
    debug!(
        "decoding {}x{} codeblock: Lcup={} Pcup={} Scup={} num_zbp={}",
        block.width, block.height, lcup, pcup, scup, block.num_zbp
    );

    let result = {
        let CodeBlock {
            segment,
            samples,
            states,
            trace,
            width,
            height,
            num_zbp,
            ..
        } = block;
        let lengths = SegmentLengths { lcup, pcup, scup };
        HTBlockCoder::new(segment.as_slice(), lengths, *width, *height, p_lsb, *num_zbp)
            .and_then(|mut coder| coder.decode_block(samples, states, trace.as_mut()))
    };
    if result.is_err() {
        block.clear_samples();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::codeblock::CodingParameters;

    #[test]
    fn test_exponent() {
        assert_eq!(exponent(1), 1);
        assert_eq!(exponent(2), 2);
        assert_eq!(exponent(3), 3);
        assert_eq!(exponent(4), 3);
        assert_eq!(exponent(5), 4);
    }

    #[test]
    fn test_zero_passes_decode_to_zero() {
        let mut block = CodeBlock::new(4, 4, CodingParameters::reversible(8)).unwrap();
        block.set_sample(1, 1, 0x1234);
        ht_cleanup_decode(&mut block, 23, 0, 0, 0).unwrap();
        assert!(block.samples().rows().all(|r| r.iter().all(|&s| s == 0)));
    }

    #[test]
    fn test_reference_segment_decodes() {
        // 4x4 block, all magnitudes 1, alternating signs.
        let mut block = CodeBlock::new(4, 4, CodingParameters::reversible(1)).unwrap();
        block.num_passes = 1;
        block.pass_length[0] = 6;
        block
            .set_compressed_data(&[0x66, 0x5A, 0x33, 0x04, 0x54, 0x00], 0)
            .unwrap();
        let SegmentLengths { lcup, pcup, scup } = block.split_cleanup_segment().unwrap();
        assert_eq!((lcup, pcup, scup), (6, 2, 4));
        ht_cleanup_decode(&mut block, 30, lcup, pcup, scup).unwrap();

        let signs = [[0, 1, 0, 1], [1, 0, 1, 0], [0, 0, 1, 1], [1, 1, 0, 0]];
        for (y, row) in signs.iter().enumerate() {
            for (x, &s) in row.iter().enumerate() {
                assert_eq!(block.sample(x as u32, y as u32), (s as u32) << 31 | 1 << 30);
            }
        }
    }

    #[test]
    fn test_inconsistent_lengths_are_rejected() {
        let mut block = CodeBlock::new(4, 4, CodingParameters::reversible(1)).unwrap();
        block.num_passes = 1;
        block.set_compressed_data(&[0; 6], 0).unwrap();
        assert_eq!(
            ht_cleanup_decode(&mut block, 30, 6, 1, 4),
            Err(HtError::InvalidSegmentLength)
        );
        assert_eq!(
            ht_cleanup_decode(&mut block, 30, 8, 4, 4),
            Err(HtError::InvalidSegmentLength)
        );
    }
}
