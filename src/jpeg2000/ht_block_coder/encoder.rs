//! HTJ2K (High-Throughput JPEG 2000) cleanup pass encoder.
//! Produces a single cleanup segment per codeblock, ISO/IEC 15444-15 clause 7.

use log::{debug, trace};

use super::coder::{exponent, kappa};
use super::mag_sgn::MagSgnEncoder;
use super::mel::MelEncoder;
use super::tables::{VLC_TABLES, uvlc_code};
use super::vlc::VlcEncoder;
use crate::constants::{
    MAXIMUM_MAGNITUDE_BITS, MAXIMUM_SCUP, MINIMUM_SCUP, QUAD_OFFSETS, STATE_NEGATIVE,
    STATE_SIGNIFICANT,
};
use crate::error::HtError;
use crate::jpeg2000::codeblock::{CodeBlock, ContextTrace, SampleBuffer, StateGrid};

/// An encoded cleanup segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupSegment {
    pub data: Vec<u8>,
    /// Length of the MagSgn part.
    pub pcup: usize,
    /// Length of the MEL and VLC part, including the two trailing bytes.
    pub scup: usize,
}

/// Significant samples of one quad.
#[derive(Default)]
struct Quad {
    rho: u16,
    /// Sample exponents, zero where insignificant.
    e_q: [u32; 4],
    /// MagSgn values `2 * (mu - 1) + sign`.
    s: [u32; 4],
    negative: [bool; 4],
}

/// Cleanup pass encoder holding the three bitstream writers.
pub struct HTBlockEncoder {
    mel: MelEncoder,
    vlc: VlcEncoder,
    magsgn: MagSgnEncoder,
    width: usize,
    height: usize,
    p_lsb: u32,
}

impl HTBlockEncoder {
    pub fn new(width: usize, height: usize, p_lsb: u8) -> Self {
        Self {
            mel: MelEncoder::new(),
            vlc: VlcEncoder::new(),
            magsgn: MagSgnEncoder::new(),
            width,
            height,
            p_lsb: p_lsb as u32,
        }
    }

    /// Code every quad pair of `samples`. `states` must be zeroed.
    pub fn encode_block(
        &mut self,
        samples: &SampleBuffer,
        states: &mut StateGrid,
        mut trace: Option<&mut ContextTrace>,
    ) {
        for y in (0..self.height).step_by(2) {
            let initial = y == 0;
            for x in (0..self.width).step_by(4) {
                let u0 = self.encode_quad(samples, states, x, y, initial, trace.as_deref_mut());
                let u1 = if x + 2 < self.width {
                    self.encode_quad(samples, states, x + 2, y, initial, trace.as_deref_mut())
                } else {
                    0
                };
                self.encode_u_offsets(u0, u1, initial);
            }
        }
    }

    fn load_quad(&self, samples: &SampleBuffer, x: usize, y: usize) -> Quad {
        let mut quad = Quad::default();
        for (i, &(dx, dy)) in QUAD_OFFSETS.iter().enumerate() {
            let (sx, sy) = (x + dx, y + dy);
            if sx >= self.width || sy >= self.height {
                continue;
            }
            let word = samples.get(sx, sy);
            let mu = (word & 0x7FFF_FFFF) >> self.p_lsb;
            if mu == 0 {
                continue;
            }
            let negative = word >> 31;
            quad.rho |= 1 << i;
            quad.e_q[i] = exponent(mu);
            quad.s[i] = 2 * (mu - 1) + negative;
            quad.negative[i] = negative != 0;
        }
        quad
    }

    /// Emit the CxtVLC codeword, MEL event and MagSgn bits of one quad.
    /// Returns the residual offset `u_q` still to be UVLC coded.
    fn encode_quad(
        &mut self,
        samples: &SampleBuffer,
        states: &mut StateGrid,
        x: usize,
        y: usize,
        initial: bool,
        trace: Option<&mut ContextTrace>,
    ) -> u32 {
        let quad = self.load_quad(samples, x, y);
        let context = states.quad_context(x, y, initial);
        if let Some(trace) = trace {
            trace.significance.push(context);
        }

        let e_max = quad.e_q.iter().copied().max().unwrap_or(0);
        let kappa = kappa(states, x, y, quad.rho, initial);
        let big_u = e_max.max(kappa);
        let u = big_u - kappa;
        let mut emb = 0u16;
        if u > 0 {
            for (i, &e) in quad.e_q.iter().enumerate() {
                if quad.rho & (1 << i) != 0 && e == e_max {
                    emb |= 1 << i;
                }
            }
        }

        let table = if initial { 0 } else { 1 };
        let entry = VLC_TABLES.encode[table][(context as usize) << 8 | (quad.rho << 4 | emb) as usize];
        self.vlc.write_bits((entry >> 8) as u32, ((entry >> 4) & 7) as u32);
        if context == 0 {
            self.mel.encode(quad.rho != 0);
        }

        let e_k = entry & 0xF;
        for (i, &(dx, dy)) in QUAD_OFFSETS.iter().enumerate() {
            if quad.rho & (1 << i) == 0 {
                continue;
            }
            let m = big_u - ((e_k >> i) & 1) as u32;
            self.magsgn.write_bits(quad.s[i] & ((1u64 << m) - 1) as u32, m);
            let sign_bit = if quad.negative[i] { STATE_NEGATIVE } else { 0 };
            let state = STATE_SIGNIFICANT | sign_bit | quad.e_q[i] as u8;
            states.apply((x + dx) as isize, (y + dy) as isize, |s| *s = state);
        }
        u
    }

    /// UVLC code the residual offsets of a quad pair.
    fn encode_u_offsets(&mut self, u0: u32, u1: u32, initial: bool) {
        if initial && u0 > 0 && u1 > 0 {
            // One MEL event tells the decoder whether both offsets exceed 2.
            let both = u0.min(u1) > 2;
            self.mel.encode(both);
            if both {
                self.write_uvlc_pair(u0 - 2, u1 - 2);
                return;
            }
            if u0 > 2 {
                let c0 = uvlc_code(u0);
                self.vlc.write_bits(c0.prefix, c0.prefix_len);
                self.vlc.write_bits(u1 - 1, 1);
                self.vlc.write_bits(c0.suffix, c0.suffix_len);
                return;
            }
        }
        match (u0 > 0, u1 > 0) {
            (true, true) => self.write_uvlc_pair(u0, u1),
            (true, false) => self.write_uvlc(u0),
            (false, true) => self.write_uvlc(u1),
            (false, false) => {}
        }
    }

    fn write_uvlc(&mut self, u: u32) {
        let c = uvlc_code(u);
        self.vlc.write_bits(c.prefix, c.prefix_len);
        self.vlc.write_bits(c.suffix, c.suffix_len);
    }

    fn write_uvlc_pair(&mut self, u0: u32, u1: u32) {
        let (c0, c1) = (uvlc_code(u0), uvlc_code(u1));
        self.vlc.write_bits(c0.prefix, c0.prefix_len);
        self.vlc.write_bits(c1.prefix, c1.prefix_len);
        self.vlc.write_bits(c0.suffix, c0.suffix_len);
        self.vlc.write_bits(c1.suffix, c1.suffix_len);
    }

    /// Terminate the three writers and lay out `MagSgn ++ MEL ++ reversed VLC`
    /// with `Scup` stored in the last two bytes.
    pub fn assemble(self) -> Result<CleanupSegment, HtError> {
        let Self {
            mut mel,
            mut vlc,
            mut magsgn,
            ..
        } = self;
        magsgn.terminate();
        terminate_mel_vlc(&mut mel, &mut vlc);

        let scup = mel.len() + vlc.len();
        if !(MINIMUM_SCUP..=MAXIMUM_SCUP).contains(&scup) {
            return Err(HtError::SegmentTooLong);
        }
        let mut data = magsgn.into_bytes();
        let pcup = data.len();
        data.extend(mel.into_bytes());
        data.extend(vlc.into_bytes().into_iter().rev());

        let lcup = data.len();
        data[lcup - 1] = (scup >> 4) as u8;
        data[lcup - 2] = (data[lcup - 2] & 0xF0) | (scup & 0xF) as u8;
        Ok(CleanupSegment { data, pcup, scup })
    }
}

/// Flush the MEL and VLC writers, fusing their last partial bytes into one
/// when the used bits do not overlap and the result cannot be mistaken for a
/// stuffing trigger.
pub fn terminate_mel_vlc(mel: &mut MelEncoder, vlc: &mut VlcEncoder) {
    let (mel_tmp, mel_mask) = mel.flush_pending();
    let (vlc_tmp, vlc_mask) = vlc.pending();
    if mel_mask | vlc_mask == 0 {
        return;
    }
    let fuse = mel_tmp | vlc_tmp;
    if ((fuse ^ mel_tmp) & mel_mask) | ((fuse ^ vlc_tmp) & vlc_mask) == 0
        && fuse != 0xFF
        && vlc.len() > 1
    {
        trace!("MEL/VLC terminal bytes fused into {:#04x}", fuse);
        mel.push_byte(fuse);
    } else {
        trace!("MEL/VLC terminal bytes {:#04x}/{:#04x}", mel_tmp, vlc_tmp);
        mel.push_byte(mel_tmp);
        vlc.push_pending();
    }
}

/// Encode the samples of `block` as a single cleanup pass.
///
/// Samples are sign-magnitude words with the least significant magnitude bit
/// at `31 - (M_b + roi_shift)`. Sets `num_zbp`, `num_passes`, the pass
/// length and the compressed data of the block and returns the segment
/// length. A block without significant samples codes no passes and no bytes.
pub fn htj2k_cleanup_encode(block: &mut CodeBlock, roi_shift: u8) -> Result<usize, HtError> {
    let bits = block.params().m_b as u32 + roi_shift as u32;
    if bits > MAXIMUM_MAGNITUDE_BITS as u32 {
        return Err(HtError::InvalidArgumentRoiShift);
    }
    let p_lsb = (31 - bits) as u8;
    block.reset_for_encode();

    let max_magnitude = block
        .samples
        .rows()
        .flat_map(|row| row.iter())
        .map(|&word| (word & 0x7FFF_FFFF) >> p_lsb)
        .max()
        .unwrap_or(0);
    if max_magnitude == 0 {
        trace!("codeblock {}x{}: all samples zero", block.width, block.height);
        block.num_zbp = bits as u8;
        block.num_passes = 0;
        block.pass_length[0] = 0;
        block.length = 0;
        block.replace_compressed_data(&[]);
        return Ok(0);
    }
    block.num_zbp = (bits - (32 - max_magnitude.leading_zeros())) as u8;

    let segment = {
        let CodeBlock {
            samples,
            states,
            trace,
            width,
            height,
            ..
        } = block;
        let mut encoder = HTBlockEncoder::new(*width, *height, p_lsb);
        encoder.encode_block(samples, states, trace.as_mut());
        encoder.assemble()?
    };

    let length = segment.data.len();
    debug!(
        "encoded {}x{} codeblock: Lcup={} Pcup={} Scup={} num_zbp={}",
        block.width, block.height, length, segment.pcup, segment.scup, block.num_zbp
    );
    block.num_passes = 1;
    block.pass_length[0] = length as u32;
    block.length = length as u32;
    block.replace_compressed_data(&segment.data);
    Ok(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg2000::codeblock::CodingParameters;

    fn block_with(width: u32, height: u32, m_b: u8, words: &[(u32, u32, u32)]) -> CodeBlock {
        let mut block = CodeBlock::new(width, height, CodingParameters::reversible(m_b)).unwrap();
        for &(x, y, w) in words {
            block.set_sample(x, y, w);
        }
        block
    }

    #[test]
    fn test_all_zero_block_codes_nothing() {
        let mut block = block_with(8, 8, 8, &[]);
        assert_eq!(htj2k_cleanup_encode(&mut block, 0).unwrap(), 0);
        assert_eq!(block.num_passes, 0);
        assert_eq!(block.num_zbp, 8);
        assert!(block.compressed_data().is_empty());
    }

    #[test]
    fn test_reference_4x4_alternating_signs() {
        let signs = [[0, 1, 0, 1], [1, 0, 1, 0], [0, 0, 1, 1], [1, 1, 0, 0]];
        let mut words = Vec::new();
        for (y, row) in signs.iter().enumerate() {
            for (x, &s) in row.iter().enumerate() {
                words.push((x as u32, y as u32, s << 31 | 1 << 30));
            }
        }
        let mut block = block_with(4, 4, 1, &words);
        assert_eq!(htj2k_cleanup_encode(&mut block, 0).unwrap(), 6);
        assert_eq!(block.compressed_data(), &[0x66, 0x5A, 0x33, 0x04, 0x54, 0x00]);
        assert_eq!(block.num_zbp, 0);
        assert_eq!(block.num_passes, 1);
        assert_eq!(block.pass_length[0], 6);
    }

    #[test]
    fn test_num_zbp_counts_empty_planes() {
        let mut block = block_with(4, 4, 8, &[(1, 2, 5 << 23)]);
        htj2k_cleanup_encode(&mut block, 0).unwrap();
        assert_eq!(block.num_zbp, 5);
    }

    #[test]
    fn test_assembled_scup_matches_trailer() {
        let words: Vec<_> = (0..48u32)
            .filter(|i| i % 3 != 1)
            .map(|i| (i % 8, i / 8, (i & 1) << 31 | (i * 5 % 61 + 1) << 23))
            .collect();
        let mut block = block_with(8, 6, 8, &words);
        block.reset_for_encode();
        let mut encoder = HTBlockEncoder::new(8, 6, 23);
        encoder.encode_block(&block.samples, &mut block.states, None);
        let segment = encoder.assemble().unwrap();

        let mut data = segment.data.clone();
        let lengths = crate::jpeg2000::codeblock::split_cleanup_segment(&mut data).unwrap();
        assert_eq!(lengths.scup, segment.scup);
        assert_eq!(lengths.pcup, segment.pcup);
        assert_eq!(lengths.lcup, segment.data.len());
    }

    #[test]
    fn test_roi_shift_out_of_range() {
        let mut block = block_with(4, 4, 28, &[]);
        assert_eq!(
            htj2k_cleanup_encode(&mut block, 3),
            Err(HtError::InvalidArgumentRoiShift)
        );
    }

    #[test]
    fn test_terminal_bytes_fuse_when_disjoint() {
        let mut mel = MelEncoder::new();
        let mut vlc = VlcEncoder::new();
        mel.encode(true);
        vlc.write_bits(0b001, 3);
        vlc.write_bits(0, 6);
        terminate_mel_vlc(&mut mel, &mut vlc);
        // The five pending VLC bits ride in the MEL byte.
        assert_eq!(mel.into_bytes(), vec![0x00]);
        assert_eq!(vlc.into_bytes(), vec![0xFF, 0x1F]);
    }

    #[test]
    fn test_terminal_bytes_kept_apart_for_short_vlc() {
        let mut mel = MelEncoder::new();
        let mut vlc = VlcEncoder::new();
        mel.encode(true);
        vlc.write_bits(0b001, 3);
        terminate_mel_vlc(&mut mel, &mut vlc);
        assert_eq!(mel.into_bytes(), vec![0x00]);
        assert_eq!(vlc.into_bytes(), vec![0xFF, 0x1F]);
    }
}
