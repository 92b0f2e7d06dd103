//! Codeblock model for the HT cleanup pass.
//!
//! A [`CodeBlock`] owns everything one encode or decode call touches: the
//! sign-magnitude sample buffer, the padded significance state grid, the
//! compressed segment bytes and the coding parameters of its subband.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::constants::{
    MAXIMUM_CODEBLOCK_AREA, MAXIMUM_CODEBLOCK_DIMENSION, MAXIMUM_MAGNITUDE_BITS, MAXIMUM_SCUP,
    MINIMUM_SCUP, STATE_EXPONENT_MASK, STATE_NEGATIVE, STATE_SIGNIFICANT,
};
use crate::error::HtError;

fn round_up(value: usize, multiple: usize) -> usize {
    value.div_ceil(multiple) * multiple
}

/// A position on the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

/// A rectangle on the reference grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// Top-left corner (inclusive).
    pub pos0: Point,
    /// Bottom-right corner (exclusive).
    pub pos1: Point,
}

impl Region {
    pub fn new(pos0: Point, pos1: Point) -> Self {
        Self { pos0, pos1 }
    }

    /// A region of the given size anchored at the origin.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self {
            pos0: Point::default(),
            pos1: Point {
                x: width,
                y: height,
            },
        }
    }

    pub fn width(&self) -> u32 {
        self.pos1.x.saturating_sub(self.pos0.x)
    }

    pub fn height(&self) -> u32 {
        self.pos1.y.saturating_sub(self.pos0.y)
    }
}

/// Orientation of a wavelet subband.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum SubbandOrientation {
    #[default]
    /// Low-Low (base image)
    LL = 0,
    /// High-Low (horizontal details)
    HL = 1,
    /// Low-High (vertical details)
    LH = 2,
    /// High-High (diagonal details)
    HH = 3,
}

/// Wavelet transform used by the tile component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TransformKind {
    /// 9-7 irreversible transform, coefficients are scalar quantized.
    Irreversible97 = 0,
    /// 5-3 reversible integer transform.
    #[default]
    Reversible53 = 1,
}

impl TransformKind {
    pub fn is_reversible(self) -> bool {
        self == Self::Reversible53
    }
}

/// Code-block style flags from the COD/COC marker (SPcod/SPcoc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodeBlockStyle(pub u8);

impl CodeBlockStyle {
    pub const BYPASS: u8 = 0x01;
    pub const RESET: u8 = 0x02;
    pub const TERMINATE_ALL: u8 = 0x04;
    pub const VERTICALLY_CAUSAL: u8 = 0x08;
    pub const PREDICTABLE_TERMINATION: u8 = 0x10;
    pub const SEGMENTATION_SYMBOLS: u8 = 0x20;
    /// HT block coding (ISO/IEC 15444-15).
    pub const HT: u8 = 0x40;
    /// HT and Part 1 block coding may be mixed per codeblock.
    pub const HT_MIXED: u8 = 0x80;

    pub fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub fn is_ht(self) -> bool {
        self.contains(Self::HT)
    }
}

/// Immutable coding parameters of the subband a codeblock belongs to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodingParameters {
    pub orientation: SubbandOrientation,
    /// Number of magnitude bit-planes of the subband (M_b).
    pub m_b: u8,
    /// Nominal dynamic range of the subband (R_b).
    pub r_b: u8,
    pub transform: TransformKind,
    /// Quantization step size; only used by the irreversible transform.
    pub step_size: f32,
    pub style: CodeBlockStyle,
    /// Region-of-interest max-shift.
    pub roi_shift: u8,
}

impl Default for CodingParameters {
    fn default() -> Self {
        Self::reversible(8)
    }
}

impl CodingParameters {
    pub fn reversible(m_b: u8) -> Self {
        Self {
            orientation: SubbandOrientation::LL,
            m_b,
            r_b: m_b,
            transform: TransformKind::Reversible53,
            step_size: 1.0,
            style: CodeBlockStyle(CodeBlockStyle::HT),
            roi_shift: 0,
        }
    }

    pub fn irreversible(m_b: u8, step_size: f32) -> Self {
        Self {
            transform: TransformKind::Irreversible97,
            step_size,
            ..Self::reversible(m_b)
        }
    }

    pub fn validate(&self) -> Result<(), HtError> {
        if self.m_b == 0 || self.m_b > MAXIMUM_MAGNITUDE_BITS {
            return Err(HtError::InvalidArgumentBitDepth);
        }
        if self.m_b as u32 + self.roi_shift as u32 > MAXIMUM_MAGNITUDE_BITS as u32 {
            return Err(HtError::InvalidArgumentRoiShift);
        }
        if !self.transform.is_reversible() && !(self.step_size.is_finite() && self.step_size > 0.0) {
            return Err(HtError::InvalidArgumentStepSize);
        }
        Ok(())
    }

    /// Bit position of the least significant magnitude bit in a sample word.
    pub fn p_lsb(&self) -> u8 {
        31 - (self.m_b + self.roi_shift)
    }
}

/// Sign-magnitude samples of a codeblock. Bit 31 holds the sign and the
/// magnitude occupies the bits from `p_lsb` upwards.
///
/// The stride is rounded up to a multiple of 8 so that quads never straddle
/// a row end; rows and columns beyond the block size stay zero.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    data: Vec<u32>,
    stride: usize,
    width: usize,
    height: usize,
}

impl SampleBuffer {
    fn reset(&mut self, width: usize, height: usize) {
        self.stride = round_up(width, 8);
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(self.stride * round_up(height, 8), 0);
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.data[y * self.stride + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: u32) {
        self.data[y * self.stride + x] = value;
    }

    /// The `width` samples of row `y`.
    pub fn row(&self, y: usize) -> &[u32] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u32]> {
        (0..self.height).map(move |y| self.row(y))
    }
}

/// Per-sample coding state with a one-sample zero border on every side.
///
/// Each byte holds [`STATE_SIGNIFICANT`], [`STATE_NEGATIVE`] and the sample
/// exponent in [`STATE_EXPONENT_MASK`]. Coordinates are sample coordinates;
/// `-1` and the column/row past the padded size address the border.
#[derive(Debug, Clone, Default)]
pub struct StateGrid {
    data: Vec<u8>,
    stride: usize,
}

impl StateGrid {
    fn reset(&mut self, width: usize, height: usize) {
        self.stride = round_up(width, 8) + 2;
        self.data.clear();
        self.data.resize(self.stride * (round_up(height, 8) + 2), 0);
    }

    fn clear(&mut self) {
        self.data.fill(0);
    }

    fn index(&self, x: isize, y: isize) -> usize {
        (y + 1) as usize * self.stride + (x + 1) as usize
    }

    pub fn read_state(&self, x: isize, y: isize) -> u8 {
        self.data[self.index(x, y)]
    }

    pub fn apply(&mut self, x: isize, y: isize, mutation: impl FnOnce(&mut u8)) {
        let idx = self.index(x, y);
        mutation(&mut self.data[idx]);
    }

    fn sigma(&self, x: isize, y: isize) -> u8 {
        (self.read_state(x, y) & STATE_SIGNIFICANT) >> 7
    }

    /// Significance context of the quad whose top-left sample is `(x, y)`.
    ///
    /// In the initial line-pair only the quad to the left is visible; later
    /// line-pairs also see the row above.
    pub fn quad_context(&self, x: usize, y: usize, initial: bool) -> u8 {
        let (x, y) = (x as isize, y as isize);
        if initial {
            if x == 0 {
                return 0;
            }
            (self.sigma(x - 2, y) | self.sigma(x - 2, y + 1))
                | self.sigma(x - 1, y) << 1
                | self.sigma(x - 1, y + 1) << 2
        } else {
            (self.sigma(x - 1, y - 1) | self.sigma(x, y - 1))
                | (self.sigma(x - 1, y) | self.sigma(x - 1, y + 1)) << 1
                | (self.sigma(x + 1, y - 1) | self.sigma(x + 2, y - 1)) << 2
        }
    }

    /// Largest exponent among the four samples above the quad at `(x, y)`
    /// and its diagonal neighbours.
    pub fn max_exponent_above(&self, x: usize, y: usize) -> u8 {
        let (x, y) = (x as isize, y as isize);
        (x - 1..=x + 2)
            .map(|xx| self.read_state(xx, y - 1) & STATE_EXPONENT_MASK)
            .max()
            .unwrap_or(0)
    }

    fn sign_contribution(&self, x: isize, y: isize) -> i8 {
        let state = self.read_state(x, y);
        if state & STATE_SIGNIFICANT == 0 {
            0
        } else if state & STATE_NEGATIVE != 0 {
            -1
        } else {
            1
        }
    }

    /// Sign coding context of sample `(x, y)` per ISO/IEC 15444-1 Table D.3:
    /// returns the context label (9..=13) and the XOR bit.
    pub fn sign_context(&self, x: usize, y: usize) -> (u8, u8) {
        let (x, y) = (x as isize, y as isize);
        let h = (self.sign_contribution(x - 1, y) + self.sign_contribution(x + 1, y)).clamp(-1, 1);
        let v = (self.sign_contribution(x, y - 1) + self.sign_contribution(x, y + 1)).clamp(-1, 1);
        match (h, v) {
            (1, 1) => (13, 0),
            (1, 0) => (12, 0),
            (1, _) => (11, 0),
            (0, 1) => (10, 0),
            (0, 0) => (9, 0),
            (0, _) => (10, 1),
            (_, 1) => (11, 1),
            (_, 0) => (12, 1),
            _ => (13, 1),
        }
    }
}

/// Owned compressed bytes with explicit length-versus-capacity tracking.
/// Storage only grows, so one buffer can serve many codeblocks.
#[derive(Debug, Clone, Default)]
pub struct SegmentBuffer {
    data: Vec<u8>,
    len: usize,
}

impl SegmentBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grow the storage to at least `n` bytes. Never shrinks.
    pub fn ensure_capacity(&mut self, n: usize) {
        if self.data.len() < n {
            self.data.resize(n, 0);
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Copy `bytes` to `offset`, growing the buffer as needed.
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) {
        let end = offset + bytes.len();
        self.ensure_capacity(end);
        self.data[offset..end].copy_from_slice(bytes);
        self.len = self.len.max(end);
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.write_at(self.len, bytes);
    }

    /// Replace the contents with `bytes`.
    pub fn assign(&mut self, bytes: &[u8]) {
        self.clear();
        self.write_at(0, bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

/// Reusable storage handed from one codeblock to the next.
#[derive(Debug, Clone, Default)]
pub struct BlockBuffers {
    pub segment: SegmentBuffer,
    samples: SampleBuffer,
    states: StateGrid,
}

/// Context labels recorded while coding a codeblock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextTrace {
    /// Significance context of every quad, in coding order.
    pub significance: Vec<u8>,
    /// Sign context label of every significant sample, in decoding order.
    /// Only the decoder records these.
    pub sign: Vec<u8>,
}

impl ContextTrace {
    fn clear(&mut self) {
        self.significance.clear();
        self.sign.clear();
    }
}

/// Lengths of the three parts of a cleanup segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentLengths {
    /// Total length.
    pub lcup: usize,
    /// Length of the forward MagSgn part.
    pub pcup: usize,
    /// Length of the reverse MEL/VLC part.
    pub scup: usize,
}

impl SegmentLengths {
    pub fn validate(&self, available: usize) -> Result<(), HtError> {
        let SegmentLengths { lcup, pcup, scup } = *self;
        if lcup > available
            || !(MINIMUM_SCUP..=MAXIMUM_SCUP).contains(&scup)
            || scup > lcup
            || pcup + scup != lcup
        {
            return Err(HtError::InvalidSegmentLength);
        }
        Ok(())
    }
}

/// Read `Scup` from the last two bytes of a cleanup segment and overwrite
/// them with the sentinel the reverse reader expects.
pub fn split_cleanup_segment(data: &mut [u8]) -> Result<SegmentLengths, HtError> {
    let lcup = data.len();
    if lcup < MINIMUM_SCUP {
        return Err(HtError::InvalidSegmentLength);
    }
    let scup = ((data[lcup - 1] as usize) << 4) + (data[lcup - 2] & 0x0F) as usize;
    let lengths = SegmentLengths {
        lcup,
        pcup: lcup.saturating_sub(scup),
        scup,
    };
    lengths.validate(lcup)?;
    data[lcup - 1] = 0xFF;
    data[lcup - 2] |= 0x0F;
    Ok(lengths)
}

/// One codeblock of quantized wavelet coefficients.
#[derive(Debug, Clone)]
pub struct CodeBlock {
    pub region: Region,
    pub(crate) width: usize,
    pub(crate) height: usize,
    params: CodingParameters,

    pub num_layers: u16,
    /// Index of the coding pass each layer starts from.
    pub layer_start: Vec<u8>,
    /// Number of coding passes each layer contributes.
    pub layer_passes: Vec<u8>,
    /// Byte length of the cleanup, SigProp and MagRef passes.
    pub pass_length: Vec<u32>,
    /// Total compressed length.
    pub length: u32,
    pub num_passes: u8,
    /// Number of most significant bit-planes that are entirely zero.
    pub num_zbp: u8,
    pub l_block: u8,
    /// When set, a second `set_compressed_data` appends the refinement segment.
    pub refsegment: bool,

    has_data: bool,
    pub(crate) segment: SegmentBuffer,
    pub(crate) samples: SampleBuffer,
    pub(crate) states: StateGrid,
    pub(crate) trace: Option<ContextTrace>,
}

impl CodeBlock {
    pub fn new(width: u32, height: u32, params: CodingParameters) -> Result<Self, HtError> {
        Self::with_buffers(Region::from_size(width, height), params, BlockBuffers::default())
    }

    pub fn with_region(region: Region, params: CodingParameters) -> Result<Self, HtError> {
        Self::with_buffers(region, params, BlockBuffers::default())
    }

    /// Build a codeblock on top of storage recycled from an earlier one.
    pub fn with_buffers(
        region: Region,
        params: CodingParameters,
        buffers: BlockBuffers,
    ) -> Result<Self, HtError> {
        let (width, height) = (region.width(), region.height());
        if width == 0 || width > MAXIMUM_CODEBLOCK_DIMENSION {
            return Err(HtError::InvalidArgumentWidth);
        }
        if height == 0 || height > MAXIMUM_CODEBLOCK_DIMENSION {
            return Err(HtError::InvalidArgumentHeight);
        }
        if width * height > MAXIMUM_CODEBLOCK_AREA {
            return Err(HtError::InvalidArgumentSize);
        }
        params.validate()?;

        let BlockBuffers {
            mut segment,
            mut samples,
            mut states,
        } = buffers;
        segment.clear();
        samples.reset(width as usize, height as usize);
        states.reset(width as usize, height as usize);

        Ok(Self {
            region,
            width: width as usize,
            height: height as usize,
            params,
            num_layers: 1,
            layer_start: vec![0],
            layer_passes: vec![0],
            pass_length: vec![0; 3],
            length: 0,
            num_passes: 0,
            num_zbp: 0,
            l_block: 3,
            refsegment: false,
            has_data: false,
            segment,
            samples,
            states,
            trace: None,
        })
    }

    /// Release the storage for reuse by the next codeblock.
    pub fn into_buffers(self) -> BlockBuffers {
        BlockBuffers {
            segment: self.segment,
            samples: self.samples,
            states: self.states,
        }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    pub fn params(&self) -> &CodingParameters {
        &self.params
    }

    /// Copy in the compressed bytes of this codeblock.
    ///
    /// A codeblock accepts one segment. In `refsegment` mode a second call
    /// places the refinement segment right after the cleanup pass, and the
    /// first call reserves `l_ref` extra bytes for it.
    pub fn set_compressed_data(&mut self, bytes: &[u8], l_ref: usize) -> Result<(), HtError> {
        if self.has_data {
            if !self.refsegment {
                return Err(HtError::IllegalReallocation);
            }
            let offset = self.pass_length[0] as usize;
            self.segment.write_at(offset, bytes);
            return Ok(());
        }
        let reserve = if self.refsegment { l_ref } else { 0 };
        self.segment.clear();
        self.segment.ensure_capacity(bytes.len() + reserve);
        self.segment.write_at(0, bytes);
        self.has_data = true;
        Ok(())
    }

    pub(crate) fn replace_compressed_data(&mut self, bytes: &[u8]) {
        self.segment.assign(bytes);
        self.has_data = !bytes.is_empty();
    }

    pub fn compressed_data(&self) -> &[u8] {
        self.segment.as_slice()
    }

    pub fn compressed_data_mut(&mut self) -> &mut [u8] {
        self.segment.as_mut_slice()
    }

    /// Extract `Scup` from the cleanup segment held by this codeblock.
    pub fn split_cleanup_segment(&mut self) -> Result<SegmentLengths, HtError> {
        let lcup = (self.pass_length[0] as usize).min(self.segment.len());
        split_cleanup_segment(&mut self.segment.as_mut_slice()[..lcup])
    }

    pub fn samples(&self) -> &SampleBuffer {
        &self.samples
    }

    pub fn sample(&self, x: u32, y: u32) -> u32 {
        self.samples.get(x as usize, y as usize)
    }

    pub fn set_sample(&mut self, x: u32, y: u32, value: u32) {
        self.samples.set(x as usize, y as usize, value);
    }

    pub fn states(&self) -> &StateGrid {
        &self.states
    }

    /// Record context labels during the next encode or decode.
    pub fn enable_context_trace(&mut self) {
        self.trace = Some(ContextTrace::default());
    }

    pub fn context_trace(&self) -> Option<&ContextTrace> {
        self.trace.as_ref()
    }

    pub(crate) fn reset_for_decode(&mut self) {
        self.samples.clear();
        self.states.clear();
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
    }

    pub(crate) fn reset_for_encode(&mut self) {
        self.states.clear();
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
    }

    pub(crate) fn clear_samples(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codeblock_rejects_bad_sizes() {
        let p = CodingParameters::reversible(8);
        assert_eq!(CodeBlock::new(0, 4, p).unwrap_err(), HtError::InvalidArgumentWidth);
        assert_eq!(CodeBlock::new(4, 0, p).unwrap_err(), HtError::InvalidArgumentHeight);
        assert_eq!(CodeBlock::new(128, 64, p).unwrap_err(), HtError::InvalidArgumentSize);
        assert_eq!(CodeBlock::new(2048, 1, p).unwrap_err(), HtError::InvalidArgumentWidth);
        assert!(CodeBlock::new(1024, 4, p).is_ok());
        assert!(CodeBlock::new(64, 64, p).is_ok());
    }

    #[test]
    fn test_parameters_validation() {
        assert_eq!(
            CodingParameters::reversible(0).validate(),
            Err(HtError::InvalidArgumentBitDepth)
        );
        let mut p = CodingParameters::reversible(20);
        p.roi_shift = 11;
        assert_eq!(p.validate(), Err(HtError::InvalidArgumentRoiShift));
        assert_eq!(
            CodingParameters::irreversible(8, 0.0).validate(),
            Err(HtError::InvalidArgumentStepSize)
        );
        assert_eq!(CodingParameters::reversible(8).p_lsb(), 23);
    }

    #[test]
    fn test_region_composition() {
        let region = Region::new(Point { x: 64, y: 32 }, Point { x: 96, y: 48 });
        let block = CodeBlock::with_region(region, CodingParameters::default()).unwrap();
        assert_eq!((block.width(), block.height()), (32, 16));
        assert_eq!(block.region.pos0, Point { x: 64, y: 32 });
        assert_eq!(block.samples().stride(), 32);
    }

    #[test]
    fn test_set_compressed_data_once() {
        let mut block = CodeBlock::new(4, 4, CodingParameters::default()).unwrap();
        block.set_compressed_data(&[1, 2, 3], 0).unwrap();
        assert_eq!(block.compressed_data(), &[1, 2, 3]);
        assert_eq!(
            block.set_compressed_data(&[4], 0),
            Err(HtError::IllegalReallocation)
        );
    }

    #[test]
    fn test_refsegment_appends() {
        let mut block = CodeBlock::new(4, 4, CodingParameters::default()).unwrap();
        block.refsegment = true;
        block.pass_length[0] = 3;
        block.set_compressed_data(&[1, 2, 3], 2).unwrap();
        assert!(block.segment.capacity() >= 5);
        block.set_compressed_data(&[9, 8], 0).unwrap();
        assert_eq!(block.compressed_data(), &[1, 2, 3, 9, 8]);
    }

    #[test]
    fn test_segment_buffer_reuse() {
        let mut buf = SegmentBuffer::new();
        buf.assign(&[0u8; 100]);
        let cap = buf.capacity();
        buf.assign(&[7, 7]);
        assert_eq!(buf.capacity(), cap);
        assert_eq!(buf.as_slice(), &[7, 7]);
        buf.ensure_capacity(10);
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn test_split_cleanup_segment() {
        // Scup = (0x01 << 4) + 0x3 = 19
        let mut data = vec![0u8; 30];
        data[28] = 0xA3;
        data[29] = 0x01;
        let lengths = split_cleanup_segment(&mut data).unwrap();
        assert_eq!(lengths, SegmentLengths { lcup: 30, pcup: 11, scup: 19 });
        assert_eq!(data[29], 0xFF);
        assert_eq!(data[28], 0xAF);

        let mut bad = vec![0u8, 0xFF];
        assert_eq!(split_cleanup_segment(&mut bad), Err(HtError::InvalidSegmentLength));
    }

    #[test]
    fn test_state_grid_contexts() {
        let mut block = CodeBlock::new(8, 4, CodingParameters::default()).unwrap();
        let grid = &mut block.states;
        assert_eq!(grid.quad_context(0, 0, true), 0);
        grid.apply(1, 1, |s| *s = STATE_SIGNIFICANT | 3);
        assert_eq!(grid.quad_context(2, 0, true), 0b100);
        grid.apply(0, 0, |s| *s = STATE_SIGNIFICANT | 5);
        assert_eq!(grid.quad_context(2, 0, true), 0b101);
        // Row above for the second line-pair.
        grid.apply(3, 1, |s| *s = STATE_SIGNIFICANT | STATE_NEGATIVE | 7);
        assert_eq!(grid.quad_context(2, 2, false) & 0b101, 0b101);
        assert_eq!(grid.max_exponent_above(2, 2), 7);
        assert_eq!(grid.read_state(-1, -1), 0);
    }

    #[test]
    fn test_sign_context() {
        let mut block = CodeBlock::new(4, 4, CodingParameters::default()).unwrap();
        let grid = &mut block.states;
        assert_eq!(grid.sign_context(1, 1), (9, 0));
        grid.apply(0, 1, |s| *s = STATE_SIGNIFICANT);
        assert_eq!(grid.sign_context(1, 1), (12, 0));
        grid.apply(1, 0, |s| *s = STATE_SIGNIFICANT | STATE_NEGATIVE);
        assert_eq!(grid.sign_context(1, 1), (11, 0));
        grid.apply(0, 1, |s| *s = STATE_SIGNIFICANT | STATE_NEGATIVE);
        assert_eq!(grid.sign_context(1, 1), (13, 1));
    }
}
