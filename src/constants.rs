// ISO/IEC 15444-1, Annex A.6.1: code-block dimensions are powers of two with
// each side at most 1024 and an area of at most 4096 samples.
pub const MAXIMUM_CODEBLOCK_DIMENSION: u32 = 1024;
pub const MAXIMUM_CODEBLOCK_AREA: u32 = 4096;

// Scup is carried in 12 bits and is further limited by ISO/IEC 15444-15, 7.2.
pub const MINIMUM_SCUP: usize = 2;
pub const MAXIMUM_SCUP: usize = 4078;

// Samples are held as sign (bit 31) plus a 31-bit magnitude field.
pub const MAXIMUM_MAGNITUDE_BITS: u8 = 30;

// MEL exponent for each adaptation state k, ISO/IEC 15444-15 Table 2.
pub const MEL_EXP: [u8; 13] = [0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 4, 5];
pub const MEL_MAX_STATE: usize = 12;

// Quad sample offsets (dx, dy) in rho bit order: top-left, bottom-left, top-right, bottom-right.
pub const QUAD_OFFSETS: [(usize, usize); 4] = [(0, 0), (0, 1), (1, 0), (1, 1)];

// Block state bits.
pub const STATE_SIGNIFICANT: u8 = 0x80;
pub const STATE_NEGATIVE: u8 = 0x40;
pub const STATE_EXPONENT_MASK: u8 = 0x1F;

// Container header for single-codeblock files written by the htblock tool.
pub const CONTAINER_MAGIC: [u8; 4] = *b"HTCB";
pub const CONTAINER_VERSION: u8 = 1;
pub const CONTAINER_HEADER_SIZE: usize = 22;
