use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtError {
    #[error("Invalid segment length")]
    InvalidSegmentLength = 1,
    #[error("Attempt to read past the end of the bitstream")]
    BitstreamExhausted = 2,
    #[error("Invalid VLC codeword")]
    InvalidCodeword = 3,
    #[error("Decoded magnitude exceeds the available bit-planes")]
    MagnitudeOverflow = 4,
    #[error("MEL and VLC segment too long")]
    SegmentTooLong = 5,
    #[error("Invalid data")]
    InvalidData = 6,
    #[error("Invalid argument width")]
    InvalidArgumentWidth = 100,
    #[error("Invalid argument height")]
    InvalidArgumentHeight = 101,
    #[error("Invalid argument size")]
    InvalidArgumentSize = 102,
    #[error("Invalid argument stride")]
    InvalidArgumentStride = 103,
    #[error("Invalid argument bit depth")]
    InvalidArgumentBitDepth = 104,
    #[error("Invalid argument step size")]
    InvalidArgumentStepSize = 105,
    #[error("Invalid argument ROI shift")]
    InvalidArgumentRoiShift = 106,
    #[error("Illegal attempt to reallocate codeblock compressed data")]
    IllegalReallocation = 107,
}

impl HtError {
    /// True for errors caused by the compressed bytes rather than by the caller.
    pub fn is_data_error(self) -> bool {
        (self as i32) < 100
    }
}
