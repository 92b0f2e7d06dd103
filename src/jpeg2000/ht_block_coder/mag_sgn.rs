//! Magnitude and Sign (MagSgn) bitstream.
//! The MagSgn segment grows forward from the start of the codeblock buffer.
//! Bits are packed LSB first and a byte following 0xFF carries only 7 bits.

use crate::error::HtError;

/// Padding supplied after the end of a forward or reverse segment before
/// the reader reports exhaustion.
pub(crate) const MAX_FILL_BYTES: usize = 8;

/// MagSgn encoder.
pub struct MagSgnEncoder {
    buffer: Vec<u8>,
    max_bits: u8,
    used_bits: u8,
    tmp: u8,
}

impl MagSgnEncoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            max_bits: 8,
            used_bits: 0,
            tmp: 0,
        }
    }

    /// Write the low `count` bits of `value`, least significant first.
    pub fn write_bits(&mut self, mut value: u32, mut count: u32) {
        while count > 0 {
            let t = (self.max_bits - self.used_bits).min(count as u8);
            let bits = value & ((1u32 << t) - 1);
            self.tmp |= (bits << self.used_bits) as u8;
            self.used_bits += t;
            value = value.checked_shr(t as u32).unwrap_or(0);
            count -= t as u32;
            if self.used_bits >= self.max_bits {
                self.buffer.push(self.tmp);
                self.max_bits = if self.tmp == 0xFF { 7 } else { 8 };
                self.tmp = 0;
                self.used_bits = 0;
            }
        }
    }

    /// Pad the last byte with ones. A trailing 0xFF is dropped since the
    /// decoder pads with 0xFF anyway.
    pub fn terminate(&mut self) {
        if self.used_bits > 0 {
            let t = self.max_bits - self.used_bits;
            self.tmp |= ((0xFFu32 & ((1u32 << t) - 1)) << self.used_bits) as u8;
            if self.tmp != 0xFF {
                self.buffer.push(self.tmp);
            }
        } else if self.max_bits == 7 {
            self.buffer.pop();
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for MagSgnEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Forward bit-stuffed reader over the MagSgn segment.
pub struct MagSgnDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    fill: u8,
    fill_used: usize,
    tmp: u64,
    bits: u32,
    unstuff: bool,
}

impl<'a> MagSgnDecoder<'a> {
    /// `data` holds exactly the `Pcup` bytes of the segment. Once exhausted,
    /// the reader supplies `fill` bytes (0xFF for the cleanup pass).
    pub fn new(data: &'a [u8], fill: u8) -> Self {
        let mut reader = Self {
            data,
            pos: 0,
            fill,
            fill_used: 0,
            tmp: 0,
            bits: 0,
            unstuff: false,
        };
        reader.read();
        reader
    }

    fn next_word(&mut self) -> Option<u32> {
        if let Some(chunk) = self.data.get(self.pos..self.pos + 4) {
            self.pos += 4;
            return Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        if self.fill_used >= MAX_FILL_BYTES {
            return None;
        }
        let mut bytes = [self.fill; 4];
        for b in bytes.iter_mut() {
            if let Some(&d) = self.data.get(self.pos) {
                *b = d;
                self.pos += 1;
            } else {
                self.fill_used += 1;
            }
        }
        Some(u32::from_le_bytes(bytes))
    }

    fn read(&mut self) {
        if self.bits > 32 {
            return;
        }
        let Some(word) = self.next_word() else {
            return;
        };
        for mut d in word.to_le_bytes() {
            let d_bits = if self.unstuff { 7 } else { 8 };
            if self.unstuff {
                d &= 0x7F;
            }
            self.tmp |= (d as u64) << self.bits;
            self.bits += d_bits;
            self.unstuff = d == 0xFF;
        }
    }

    /// Peek at the next 32 bits.
    pub fn fetch(&mut self) -> u32 {
        if self.bits < 32 {
            self.read();
            if self.bits < 32 {
                self.read();
            }
        }
        self.tmp as u32
    }

    /// Consume `num_bits` bits.
    pub fn advance(&mut self, num_bits: u32) -> Result<(), HtError> {
        if num_bits > self.bits {
            return Err(HtError::BitstreamExhausted);
        }
        self.tmp = self.tmp.checked_shr(num_bits).unwrap_or(0);
        self.bits -= num_bits;
        Ok(())
    }
}
