//! Variable Length Coding (VLC) bitstream.
//! The VLC segment grows backwards from the end of the codeblock buffer and
//! shares its bytes with the MEL segment. Bits are packed LSB first; once a
//! byte exceeds 0x8F, the following byte may only be 0x7F in its low seven
//! bits if its top bit is a stuffed zero.

use super::mag_sgn::MAX_FILL_BYTES;
use crate::error::HtError;

/// VLC encoder. Bytes are collected in writing order and reversed on assembly.
pub struct VlcEncoder {
    buffer: Vec<u8>,
    used_bits: u8,
    tmp: u8,
    last_greater_than_8f: bool,
}

impl VlcEncoder {
    pub fn new() -> Self {
        // The first byte is reserved for Scup; the low nibble of the second
        // byte is preset to 0xF for the same reason.
        Self {
            buffer: vec![0xFF],
            used_bits: 4,
            tmp: 0xF,
            last_greater_than_8f: true,
        }
    }

    /// Write the low `count` bits of `codeword`, least significant first.
    pub fn write_bits(&mut self, mut codeword: u32, mut count: u32) {
        while count > 0 {
            let mut avail = 8 - self.last_greater_than_8f as u8 - self.used_bits;
            let t = avail.min(count as u8);
            self.tmp |= ((codeword & ((1u32 << t) - 1)) << self.used_bits) as u8;
            self.used_bits += t;
            avail -= t;
            count -= t as u32;
            codeword >>= t;
            if avail == 0 {
                if self.last_greater_than_8f && self.tmp != 0x7F {
                    self.last_greater_than_8f = false;
                    continue;
                }
                self.buffer.push(self.tmp);
                self.last_greater_than_8f = self.tmp > 0x8F;
                self.tmp = 0;
                self.used_bits = 0;
            }
        }
    }

    /// The partial byte and the mask of its used bits.
    pub(crate) fn pending(&self) -> (u8, u8) {
        (self.tmp, (0xFFu16 >> (8 - self.used_bits)) as u8)
    }

    pub(crate) fn push_pending(&mut self) {
        self.buffer.push(self.tmp);
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

impl Default for VlcEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Reverse bit-stuffed reader over the MEL/VLC segment.
pub struct VlcDecoder<'a> {
    data: &'a [u8],
    /// Index of the next byte to read; bytes are consumed towards the front.
    pos: usize,
    remaining: usize,
    fill_used: usize,
    tmp: u64,
    bits: u32,
    unstuff: bool,
}

impl<'a> VlcDecoder<'a> {
    /// `data` is the whole codeblock segment of `lcup` bytes, with `Scup`
    /// already extracted from its last two bytes.
    pub fn new(data: &'a [u8], lcup: usize, scup: usize) -> Self {
        let d = data[lcup - 2];
        let tmp = (d >> 4) as u64;
        let bits = 4 - ((tmp & 7) == 7) as u32;
        let mut reader = Self {
            data,
            pos: lcup - 2,
            remaining: scup - 2,
            fill_used: 0,
            tmp,
            bits,
            unstuff: (d | 0xF) > 0x8F,
        };
        reader.read();
        reader
    }

    fn next_word(&mut self) -> Option<u32> {
        if self.remaining >= 4 {
            let start = self.pos - 4;
            let chunk = &self.data[start..self.pos];
            self.pos = start;
            self.remaining -= 4;
            return Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        if self.fill_used >= MAX_FILL_BYTES {
            return None;
        }
        let mut bytes = [0xFFu8; 4];
        for b in bytes.iter_mut().rev() {
            if self.remaining > 0 {
                self.pos -= 1;
                self.remaining -= 1;
                *b = self.data[self.pos];
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
        // Highest address first.
        for mut d in word.to_be_bytes() {
            let d_bits = if self.unstuff && (d & 0x7F) == 0x7F {
                d &= 0x7F;
                7
            } else {
                8
            };
            self.tmp |= (d as u64) << self.bits;
            self.bits += d_bits;
            self.unstuff = d > 0x8F;
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

#[cfg(test)]
mod tests {
    use super::*;

    /// Lay out VLC bytes the way the encoder assembles them and read them back.
    fn segment(enc: VlcEncoder) -> Vec<u8> {
        let mut enc = enc;
        enc.push_pending();
        let mut bytes = enc.into_bytes();
        bytes.reverse();
        let scup = bytes.len();
        let l = bytes.len();
        bytes[l - 1] = 0xFF;
        bytes[l - 2] |= 0x0F;
        assert!(scup >= 2);
        bytes
    }

    #[test]
    fn test_vlc_write_read() {
        let fields = [(0b101u32, 3u32), (0x7F, 7), (0x3F, 6), (0, 2), (0x5A, 7), (0x1F, 5)];
        let mut enc = VlcEncoder::new();
        for &(v, n) in &fields {
            enc.write_bits(v, n);
        }
        let data = segment(enc);
        let lcup = data.len();
        let mut dec = VlcDecoder::new(&data, lcup, lcup);
        for &(v, n) in &fields {
            assert_eq!(dec.fetch() & ((1 << n) - 1), v);
            dec.advance(n).unwrap();
        }
    }

    #[test]
    fn test_vlc_stuffing_rule() {
        let mut enc = VlcEncoder::new();
        for _ in 0..40 {
            enc.write_bits(0x7F, 7);
        }
        let bytes = enc.into_bytes();
        // In reading order a byte above 0x8F is never followed by a byte with
        // seven trailing ones and a set top bit.
        for pair in bytes.windows(2) {
            if pair[0] > 0x8F {
                assert!(pair[1] & 0x80 == 0 || pair[1] & 0x7F != 0x7F);
            }
        }
    }

    #[test]
    fn test_vlc_initial_nibble() {
        // Three bits fill the first byte unless they would make it 0x7F.
        let mut enc = VlcEncoder::new();
        enc.write_bits(0b011, 3);
        assert_eq!(enc.pending(), (0x3F, 0x7F));
        assert_eq!(enc.len(), 1);

        let mut enc = VlcEncoder::new();
        enc.write_bits(0b111, 3);
        assert_eq!(enc.pending(), (0, 0));
        assert_eq!(enc.len(), 2);
    }
}
