//! Magnitude Exponent Logic (MEL) coder.
//! Implements the adaptive run-length code of ISO/IEC 15444-15 clause 7.3.3
//! that signals which quads in context 0 are significant.

use crate::constants::{MEL_EXP, MEL_MAX_STATE};

/// MEL encoder. Bits are packed MSB first; a byte following 0xFF carries 7 bits.
pub struct MelEncoder {
    buffer: Vec<u8>,
    remaining_bits: u8,
    tmp: u8,
    run: u32,
    k: usize,
    threshold: u32,
}

impl MelEncoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            remaining_bits: 8,
            tmp: 0,
            run: 0,
            k: 0,
            threshold: 1,
        }
    }

    fn emit_bit(&mut self, bit: u8) {
        self.tmp = (self.tmp << 1) | bit;
        self.remaining_bits -= 1;
        if self.remaining_bits == 0 {
            self.buffer.push(self.tmp);
            self.remaining_bits = if self.tmp == 0xFF { 7 } else { 8 };
            self.tmp = 0;
        }
    }

    /// Encode one MEL event: `true` when the quad is significant.
    pub fn encode(&mut self, event: bool) {
        if !event {
            self.run += 1;
            if self.run >= self.threshold {
                self.emit_bit(1);
                self.run = 0;
                self.k = (self.k + 1).min(MEL_MAX_STATE);
                self.threshold = 1 << MEL_EXP[self.k];
            }
        } else {
            self.emit_bit(0);
            let mut t = MEL_EXP[self.k];
            while t > 0 {
                t -= 1;
                self.emit_bit(((self.run >> t) & 1) as u8);
            }
            self.run = 0;
            self.k = self.k.saturating_sub(1);
            self.threshold = 1 << MEL_EXP[self.k];
        }
    }

    /// Current adaptation state.
    pub fn state(&self) -> usize {
        self.k
    }

    /// Close an unfinished run and left-align the partial byte.
    /// Returns the pending byte and the mask of its used bits.
    pub(crate) fn flush_pending(&mut self) -> (u8, u8) {
        if self.run > 0 {
            self.emit_bit(1);
        }
        let rem = self.remaining_bits;
        let tmp = ((self.tmp as u16) << rem) as u8;
        let mask = (0xFFu16 << rem) as u8;
        self.tmp = tmp;
        (tmp, mask)
    }

    pub(crate) fn push_byte(&mut self, byte: u8) {
        self.buffer.push(byte);
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

impl Default for MelEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// MEL decoder.
///
/// Reads `Scup - 1` bytes forward from the start of the MEL/VLC segment.
/// Decoded runs are buffered, up to eight at a time, each packed into 7 bits:
/// bit 0 set means the run ends with a significant event, the remaining bits
/// count the insignificant events before it.
pub struct MelDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    remaining: usize,
    tmp: u64,
    bits: u32,
    unstuff: bool,
    k: usize,
    runs: u64,
    num_runs: u32,
    run: i32,
}

impl<'a> MelDecoder<'a> {
    /// `data` is the whole codeblock segment of `lcup` bytes.
    pub fn new(data: &'a [u8], lcup: usize, scup: usize) -> Self {
        let mut mel = Self {
            data,
            pos: lcup - scup,
            remaining: scup - 1,
            tmp: 0,
            bits: 0,
            unstuff: false,
            k: 0,
            runs: 0,
            num_runs: 0,
            run: 0,
        };
        mel.run = mel.get_run();
        mel
    }

    fn next_byte(&mut self) -> u8 {
        if self.remaining == 0 {
            return 0xFF;
        }
        let mut d = self.data.get(self.pos).copied().unwrap_or(0xFF);
        self.pos += 1;
        self.remaining -= 1;
        if self.remaining == 0 {
            // Low nibble of the last byte belongs to Scup.
            d |= 0x0F;
        }
        d
    }

    /// Load up to 32 bits into the left-aligned register.
    fn read(&mut self) {
        if self.bits > 32 {
            return;
        }
        let mut t = 0u64;
        let mut nbits = 0u32;
        for _ in 0..4 {
            let mut d = self.next_byte();
            let d_bits = if self.unstuff { 7 } else { 8 };
            if self.unstuff {
                d &= 0x7F;
            }
            t = (t << d_bits) | d as u64;
            nbits += d_bits;
            self.unstuff = d == 0xFF;
        }
        self.tmp |= t << (64 - nbits - self.bits);
        self.bits += nbits;
    }

    fn decode_runs(&mut self) {
        if self.bits < 6 {
            self.read();
        }
        while self.bits >= 6 && self.num_runs < 8 {
            let e = MEL_EXP[self.k] as u32;
            let run = if self.tmp & (1 << 63) != 0 {
                self.k = (self.k + 1).min(MEL_MAX_STATE);
                self.tmp <<= 1;
                self.bits -= 1;
                ((1u64 << e) - 1) << 1
            } else {
                let r = (self.tmp >> (63 - e)) & ((1u64 << e) - 1);
                self.k = self.k.saturating_sub(1);
                self.tmp <<= e + 1;
                self.bits -= e + 1;
                (r << 1) + 1
            };
            self.runs |= run << (7 * self.num_runs);
            self.num_runs += 1;
        }
    }

    fn get_run(&mut self) -> i32 {
        if self.num_runs == 0 {
            self.decode_runs();
        }
        let run = (self.runs & 0x7F) as i32;
        self.runs >>= 7;
        self.num_runs = self.num_runs.saturating_sub(1);
        run
    }

    /// Decode the next MEL event.
    pub fn decode(&mut self) -> bool {
        self.run -= 2;
        let event = self.run == -1;
        if self.run < 0 {
            self.run = self.get_run();
        }
        event
    }

    /// Current adaptation state.
    pub fn state(&self) -> usize {
        self.k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_events(bytes: &[u8], count: usize) -> Vec<bool> {
        // Place the MEL bytes in a segment with a VLC byte pair behind them.
        let mut data = bytes.to_vec();
        data.extend_from_slice(&[0xFF, 0xFF]);
        let lcup = data.len();
        let mut mel = MelDecoder::new(&data, lcup, lcup);
        (0..count).map(|_| mel.decode()).collect()
    }

    #[test]
    fn test_mel_encoder_runs() {
        // k=0: a zero event completes a run of 1 and emits '1'.
        // Then k=1 (E=0): zero -> '1'; k=2 (E=0): one -> '0', k=1.
        let mut mel = MelEncoder::new();
        mel.encode(false);
        assert_eq!(mel.state(), 1);
        mel.encode(false);
        assert_eq!(mel.state(), 2);
        mel.encode(true);
        assert_eq!(mel.state(), 1);
        let (tmp, mask) = mel.flush_pending();
        assert_eq!(mask, 0xE0);
        assert_eq!(tmp, 0b1100_0000);
    }

    #[test]
    fn test_mel_roundtrip_events() {
        let mut events = Vec::new();
        let mut seed = 0x2545_f491u32;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            events.push(seed % 7 == 0);
        }
        let mut enc = MelEncoder::new();
        for &e in &events {
            enc.encode(e);
        }
        let (tmp, mask) = enc.flush_pending();
        if mask != 0 {
            enc.push_byte(tmp);
        }
        let bytes = enc.into_bytes();
        assert_eq!(decode_events(&bytes, events.len()), events);
    }

    #[test]
    fn test_mel_state_stays_in_range() {
        for pattern in [0x00u8, 0xFF, 0x55, 0xAA, 0x0F, 0xF0] {
            let mut data = vec![pattern; 64];
            data.extend_from_slice(&[0xFF, 0xFF]);
            let lcup = data.len();
            let mut mel = MelDecoder::new(&data, lcup, lcup);
            for _ in 0..2000 {
                mel.decode();
                assert!(mel.state() <= MEL_MAX_STATE);
            }
        }
    }

    #[test]
    fn test_mel_stuffed_byte_carries_seven_bits() {
        let mut mel = MelEncoder::new();
        // Long runs of insignificant quads produce '1' bits until a 0xFF byte is emitted.
        for _ in 0..400 {
            mel.encode(false);
        }
        let bytes = mel.into_bytes();
        for pair in bytes.windows(2) {
            if pair[0] == 0xFF {
                assert!(pair[1] <= 0x7F);
            }
        }
    }
}
