//! Conversion between wavelet coefficients and the sign-magnitude words
//! coded by the HT block coder.

use super::codeblock::TransformKind;

pub fn quantize_scalar(coeff: f32, step_size: f32) -> i32 {
    // Dead-zone scalar quantization
    // q = sign(x) * floor(|x| / delta)
    let q = (coeff.abs() / step_size).floor() as i32;
    if coeff < 0.0 { -q } else { q }
}

pub fn dequantize_scalar(q: i32, step_size: f32) -> f32 {
    // Mid-point reconstruction: x = (|q| + 0.5) * delta * sign(q), and 0 for q = 0
    if q == 0 {
        return 0.0;
    }
    let sign = if q > 0 { 1.0 } else { -1.0 };
    (q.unsigned_abs() as f32 + 0.5) * step_size * sign
}

/// A wavelet-domain coefficient type the block codec can consume and produce.
pub trait WaveletSample: Copy + Default + Send + Sync {
    /// Quantized sign and magnitude.
    fn quantize(self, transform: TransformKind, step_size: f32) -> (bool, u32);
    fn dequantize(negative: bool, magnitude: u32, transform: TransformKind, step_size: f32) -> Self;
}

impl WaveletSample for i32 {
    fn quantize(self, transform: TransformKind, step_size: f32) -> (bool, u32) {
        if transform.is_reversible() {
            (self < 0, self.unsigned_abs())
        } else {
            let q = quantize_scalar(self as f32, step_size);
            (q < 0, q.unsigned_abs())
        }
    }

    fn dequantize(negative: bool, magnitude: u32, transform: TransformKind, step_size: f32) -> Self {
        let signed = if negative {
            -(magnitude as i64)
        } else {
            magnitude as i64
        };
        if transform.is_reversible() {
            signed as i32
        } else {
            dequantize_scalar(signed as i32, step_size).round() as i32
        }
    }
}

impl WaveletSample for f32 {
    fn quantize(self, transform: TransformKind, step_size: f32) -> (bool, u32) {
        let q = if transform.is_reversible() {
            self.round() as i32
        } else {
            quantize_scalar(self, step_size)
        };
        (q < 0, q.unsigned_abs())
    }

    fn dequantize(negative: bool, magnitude: u32, transform: TransformKind, step_size: f32) -> Self {
        let signed = if negative {
            -(magnitude as i32)
        } else {
            magnitude as i32
        };
        if transform.is_reversible() {
            signed as f32
        } else {
            dequantize_scalar(signed, step_size)
        }
    }
}

/// Pack a sign and integer magnitude into a sample word.
pub fn to_sign_magnitude(negative: bool, magnitude: u32, p_lsb: u8) -> u32 {
    (negative as u32) << 31 | magnitude << p_lsb
}

/// Split a sample word into its sign and integer magnitude.
pub fn from_sign_magnitude(word: u32, p_lsb: u8) -> (bool, u32) {
    (word >> 31 != 0, (word & 0x7FFF_FFFF) >> p_lsb)
}

/// ROI max-shift: samples inside the region are scaled above every
/// background sample before coding.
pub fn roi_upshift(magnitude: u32, roi_shift: u8) -> u32 {
    magnitude << roi_shift
}

/// Undo the max-shift: any magnitude at or above `2^roi_shift` belongs to the ROI.
pub fn roi_downshift(magnitude: u32, roi_shift: u8) -> u32 {
    if roi_shift > 0 && magnitude >= 1 << roi_shift {
        magnitude >> roi_shift
    } else {
        magnitude
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantization_roundtrip() {
        let val = 10.5;
        let step = 2.0;
        let q = quantize_scalar(val, step);
        // 10.5 / 2.0 = 5.25 -> 5
        assert_eq!(q, 5);

        let recon = dequantize_scalar(q, step);
        // (5 + 0.5) * 2.0 = 11.0
        assert!((val - recon).abs() <= step);
        assert_eq!(quantize_scalar(-10.5, step), -5);
        assert_eq!(dequantize_scalar(-5, step), -11.0);
    }

    #[test]
    fn test_sign_magnitude_words() {
        let word = to_sign_magnitude(true, 5, 23);
        assert_eq!(word, 0x8000_0000 | 5 << 23);
        assert_eq!(from_sign_magnitude(word, 23), (true, 5));
        assert_eq!(from_sign_magnitude(0, 1), (false, 0));
    }

    #[test]
    fn test_wavelet_sample_reversible_is_exact() {
        for v in [-70000i32, -1, 0, 1, 255, 1 << 20] {
            let (neg, mag) = v.quantize(TransformKind::Reversible53, 1.0);
            assert_eq!(i32::dequantize(neg, mag, TransformKind::Reversible53, 1.0), v);
        }
        let (neg, mag) = (-3.4f32).quantize(TransformKind::Reversible53, 1.0);
        assert_eq!((neg, mag), (true, 3));
    }

    #[test]
    fn test_roi_shift() {
        assert_eq!(roi_downshift(roi_upshift(3, 4), 4), 3);
        assert_eq!(roi_downshift(15, 4), 15);
        assert_eq!(roi_downshift(15, 0), 15);
    }
}
