//! Lookup tables for the HT cleanup pass.
//!
//! Two families of tables are used:
//!
//! - **UVLC tables** decode the unsigned residual offsets `u_q` of a quad pair.
//!   They are indexed by `(mode << 6) | bits`, where `mode` holds the two
//!   `u_off` flags (and, in the initial line-pair only, the value 4 when both
//!   flags are set and the extra MEL event is 1). Each entry packs
//!   `[0..3)` total prefix length, `[3..7)` total suffix length,
//!   `[7..10)` suffix length of the first quad, `[10..13)` and `[13..16)` the
//!   prefix-derived bases of `u_q` for the first and second quad.
//! - **CxtVLC tables** map the significance context and the next 7 bits of
//!   the reverse stream to a quad's `rho`, `u_off`, `e_k` and `e_1`. The code
//!   for each context is a canonical prefix code built from the per-context
//!   code lengths below, so the tables are fully determined by those lengths.

use std::sync::LazyLock;

/// UVLC decode table for the initial line-pair.
pub static UVLC_INITIAL: [u16; 320] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401,
    0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401,
    0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0x36ac, 0xa42c, 0xa82d, 0x2402, 0x2c8c, 0x4403, 0x2803, 0x2402, 0x56ac, 0x640c, 0x4804, 0x2402,
    0x4c8c, 0x4403, 0x2803, 0x2402, 0x36ac, 0xa42c, 0x680d, 0x2402, 0x2c8c, 0x4403, 0x2803, 0x2402,
    0x56ac, 0x640c, 0x4804, 0x2402, 0x4c8c, 0x4403, 0x2803, 0x2402, 0x36ac, 0xa42c, 0xa82d, 0x2402,
    0x2c8c, 0x4403, 0x2803, 0x2402, 0x56ac, 0x640c, 0x4804, 0x2402, 0x4c8c, 0x4403, 0x2803, 0x2402,
    0x36ac, 0xa42c, 0x680d, 0x2402, 0x2c8c, 0x4403, 0x2803, 0x2402, 0x56ac, 0x640c, 0x4804, 0x2402,
    0x4c8c, 0x4403, 0x2803, 0x2402, 0xfed6, 0xec2c, 0xf02d, 0x6c02, 0xf4b6, 0x8c03, 0x7003, 0x6c02,
    0x7eac, 0xac0c, 0x9004, 0x6c02, 0x748c, 0x8c03, 0x7003, 0x6c02, 0x9ead, 0xec2c, 0xb00d, 0x6c02,
    0x948d, 0x8c03, 0x7003, 0x6c02, 0x7eac, 0xac0c, 0x9004, 0x6c02, 0x748c, 0x8c03, 0x7003, 0x6c02,
    0xbeb6, 0xec2c, 0xf02d, 0x6c02, 0xb496, 0x8c03, 0x7003, 0x6c02, 0x7eac, 0xac0c, 0x9004, 0x6c02,
    0x748c, 0x8c03, 0x7003, 0x6c02, 0x9ead, 0xec2c, 0xb00d, 0x6c02, 0x948d, 0x8c03, 0x7003, 0x6c02,
    0x7eac, 0xac0c, 0x9004, 0x6c02, 0x748c, 0x8c03, 0x7003, 0x6c02,
];

/// UVLC decode table for every line-pair after the first.
pub static UVLC_NON_INITIAL: [u16; 256] = [
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000, 0x0000,
    0x0000, 0x0000, 0x0000, 0x0000, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401,
    0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401,
    0x0c8b, 0x0401, 0x0802, 0x0401, 0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401,
    0x16ab, 0x0401, 0x0802, 0x0401, 0x0c8b, 0x0401, 0x0802, 0x0401, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001,
    0x600b, 0x2001, 0x4002, 0x2001, 0xa02b, 0x2001, 0x4002, 0x2001, 0x600b, 0x2001, 0x4002, 0x2001,
    0xb6d6, 0xa42c, 0xa82d, 0x2402, 0xacb6, 0x4403, 0x2803, 0x2402, 0x36ac, 0x640c, 0x4804, 0x2402,
    0x2c8c, 0x4403, 0x2803, 0x2402, 0x56ad, 0xa42c, 0x680d, 0x2402, 0x4c8d, 0x4403, 0x2803, 0x2402,
    0x36ac, 0x640c, 0x4804, 0x2402, 0x2c8c, 0x4403, 0x2803, 0x2402, 0x76b6, 0xa42c, 0xa82d, 0x2402,
    0x6c96, 0x4403, 0x2803, 0x2402, 0x36ac, 0x640c, 0x4804, 0x2402, 0x2c8c, 0x4403, 0x2803, 0x2402,
    0x56ad, 0xa42c, 0x680d, 0x2402, 0x4c8d, 0x4403, 0x2803, 0x2402, 0x36ac, 0x640c, 0x4804, 0x2402,
    0x2c8c, 0x4403, 0x2803, 0x2402,
];

/// Prefix and suffix of the UVLC code for one residual offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvlcCode {
    pub prefix: u32,
    pub prefix_len: u32,
    pub suffix: u32,
    pub suffix_len: u32,
}

/// Returns the UVLC code for `u`. Offsets up to 36 are representable.
pub fn uvlc_code(u: u32) -> UvlcCode {
    let (prefix, prefix_len, suffix, suffix_len) = match u {
        0 => (0, 0, 0, 0),
        1 => (1, 1, 0, 0),
        2 => (2, 2, 0, 0),
        3 | 4 => (4, 3, u - 3, 1),
        _ => (0, 3, u - 5, 5),
    };
    UvlcCode {
        prefix,
        prefix_len,
        suffix,
        suffix_len,
    }
}

/// A decoded CxtVLC symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlcSymbol {
    /// Significance pattern of the quad, bit `i` for sample `i`.
    pub rho: u8,
    /// Set when the quad carries a residual offset `u_q > 0`.
    pub u_off: u8,
    /// Samples whose exponent may equal `U_q`.
    pub e_k: u8,
    /// Samples of `e_k` whose exponent does equal `U_q`.
    pub e_1: u8,
}

/// One codeword of a CxtVLC table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlcCode {
    pub context: u8,
    pub symbol: VlcSymbol,
    /// Codeword in reading order: bit 0 is the first bit taken from the stream.
    pub codeword: u8,
    pub length: u8,
}

/// Code lengths shared by a class of contexts.
struct LengthProfile {
    rho_zero: Option<u8>,
    /// Length of `(rho, u_off = 0)` indexed by `popcount(rho) - 1`.
    no_offset: [u8; 4],
    /// Length of `(rho, u_off = 1)` for single-sample quads.
    single_offset: u8,
    /// Length of `(rho, u_off = 1, e_k = 0)` for multi-sample quads.
    fallback: u8,
    /// Length of `(rho, u_off = 1, e_k = rho, e_1 = one bit)`.
    embedded: u8,
    embedded_popcounts: &'static [u32],
}

// Context 0: no significant neighbours, quad significance already signalled by MEL.
const ISOLATED: LengthProfile = LengthProfile {
    rho_zero: None,
    no_offset: [4, 5, 6, 6],
    single_offset: 5,
    fallback: 7,
    embedded: 7,
    embedded_popcounts: &[2, 3, 4],
};

const NEIGHBOURED: LengthProfile = LengthProfile {
    rho_zero: Some(2),
    no_offset: [4, 6, 6, 5],
    single_offset: 6,
    fallback: 7,
    embedded: 7,
    embedded_popcounts: &[2, 4],
};

// Non-initial line-pairs with two or more significant neighbour groups.
const DENSE: LengthProfile = LengthProfile {
    rho_zero: Some(3),
    no_offset: [4, 5, 6, 4],
    single_offset: 6,
    fallback: 7,
    embedded: 7,
    embedded_popcounts: &[2, 4],
};

fn profile(table: usize, context: u8) -> &'static LengthProfile {
    if context == 0 {
        &ISOLATED
    } else if table == 1 && context.count_ones() >= 2 {
        &DENSE
    } else {
        &NEIGHBOURED
    }
}

fn symbol(rho: u8, u_off: u8, e_k: u8, e_1: u8) -> VlcSymbol {
    VlcSymbol {
        rho,
        u_off,
        e_k,
        e_1,
    }
}

/// Symbols of one context with their code lengths, in codeword assignment order.
fn context_symbols(table: usize, context: u8) -> Vec<(VlcSymbol, u8)> {
    let p = profile(table, context);
    let mut out = Vec::with_capacity(50);
    if let Some(len) = p.rho_zero {
        out.push((symbol(0, 0, 0, 0), len));
    }
    for rho in 1..16u8 {
        out.push((symbol(rho, 0, 0, 0), p.no_offset[rho.count_ones() as usize - 1]));
    }
    for rho in 1..16u8 {
        let count = rho.count_ones();
        if count == 1 {
            out.push((symbol(rho, 1, rho, rho), p.single_offset));
            continue;
        }
        out.push((symbol(rho, 1, 0, 0), p.fallback));
        if p.embedded_popcounts.contains(&count) {
            for b in 0..4 {
                if rho & (1 << b) != 0 {
                    out.push((symbol(rho, 1, rho, 1 << b), p.embedded));
                }
            }
        }
    }
    out
}

/// Builds the full codebook of one table (0: initial line-pair, 1: others).
pub fn codebook(table: usize) -> Vec<VlcCode> {
    let mut codes = Vec::with_capacity(400);
    for context in 0..8u8 {
        let symbols = context_symbols(table, context);
        let mut order: Vec<usize> = (0..symbols.len()).collect();
        order.sort_by_key(|&i| symbols[i].1);

        let mut code = 0u32;
        let mut prev_len = 0u8;
        for i in order {
            let (symbol, length) = symbols[i];
            code <<= length - prev_len;
            prev_len = length;
            codes.push(VlcCode {
                context,
                symbol,
                codeword: (code as u8).reverse_bits() >> (8 - length),
                length,
            });
            code += 1;
        }
    }
    codes
}

/// CxtVLC lookup tables for both line-pair kinds.
pub struct VlcTables {
    /// Index `(context << 7) | next 7 bits`. Entry packs
    /// `e_k << 12 | e_1 << 8 | rho << 4 | u_off << 3 | length`; zero marks an invalid prefix.
    pub decode: [[u16; 1024]; 2],
    /// Index `(context << 8) | (rho << 4) | emb`. Entry packs `codeword << 8 | length << 4 | e_k`.
    pub encode: [[u16; 2048]; 2],
}

pub static VLC_TABLES: LazyLock<VlcTables> = LazyLock::new(VlcTables::build);

impl VlcTables {
    fn build() -> Self {
        let mut tables = Self {
            decode: [[0; 1024]; 2],
            encode: [[0; 2048]; 2],
        };
        for table in 0..2 {
            let codes = codebook(table);
            fill_decode(&mut tables.decode[table], &codes);
            fill_encode(&mut tables.encode[table], &codes);
        }
        tables
    }
}

fn fill_decode(lut: &mut [u16; 1024], codes: &[VlcCode]) {
    for code in codes {
        let s = code.symbol;
        let entry = (s.e_k as u16) << 12
            | (s.e_1 as u16) << 8
            | (s.rho as u16) << 4
            | (s.u_off as u16) << 3
            | code.length as u16;
        for ext in 0..(1usize << (7 - code.length)) {
            let idx = (code.context as usize) << 7 | ext << code.length | code.codeword as usize;
            lut[idx] = entry;
        }
    }
}

fn fill_encode(lut: &mut [u16; 2048], codes: &[VlcCode]) {
    for context in 0..8u8 {
        for rho in 0..16u8 {
            if rho == 0 && context == 0 {
                continue;
            }
            for emb in 0..16u8 {
                if emb & rho != emb {
                    continue;
                }
                let mut candidates = codes
                    .iter()
                    .filter(|c| c.context == context && c.symbol.rho == rho);
                let mut best: Option<&VlcCode> = None;
                if emb == 0 {
                    best = candidates.find(|c| c.symbol.u_off == 0);
                } else {
                    for c in candidates.filter(|c| c.symbol.u_off == 1 && emb & c.symbol.e_k == c.symbol.e_1) {
                        let better = match best {
                            None => true,
                            Some(b) => {
                                let (cp, bp) = (c.symbol.e_k.count_ones(), b.symbol.e_k.count_ones());
                                cp > bp || (cp == bp && c.length < b.length)
                            }
                        };
                        if better {
                            best = Some(c);
                        }
                    }
                }
                if let Some(c) = best {
                    let idx = (context as usize) << 8 | (rho as usize) << 4 | emb as usize;
                    lut[idx] = (c.codeword as u16) << 8 | (c.length as u16) << 4 | c.symbol.e_k as u16;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codebook_is_complete_prefix_code() {
        for table in 0..2 {
            let codes = codebook(table);
            assert_eq!(codes.len(), 387);
            for context in 0..8u8 {
                let kraft: f64 = codes
                    .iter()
                    .filter(|c| c.context == context)
                    .map(|c| 0.5f64.powi(c.length as i32))
                    .sum();
                assert!(kraft <= 1.0, "table {table} context {context}: {kraft}");
            }
        }
    }

    #[test]
    fn test_decode_table_inverts_codebook() {
        let tables = &*VLC_TABLES;
        for table in 0..2 {
            for code in codebook(table) {
                let idx = (code.context as usize) << 7 | code.codeword as usize;
                let entry = tables.decode[table][idx];
                assert_eq!(entry & 7, code.length as u16);
                assert_eq!((entry >> 4) & 0xF, code.symbol.rho as u16);
                assert_eq!((entry >> 3) & 1, code.symbol.u_off as u16);
                assert_eq!((entry >> 8) & 0xF, code.symbol.e_1 as u16);
                assert_eq!(entry >> 12, code.symbol.e_k as u16);
            }
        }
    }

    #[test]
    fn test_known_entries() {
        let tables = &*VLC_TABLES;
        assert_eq!(tables.encode[0][1 << 4], 0x0040);
        assert_eq!(tables.encode[1][3 << 8 | 15 << 4 | 4], 0x4f7f);
        assert_eq!(tables.decode[0][0], 0x0014);
        assert_eq!(tables.decode[1][5 << 7], 0x0003);
        // Context 0 never codes an empty quad.
        assert_eq!(tables.encode[0][0], 0);
    }

    #[test]
    fn test_every_valid_quad_is_encodable() {
        let tables = &*VLC_TABLES;
        for table in 0..2 {
            for context in 0..8usize {
                for rho in 0..16usize {
                    if rho == 0 && context == 0 {
                        continue;
                    }
                    for emb in (0..16usize).filter(|e| e & rho == *e) {
                        let entry = tables.encode[table][context << 8 | rho << 4 | emb];
                        assert_ne!((entry >> 4) & 7, 0, "table {table} c {context} rho {rho} emb {emb}");
                        let e_k = (entry & 0xF) as usize;
                        assert_eq!(e_k & !rho, 0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_uvlc_codes() {
        assert_eq!(uvlc_code(1), UvlcCode { prefix: 1, prefix_len: 1, suffix: 0, suffix_len: 0 });
        assert_eq!(uvlc_code(4).suffix, 1);
        assert_eq!(uvlc_code(36).suffix, 31);
        assert_eq!(UVLC_INITIAL[64], 0x16ab);
        assert_eq!(UVLC_NON_INITIAL[255], 0x2402);
    }
}
