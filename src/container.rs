//! `HTCB` single-codeblock files.
//!
//! Layout (little-endian): magic `HTCB`, version, width u16, height u16,
//! M_b, num_zbp, num_passes, transform, orientation, step size f32,
//! Lcup u32, then the Lcup segment bytes.

use crate::constants::{
    CONTAINER_HEADER_SIZE, CONTAINER_MAGIC, CONTAINER_VERSION, MAXIMUM_CODEBLOCK_AREA,
    MAXIMUM_CODEBLOCK_DIMENSION,
};
use crate::error::HtError;
use crate::jpeg2000::block_codec::EncodedBlock;
use crate::jpeg2000::codeblock::{CodingParameters, SubbandOrientation, TransformKind};

/// A coded codeblock together with what is needed to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockFile {
    pub width: u16,
    pub height: u16,
    pub params: CodingParameters,
    pub num_zbp: u8,
    pub num_passes: u8,
    pub data: Vec<u8>,
}

impl BlockFile {
    pub fn new(width: u16, height: u16, params: CodingParameters, encoded: EncodedBlock) -> Self {
        Self {
            width,
            height,
            params,
            num_zbp: encoded.num_zbp,
            num_passes: encoded.num_passes_total,
            data: encoded.data,
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(CONTAINER_HEADER_SIZE + self.data.len());
        out.extend_from_slice(&CONTAINER_MAGIC);
        out.push(CONTAINER_VERSION);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.push(self.params.m_b);
        out.push(self.num_zbp);
        out.push(self.num_passes);
        out.push(self.params.transform.into());
        out.push(self.params.orientation.into());
        out.extend_from_slice(&self.params.step_size.to_le_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HtError> {
        if bytes.len() < CONTAINER_HEADER_SIZE || bytes[..4] != CONTAINER_MAGIC {
            return Err(HtError::InvalidData);
        }
        if bytes[4] != CONTAINER_VERSION {
            return Err(HtError::InvalidData);
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        let (width, height) = (u16_at(5), u16_at(7));
        if !codeblock_size_fits(width as u32, height as u32) {
            return Err(HtError::InvalidData);
        }

        let transform = TransformKind::try_from(bytes[12]).map_err(|_| HtError::InvalidData)?;
        let orientation = SubbandOrientation::try_from(bytes[13]).map_err(|_| HtError::InvalidData)?;
        let step_size = f32::from_bits(u32_at(14));
        let lcup = u32_at(18) as usize;
        let data = bytes
            .get(CONTAINER_HEADER_SIZE..CONTAINER_HEADER_SIZE + lcup)
            .ok_or(HtError::InvalidData)?;

        let params = CodingParameters {
            orientation,
            transform,
            step_size,
            ..CodingParameters::reversible(bytes[9])
        };
        params.validate()?;
        Ok(Self {
            width,
            height,
            params,
            num_zbp: bytes[10],
            num_passes: bytes[11],
            data: data.to_vec(),
        })
    }
}

fn codeblock_size_fits(width: u32, height: u32) -> bool {
    width != 0
        && height != 0
        && width <= MAXIMUM_CODEBLOCK_DIMENSION
        && height <= MAXIMUM_CODEBLOCK_DIMENSION
        && width * height <= MAXIMUM_CODEBLOCK_AREA
}
