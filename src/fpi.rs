//! FPI ("floating-point image") serialization: the render buffer's
//! persisted form (spec.md §6 "Render buffer"). The crate implements this
//! in full even though broader image codecs are out of scope, since
//! spec.md specifies the byte layout as an External Interface and its
//! round-trip is one of the testable properties in spec.md §8.
//!
//! Layout: a `u32` version, a compact [`Int2`] size, then every pixel in
//! row-major order — `(0, 0)` at the bottom-left, the "serialization flip"
//! from the buffer's internal top-left-origin rows — as four channels
//! (red, green, blue, and a constant-opaque alpha) XOR-differenced against
//! the running value of the same channel in the previous pixel, each
//! written as a variable-length quantity.

use crate::render::{Int2, RenderBuffer};
use thiserror::Error;

const VERSION: u32 = 1;
const CHANNEL_COUNT: usize = 4;
const OPAQUE_ALPHA_BITS: u32 = 1.0f32.to_bits();

/// Failures decoding an FPI byte stream. Kept separate from [`crate::EchoError`]:
/// this is a leaf wire-format concern, not one of spec.md §7's taxonomy
/// members.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum FpiError {
    #[error("truncated FPI stream")]
    Truncated,
    #[error("unsupported FPI version {0}, expected {VERSION}")]
    UnsupportedVersion(u32),
    #[error("FPI size {width}x{height} is not positive")]
    NonPositiveSize { width: i32, height: i32 },
}

fn write_varint(out: &mut Vec<u8>, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

fn read_varint(bytes: &[u8], cursor: &mut usize) -> Result<u32, FpiError> {
    let mut result: u32 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*cursor).ok_or(FpiError::Truncated)?;
        *cursor += 1;
        result |= ((byte & 0x7f) as u32) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 32 {
            return Err(FpiError::Truncated);
        }
    }
    Ok(result)
}

/// Serializes `buffer`'s color layer to the FPI byte layout. Auxiliary
/// albedo/normal layers are not part of this persisted form (spec.md §6
/// names only the four color channels).
pub fn serialize(buffer: &RenderBuffer) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&VERSION.to_le_bytes());
    write_varint(&mut out, buffer.width() as u32);
    write_varint(&mut out, buffer.height() as u32);

    let mut running = [0u32; CHANNEL_COUNT];
    for y in (0..buffer.height()).rev() {
        for x in 0..buffer.width() {
            let color = buffer.color(Int2::new(x, y));
            let channels = [color.r.to_bits(), color.g.to_bits(), color.b.to_bits(), OPAQUE_ALPHA_BITS];
            for (c, &value) in channels.iter().enumerate() {
                write_varint(&mut out, value ^ running[c]);
                running[c] = value;
            }
        }
    }
    out
}

/// Deserializes an FPI byte stream into a fresh [`RenderBuffer`]. Auxiliary
/// layers come back default (black albedo, zero normal) since they were
/// never persisted.
pub fn deserialize(bytes: &[u8]) -> Result<RenderBuffer, FpiError> {
    if bytes.len() < 4 {
        return Err(FpiError::Truncated);
    }
    let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    if version != VERSION {
        return Err(FpiError::UnsupportedVersion(version));
    }
    let mut cursor = 4usize;
    let width = read_varint(bytes, &mut cursor)? as i32;
    let height = read_varint(bytes, &mut cursor)? as i32;
    if width <= 0 || height <= 0 {
        return Err(FpiError::NonPositiveSize { width, height });
    }

    let mut buffer = RenderBuffer::new(width, height);
    let mut running = [0u32; CHANNEL_COUNT];
    for y in (0..height).rev() {
        for x in 0..width {
            let mut channels = [0u32; CHANNEL_COUNT];
            for c in 0..CHANNEL_COUNT {
                let xored = read_varint(bytes, &mut cursor)?;
                let value = xored ^ running[c];
                running[c] = value;
                channels[c] = value;
            }
            let color = crate::math::RGB128::new(
                f32::from_bits(channels[0]),
                f32::from_bits(channels[1]),
                f32::from_bits(channels[2]),
            );
            buffer.set_pixel(Int2::new(x, y), color, crate::math::RGB128::BLACK, glam::Vec3::ZERO);
        }
    }
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::RGB128;

    #[test]
    fn serialize_then_deserialize_is_bit_exact() {
        let mut buffer = RenderBuffer::new(6, 4);
        let mut seed = 0.0f32;
        for y in 0..4 {
            for x in 0..6 {
                seed += 0.013;
                let color = RGB128::new(seed, seed * 0.5, (seed * 2.0).fract());
                buffer.set_pixel(Int2::new(x, y), color, RGB128::BLACK, glam::Vec3::ZERO);
            }
        }

        let bytes = serialize(&buffer);
        let round_tripped = deserialize(&bytes).expect("valid stream");

        assert_eq!(round_tripped.width(), buffer.width());
        assert_eq!(round_tripped.height(), buffer.height());
        for y in 0..4 {
            for x in 0..6 {
                let pos = Int2::new(x, y);
                assert_eq!(round_tripped.color(pos), buffer.color(pos));
            }
        }
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 1]);
        assert_eq!(deserialize(&bytes), Err(FpiError::UnsupportedVersion(2)));
    }

    #[test]
    fn rejects_truncated_stream() {
        assert_eq!(deserialize(&[1, 0]), Err(FpiError::Truncated));
    }

    #[test]
    fn identical_neighboring_pixels_xor_to_zero_after_the_first() {
        // Every channel's running value tracks the previous pixel, so a
        // second, identical pixel's varints are all single zero bytes
        // regardless of how many bytes the first pixel needed.
        let one = serialize(&RenderBuffer::new(1, 1));
        let two = serialize(&RenderBuffer::new(2, 1));
        assert_eq!(&two[one.len()..], &[0, 0, 0, 0]);
    }
}
