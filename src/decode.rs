//! Register decoding utilities
//!
//! Pure transforms between raw Modbus register words (as returned by the
//! connection layer, one `u16` per register in wire big-endian order) and
//! domain values. Chargers disagree on almost everything here: byte order,
//! word order, fixed-point scales, and string encodings all vary per vendor,
//! so every variant gets its own function and its own tests.
//!
//! No function in this module performs I/O.

use crate::error::{AstrapeError, Result};

fn require(words: &[u16], count: usize, what: &str) -> Result<()> {
    if words.len() < count {
        return Err(AstrapeError::decode(format!(
            "{} needs {} registers, got {}",
            what,
            count,
            words.len()
        )));
    }
    Ok(())
}

/// Decode a single register as an unsigned 16-bit value (wire order)
pub fn u16_be(words: &[u16]) -> Result<u16> {
    require(words, 1, "u16")?;
    Ok(words[0])
}

/// Decode a single register with its bytes swapped (little-endian on the wire)
pub fn u16_le(words: &[u16]) -> Result<u16> {
    require(words, 1, "u16 (LE)")?;
    Ok(words[0].swap_bytes())
}

/// Decode two registers as a big-endian unsigned 32-bit value (high word first)
pub fn u32_be(words: &[u16]) -> Result<u32> {
    require(words, 2, "u32")?;
    Ok((u32::from(words[0]) << 16) | u32::from(words[1]))
}

/// Decode two registers as a fully byte-reversed (little-endian) 32-bit value
pub fn u32_le(words: &[u16]) -> Result<u32> {
    Ok(u32_be(words)?.swap_bytes())
}

/// Decode two registers in swapped-word order: low word transmitted first,
/// each word itself big-endian
pub fn u32_swapped(words: &[u16]) -> Result<u32> {
    require(words, 2, "u32 (swapped)")?;
    Ok((u32::from(words[1]) << 16) | u32::from(words[0]))
}

/// Decode two registers as an IEEE-754 single-precision float, high word first
pub fn f32_be(words: &[u16]) -> Result<f32> {
    Ok(f32::from_bits(u32_be(words)?))
}

/// Decode two registers as an IEEE-754 single-precision float, low word first
pub fn f32_swapped(words: &[u16]) -> Result<f32> {
    Ok(f32::from_bits(u32_swapped(words)?))
}

/// Decode four registers as an IEEE-754 double-precision float, high word first
pub fn f64_be(words: &[u16]) -> Result<f64> {
    require(words, 4, "f64")?;
    let mut bits: u64 = 0;
    for &word in &words[..4] {
        bits = (bits << 16) | u64::from(word);
    }
    Ok(f64::from_bits(bits))
}

/// Apply a power-of-ten fixed-point scale to a raw register value
///
/// `exponent` is the power applied to the raw value: a register holding
/// deciamps uses `-1`, milliamps `-3`.
pub fn scaled(raw: f64, exponent: i8) -> f64 {
    raw * 10f64.powi(i32::from(exponent))
}

/// Invert [`scaled`]: convert a domain value to the nearest raw register value
pub fn unscaled(value: f64, exponent: i8) -> f64 {
    (value * 10f64.powi(-i32::from(exponent))).round()
}

/// Encode an unsigned 32-bit value as two big-endian registers
pub fn encode_u32_be(value: u32) -> [u16; 2] {
    [(value >> 16) as u16, (value & 0xFFFF) as u16]
}

/// Encode an unsigned 32-bit value in swapped-word order
pub fn encode_u32_swapped(value: u32) -> [u16; 2] {
    let [high, low] = encode_u32_be(value);
    [low, high]
}

/// Encode an IEEE-754 single-precision float as two big-endian registers
pub fn encode_f32_be(value: f32) -> [u16; 2] {
    encode_u32_be(value.to_bits())
}

/// Encode an IEEE-754 single-precision float in swapped-word order
pub fn encode_f32_swapped(value: f32) -> [u16; 2] {
    encode_u32_swapped(value.to_bits())
}

/// Decode registers as a fixed-length ASCII string, two characters per
/// register, trimming NUL and space padding
pub fn ascii(words: &[u16]) -> Result<String> {
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for &word in words {
        bytes.push((word >> 8) as u8);
        bytes.push((word & 0xFF) as u8);
    }
    let text = String::from_utf8_lossy(&bytes);
    Ok(text.trim_end_matches(['\0', ' ']).to_string())
}

/// Decode registers as UTF-16 with big-endian code units (one per register)
pub fn utf16_be(words: &[u16]) -> Result<String> {
    let units: Vec<u16> = words.iter().copied().take_while(|&u| u != 0).collect();
    String::from_utf16(&units)
        .map(|s| s.trim_end_matches(' ').to_string())
        .map_err(|e| AstrapeError::decode(format!("invalid UTF-16 sequence: {}", e)))
}

/// Decode registers as UTF-16 with little-endian code units
pub fn utf16_le(words: &[u16]) -> Result<String> {
    let swapped: Vec<u16> = words.iter().map(|w| w.swap_bytes()).collect();
    utf16_be(&swapped)
}
