#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Interpret the input as a register stream in wire big-endian pairs
    let mut words = Vec::new();
    for pair in data.chunks_exact(2) {
        words.push(u16::from_be_bytes([pair[0], pair[1]]));
    }

    // Numeric decoders under varying lengths
    let _ = astrape::decode::u16_be(&words);
    let _ = astrape::decode::u16_le(&words);
    let _ = astrape::decode::u32_be(&words);
    let _ = astrape::decode::u32_le(&words);
    let _ = astrape::decode::u32_swapped(&words);
    let _ = astrape::decode::f32_be(&words);
    let _ = astrape::decode::f32_swapped(&words);
    let _ = astrape::decode::f64_be(&words);

    // String decoders must never panic on arbitrary word content
    let _ = astrape::decode::ascii(&words);
    let _ = astrape::decode::utf16_be(&words);
    let _ = astrape::decode::utf16_le(&words);
});
