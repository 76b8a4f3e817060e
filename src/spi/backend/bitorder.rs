//! Software bit-order conversion
//!
//! Most SPI peripherals only shift MSB first. The memory card expects LSB
//! first, so backends that cannot switch the peripheral mirror every byte
//! before sending and after receiving.

/// Mirror the bits of every byte in place
pub fn reverse_in_place(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        *byte = byte.reverse_bits();
    }
}

/// Copy of `buf` with the bits of every byte mirrored
pub fn reversed(buf: &[u8]) -> Vec<u8> {
    buf.iter().map(|byte| byte.reverse_bits()).collect()
}
