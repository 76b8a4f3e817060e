/// XOR checksum over the echoed address and the frame payload.
///
/// `msb` and `lsb` are the confirmation bytes the card sends back at
/// offsets 8 and 9, not the address the host asked for.
pub fn frame_checksum(msb: u8, lsb: u8, data: &[u8]) -> u8 {
    data.iter().fold(msb ^ lsb, |acc, &byte| acc ^ byte)
}
