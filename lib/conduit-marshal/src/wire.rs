//! Protobuf wire primitives.

/// Protobuf wire type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    LengthDelimited = 2,
    Fixed32 = 5,
}

/// Builds the tag for the given field number and wire type.
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << 3) | wire_type as u32
}

/// Returns the encoded size of `value` as a varint.
pub const fn varint_size(value: u64) -> usize {
    // Each byte carries 7 bits; zero still takes one byte.
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Returns the encoded size of a signed 32-bit value as a varint.
///
/// Negative values are sign-extended to 64 bits, so they always take ten bytes.
pub const fn int32_size(value: i32) -> usize {
    varint_size(value as i64 as u64)
}

/// ZigZag-encodes a signed 32-bit value.
pub const fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// ZigZag-encodes a signed 64-bit value.
pub const fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Encodes `value` as a varint into `buf`, returning the number of bytes used.
pub fn encode_varint(mut value: u64, buf: &mut [u8; 10]) -> usize {
    let mut i = 0;
    while value >= 0x80 {
        buf[i] = (value as u8) | 0x80;
        value >>= 7;
        i += 1;
    }
    buf[i] = value as u8;
    i + 1
}
