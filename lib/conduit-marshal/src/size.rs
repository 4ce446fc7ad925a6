//! Size computation for the binary encoding.
//!
//! Every helper here mirrors a `serialize_*` method on [`Serializer`][crate::Serializer]: it returns zero exactly
//! when the serializer would skip the field, and otherwise the full encoded size including the tag.

use crate::{
    encoder::StringEncoder,
    wire::{int32_size, varint_size, zigzag32},
    Marshaler, ProtoEnumInfo, ProtoFieldInfo, Text,
};

/// Size of a length-delimited field with a payload of `len` bytes.
#[inline]
pub const fn length_delimited_size(field: &ProtoFieldInfo, len: usize) -> usize {
    field.tag_size() + varint_size(len as u64) + len
}

pub fn size_bool(field: &ProtoFieldInfo, value: bool) -> usize {
    if value {
        field.tag_size() + 1
    } else {
        0
    }
}

pub fn size_enum(field: &ProtoFieldInfo, value: ProtoEnumInfo) -> usize {
    if value.number() == 0 {
        0
    } else {
        field.tag_size() + int32_size(value.number())
    }
}

pub fn size_uint32(field: &ProtoFieldInfo, value: u32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + varint_size(value as u64)
    }
}

pub fn size_int32(field: &ProtoFieldInfo, value: i32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + int32_size(value)
    }
}

pub fn size_sint32(field: &ProtoFieldInfo, value: i32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + varint_size(zigzag32(value) as u64)
    }
}

pub fn size_int64(field: &ProtoFieldInfo, value: i64) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + varint_size(value as u64)
    }
}

pub fn size_uint64(field: &ProtoFieldInfo, value: u64) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + varint_size(value)
    }
}

pub fn size_fixed32(field: &ProtoFieldInfo, value: u32) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + 4
    }
}

pub fn size_fixed64(field: &ProtoFieldInfo, value: u64) -> usize {
    if value == 0 {
        0
    } else {
        field.tag_size() + 8
    }
}

pub fn size_double(field: &ProtoFieldInfo, value: f64) -> usize {
    if value == 0.0 {
        0
    } else {
        field.tag_size() + 8
    }
}

pub fn size_bytes(field: &ProtoFieldInfo, value: &[u8]) -> usize {
    if value.is_empty() {
        0
    } else {
        length_delimited_size(field, value.len())
    }
}

/// Size of a string field whose UTF-8 length is already known.
pub fn size_string_with_len(field: &ProtoFieldInfo, utf8_len: usize) -> usize {
    if utf8_len == 0 {
        0
    } else {
        length_delimited_size(field, utf8_len)
    }
}

/// Size of a string field, using `encoder` to compute its UTF-8 length.
pub fn size_string(field: &ProtoFieldInfo, value: Text<'_>, encoder: &dyn StringEncoder) -> usize {
    size_string_with_len(field, encoder.size_of(value))
}

/// Size of a trace or span ID field.
pub fn size_id(field: &ProtoFieldInfo, value: &[u8]) -> usize {
    size_bytes(field, value)
}

/// Size of a nested message field. Always non-zero.
pub fn size_message(field: &ProtoFieldInfo, message: &dyn Marshaler) -> usize {
    length_delimited_size(field, message.compute_size())
}

/// Size of a repeated message field.
pub fn size_repeated_message<M>(field: &ProtoFieldInfo, messages: &[M]) -> usize
where
    M: Marshaler,
{
    messages
        .iter()
        .map(|message| length_delimited_size(field, message.compute_size()))
        .sum()
}

/// Size of a packed repeated `fixed64` field.
pub fn size_repeated_fixed64(field: &ProtoFieldInfo, values: &[u64]) -> usize {
    if values.is_empty() {
        0
    } else {
        length_delimited_size(field, values.len() * 8)
    }
}

/// Size of a packed repeated `double` field.
pub fn size_repeated_double(field: &ProtoFieldInfo, values: &[f64]) -> usize {
    if values.is_empty() {
        0
    } else {
        length_delimited_size(field, values.len() * 8)
    }
}

pub(crate) fn packed_uint64_payload_size(values: &[u64]) -> usize {
    values.iter().map(|&v| varint_size(v)).sum()
}

pub(crate) fn packed_int64_payload_size(values: &[i64]) -> usize {
    values.iter().map(|&v| varint_size(v as u64)).sum()
}

/// Size of a packed repeated `uint64` field.
pub fn size_repeated_uint64(field: &ProtoFieldInfo, values: &[u64]) -> usize {
    if values.is_empty() {
        0
    } else {
        length_delimited_size(field, packed_uint64_payload_size(values))
    }
}

/// Size of a packed repeated `int64` field.
pub fn size_repeated_int64(field: &ProtoFieldInfo, values: &[i64]) -> usize {
    if values.is_empty() {
        0
    } else {
        length_delimited_size(field, packed_int64_payload_size(values))
    }
}
