use crate::wire::{make_tag, varint_size, WireType};

/// Static description of a protobuf field.
///
/// Meant to be declared once per message field as a `const`/`static` and shared by every instance of that message.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProtoFieldInfo {
    field_number: u32,
    tag: u32,
    tag_size: usize,
    json_name: &'static str,
}

impl ProtoFieldInfo {
    /// Creates a field description.
    ///
    /// `json_name` is the name used by the JSON mapping, which is the lowerCamelCase form of the protobuf field name.
    pub const fn new(field_number: u32, wire_type: WireType, json_name: &'static str) -> Self {
        let tag = make_tag(field_number, wire_type);
        Self {
            field_number,
            tag,
            tag_size: varint_size(tag as u64),
            json_name,
        }
    }

    /// Returns the field number.
    pub const fn field_number(&self) -> u32 {
        self.field_number
    }

    /// Returns the precomputed tag.
    pub const fn tag(&self) -> u32 {
        self.tag
    }

    /// Returns the encoded size of the tag.
    pub const fn tag_size(&self) -> usize {
        self.tag_size
    }

    /// Returns the JSON field name.
    pub const fn json_name(&self) -> &'static str {
        self.json_name
    }
}

/// Static description of a protobuf enum value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProtoEnumInfo {
    number: i32,
    json_name: &'static str,
}

impl ProtoEnumInfo {
    pub const fn new(number: i32, json_name: &'static str) -> Self {
        Self { number, json_name }
    }

    pub const fn number(&self) -> i32 {
        self.number
    }

    pub const fn json_name(&self) -> &'static str {
        self.json_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_precomputed() {
        const FIELD: ProtoFieldInfo = ProtoFieldInfo::new(16, WireType::LengthDelimited, "someField");
        assert_eq!(FIELD.tag(), 130);
        assert_eq!(FIELD.tag_size(), 2);
        assert_eq!(FIELD.json_name(), "someField");
    }
}
