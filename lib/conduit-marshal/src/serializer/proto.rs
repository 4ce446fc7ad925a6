use std::io::{self, Write};

use crate::{
    encoder::{string_encoder, StringEncoder},
    wire::{encode_varint, zigzag32, WireType},
    ProtoEnumInfo, ProtoFieldInfo, Serializer, Text,
};

/// Writes the protobuf binary encoding.
///
/// Output goes straight to the underlying writer, so callers writing to anything but memory should hand in a buffered
/// writer.
pub struct ProtoSerializer<W> {
    writer: W,
    encoder: &'static dyn StringEncoder,
    scratch: Vec<u8>,
}

impl<W: Write> ProtoSerializer<W> {
    /// Creates a serializer using the process-wide string encoder.
    pub fn new(writer: W) -> Self {
        Self::with_string_encoder(writer, string_encoder())
    }

    /// Creates a serializer using the given string encoder.
    pub fn with_string_encoder(writer: W, encoder: &'static dyn StringEncoder) -> Self {
        Self {
            writer,
            encoder,
            scratch: Vec::new(),
        }
    }

    /// Consumes the serializer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_varint(&mut self, value: u64) -> io::Result<()> {
        let mut buf = [0u8; 10];
        let len = encode_varint(value, &mut buf);
        self.writer.write_all(&buf[..len])
    }

    fn write_tag(&mut self, field: &ProtoFieldInfo) -> io::Result<()> {
        self.write_varint(field.tag() as u64)
    }

    fn write_length_delimited_header(&mut self, field: &ProtoFieldInfo, len: usize) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(len as u64)
    }
}

impl<W: Write> Serializer for ProtoSerializer<W> {
    fn write_bool(&mut self, field: &ProtoFieldInfo, value: bool) -> io::Result<()> {
        self.write_tag(field)?;
        self.writer.write_all(&[value as u8])
    }

    fn write_enum(&mut self, field: &ProtoFieldInfo, value: ProtoEnumInfo) -> io::Result<()> {
        self.write_int32(field, value.number())
    }

    fn write_uint32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(value as u64)
    }

    fn write_int32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(value as i64 as u64)
    }

    fn write_sint32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(zigzag32(value) as u64)
    }

    fn write_int64(&mut self, field: &ProtoFieldInfo, value: i64) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(value as u64)
    }

    fn write_uint64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        self.write_tag(field)?;
        self.write_varint(value)
    }

    fn write_fixed32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        self.write_tag(field)?;
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_fixed64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        self.write_tag(field)?;
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_double(&mut self, field: &ProtoFieldInfo, value: f64) -> io::Result<()> {
        self.write_tag(field)?;
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_string(&mut self, field: &ProtoFieldInfo, value: Text<'_>, utf8_len: usize) -> io::Result<()> {
        self.write_length_delimited_header(field, utf8_len)?;
        match value {
            Text::Utf8(s) => self.writer.write_all(s.as_bytes()),
            other => {
                self.scratch.clear();
                self.encoder.encode(other, utf8_len, &mut self.scratch);
                self.writer.write_all(&self.scratch)
            }
        }
    }

    fn write_bytes(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_length_delimited_header(field, value.len())?;
        self.writer.write_all(value)
    }

    fn write_trace_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_bytes(field, value)
    }

    fn write_span_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_bytes(field, value)
    }

    fn write_start_message(&mut self, field: &ProtoFieldInfo, proto_size: usize) -> io::Result<()> {
        self.write_length_delimited_header(field, proto_size)
    }

    fn write_end_message(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_start_repeated(&mut self, _field: &ProtoFieldInfo) -> io::Result<()> {
        Ok(())
    }

    fn write_end_repeated(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_start_repeated_element(&mut self, field: &ProtoFieldInfo, proto_size: usize) -> io::Result<()> {
        self.write_length_delimited_header(field, proto_size)
    }

    fn write_end_repeated_element(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_start_packed(&mut self, field: &ProtoFieldInfo, payload_size: usize) -> io::Result<()> {
        debug_assert_eq!(field.tag() & 0x7, WireType::LengthDelimited as u32);
        self.write_length_delimited_header(field, payload_size)
    }

    fn write_packed_fixed64(&mut self, value: u64) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_packed_double(&mut self, value: f64) -> io::Result<()> {
        self.writer.write_all(&value.to_le_bytes())
    }

    fn write_packed_uint64(&mut self, value: u64) -> io::Result<()> {
        self.write_varint(value)
    }

    fn write_packed_int64(&mut self, value: i64) -> io::Result<()> {
        self.write_varint(value as u64)
    }

    fn write_end_packed(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn write_serialized_message(&mut self, field: &ProtoFieldInfo, proto: &[u8], _json: &str) -> io::Result<()> {
        self.write_bytes(field, proto)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
