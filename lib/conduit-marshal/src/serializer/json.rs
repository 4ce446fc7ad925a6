use std::io::{self, Write};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::ser::{CompactFormatter, Formatter};

use crate::{
    encoder::{string_encoder, StringEncoder},
    Marshaler, ProtoEnumInfo, ProtoFieldInfo, Serializer, Text,
};

/// Writes the OTLP JSON encoding.
///
/// Follows the protobuf JSON mapping as used by OTLP: lowerCamelCase field names, 64-bit integers as strings, bytes
/// as base64, enums as numbers, and trace/span IDs as lowercase hex.
pub struct JsonSerializer<W> {
    writer: W,
    formatter: CompactFormatter,
    encoder: &'static dyn StringEncoder,
    // One entry per open object/array: whether the next member is the first one.
    first: Vec<bool>,
    scratch: Vec<u8>,
}

impl<W: Write> JsonSerializer<W> {
    /// Creates a serializer using the process-wide string encoder.
    pub fn new(writer: W) -> Self {
        Self::with_string_encoder(writer, string_encoder())
    }

    /// Creates a serializer using the given string encoder.
    pub fn with_string_encoder(writer: W, encoder: &'static dyn StringEncoder) -> Self {
        Self {
            writer,
            formatter: CompactFormatter,
            encoder,
            first: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Consumes the serializer, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes `message` as a top-level JSON object.
    pub fn write_message_value(&mut self, message: &dyn Marshaler) -> io::Result<()> {
        self.begin_object()?;
        message.write_to(self)?;
        self.end_object()
    }

    pub(crate) fn write_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)
    }

    fn take_first(&mut self) -> bool {
        match self.first.last_mut() {
            Some(first) => std::mem::replace(first, false),
            None => true,
        }
    }

    fn begin_object(&mut self) -> io::Result<()> {
        self.first.push(true);
        self.formatter.begin_object(&mut self.writer)
    }

    fn end_object(&mut self) -> io::Result<()> {
        self.first.pop();
        self.formatter.end_object(&mut self.writer)
    }

    fn begin_array(&mut self) -> io::Result<()> {
        self.first.push(true);
        self.formatter.begin_array(&mut self.writer)
    }

    fn end_array(&mut self) -> io::Result<()> {
        self.first.pop();
        self.formatter.end_array(&mut self.writer)
    }

    fn begin_array_value(&mut self) -> io::Result<()> {
        let first = self.take_first();
        self.formatter.begin_array_value(&mut self.writer, first)
    }

    fn write_key(&mut self, field: &ProtoFieldInfo) -> io::Result<()> {
        let first = self.take_first();
        self.formatter.begin_object_key(&mut self.writer, first)?;
        self.write_str(field.json_name())?;
        self.formatter.end_object_key(&mut self.writer)?;
        self.formatter.begin_object_value(&mut self.writer)
    }

    fn write_str(&mut self, value: &str) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, value).map_err(io::Error::from)
    }

    fn write_quoted(&mut self, value: impl std::fmt::Display) -> io::Result<()> {
        write!(self.writer, "\"{}\"", value)
    }

    fn write_f64_value(&mut self, value: f64) -> io::Result<()> {
        if value.is_nan() {
            self.write_str("NaN")
        } else if value.is_infinite() {
            self.write_str(if value > 0.0 { "Infinity" } else { "-Infinity" })
        } else {
            self.formatter.write_f64(&mut self.writer, value)
        }
    }

    fn write_hex(&mut self, value: &[u8]) -> io::Result<()> {
        self.write_quoted(hex::encode(value))
    }
}

impl<W: Write> Serializer for JsonSerializer<W> {
    fn write_bool(&mut self, field: &ProtoFieldInfo, value: bool) -> io::Result<()> {
        self.write_key(field)?;
        self.formatter.write_bool(&mut self.writer, value)
    }

    fn write_enum(&mut self, field: &ProtoFieldInfo, value: ProtoEnumInfo) -> io::Result<()> {
        self.write_key(field)?;
        self.formatter.write_i32(&mut self.writer, value.number())
    }

    fn write_uint32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        self.write_key(field)?;
        self.formatter.write_u32(&mut self.writer, value)
    }

    fn write_int32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        self.write_key(field)?;
        self.formatter.write_i32(&mut self.writer, value)
    }

    fn write_sint32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        self.write_int32(field, value)
    }

    fn write_int64(&mut self, field: &ProtoFieldInfo, value: i64) -> io::Result<()> {
        self.write_key(field)?;
        self.write_quoted(value)
    }

    fn write_uint64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        self.write_key(field)?;
        self.write_quoted(value)
    }

    fn write_fixed32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        self.write_uint32(field, value)
    }

    fn write_fixed64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        self.write_uint64(field, value)
    }

    fn write_double(&mut self, field: &ProtoFieldInfo, value: f64) -> io::Result<()> {
        self.write_key(field)?;
        self.write_f64_value(value)
    }

    fn write_string(&mut self, field: &ProtoFieldInfo, value: Text<'_>, utf8_len: usize) -> io::Result<()> {
        self.write_key(field)?;
        match value {
            Text::Utf8(s) => self.write_str(s),
            other => {
                let mut scratch = std::mem::take(&mut self.scratch);
                scratch.clear();
                self.encoder.encode(other, utf8_len, &mut scratch);
                // Transcoded output is always valid UTF-8: unpaired surrogates become `?`.
                let result = match std::str::from_utf8(&scratch) {
                    Ok(s) => self.write_str(s),
                    Err(e) => Err(io::Error::new(io::ErrorKind::InvalidData, e)),
                };
                self.scratch = scratch;
                result
            }
        }
    }

    fn write_bytes(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_key(field)?;
        self.write_quoted(STANDARD.encode(value))
    }

    fn write_trace_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_key(field)?;
        self.write_hex(value)
    }

    fn write_span_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        self.write_key(field)?;
        self.write_hex(value)
    }

    fn write_start_message(&mut self, field: &ProtoFieldInfo, _proto_size: usize) -> io::Result<()> {
        self.write_key(field)?;
        self.begin_object()
    }

    fn write_end_message(&mut self) -> io::Result<()> {
        self.end_object()
    }

    fn write_start_repeated(&mut self, field: &ProtoFieldInfo) -> io::Result<()> {
        self.write_key(field)?;
        self.begin_array()
    }

    fn write_end_repeated(&mut self) -> io::Result<()> {
        self.end_array()
    }

    fn write_start_repeated_element(&mut self, _field: &ProtoFieldInfo, _proto_size: usize) -> io::Result<()> {
        self.begin_array_value()?;
        self.begin_object()
    }

    fn write_end_repeated_element(&mut self) -> io::Result<()> {
        self.end_object()
    }

    fn write_start_packed(&mut self, field: &ProtoFieldInfo, _payload_size: usize) -> io::Result<()> {
        self.write_key(field)?;
        self.begin_array()
    }

    fn write_packed_fixed64(&mut self, value: u64) -> io::Result<()> {
        self.begin_array_value()?;
        self.write_quoted(value)
    }

    fn write_packed_double(&mut self, value: f64) -> io::Result<()> {
        self.begin_array_value()?;
        self.write_f64_value(value)
    }

    fn write_packed_uint64(&mut self, value: u64) -> io::Result<()> {
        self.begin_array_value()?;
        self.write_quoted(value)
    }

    fn write_packed_int64(&mut self, value: i64) -> io::Result<()> {
        self.begin_array_value()?;
        self.write_quoted(value)
    }

    fn write_end_packed(&mut self) -> io::Result<()> {
        self.end_array()
    }

    fn write_serialized_message(&mut self, field: &ProtoFieldInfo, _proto: &[u8], json: &str) -> io::Result<()> {
        self.write_key(field)?;
        self.writer.write_all(json.as_bytes())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
