//! Field-level output abstraction shared by the protobuf and JSON encodings.
//!
//! Marshalers describe their content once, in terms of [`Serializer`] calls, and the backend decides what actually
//! gets written. The `write_*` methods always emit the field. The `serialize_*` helpers on `dyn Serializer` skip
//! fields holding their protobuf default (zero, empty, `false`), which is what proto3 encoders do, and what the size
//! helpers in [`size`][crate::size] assume.

use std::io;

use crate::{Marshaler, ProtoEnumInfo, ProtoFieldInfo, Text};

mod json;
pub use self::json::JsonSerializer;

mod proto;
pub use self::proto::ProtoSerializer;

/// Writes individual fields in a specific encoding.
///
/// Message and repeated fields are bracketed by start/end calls. The binary encoding only needs the start call (to
/// write the tag and length prefix), while JSON needs both to open and close objects and arrays.
pub trait Serializer {
    /// Writes a `bool` field.
    fn write_bool(&mut self, field: &ProtoFieldInfo, value: bool) -> io::Result<()>;

    /// Writes an enum field.
    fn write_enum(&mut self, field: &ProtoFieldInfo, value: ProtoEnumInfo) -> io::Result<()>;

    /// Writes a `uint32` field.
    fn write_uint32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()>;

    /// Writes an `int32` field.
    fn write_int32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()>;

    /// Writes a `sint32` field.
    fn write_sint32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()>;

    /// Writes an `int64` field.
    fn write_int64(&mut self, field: &ProtoFieldInfo, value: i64) -> io::Result<()>;

    /// Writes a `uint64` field.
    fn write_uint64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()>;

    /// Writes a `fixed32` field.
    fn write_fixed32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()>;

    /// Writes a `fixed64` field.
    fn write_fixed64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()>;

    /// Writes a `double` field.
    fn write_double(&mut self, field: &ProtoFieldInfo, value: f64) -> io::Result<()>;

    /// Writes a `string` field whose UTF-8 length is `utf8_len`.
    fn write_string(&mut self, field: &ProtoFieldInfo, value: Text<'_>, utf8_len: usize) -> io::Result<()>;

    /// Writes a `bytes` field.
    fn write_bytes(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()>;

    /// Writes a trace ID, which is a `bytes` field rendered as hex in JSON.
    fn write_trace_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()>;

    /// Writes a span ID, which is a `bytes` field rendered as hex in JSON.
    fn write_span_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()>;

    /// Starts a nested message field whose payload is `proto_size` bytes.
    fn write_start_message(&mut self, field: &ProtoFieldInfo, proto_size: usize) -> io::Result<()>;

    /// Ends the current nested message field.
    fn write_end_message(&mut self) -> io::Result<()>;

    /// Starts a repeated message field.
    fn write_start_repeated(&mut self, field: &ProtoFieldInfo) -> io::Result<()>;

    /// Ends the current repeated message field.
    fn write_end_repeated(&mut self) -> io::Result<()>;

    /// Starts one element of a repeated message field, whose payload is `proto_size` bytes.
    fn write_start_repeated_element(&mut self, field: &ProtoFieldInfo, proto_size: usize) -> io::Result<()>;

    /// Ends the current element of a repeated message field.
    fn write_end_repeated_element(&mut self) -> io::Result<()>;

    /// Starts a packed repeated primitive field whose payload is `payload_size` bytes.
    fn write_start_packed(&mut self, field: &ProtoFieldInfo, payload_size: usize) -> io::Result<()>;

    /// Writes one `fixed64` element of a packed field.
    fn write_packed_fixed64(&mut self, value: u64) -> io::Result<()>;

    /// Writes one `double` element of a packed field.
    fn write_packed_double(&mut self, value: f64) -> io::Result<()>;

    /// Writes one `uint64` element of a packed field.
    fn write_packed_uint64(&mut self, value: u64) -> io::Result<()>;

    /// Writes one `int64` element of a packed field.
    fn write_packed_int64(&mut self, value: i64) -> io::Result<()>;

    /// Ends the current packed field.
    fn write_end_packed(&mut self) -> io::Result<()>;

    /// Writes a nested message field from its already-encoded forms.
    ///
    /// `proto` is the binary payload (without tag or length) and `json` the JSON object.
    fn write_serialized_message(&mut self, field: &ProtoFieldInfo, proto: &[u8], json: &str) -> io::Result<()>;

    /// Flushes buffered output.
    fn flush(&mut self) -> io::Result<()>;
}

impl<'a> dyn Serializer + 'a {
    /// Writes a `bool` field, unless `false`.
    pub fn serialize_bool(&mut self, field: &ProtoFieldInfo, value: bool) -> io::Result<()> {
        if value {
            self.write_bool(field, value)?;
        }
        Ok(())
    }

    /// Writes an enum field, unless it is the zero value.
    pub fn serialize_enum(&mut self, field: &ProtoFieldInfo, value: ProtoEnumInfo) -> io::Result<()> {
        if value.number() != 0 {
            self.write_enum(field, value)?;
        }
        Ok(())
    }

    /// Writes a `uint32` field, unless zero.
    pub fn serialize_uint32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        if value != 0 {
            self.write_uint32(field, value)?;
        }
        Ok(())
    }

    /// Writes an `int32` field, unless zero.
    pub fn serialize_int32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        if value != 0 {
            self.write_int32(field, value)?;
        }
        Ok(())
    }

    /// Writes a `sint32` field, unless zero.
    pub fn serialize_sint32(&mut self, field: &ProtoFieldInfo, value: i32) -> io::Result<()> {
        if value != 0 {
            self.write_sint32(field, value)?;
        }
        Ok(())
    }

    /// Writes an `int64` field, unless zero.
    pub fn serialize_int64(&mut self, field: &ProtoFieldInfo, value: i64) -> io::Result<()> {
        if value != 0 {
            self.write_int64(field, value)?;
        }
        Ok(())
    }

    /// Writes a `uint64` field, unless zero.
    pub fn serialize_uint64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        if value != 0 {
            self.write_uint64(field, value)?;
        }
        Ok(())
    }

    /// Writes a `fixed32` field, unless zero.
    pub fn serialize_fixed32(&mut self, field: &ProtoFieldInfo, value: u32) -> io::Result<()> {
        if value != 0 {
            self.write_fixed32(field, value)?;
        }
        Ok(())
    }

    /// Writes a `fixed64` field, unless zero.
    pub fn serialize_fixed64(&mut self, field: &ProtoFieldInfo, value: u64) -> io::Result<()> {
        if value != 0 {
            self.write_fixed64(field, value)?;
        }
        Ok(())
    }

    /// Writes a `double` field, unless zero.
    pub fn serialize_double(&mut self, field: &ProtoFieldInfo, value: f64) -> io::Result<()> {
        if value != 0.0 {
            self.write_double(field, value)?;
        }
        Ok(())
    }

    /// Writes a `string` field, unless empty.
    pub fn serialize_string(&mut self, field: &ProtoFieldInfo, value: Text<'_>, utf8_len: usize) -> io::Result<()> {
        if utf8_len != 0 {
            self.write_string(field, value, utf8_len)?;
        }
        Ok(())
    }

    /// Writes a `bytes` field, unless empty.
    pub fn serialize_bytes(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        if !value.is_empty() {
            self.write_bytes(field, value)?;
        }
        Ok(())
    }

    /// Writes a trace ID, unless empty.
    pub fn serialize_trace_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        if !value.is_empty() {
            self.write_trace_id(field, value)?;
        }
        Ok(())
    }

    /// Writes a span ID, unless empty.
    pub fn serialize_span_id(&mut self, field: &ProtoFieldInfo, value: &[u8]) -> io::Result<()> {
        if !value.is_empty() {
            self.write_span_id(field, value)?;
        }
        Ok(())
    }

    /// Writes a nested message field.
    ///
    /// Message fields are always written, even when empty, as presence is meaningful for them.
    pub fn serialize_message(&mut self, field: &ProtoFieldInfo, message: &dyn Marshaler) -> io::Result<()> {
        self.write_start_message(field, message.compute_size())?;
        message.write_to(self)?;
        self.write_end_message()
    }

    /// Writes a repeated message field, unless there are no elements.
    pub fn serialize_repeated_message<M>(&mut self, field: &ProtoFieldInfo, messages: &[M]) -> io::Result<()>
    where
        M: Marshaler,
    {
        if messages.is_empty() {
            return Ok(());
        }

        self.write_start_repeated(field)?;
        for message in messages {
            self.write_start_repeated_element(field, message.compute_size())?;
            message.write_to(self)?;
            self.write_end_repeated_element()?;
        }
        self.write_end_repeated()
    }

    /// Writes a packed repeated `fixed64` field, unless there are no elements.
    pub fn serialize_repeated_fixed64(&mut self, field: &ProtoFieldInfo, values: &[u64]) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        self.write_start_packed(field, values.len() * 8)?;
        for &value in values {
            self.write_packed_fixed64(value)?;
        }
        self.write_end_packed()
    }

    /// Writes a packed repeated `double` field, unless there are no elements.
    pub fn serialize_repeated_double(&mut self, field: &ProtoFieldInfo, values: &[f64]) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        self.write_start_packed(field, values.len() * 8)?;
        for &value in values {
            self.write_packed_double(value)?;
        }
        self.write_end_packed()
    }

    /// Writes a packed repeated `uint64` field, unless there are no elements.
    pub fn serialize_repeated_uint64(&mut self, field: &ProtoFieldInfo, values: &[u64]) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        self.write_start_packed(field, crate::size::packed_uint64_payload_size(values))?;
        for &value in values {
            self.write_packed_uint64(value)?;
        }
        self.write_end_packed()
    }

    /// Writes a packed repeated `int64` field, unless there are no elements.
    pub fn serialize_repeated_int64(&mut self, field: &ProtoFieldInfo, values: &[i64]) -> io::Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        self.write_start_packed(field, crate::size::packed_int64_payload_size(values))?;
        for &value in values {
            self.write_packed_int64(value)?;
        }
        self.write_end_packed()
    }
}
