use std::io::{self, BufWriter, Write};

use crate::{JsonSerializer, ProtoSerializer, Serializer};

/// A unit of encodable data.
///
/// Encoding happens in two passes: [`compute_size`][Self::compute_size] returns the exact number of bytes the binary
/// encoding takes, and [`write_to`][Self::write_to] emits the fields, in field number order, to a [`Serializer`].
/// Parents use the size of each child to write its length prefix before writing the child itself.
///
/// Writing the binary encoding must produce exactly `compute_size()` bytes. Anything else is a bug in the marshaler.
pub trait Marshaler {
    /// Returns the size, in bytes, of the binary encoding.
    ///
    /// May be called any number of times, and returns the same value as long as the marshaler is not mutated.
    fn compute_size(&self) -> usize;

    /// Writes every field to `output`.
    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()>;
}

impl<M> Marshaler for &M
where
    M: Marshaler + ?Sized,
{
    fn compute_size(&self) -> usize {
        (**self).compute_size()
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        (**self).write_to(output)
    }
}

impl<M> Marshaler for Box<M>
where
    M: Marshaler + ?Sized,
{
    fn compute_size(&self) -> usize {
        (**self).compute_size()
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        (**self).write_to(output)
    }
}

/// How marshalers hold the data they encode.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum MemoryMode {
    /// Data is copied into freshly allocated marshalers, which can outlive the source data and be shared.
    #[default]
    ImmutableData,

    /// Marshalers view the source data and reuse their scratch state across exports.
    ///
    /// The source data must not change between computing the size and writing, and a marshaler must not be used by
    /// two exports at once.
    ReusableData,
}

/// Encodes `marshaler` in the binary encoding into a new buffer.
///
/// ## Errors
///
/// If the marshaler fails to write, an error will be returned.
pub fn to_binary(marshaler: &dyn Marshaler) -> io::Result<Vec<u8>> {
    let size = marshaler.compute_size();
    let mut serializer = ProtoSerializer::new(Vec::with_capacity(size));
    marshaler.write_to(&mut serializer)?;

    let buf = serializer.into_inner();
    debug_assert_eq!(buf.len(), size, "marshaler wrote a different number of bytes than it computed");
    Ok(buf)
}

/// Encodes `marshaler` in the binary encoding into `writer`.
///
/// ## Errors
///
/// If writing fails, the error from the write is returned even if the final flush fails as well.
pub fn write_binary_to<W: Write>(marshaler: &dyn Marshaler, writer: W) -> io::Result<()> {
    let mut serializer = ProtoSerializer::new(BufWriter::new(writer));
    let write_result = marshaler.write_to(&mut serializer);
    let flush_result = serializer.flush();
    write_result.and(flush_result)
}

/// Encodes `marshaler` as a JSON object into `writer`.
///
/// ## Errors
///
/// If writing fails, the error from the write is returned even if the final flush fails as well.
pub fn write_json_to<W: Write>(marshaler: &dyn Marshaler, writer: W) -> io::Result<()> {
    let mut serializer = JsonSerializer::new(BufWriter::new(writer));
    let write_result = serializer.write_message_value(marshaler);
    let flush_result = serializer.flush();
    write_result.and(flush_result)
}

/// Encodes `marshaler` as a JSON object followed by a newline, for line-delimited output.
///
/// ## Errors
///
/// If writing fails, the error from the write is returned even if the final flush fails as well.
pub fn write_json_with_newline<W: Write>(marshaler: &dyn Marshaler, writer: W) -> io::Result<()> {
    let mut serializer = JsonSerializer::new(BufWriter::new(writer));
    let write_result = serializer
        .write_message_value(marshaler)
        .and_then(|()| serializer.write_raw(b"\n"));
    let flush_result = serializer.flush();
    write_result.and(flush_result)
}
