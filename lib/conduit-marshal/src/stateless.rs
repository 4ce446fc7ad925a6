//! Marshaling over borrowed data, for the reusable memory mode.
//!
//! A [`StatelessMarshaler`] holds no data of its own: it is handed the value to encode along with a
//! [`MarshalerContext`], and records every nested size in the context during the size pass so the write pass can read
//! them back instead of measuring subtrees again. [`ReusableMarshaler`] ties a value, its stateless marshaler and a
//! context together into a regular [`Marshaler`] whose context is recycled between uses.

use std::{
    cell::{Cell, RefCell},
    io,
};

use crate::{
    size::{length_delimited_size, size_string_with_len},
    Marshaler, MarshalerContext, ProtoFieldInfo, Serializer, Text,
};

/// Encodes values of type `T` without owning them.
///
/// Implementations must make the exact same context calls, in the same order, in both methods: every
/// `*_with_context` size helper used in [`binary_size`][Self::binary_size] must be matched by the corresponding
/// `serialize_*_with_context` call in [`write_to`][Self::write_to].
pub trait StatelessMarshaler<T: ?Sized> {
    /// Returns the size of the binary encoding of `value`, recording nested sizes in `context`.
    fn binary_size(&self, value: &T, context: &mut MarshalerContext) -> usize;

    /// Writes every field of `value` to `output`, reading nested sizes back from `context`.
    fn write_to(&self, output: &mut dyn Serializer, value: &T, context: &mut MarshalerContext) -> io::Result<()>;
}

/// Size of a nested message field encoded by a stateless marshaler.
///
/// The nested size is recorded before the sizes of its own children, matching the order in which the write pass
/// needs them.
pub fn size_message_with_context<T, M>(
    field: &ProtoFieldInfo, value: &T, marshaler: &M, context: &mut MarshalerContext,
) -> usize
where
    T: ?Sized,
    M: StatelessMarshaler<T> + ?Sized,
{
    let index = context.reserve_size();
    let size = marshaler.binary_size(value, context);
    context.set_size(index, size);
    length_delimited_size(field, size)
}

/// Size of a repeated message field encoded by a stateless marshaler.
pub fn size_repeated_message_with_context<T, M>(
    field: &ProtoFieldInfo, values: &[T], marshaler: &M, context: &mut MarshalerContext,
) -> usize
where
    M: StatelessMarshaler<T> + ?Sized,
{
    values
        .iter()
        .map(|value| size_message_with_context(field, value, marshaler, context))
        .sum()
}

/// Size of a string field, recording the UTF-8 length of transcoded text.
///
/// UTF-8 text knows its length already, so only Latin-1 and UTF-16 text gets an entry in the context.
pub fn size_string_with_context(field: &ProtoFieldInfo, value: Text<'_>, context: &mut MarshalerContext) -> usize {
    match value {
        Text::Utf8(s) => size_string_with_len(field, s.len()),
        other => {
            let utf8_len = context.string_encoder().size_of(other);
            context.add_size(utf8_len);
            size_string_with_len(field, utf8_len)
        }
    }
}

impl<'a> dyn Serializer + 'a {
    /// Writes a nested message field using a stateless marshaler.
    pub fn serialize_message_with_context<T, M>(
        &mut self, field: &ProtoFieldInfo, value: &T, marshaler: &M, context: &mut MarshalerContext,
    ) -> io::Result<()>
    where
        T: ?Sized,
        M: StatelessMarshaler<T> + ?Sized,
    {
        let size = context.next_size();
        self.write_start_message(field, size)?;
        marshaler.write_to(self, value, context)?;
        self.write_end_message()
    }

    /// Writes a repeated message field using a stateless marshaler, unless there are no elements.
    pub fn serialize_repeated_message_with_context<T, M>(
        &mut self, field: &ProtoFieldInfo, values: &[T], marshaler: &M, context: &mut MarshalerContext,
    ) -> io::Result<()>
    where
        M: StatelessMarshaler<T> + ?Sized,
    {
        if values.is_empty() {
            return Ok(());
        }

        self.write_start_repeated(field)?;
        for value in values {
            let size = context.next_size();
            self.write_start_repeated_element(field, size)?;
            marshaler.write_to(self, value, context)?;
            self.write_end_repeated_element()?;
        }
        self.write_end_repeated()
    }

    /// Writes a string field whose length was recorded by [`size_string_with_context`].
    pub fn serialize_string_with_context(
        &mut self, field: &ProtoFieldInfo, value: Text<'_>, context: &mut MarshalerContext,
    ) -> io::Result<()> {
        let utf8_len = match value {
            Text::Utf8(s) => s.len(),
            _ => context.next_size(),
        };
        self.serialize_string(field, value, utf8_len)
    }
}

/// A [`Marshaler`] over a recyclable value.
///
/// Computing the size resets the context and records every nested size once. Writing reuses those sizes, computing
/// them first only if that has not happened yet. Once written, the value can be swapped for the next batch with
/// [`reset`][Self::reset], keeping the context and its pooled allocations.
///
/// The value must not change between computing the size and writing.
pub struct ReusableMarshaler<T, M> {
    value: T,
    marshaler: M,
    context: RefCell<MarshalerContext>,
    size: Cell<Option<usize>>,
}

impl<T, M> ReusableMarshaler<T, M>
where
    M: StatelessMarshaler<T>,
{
    /// Creates a reusable marshaler with a fresh context.
    pub fn new(value: T, marshaler: M) -> Self {
        Self::with_context(value, marshaler, MarshalerContext::new())
    }

    /// Creates a reusable marshaler with an existing context.
    pub fn with_context(value: T, marshaler: M, context: MarshalerContext) -> Self {
        Self {
            value,
            marshaler,
            context: RefCell::new(context),
            size: Cell::new(None),
        }
    }

    /// Returns the value being encoded.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Replaces the value being encoded, returning the previous one so its buffers can be recycled.
    pub fn reset(&mut self, value: T) -> T {
        self.size.set(None);
        self.context.get_mut().reset();
        std::mem::replace(&mut self.value, value)
    }

    /// Consumes the marshaler, returning the value and the context.
    pub fn into_parts(self) -> (T, MarshalerContext) {
        (self.value, self.context.into_inner())
    }
}

impl<T, M> Marshaler for ReusableMarshaler<T, M>
where
    M: StatelessMarshaler<T>,
{
    fn compute_size(&self) -> usize {
        let mut context = self.context.borrow_mut();
        context.reset();
        let size = self.marshaler.binary_size(&self.value, &mut context);
        self.size.set(Some(size));
        size
    }

    fn write_to(&self, output: &mut dyn Serializer) -> io::Result<()> {
        if self.size.get().is_none() {
            self.compute_size();
        }

        let mut context = self.context.borrow_mut();
        context.reset_read_index();
        self.marshaler.write_to(output, &self.value, &mut context)
    }
}
