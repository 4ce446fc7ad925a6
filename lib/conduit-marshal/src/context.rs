use std::{
    any::{Any, TypeId},
    collections::HashMap,
    fmt,
};

use crate::encoder::{string_encoder, StringEncoder};

/// Scratch state for one pass over reusable marshalers.
///
/// During the size pass, nested sizes are recorded in traversal order. During the write pass they are read back in
/// the same order, so nothing is computed twice. Both passes must walk the data identically, which holds as long as
/// the data is not modified in between.
///
/// A context also pools arbitrary scratch values between uses, keyed by type, so repeated exports do not have to
/// reallocate them.
pub struct MarshalerContext {
    sizes: Vec<usize>,
    size_read_index: usize,
    data: Vec<Box<dyn Any + Send>>,
    data_read_index: usize,
    pooled: HashMap<TypeId, Box<dyn Any + Send>>,
    encoder: &'static dyn StringEncoder,
}

impl MarshalerContext {
    /// Creates an empty context using the process-wide string encoder.
    pub fn new() -> Self {
        Self::with_string_encoder(string_encoder())
    }

    /// Creates an empty context using the given string encoder.
    pub fn with_string_encoder(encoder: &'static dyn StringEncoder) -> Self {
        Self {
            sizes: Vec::new(),
            size_read_index: 0,
            data: Vec::new(),
            data_read_index: 0,
            pooled: HashMap::new(),
            encoder,
        }
    }

    /// Returns the string encoder to use for sizing text.
    pub fn string_encoder(&self) -> &'static dyn StringEncoder {
        self.encoder
    }

    /// Reserves a slot for a size that is only known after its children were sized.
    ///
    /// Returns the index to pass to [`set_size`][Self::set_size].
    pub fn reserve_size(&mut self) -> usize {
        self.sizes.push(0);
        self.sizes.len() - 1
    }

    /// Fills a slot previously returned by [`reserve_size`][Self::reserve_size].
    pub fn set_size(&mut self, index: usize, size: usize) {
        self.sizes[index] = size;
    }

    /// Records a size.
    pub fn add_size(&mut self, size: usize) {
        self.sizes.push(size);
    }

    /// Reads the next recorded size.
    ///
    /// # Panics
    ///
    /// Panics if more sizes are read than were recorded, which means the write pass walked the data differently than
    /// the size pass did.
    pub fn next_size(&mut self) -> usize {
        let size = self.sizes[self.size_read_index];
        self.size_read_index += 1;
        size
    }

    /// Records an arbitrary value computed during the size pass.
    pub fn add_data<T>(&mut self, value: T)
    where
        T: Any + Send,
    {
        self.data.push(Box::new(value));
    }

    /// Reads the next recorded value, if it has type `T`.
    pub fn next_data<T>(&mut self) -> Option<&T>
    where
        T: Any + Send,
    {
        let value = self.data.get(self.data_read_index)?;
        self.data_read_index += 1;
        value.downcast_ref::<T>()
    }

    /// Takes the pooled value of type `T`, or a default one if none is pooled.
    ///
    /// Hand it back with [`return_pooled`][Self::return_pooled] to keep its allocations around.
    pub fn take_pooled<T>(&mut self) -> T
    where
        T: Any + Default + Send,
    {
        self.pooled
            .remove(&TypeId::of::<T>())
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
            .unwrap_or_default()
    }

    /// Returns a value to the pool.
    pub fn return_pooled<T>(&mut self, value: T)
    where
        T: Any + Send,
    {
        self.pooled.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Clears recorded sizes and data, keeping pooled values and allocations.
    ///
    /// Must be called before each size pass.
    pub fn reset(&mut self) {
        self.sizes.clear();
        self.data.clear();
        self.reset_read_index();
    }

    /// Rewinds the read position to the first recorded size and value.
    ///
    /// Must be called before each write pass.
    pub fn reset_read_index(&mut self) {
        self.size_read_index = 0;
        self.data_read_index = 0;
    }

    /// Returns the number of recorded sizes.
    pub fn recorded_sizes(&self) -> usize {
        self.sizes.len()
    }
}

impl Default for MarshalerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MarshalerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshalerContext")
            .field("sizes", &self.sizes.len())
            .field("size_read_index", &self.size_read_index)
            .field("data", &self.data.len())
            .field("pooled", &self.pooled.len())
            .field("encoder", &self.encoder.name())
            .finish()
    }
}
