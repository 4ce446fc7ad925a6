//! UTF-8 transcoding strategies.
//!
//! Strings that are not already UTF-8 ([`Text::Latin1`] and [`Text::Utf16`]) need to be sized and transcoded during
//! marshaling. Three strategies exist, all producing identical output:
//!
//! - [`FallbackStringEncoder`]: bounds-checked indexing, works everywhere
//! - [`UncheckedStringEncoder`]: raw pointer reads with a word-at-a-time ASCII fast path
//! - [`VectorizedStringEncoder`]: SIMD ASCII detection (SSE2 on x86-64, autovectorized chunks elsewhere)
//!
//! The strategy is picked once per process by [`string_encoder`] and never re-evaluated.
//!
//! Unpaired surrogates in UTF-16 input are each replaced with `?`.

use std::sync::OnceLock;

use tracing::debug;

use crate::Text;

mod fallback;
pub use self::fallback::FallbackStringEncoder;

mod unchecked;
pub use self::unchecked::UncheckedStringEncoder;

mod vectorized;
pub use self::vectorized::VectorizedStringEncoder;

/// Replacement byte for unpaired surrogates.
pub const REPLACEMENT_BYTE: u8 = b'?';

/// Computes UTF-8 sizes and transcodes non-UTF-8 text.
///
/// Implementations are stateless and must produce byte-identical output for every input.
pub trait StringEncoder: Send + Sync + 'static {
    /// Name of the strategy, for diagnostics.
    fn name(&self) -> &'static str;

    /// Returns the UTF-8 length of the given UTF-16 code units.
    fn utf16_len(&self, units: &[u16]) -> usize;

    /// Appends the UTF-8 encoding of the given UTF-16 code units to `out`.
    fn encode_utf16(&self, units: &[u16], out: &mut Vec<u8>);

    /// Returns the UTF-8 length of the given Latin-1 bytes.
    fn latin1_len(&self, bytes: &[u8]) -> usize;

    /// Appends the UTF-8 encoding of the given Latin-1 bytes to `out`.
    fn encode_latin1(&self, bytes: &[u8], out: &mut Vec<u8>);

    /// Returns the UTF-8 length of `text`.
    fn size_of(&self, text: Text<'_>) -> usize {
        match text {
            Text::Utf8(s) => s.len(),
            Text::Latin1(bytes) => self.latin1_len(bytes),
            Text::Utf16(units) => self.utf16_len(units),
        }
    }

    /// Appends the UTF-8 encoding of `text` to `out`.
    ///
    /// Exactly `size` bytes are appended, where `size` must be the value returned by [`size_of`][Self::size_of] for
    /// the same text.
    fn encode(&self, text: Text<'_>, size: usize, out: &mut Vec<u8>) {
        let start = out.len();
        out.reserve(size);
        match text {
            Text::Utf8(s) => out.extend_from_slice(s.as_bytes()),
            Text::Latin1(bytes) => self.encode_latin1(bytes, out),
            Text::Utf16(units) => self.encode_utf16(units, out),
        }
        debug_assert_eq!(out.len() - start, size, "encoded size mismatch in {}", self.name());
    }
}

static SELECTED: OnceLock<&'static dyn StringEncoder> = OnceLock::new();

/// Returns the string encoder selected for this process.
pub fn string_encoder() -> &'static dyn StringEncoder {
    *SELECTED.get_or_init(|| {
        let encoder = select_string_encoder();
        debug!(encoder = encoder.name(), "Selected string encoder.");
        encoder
    })
}

fn select_string_encoder() -> &'static dyn StringEncoder {
    if cfg!(feature = "portable-string-encoder") {
        &FallbackStringEncoder
    } else if VectorizedStringEncoder::is_accelerated() {
        &VectorizedStringEncoder
    } else {
        &UncheckedStringEncoder
    }
}

/// Returns every available strategy.
pub fn all_string_encoders() -> [&'static dyn StringEncoder; 3] {
    [&FallbackStringEncoder, &UncheckedStringEncoder, &VectorizedStringEncoder]
}

/// Decodes the code point starting with `unit`, given the unit that follows it, if any.
///
/// Returns the code point (`None` for an unpaired surrogate) and the number of units consumed.
#[inline]
pub(crate) fn decode_unit(unit: u16, next: Option<u16>) -> (Option<u32>, usize) {
    match unit {
        0xD800..=0xDBFF => match next {
            Some(low @ 0xDC00..=0xDFFF) => {
                let cp = 0x10000 + (((unit as u32) - 0xD800) << 10) + ((low as u32) - 0xDC00);
                (Some(cp), 2)
            }
            _ => (None, 1),
        },
        0xDC00..=0xDFFF => (None, 1),
        _ => (Some(unit as u32), 1),
    }
}

#[inline]
pub(crate) fn utf8_len(cp: Option<u32>) -> usize {
    match cp {
        None => 1,
        Some(0..=0x7F) => 1,
        Some(0x80..=0x7FF) => 2,
        Some(0x800..=0xFFFF) => 3,
        Some(_) => 4,
    }
}

#[inline]
pub(crate) fn push_utf8(out: &mut Vec<u8>, cp: Option<u32>) {
    match cp {
        None => out.push(REPLACEMENT_BYTE),
        Some(cp @ 0..=0x7F) => out.push(cp as u8),
        Some(cp @ 0x80..=0x7FF) => out.extend_from_slice(&[0xC0 | (cp >> 6) as u8, 0x80 | (cp & 0x3F) as u8]),
        Some(cp @ 0x800..=0xFFFF) => out.extend_from_slice(&[
            0xE0 | (cp >> 12) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]),
        Some(cp) => out.extend_from_slice(&[
            0xF0 | (cp >> 18) as u8,
            0x80 | ((cp >> 12) & 0x3F) as u8,
            0x80 | ((cp >> 6) & 0x3F) as u8,
            0x80 | (cp & 0x3F) as u8,
        ]),
    }
}

#[inline]
pub(crate) fn push_latin1(out: &mut Vec<u8>, b: u8) {
    if b < 0x80 {
        out.push(b);
    } else {
        out.extend_from_slice(&[0xC0 | (b >> 6), 0x80 | (b & 0x3F)]);
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn reference_utf16(units: &[u16]) -> Vec<u8> {
        char::decode_utf16(units.iter().copied())
            .map(|r| r.unwrap_or('?'))
            .collect::<String>()
            .into_bytes()
    }

    fn reference_latin1(bytes: &[u8]) -> Vec<u8> {
        bytes.iter().map(|&b| b as char).collect::<String>().into_bytes()
    }

    fn check_utf16(units: &[u16]) {
        let expected = reference_utf16(units);
        for encoder in all_string_encoders() {
            let size = encoder.size_of(Text::Utf16(units));
            assert_eq!(size, expected.len(), "size mismatch for {}", encoder.name());

            let mut out = Vec::new();
            encoder.encode(Text::Utf16(units), size, &mut out);
            similar_asserts::assert_eq!(out, expected, "output mismatch for {}", encoder.name());
        }
    }

    #[test]
    fn lone_surrogates_replaced() {
        // lone high, lone low, high at the very end, reversed pair
        check_utf16(&[0xD800]);
        check_utf16(&[0xDC00]);
        check_utf16(&[b'a' as u16, 0xD83D]);
        check_utf16(&[0xDE00, 0xD83D]);
        check_utf16(&[0xD83D, 0xDE00, 0xD83D, b'x' as u16]);

        let mut out = Vec::new();
        FallbackStringEncoder.encode(Text::Utf16(&[0xD800, 0x41]), 2, &mut out);
        assert_eq!(out, b"?A");
    }

    #[test]
    fn surrogates_straddling_chunk_boundaries() {
        // Pairs positioned across the 4- and 8-unit chunk edges used by the accelerated strategies.
        for offset in 0..18 {
            let mut units = vec![b'a' as u16; offset];
            units.extend_from_slice(&[0xD83D, 0xDE00]);
            units.extend(std::iter::repeat(b'b' as u16).take(9));
            check_utf16(&units);
        }
    }

    #[test]
    fn mixed_widths() {
        let s = "héllo wörld, ✓ done 🚀 ok and some trailing ascii";
        let units: Vec<u16> = s.encode_utf16().collect();
        check_utf16(&units);
    }

    #[test]
    fn latin1_high_bytes_take_two_bytes() {
        let bytes = [b'c', b'a', b'f', 0xE9, 0x80, 0xFF];
        for encoder in all_string_encoders() {
            let size = encoder.size_of(Text::Latin1(&bytes));
            assert_eq!(size, 9);
            let mut out = Vec::new();
            encoder.encode(Text::Latin1(&bytes), size, &mut out);
            assert_eq!(out, reference_latin1(&bytes), "output mismatch for {}", encoder.name());
        }
    }

    #[test]
    fn selection_is_stable() {
        let first = string_encoder().name();
        let second = string_encoder().name();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn property_test_utf16_encoders_agree(units in proptest::collection::vec(any::<u16>(), 0..96)) {
            check_utf16(&units);
        }

        #[test]
        fn property_test_utf16_mostly_ascii(units in proptest::collection::vec(prop_oneof![
            8 => 0x20u16..0x7F,
            1 => 0x80u16..0x800,
            1 => 0xD800u16..0xE000,
        ], 0..128)) {
            check_utf16(&units);
        }

        #[test]
        fn property_test_latin1_encoders_agree(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            let expected = reference_latin1(&bytes);
            for encoder in all_string_encoders() {
                let size = encoder.size_of(Text::Latin1(&bytes));
                prop_assert_eq!(size, expected.len());
                let mut out = Vec::new();
                encoder.encode(Text::Latin1(&bytes), size, &mut out);
                prop_assert_eq!(&out, &expected);
            }
        }

        #[test]
        fn property_test_utf8_passthrough(s in ".*") {
            for encoder in all_string_encoders() {
                let size = encoder.size_of(Text::Utf8(&s));
                prop_assert_eq!(size, s.len());
                let mut out = Vec::new();
                encoder.encode(Text::Utf8(&s), size, &mut out);
                prop_assert_eq!(out.as_slice(), s.as_bytes());
            }
        }
    }
}
