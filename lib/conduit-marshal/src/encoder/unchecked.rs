use super::{decode_unit, push_latin1, push_utf8, utf8_len, StringEncoder};

const UTF16_NON_ASCII_MASK: u64 = 0xFF80_FF80_FF80_FF80;
const LATIN1_NON_ASCII_MASK: u64 = 0x8080_8080_8080_8080;

/// Strategy reading input through raw pointers, checking four UTF-16 units (or eight Latin-1 bytes) at a time for
/// ASCII.
///
/// The masks test the high bits of every lane at once, so the result does not depend on byte order.
#[derive(Clone, Copy, Debug, Default)]
pub struct UncheckedStringEncoder;

/// Reads the unit at `i` and the one after it, if any.
///
/// # Safety
///
/// `i` must be less than `len`, the length of the allocation behind `ptr`.
#[inline(always)]
unsafe fn units_at(ptr: *const u16, len: usize, i: usize) -> (u16, Option<u16>) {
    let unit = *ptr.add(i);
    let next = if i + 1 < len { Some(*ptr.add(i + 1)) } else { None };
    (unit, next)
}

impl StringEncoder for UncheckedStringEncoder {
    fn name(&self) -> &'static str {
        "unchecked"
    }

    fn utf16_len(&self, units: &[u16]) -> usize {
        let (ptr, n) = (units.as_ptr(), units.len());
        let mut len = 0;
        let mut i = 0;

        // SAFETY: word reads cover `i..i + 4` with `i + 4 <= n`; single reads go through `units_at` with `i < n`.
        unsafe {
            while i + 4 <= n {
                let word = ptr.add(i).cast::<u64>().read_unaligned();
                if word & UTF16_NON_ASCII_MASK == 0 {
                    len += 4;
                    i += 4;
                    continue;
                }

                let (unit, next) = units_at(ptr, n, i);
                let (cp, consumed) = decode_unit(unit, next);
                len += utf8_len(cp);
                i += consumed;
            }

            while i < n {
                let (unit, next) = units_at(ptr, n, i);
                let (cp, consumed) = decode_unit(unit, next);
                len += utf8_len(cp);
                i += consumed;
            }
        }

        len
    }

    fn encode_utf16(&self, units: &[u16], out: &mut Vec<u8>) {
        let (ptr, n) = (units.as_ptr(), units.len());
        let mut i = 0;

        // SAFETY: same bounds as `utf16_len`.
        unsafe {
            while i + 4 <= n {
                let word = ptr.add(i).cast::<u64>().read_unaligned();
                if word & UTF16_NON_ASCII_MASK == 0 {
                    out.extend_from_slice(&[
                        *ptr.add(i) as u8,
                        *ptr.add(i + 1) as u8,
                        *ptr.add(i + 2) as u8,
                        *ptr.add(i + 3) as u8,
                    ]);
                    i += 4;
                    continue;
                }

                let (unit, next) = units_at(ptr, n, i);
                let (cp, consumed) = decode_unit(unit, next);
                push_utf8(out, cp);
                i += consumed;
            }

            while i < n {
                let (unit, next) = units_at(ptr, n, i);
                let (cp, consumed) = decode_unit(unit, next);
                push_utf8(out, cp);
                i += consumed;
            }
        }
    }

    fn latin1_len(&self, bytes: &[u8]) -> usize {
        let (ptr, n) = (bytes.as_ptr(), bytes.len());
        let mut len = n;
        let mut i = 0;

        // SAFETY: word reads cover `i..i + 8` with `i + 8 <= n`, byte reads have `i < n`.
        unsafe {
            while i + 8 <= n {
                let word = ptr.add(i).cast::<u64>().read_unaligned();
                len += (word & LATIN1_NON_ASCII_MASK).count_ones() as usize;
                i += 8;
            }
            while i < n {
                len += (*ptr.add(i) >> 7) as usize;
                i += 1;
            }
        }

        len
    }

    fn encode_latin1(&self, bytes: &[u8], out: &mut Vec<u8>) {
        let (ptr, n) = (bytes.as_ptr(), bytes.len());
        let mut i = 0;

        // SAFETY: same bounds as `latin1_len`.
        unsafe {
            while i + 8 <= n {
                let word = ptr.add(i).cast::<u64>().read_unaligned();
                if word & LATIN1_NON_ASCII_MASK == 0 {
                    out.extend_from_slice(std::slice::from_raw_parts(ptr.add(i), 8));
                } else {
                    for j in 0..8 {
                        push_latin1(out, *ptr.add(i + j));
                    }
                }
                i += 8;
            }
            while i < n {
                push_latin1(out, *ptr.add(i));
                i += 1;
            }
        }
    }
}
