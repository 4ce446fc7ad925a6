use super::{decode_unit, push_latin1, push_utf8, utf8_len, StringEncoder};

/// Portable strategy using plain, bounds-checked indexing.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackStringEncoder;

impl StringEncoder for FallbackStringEncoder {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn utf16_len(&self, units: &[u16]) -> usize {
        let mut len = 0;
        let mut i = 0;
        while i < units.len() {
            let (cp, consumed) = decode_unit(units[i], units.get(i + 1).copied());
            len += utf8_len(cp);
            i += consumed;
        }
        len
    }

    fn encode_utf16(&self, units: &[u16], out: &mut Vec<u8>) {
        let mut i = 0;
        while i < units.len() {
            let (cp, consumed) = decode_unit(units[i], units.get(i + 1).copied());
            push_utf8(out, cp);
            i += consumed;
        }
    }

    fn latin1_len(&self, bytes: &[u8]) -> usize {
        bytes.len() + bytes.iter().filter(|&&b| b >= 0x80).count()
    }

    fn encode_latin1(&self, bytes: &[u8], out: &mut Vec<u8>) {
        for &b in bytes {
            push_latin1(out, b);
        }
    }
}
