use super::{decode_unit, push_latin1, push_utf8, utf8_len, StringEncoder};

const UTF16_LANES: usize = 8;
const LATIN1_LANES: usize = 16;

/// Strategy detecting ASCII runs with SIMD.
///
/// On x86-64 the checks use SSE2, which is part of the baseline. Elsewhere they are written as fixed-width reductions
/// the compiler turns into vector code where the target allows.
#[derive(Clone, Copy, Debug, Default)]
pub struct VectorizedStringEncoder;

impl VectorizedStringEncoder {
    /// Returns `true` if the current target has vector instructions backing this strategy.
    pub const fn is_accelerated() -> bool {
        cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
    }
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn utf16_chunk_is_ascii(chunk: &[u16]) -> bool {
    use std::arch::x86_64::{
        __m128i, _mm_and_si128, _mm_cmpeq_epi16, _mm_loadu_si128, _mm_movemask_epi8, _mm_set1_epi16, _mm_setzero_si128,
    };

    debug_assert_eq!(chunk.len(), UTF16_LANES);

    // SAFETY: SSE2 is always available on x86-64, and the chunk holds exactly 16 bytes read unaligned.
    unsafe {
        let v = _mm_loadu_si128(chunk.as_ptr().cast::<__m128i>());
        let high = _mm_and_si128(v, _mm_set1_epi16(0xFF80u16 as i16));
        _mm_movemask_epi8(_mm_cmpeq_epi16(high, _mm_setzero_si128())) == 0xFFFF
    }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn utf16_chunk_is_ascii(chunk: &[u16]) -> bool {
    chunk.iter().fold(0u16, |acc, &unit| acc | unit) < 0x80
}

#[cfg(target_arch = "x86_64")]
#[inline]
fn latin1_chunk_is_ascii(chunk: &[u8]) -> bool {
    use std::arch::x86_64::{__m128i, _mm_loadu_si128, _mm_movemask_epi8};

    debug_assert_eq!(chunk.len(), LATIN1_LANES);

    // SAFETY: SSE2 is always available on x86-64, and the chunk holds exactly 16 bytes read unaligned.
    unsafe { _mm_movemask_epi8(_mm_loadu_si128(chunk.as_ptr().cast::<__m128i>())) == 0 }
}

#[cfg(not(target_arch = "x86_64"))]
#[inline]
fn latin1_chunk_is_ascii(chunk: &[u8]) -> bool {
    chunk.iter().fold(0u8, |acc, &b| acc | b) < 0x80
}

impl StringEncoder for VectorizedStringEncoder {
    fn name(&self) -> &'static str {
        "vectorized"
    }

    fn utf16_len(&self, units: &[u16]) -> usize {
        let n = units.len();
        let mut len = 0;
        let mut i = 0;
        while i < n {
            if i + UTF16_LANES <= n && utf16_chunk_is_ascii(&units[i..i + UTF16_LANES]) {
                len += UTF16_LANES;
                i += UTF16_LANES;
                continue;
            }

            // Not a full ASCII chunk: walk scalar up to where the next chunk would start.
            let end = (i + UTF16_LANES).min(n);
            while i < end {
                let (cp, consumed) = decode_unit(units[i], units.get(i + 1).copied());
                len += utf8_len(cp);
                i += consumed;
            }
        }
        len
    }

    fn encode_utf16(&self, units: &[u16], out: &mut Vec<u8>) {
        let n = units.len();
        let mut i = 0;
        while i < n {
            if i + UTF16_LANES <= n && utf16_chunk_is_ascii(&units[i..i + UTF16_LANES]) {
                out.extend(units[i..i + UTF16_LANES].iter().map(|&unit| unit as u8));
                i += UTF16_LANES;
                continue;
            }

            let end = (i + UTF16_LANES).min(n);
            while i < end {
                let (cp, consumed) = decode_unit(units[i], units.get(i + 1).copied());
                push_utf8(out, cp);
                i += consumed;
            }
        }
    }

    fn latin1_len(&self, bytes: &[u8]) -> usize {
        let mut chunks = bytes.chunks_exact(LATIN1_LANES);
        let mut len = bytes.len();
        for chunk in &mut chunks {
            if !latin1_chunk_is_ascii(chunk) {
                len += chunk.iter().filter(|&&b| b >= 0x80).count();
            }
        }
        len + chunks.remainder().iter().filter(|&&b| b >= 0x80).count()
    }

    fn encode_latin1(&self, bytes: &[u8], out: &mut Vec<u8>) {
        let mut chunks = bytes.chunks_exact(LATIN1_LANES);
        for chunk in &mut chunks {
            if latin1_chunk_is_ascii(chunk) {
                out.extend_from_slice(chunk);
            } else {
                for &b in chunk {
                    push_latin1(out, b);
                }
            }
        }
        for &b in chunks.remainder() {
            push_latin1(out, b);
        }
    }
}
