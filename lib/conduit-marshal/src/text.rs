/// Borrowed string data in one of the representations a producer may hold.
///
/// Producers holding Rust strings use [`Text::Utf8`], which is written as-is. The other two forms are transcoded to
/// UTF-8 by the selected [`StringEncoder`][crate::StringEncoder].
#[derive(Clone, Copy, Debug)]
pub enum Text<'a> {
    /// Valid UTF-8.
    Utf8(&'a str),

    /// ISO-8859-1 bytes, one code point per byte.
    Latin1(&'a [u8]),

    /// UTF-16 code units, possibly holding unpaired surrogates.
    Utf16(&'a [u16]),
}

impl Text<'_> {
    /// Returns `true` if the text holds no characters.
    pub fn is_empty(&self) -> bool {
        match self {
            Text::Utf8(s) => s.is_empty(),
            Text::Latin1(b) => b.is_empty(),
            Text::Utf16(u) => u.is_empty(),
        }
    }
}

impl<'a> From<&'a str> for Text<'a> {
    fn from(s: &'a str) -> Self {
        Text::Utf8(s)
    }
}

impl<'a> From<&'a String> for Text<'a> {
    fn from(s: &'a String) -> Self {
        Text::Utf8(s.as_str())
    }
}
