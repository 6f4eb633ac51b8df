use crate::{Error, ErrorCode};

/// A random-access byte source.
///
/// `Input` is a cheap `Copy` handle over a fixed, immutable buffer. It knows
/// nothing about CBOR; the decoder layers all format semantics on top of the
/// two read primitives. Offsets are absolute byte indices into the buffer.
#[derive(Debug, Clone, Copy)]
pub struct Input<'a> {
    data: &'a [u8],
}

impl<'a> Input<'a> {
    /// Wrap a byte slice as an input.
    #[inline]
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Total length of the backing buffer in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns whether the backing buffer is empty.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The full backing byte slice.
    #[inline]
    #[must_use]
    pub const fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    /// Read the single byte at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if `offset` is past the end of the buffer.
    #[inline]
    pub fn read_byte(&self, offset: usize) -> Result<u8, Error> {
        self.data
            .get(offset)
            .copied()
            .ok_or(Error::format(ErrorCode::UnexpectedEof, offset))
    }

    /// Read `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `LengthOverflow` if `offset + len` overflows, or
    /// `UnexpectedEof` if the range extends past the end of the buffer.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<&'a [u8], Error> {
        let end = offset
            .checked_add(len)
            .ok_or(Error::format(ErrorCode::LengthOverflow, offset))?;
        if end > self.data.len() {
            return Err(Error::format(ErrorCode::UnexpectedEof, offset));
        }
        Ok(&self.data[offset..end])
    }

    /// Identity over the backing buffer, used for O(1) lazy-value equality.
    #[inline]
    pub(crate) fn same_buffer(&self, other: &Self) -> bool {
        core::ptr::eq(self.data.as_ptr(), other.data.as_ptr()) && self.data.len() == other.data.len()
    }
}

impl<'a> From<&'a [u8]> for Input<'a> {
    fn from(data: &'a [u8]) -> Self {
        Self::new(data)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Input<'a> {
    fn from(data: &'a [u8; N]) -> Self {
        Self::new(data)
    }
}
