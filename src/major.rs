/// The coarse CBOR value category encoded in the top 3 bits of a head byte.
///
/// Fixed, closed enumeration per RFC 8949.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorType {
    /// Major type 0.
    UnsignedInteger,
    /// Major type 1, stored as `-(1 + n)`.
    NegativeInteger,
    /// Major type 2.
    ByteString,
    /// Major type 3.
    TextString,
    /// Major type 4 (array).
    Sequence,
    /// Major type 5 (map).
    Dictionary,
    /// Major type 6.
    SemanticTag,
    /// Major type 7 (floats and simple values).
    FloatOrSimple,
}

impl MajorType {
    /// Derive the major type from a head byte.
    #[inline]
    #[must_use]
    pub const fn from_head_byte(head: u8) -> Self {
        match head >> 5 {
            0 => Self::UnsignedInteger,
            1 => Self::NegativeInteger,
            2 => Self::ByteString,
            3 => Self::TextString,
            4 => Self::Sequence,
            5 => Self::Dictionary,
            6 => Self::SemanticTag,
            _ => Self::FloatOrSimple,
        }
    }

    /// The raw 3-bit major type value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::UnsignedInteger => 0,
            Self::NegativeInteger => 1,
            Self::ByteString => 2,
            Self::TextString => 3,
            Self::Sequence => 4,
            Self::Dictionary => 5,
            Self::SemanticTag => 6,
            Self::FloatOrSimple => 7,
        }
    }
}
