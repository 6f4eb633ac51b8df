use crate::decode;
use crate::input::Input;
use crate::major::MajorType;
use crate::stream::CborStream;
use crate::{Error, ErrorCode};

/// Semantic tag numbers with built-in classifications.
mod tag_numbers {
    pub const DATE_TIME: u64 = 0;
    pub const TIMESTAMP: u64 = 1;
    pub const UBIG_NUM: u64 = 2;
    pub const NBIG_NUM: u64 = 3;
    pub const ENC_CBOR: u64 = 24;
    pub const URI: u64 = 32;
}

/// A refinement of [`MajorType`] plus semantic tag.
///
/// Computed once per access from the head byte (and, for tags, the tag
/// number); never persisted across calls. Unknown tags are not errors: they
/// classify as [`ValueType::Unknown`] with the tag number preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Unsigned integer (major 0).
    UInt,
    /// Negative integer (major 1).
    NInt,
    /// Byte string (major 2).
    ByteString,
    /// Text string (major 3).
    TextString,
    /// Sequence/array (major 4).
    Sequence,
    /// Dictionary/map (major 5).
    Dictionary,
    /// Half/single/double float (major 7, ai 25..=27).
    Float,
    /// Simple value `true`/`false`.
    Bool,
    /// Simple value `null`.
    Null,
    /// Simple value `undefined`.
    Undefined,
    /// Any other simple value (major 7), preserved opaquely.
    Simple(u8),
    /// Tag 0: RFC 3339 date-time string.
    DateTime,
    /// Tag 1: epoch timestamp number.
    Timestamp,
    /// Tag 2: unsigned big integer.
    UBigNum,
    /// Tag 3: negative big integer.
    NBigNum,
    /// Tag 32: URI string.
    Uri,
    /// Tag 24: embedded CBOR byte string.
    EncCbor,
    /// Any other tag, preserved as an opaque tagged value.
    Unknown(u64),
}

impl ValueType {
    /// The tag number for tag-derived value types, `None` otherwise.
    #[must_use]
    pub const fn tag_number(self) -> Option<u64> {
        match self {
            Self::DateTime => Some(tag_numbers::DATE_TIME),
            Self::Timestamp => Some(tag_numbers::TIMESTAMP),
            Self::UBigNum => Some(tag_numbers::UBIG_NUM),
            Self::NBigNum => Some(tag_numbers::NBIG_NUM),
            Self::EncCbor => Some(tag_numbers::ENC_CBOR),
            Self::Uri => Some(tag_numbers::URI),
            Self::Unknown(n) => Some(n),
            _ => None,
        }
    }

    /// Returns whether this value type refines a semantic tag.
    #[must_use]
    pub const fn is_tag(self) -> bool {
        self.tag_number().is_some()
    }
}

/// Classify the item at `offset` into a [`ValueType`].
///
/// For major type 6 the tag number is peeked (a decoded unsigned integer
/// following the head) and mapped through the fixed built-in table; anything
/// unmapped degrades to [`ValueType::Unknown`] rather than failing.
///
/// # Errors
///
/// Returns format errors for reserved additional-info values, stray break
/// markers, two-byte simple values below 32, and truncation. Unassigned
/// simple values are not errors; they classify as [`ValueType::Simple`].
pub fn value_type(input: Input<'_>, offset: usize) -> Result<ValueType, Error> {
    let ib = decode::head_byte(input, offset)?;
    let ai = ib & 0x1f;

    match MajorType::from_head_byte(ib) {
        MajorType::UnsignedInteger => Ok(ValueType::UInt),
        MajorType::NegativeInteger => Ok(ValueType::NInt),
        MajorType::ByteString => Ok(ValueType::ByteString),
        MajorType::TextString => Ok(ValueType::TextString),
        MajorType::Sequence => Ok(ValueType::Sequence),
        MajorType::Dictionary => Ok(ValueType::Dictionary),
        MajorType::SemanticTag => {
            let mut s = CborStream::new(input, offset + 1);
            let tag = s.read_uint_arg(ai, offset)?;
            Ok(classify_tag(tag))
        }
        MajorType::FloatOrSimple => match ai {
            20 | 21 => Ok(ValueType::Bool),
            22 => Ok(ValueType::Null),
            23 => Ok(ValueType::Undefined),
            // Two-byte form; values below 32 are not well-formed (RFC 8949
            // section 3.3).
            24 => match input.read_byte(offset + 1)? {
                n @ 32.. => Ok(ValueType::Simple(n)),
                _ => Err(Error::format(ErrorCode::UnsupportedSimpleValue, offset)),
            },
            25..=27 => Ok(ValueType::Float),
            28..=30 => Err(Error::format(ErrorCode::ReservedAdditionalInfo, offset)),
            31 => Err(Error::format(ErrorCode::UnexpectedBreak, offset)),
            n => Ok(ValueType::Simple(n)),
        },
    }
}

const fn classify_tag(tag: u64) -> ValueType {
    match tag {
        tag_numbers::DATE_TIME => ValueType::DateTime,
        tag_numbers::TIMESTAMP => ValueType::Timestamp,
        tag_numbers::UBIG_NUM => ValueType::UBigNum,
        tag_numbers::NBIG_NUM => ValueType::NBigNum,
        tag_numbers::ENC_CBOR => ValueType::EncCbor,
        tag_numbers::URI => ValueType::Uri,
        n => ValueType::Unknown(n),
    }
}
