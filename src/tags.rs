//! Semantic tag decoding (major type 6).
//!
//! Tag decoders are plain functions keyed by tag number in a [`TagRegistry`].
//! Each decoder receives the offset of the tag head byte and produces a
//! [`TagValue`]; the built-in set covers tags 0, 1, 2, 3, 24, and 32.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use url::Url;

use crate::decode::{self, Length};
use crate::input::Input;
use crate::lazy::LazyValue;
use crate::major::MajorType;
use crate::stream::CborStream;
use crate::value::{BigInt, Number};
use crate::{Error, ErrorCode};

/// What [`TagRegistry::decode`] does with a tag no decoder is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownTagPolicy {
    /// Preserve the tagged item as [`TagValue::Opaque`] with its raw bytes.
    #[default]
    Opaque,
    /// Fail with `UnknownTagRejected`.
    Fail,
}

/// A decoded semantic tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue<'a> {
    /// Tag 0: an RFC 3339 date-time.
    DateTime(DateTime<FixedOffset>),
    /// Tag 1: an epoch timestamp, integer or float.
    Timestamp(Number),
    /// Tag 2 or 3: a big integer.
    BigNum(BigInt),
    /// Tag 32: a URI.
    Uri(Url),
    /// Tag 24: the item embedded in the byte-string payload.
    Nested(LazyValue<'a>),
    /// An unregistered tag, preserved verbatim.
    Opaque {
        /// The tag number.
        tag: u64,
        /// The full encoded span of the tagged item, head included.
        raw: &'a [u8],
    },
}

/// A tag decoder: given the buffer, the offset of the tag head byte, and the
/// registry (for nested decoding), produce a [`TagValue`].
pub type TagDecoderFn = for<'a> fn(Input<'a>, usize, &'a TagRegistry) -> Result<TagValue<'a>, Error>;

/// Registry mapping tag numbers to decoder functions.
///
/// [`TagRegistry::default`] carries the built-in decoders; [`TagRegistry::empty`]
/// starts blank. Registering over an existing tag number replaces the decoder,
/// so built-ins can be overridden.
#[derive(Clone)]
pub struct TagRegistry {
    decoders: BTreeMap<u64, TagDecoderFn>,
    unknown: UnknownTagPolicy,
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagRegistry")
            .field("tags", &self.decoders.keys().collect::<Vec<_>>())
            .field("unknown", &self.unknown)
            .finish()
    }
}

impl Default for TagRegistry {
    fn default() -> Self {
        let mut r = Self::empty();
        r.register(0, decode_date_time);
        r.register(1, decode_timestamp);
        r.register(2, decode_ubignum);
        r.register(3, decode_nbignum);
        r.register(24, decode_enc_cbor);
        r.register(32, decode_uri);
        r
    }
}

impl TagRegistry {
    /// A registry with no decoders and the default unknown-tag policy.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            decoders: BTreeMap::new(),
            unknown: UnknownTagPolicy::Opaque,
        }
    }

    /// Set the policy for tags without a registered decoder.
    #[must_use]
    pub const fn with_unknown_tag_policy(mut self, policy: UnknownTagPolicy) -> Self {
        self.unknown = policy;
        self
    }

    /// Register (or replace) the decoder for `tag`.
    pub fn register(&mut self, tag: u64, decoder: TagDecoderFn) {
        self.decoders.insert(tag, decoder);
    }

    /// Decode the tagged item at `offset` (which must point at a major-6 head).
    ///
    /// # Errors
    ///
    /// Returns `ExpectedTag` if the item is not a semantic tag, the decoder's
    /// error for registered tags, and `UnknownTagRejected` for unregistered
    /// tags under [`UnknownTagPolicy::Fail`].
    pub fn decode<'a>(&'a self, input: Input<'a>, offset: usize) -> Result<TagValue<'a>, Error> {
        let ib = decode::head_byte(input, offset)?;
        if MajorType::from_head_byte(ib) != MajorType::SemanticTag {
            return Err(Error::type_mismatch(ErrorCode::ExpectedTag, offset));
        }
        let mut s = CborStream::new(input, offset + 1);
        let tag = s.read_uint_arg(ib & 0x1f, offset)?;
        match self.decoders.get(&tag) {
            Some(decoder) => decoder(input, offset, self),
            None => match self.unknown {
                UnknownTagPolicy::Opaque => {
                    let end = decode::value_end(input, offset)?;
                    Ok(TagValue::Opaque {
                        tag,
                        raw: input.read_bytes(offset, end - offset)?,
                    })
                }
                UnknownTagPolicy::Fail => {
                    Err(Error::tag_decode(ErrorCode::UnknownTagRejected, offset))
                }
            },
        }
    }
}

/// Offset of the item wrapped by the tag head at `offset`.
fn tagged_item_offset(input: Input<'_>, offset: usize) -> Result<usize, Error> {
    Ok(offset + decode::header_byte_size(input, offset)?)
}

fn decode_date_time<'a>(
    input: Input<'a>,
    offset: usize,
    _tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    let item = tagged_item_offset(input, offset)?;
    let text = decode::read_text(input, item)?;
    let dt = DateTime::parse_from_rfc3339(&text)
        .map_err(|_| Error::tag_decode(ErrorCode::InvalidDateTime, offset))?;
    Ok(TagValue::DateTime(dt))
}

fn decode_timestamp<'a>(
    input: Input<'a>,
    offset: usize,
    _tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    let item = tagged_item_offset(input, offset)?;
    let n = decode::read_number(input, item)
        .map_err(|_| Error::tag_decode(ErrorCode::InvalidTimestamp, offset))?;
    Ok(TagValue::Timestamp(n))
}

fn decode_ubignum<'a>(
    input: Input<'a>,
    offset: usize,
    _tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    bignum(input, offset, false)
}

fn decode_nbignum<'a>(
    input: Input<'a>,
    offset: usize,
    _tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    bignum(input, offset, true)
}

fn bignum(input: Input<'_>, offset: usize, negative: bool) -> Result<TagValue<'_>, Error> {
    let item = tagged_item_offset(input, offset)?;
    let magnitude = match decode::read_byte_string(input, item)? {
        Cow::Borrowed(b) => b.to_vec(),
        Cow::Owned(b) => b,
    };
    Ok(TagValue::BigNum(BigInt::new(negative, magnitude)))
}

fn decode_uri<'a>(
    input: Input<'a>,
    offset: usize,
    _tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    let item = tagged_item_offset(input, offset)?;
    let text = decode::read_text(input, item)?;
    let url = Url::parse(&text).map_err(|_| Error::tag_decode(ErrorCode::InvalidUri, offset))?;
    Ok(TagValue::Uri(url))
}

fn decode_enc_cbor<'a>(
    input: Input<'a>,
    offset: usize,
    tags: &'a TagRegistry,
) -> Result<TagValue<'a>, Error> {
    let item = tagged_item_offset(input, offset)?;
    if decode::major_type(input, item)? != MajorType::ByteString
        || decode::read_length(input, item)? == Length::Indefinite
    {
        return Err(Error::tag_decode(ErrorCode::InvalidNestedItem, offset));
    }
    // The embedded item starts right after the byte-string head, inside the
    // same buffer, so it can be addressed by offset like any other item.
    let nested = item + decode::header_byte_size(input, item)?;
    Ok(TagValue::Nested(LazyValue::new(input, tags, nested)?))
}
