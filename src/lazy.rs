//! Lazy values: typed handles into the raw buffer.
//!
//! A [`LazyValue`] is a `(major type, value type, offset)` triple borrowing
//! the input. Nothing is decoded until an accessor asks for it, and container
//! access re-walks child spans with [`decode::value_end`] instead of holding a
//! parsed tree. Handles are `Copy`; re-reading an accessor re-decodes.

use std::borrow::Cow;
use std::hash::{Hash, Hasher};

use crate::classify::{self, ValueType};
use crate::decode::{self, Length, BREAK, MAX_NESTING_DEPTH};
use crate::input::Input;
use crate::major::MajorType;
use crate::pipeline::KeySpec;
use crate::tags::{TagRegistry, TagValue};
use crate::value::{Number, Value};
use crate::{Error, ErrorCode};

/// A typed, positioned handle to one encoded item.
#[derive(Debug, Clone, Copy)]
pub struct LazyValue<'a> {
    input: Input<'a>,
    tags: &'a TagRegistry,
    major: MajorType,
    value_type: ValueType,
    offset: usize,
}

impl<'a> LazyValue<'a> {
    /// Classify the item at `offset` into a handle.
    ///
    /// # Errors
    ///
    /// Returns format errors when the head byte at `offset` cannot be
    /// classified (truncation, reserved encodings, stray break markers).
    pub fn new(input: Input<'a>, tags: &'a TagRegistry, offset: usize) -> Result<Self, Error> {
        Ok(Self {
            input,
            tags,
            major: decode::major_type(input, offset)?,
            value_type: classify::value_type(input, offset)?,
            offset,
        })
    }

    /// The major type of the item.
    #[inline]
    #[must_use]
    pub const fn major_type(&self) -> MajorType {
        self.major
    }

    /// The refined value type of the item.
    #[inline]
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// The absolute offset of the item's head byte.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// The buffer this handle points into.
    #[inline]
    #[must_use]
    pub const fn input(&self) -> Input<'a> {
        self.input
    }

    /// The full encoded byte span of the item, head included.
    ///
    /// Re-classifying the returned slice at offset 0 yields an equivalent
    /// value.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`decode::value_end`].
    pub fn raw(&self) -> Result<&'a [u8], Error> {
        let end = decode::value_end(self.input, self.offset)?;
        self.input.read_bytes(self.offset, end - self.offset)
    }

    /// Decode as a number (integer or float).
    ///
    /// # Errors
    ///
    /// Returns `ExpectedNumber` for non-numeric items.
    pub fn as_number(&self) -> Result<Number, Error> {
        decode::read_number(self.input, self.offset)
    }

    /// Decode as a text string.
    ///
    /// Borrows for definite-length strings, owns the concatenation for
    /// indefinite-length ones.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedString` for non-text items, `Utf8Invalid` for bad
    /// payloads.
    pub fn as_string(&self) -> Result<Cow<'a, str>, Error> {
        decode::read_text(self.input, self.offset)
    }

    /// Decode as a byte string.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedBytes` for non-byte-string items.
    pub fn as_bytes(&self) -> Result<Cow<'a, [u8]>, Error> {
        decode::read_byte_string(self.input, self.offset)
    }

    /// Decode as a boolean.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedBool` for anything but simple values 20/21.
    pub fn as_bool(&self) -> Result<bool, Error> {
        match decode::head_byte(self.input, self.offset)? {
            0xf4 => Ok(false),
            0xf5 => Ok(true),
            _ => Err(Error::type_mismatch(ErrorCode::ExpectedBool, self.offset)),
        }
    }

    /// Returns whether the item is the simple value `null`.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self.value_type, ValueType::Null)
    }

    /// View as a sequence.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedSequence` if the item is not major type 4.
    pub fn as_sequence(&self) -> Result<Sequence<'a>, Error> {
        if self.major != MajorType::Sequence {
            return Err(Error::type_mismatch(
                ErrorCode::ExpectedSequence,
                self.offset,
            ));
        }
        let len = match decode::read_length(self.input, self.offset)? {
            Length::Definite(n) => Some(decode::len_to_usize(n, self.offset)?),
            Length::Indefinite => None,
        };
        Ok(Sequence {
            input: self.input,
            tags: self.tags,
            items_start: self.offset + decode::header_byte_size(self.input, self.offset)?,
            len,
        })
    }

    /// View as a dictionary.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedDictionary` if the item is not major type 5.
    pub fn as_dictionary(&self) -> Result<Dictionary<'a>, Error> {
        if self.major != MajorType::Dictionary {
            return Err(Error::type_mismatch(
                ErrorCode::ExpectedDictionary,
                self.offset,
            ));
        }
        let len = match decode::read_length(self.input, self.offset)? {
            Length::Definite(n) => Some(decode::len_to_usize(n, self.offset)?),
            Length::Indefinite => None,
        };
        Ok(Dictionary {
            input: self.input,
            tags: self.tags,
            entries_start: self.offset + decode::header_byte_size(self.input, self.offset)?,
            len,
        })
    }

    /// Decode the semantic tag through the registry.
    ///
    /// # Errors
    ///
    /// Returns `ExpectedTag` if the item is not major type 6, otherwise
    /// whatever the registered decoder (or the unknown-tag policy) yields.
    pub fn tag(&self) -> Result<TagValue<'a>, Error> {
        self.tags.decode(self.input, self.offset)
    }

    /// Fully decode into an owned [`Value`].
    ///
    /// Recursion is bounded by [`MAX_NESTING_DEPTH`]; embedded CBOR (tag 24)
    /// counts toward the same budget.
    ///
    /// # Errors
    ///
    /// Any decode error of any reachable child.
    pub fn materialize(&self) -> Result<Value, Error> {
        self.materialize_at(0)
    }

    fn materialize_at(&self, depth: usize) -> Result<Value, Error> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(Error::format(ErrorCode::DepthLimitExceeded, self.offset));
        }
        match self.value_type {
            ValueType::UInt | ValueType::NInt => {
                decode::read_int(self.input, self.offset).map(Value::Int)
            }
            ValueType::Float => decode::read_float(self.input, self.offset).map(Value::Float),
            ValueType::Bool => self.as_bool().map(Value::Bool),
            ValueType::Simple(n) => Ok(Value::Simple(n)),
            ValueType::Null => Ok(Value::Null),
            ValueType::Undefined => Ok(Value::Undefined),
            ValueType::ByteString => Ok(Value::Bytes(self.as_bytes()?.into_owned())),
            ValueType::TextString => Ok(Value::Text(self.as_string()?.into_owned())),
            ValueType::Sequence => {
                let mut items = Vec::new();
                for item in self.as_sequence()?.iter() {
                    items.push(item?.materialize_at(depth + 1)?);
                }
                Ok(Value::Sequence(items))
            }
            ValueType::Dictionary => {
                let mut entries = Vec::new();
                for entry in self.as_dictionary()?.iter() {
                    let (k, v) = entry?;
                    entries.push((k.materialize_at(depth + 1)?, v.materialize_at(depth + 1)?));
                }
                Ok(Value::Dictionary(entries))
            }
            ValueType::DateTime
            | ValueType::Timestamp
            | ValueType::UBigNum
            | ValueType::NBigNum
            | ValueType::Uri
            | ValueType::EncCbor
            | ValueType::Unknown(_) => match self.tag()? {
                TagValue::DateTime(dt) => Ok(Value::DateTime(dt)),
                TagValue::Timestamp(n) => Ok(Value::Timestamp(n)),
                TagValue::BigNum(b) => Ok(Value::BigNum(b)),
                TagValue::Uri(u) => Ok(Value::Uri(u)),
                TagValue::Nested(inner) => inner.materialize_at(depth + 1),
                TagValue::Opaque { tag, raw } => Ok(Value::Tagged {
                    tag,
                    raw: raw.to_vec(),
                }),
            },
        }
    }
}

/// Identity: same buffer, same offset, same classification.
impl PartialEq for LazyValue<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.offset == other.offset
            && self.value_type == other.value_type
            && self.input.same_buffer(&other.input)
    }
}

impl Eq for LazyValue<'_> {}

impl Hash for LazyValue<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.offset.hash(state);
        self.value_type.hash(state);
        self.input.as_slice().as_ptr().hash(state);
    }
}

/// A lazy view over a sequence (major type 4).
///
/// Random access walks item spans from the front; there is no index. A
/// definite length is O(1), an indefinite one is discovered by scanning.
#[derive(Debug, Clone, Copy)]
pub struct Sequence<'a> {
    input: Input<'a>,
    tags: &'a TagRegistry,
    items_start: usize,
    len: Option<usize>,
}

impl<'a> Sequence<'a> {
    /// Number of items.
    ///
    /// # Errors
    ///
    /// Indefinite-length sequences are scanned to the break marker, so any
    /// child decode error surfaces here.
    pub fn len(&self) -> Result<usize, Error> {
        match self.len {
            Some(n) => Ok(n),
            None => {
                let mut count = 0;
                for item in self.iter() {
                    item?;
                    count += 1;
                }
                Ok(count)
            }
        }
    }

    /// Returns whether the sequence has no items.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Sequence::len`] for indefinite lengths.
    pub fn is_empty(&self) -> Result<bool, Error> {
        match self.len {
            Some(n) => Ok(n == 0),
            None => Ok(decode::head_byte(self.input, self.items_start)? == BREAK),
        }
    }

    /// The item at `index`, or `None` past the end.
    ///
    /// # Errors
    ///
    /// Any decode error while skipping over preceding items.
    pub fn get(&self, index: usize) -> Result<Option<LazyValue<'a>>, Error> {
        for (i, item) in self.iter().enumerate() {
            let item = item?;
            if i == index {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    /// Iterate the items in encounter order.
    #[must_use]
    pub fn iter(&self) -> SequenceIter<'a> {
        SequenceIter {
            input: self.input,
            tags: self.tags,
            pos: self.items_start,
            remaining: self.len,
            done: false,
        }
    }
}

/// Iterator over sequence items; fuses after the first error.
#[derive(Debug, Clone)]
pub struct SequenceIter<'a> {
    input: Input<'a>,
    tags: &'a TagRegistry,
    pos: usize,
    remaining: Option<usize>,
    done: bool,
}

impl<'a> Iterator for SequenceIter<'a> {
    type Item = Result<LazyValue<'a>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.remaining {
            Some(0) => {
                self.done = true;
                return None;
            }
            Some(ref mut n) => *n -= 1,
            None => match decode::head_byte(self.input, self.pos) {
                Ok(BREAK) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            },
        }
        let item = LazyValue::new(self.input, self.tags, self.pos)
            .and_then(|v| decode::value_end(self.input, self.pos).map(|end| (v, end)));
        match item {
            Ok((v, end)) => {
                self.pos = end;
                Some(Ok(v))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// A lazy view over a dictionary (major type 5).
///
/// Entries stay encoded; lookup compares keys in place without materializing
/// them.
#[derive(Debug, Clone, Copy)]
pub struct Dictionary<'a> {
    input: Input<'a>,
    tags: &'a TagRegistry,
    entries_start: usize,
    len: Option<usize>,
}

impl<'a> Dictionary<'a> {
    /// Number of entries.
    ///
    /// # Errors
    ///
    /// Indefinite-length dictionaries are scanned to the break marker.
    pub fn len(&self) -> Result<usize, Error> {
        match self.len {
            Some(n) => Ok(n),
            None => {
                let mut count = 0;
                for entry in self.iter() {
                    entry?;
                    count += 1;
                }
                Ok(count)
            }
        }
    }

    /// Returns whether the dictionary has no entries.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Dictionary::len`] for indefinite lengths.
    pub fn is_empty(&self) -> Result<bool, Error> {
        match self.len {
            Some(n) => Ok(n == 0),
            None => Ok(decode::head_byte(self.input, self.entries_start)? == BREAK),
        }
    }

    /// Find the value whose key matches `key`, comparing keys in place.
    ///
    /// Text keys match text strings, integer keys match integer items, float
    /// keys match float items. The first matching entry wins.
    ///
    /// # Errors
    ///
    /// Any decode error while walking entries or comparing keys.
    pub fn get(&self, key: &KeySpec) -> Result<Option<LazyValue<'a>>, Error> {
        for entry in self.iter() {
            let (k, v) = entry?;
            if key_matches(key, &k)? {
                return Ok(Some(v));
            }
        }
        Ok(None)
    }

    /// Iterate the entries in encounter order.
    #[must_use]
    pub fn iter(&self) -> DictionaryIter<'a> {
        DictionaryIter {
            items: SequenceIter {
                input: self.input,
                tags: self.tags,
                pos: self.entries_start,
                remaining: self.len.map(|n| n.saturating_mul(2)),
                done: false,
            },
        }
    }
}

fn key_matches(spec: &KeySpec, key: &LazyValue<'_>) -> Result<bool, Error> {
    match (spec, key.value_type()) {
        (KeySpec::Text(want), ValueType::TextString) => Ok(*key.as_string()? == **want),
        (KeySpec::Int(want), ValueType::UInt | ValueType::NInt) => {
            Ok(decode::read_int(key.input, key.offset)? == i128::from(*want))
        }
        (KeySpec::Float(want), ValueType::Float) => {
            Ok(decode::read_float(key.input, key.offset)? == *want)
        }
        _ => Ok(false),
    }
}

/// Iterator over dictionary entries; fuses after the first error.
///
/// A break marker (or definite count exhaustion) between a key and its value
/// is a format error.
#[derive(Debug, Clone)]
pub struct DictionaryIter<'a> {
    items: SequenceIter<'a>,
}

impl<'a> Iterator for DictionaryIter<'a> {
    type Item = Result<(LazyValue<'a>, LazyValue<'a>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let key = match self.items.next()? {
            Ok(k) => k,
            Err(e) => return Some(Err(e)),
        };
        match self.items.next() {
            Some(Ok(value)) => Some(Ok((key, value))),
            Some(Err(e)) => Some(Err(e)),
            None => Some(Err(Error::format(
                ErrorCode::UnexpectedBreak,
                self.items.pos,
            ))),
        }
    }
}
