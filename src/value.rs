use chrono::{DateTime, FixedOffset};
use url::Url;

/// A generic decoded number: integer or float.
///
/// `i128` covers the full CBOR integer range, including negative integers
/// down to `-2^64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    /// An exact integer.
    Int(i128),
    /// A floating-point value.
    Float(f64),
}

impl Number {
    /// The exact integer value, if this is an integer.
    #[inline]
    #[must_use]
    pub const fn as_i128(self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(v),
            Self::Float(_) => None,
        }
    }

    /// The value widened to `f64` (lossy for large integers).
    #[inline]
    #[must_use]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

/// An arbitrary-precision integer decoded from CBOR tag 2 or 3.
///
/// Stored as sign plus big-endian magnitude bytes. For negative bignums
/// (tag 3) the represented value is `-1 - magnitude`, realizing CBOR's
/// negative-bignum encoding without a two's-complement pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BigInt {
    negative: bool,
    magnitude: Vec<u8>,
}

impl BigInt {
    /// Construct from sign and big-endian magnitude bytes.
    #[must_use]
    pub const fn new(negative: bool, magnitude: Vec<u8>) -> Self {
        Self {
            negative,
            magnitude,
        }
    }

    /// Sign flag: `true` for a negative bignum (tag 3).
    #[inline]
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.negative
    }

    /// The big-endian magnitude bytes.
    #[inline]
    #[must_use]
    pub fn magnitude(&self) -> &[u8] {
        &self.magnitude
    }

    /// Best-effort conversion to `i128`.
    ///
    /// Returns `None` when the magnitude does not fit. The negative value is
    /// `-1 - magnitude`, so a positive `1` payload converts to `1` under
    /// tag 2 and `-2` under tag 3.
    #[must_use]
    pub fn to_i128(&self) -> Option<i128> {
        let mut acc: u128 = 0;
        for &b in &self.magnitude {
            acc = acc.checked_shl(8)?.checked_add(u128::from(b))?;
        }
        if self.negative {
            let m = i128::try_from(acc).ok()?;
            Some(-1 - m)
        } else {
            i128::try_from(acc).ok()
        }
    }
}

/// An owned, fully materialized value.
///
/// Produced by [`LazyValue::materialize`](crate::LazyValue::materialize) and
/// by the projection strategy when rebuilding sub-documents. The lazy engine
/// never constructs these on its own; they exist only at the emission
/// boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// CBOR `null`, also the well-defined absent marker.
    Null,
    /// CBOR `undefined`.
    Undefined,
    /// A boolean.
    Bool(bool),
    /// An unassigned simple value (major 7), preserved opaquely.
    Simple(u8),
    /// An integer (major 0/1), full CBOR range.
    Int(i128),
    /// A float (major 7).
    Float(f64),
    /// A byte string.
    Bytes(Vec<u8>),
    /// A text string.
    Text(String),
    /// A sequence, in encounter order.
    Sequence(Vec<Value>),
    /// A dictionary, as key/value pairs in encounter order.
    Dictionary(Vec<(Value, Value)>),
    /// A big integer (tag 2/3).
    BigNum(BigInt),
    /// A date-time (tag 0).
    DateTime(DateTime<FixedOffset>),
    /// A URI (tag 32).
    Uri(Url),
    /// An epoch timestamp (tag 1).
    Timestamp(Number),
    /// An opaque tagged value with its raw encoded bytes (tag head included).
    Tagged {
        /// The semantic tag number.
        tag: u64,
        /// The full encoded span of the tagged item.
        raw: Vec<u8>,
    },
}

impl Value {
    /// Returns whether this is the null/absent marker.
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The integer value, if this is an integer.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i128> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// The text value, if this is a text string.
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The sequence items, if this is a sequence.
    #[inline]
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// The dictionary entries, if this is a dictionary.
    #[inline]
    #[must_use]
    pub fn as_dictionary(&self) -> Option<&[(Value, Value)]> {
        match self {
            Self::Dictionary(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a dictionary entry by text key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        let Self::Dictionary(entries) = self else {
            return None;
        };
        entries
            .iter()
            .find(|(k, _)| k.as_text() == Some(key))
            .map(|(_, v)| v)
    }
}
