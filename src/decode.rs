//! Primitive, offset-driven CBOR decoding.
//!
//! Every function here computes directly over the raw buffer: given an offset
//! that points at a CBOR head byte, it reads the fixed number of bytes the
//! length-encoding rule specifies and nothing more. Container children are
//! located by arithmetic ([`value_end`]), never by building a tree.

use std::borrow::Cow;

use half::f16;

use crate::input::Input;
use crate::major::MajorType;
use crate::stream::CborStream;
use crate::utf8;
use crate::value::Number;
use crate::{Error, ErrorCode};

/// The indefinite-length break marker (major 7, additional info 31).
pub const BREAK: u8 = 0xff;

/// Maximum container nesting depth accepted by the offset walker.
pub const MAX_NESTING_DEPTH: usize = 256;

/// The decoded length argument of a string or container head.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// A definite length in items (containers) or bytes (strings).
    Definite(u64),
    /// Indefinite length; the item runs until a break marker.
    Indefinite,
}

/// Read the head byte at `offset`.
///
/// # Errors
///
/// Returns `UnexpectedEof` if `offset` is past the end of the input.
#[inline]
pub fn head_byte(input: Input<'_>, offset: usize) -> Result<u8, Error> {
    input.read_byte(offset)
}

/// The major type of the item starting at `offset`.
///
/// # Errors
///
/// Returns `UnexpectedEof` if `offset` is past the end of the input.
#[inline]
pub fn major_type(input: Input<'_>, offset: usize) -> Result<MajorType, Error> {
    Ok(MajorType::from_head_byte(head_byte(input, offset)?))
}

/// The 5-bit additional-information field of the head byte at `offset`.
///
/// # Errors
///
/// Returns `UnexpectedEof` if `offset` is past the end of the input.
#[inline]
pub fn additional_info(input: Input<'_>, offset: usize) -> Result<u8, Error> {
    Ok(head_byte(input, offset)? & 0x1f)
}

/// Byte size of the head plus its length-extension bytes.
///
/// Additional-info values 24..=27 select 1/2/4/8 extension bytes; the
/// indefinite-length marker (31) occupies the head byte alone. The payload of
/// the item starts at `offset + header_byte_size`.
///
/// # Errors
///
/// Returns `ReservedAdditionalInfo` for the reserved values 28..=30.
pub fn header_byte_size(input: Input<'_>, offset: usize) -> Result<usize, Error> {
    match additional_info(input, offset)? {
        0..=23 | 31 => Ok(1),
        24 => Ok(2),
        25 => Ok(3),
        26 => Ok(5),
        27 => Ok(9),
        _ => Err(Error::format(ErrorCode::ReservedAdditionalInfo, offset)),
    }
}

/// Decode an unsigned integer (major type 0) at `offset`.
///
/// # Errors
///
/// Returns `ExpectedNumber` if the item is not an unsigned integer, or a
/// format error for reserved/truncated encodings.
pub fn read_uint(input: Input<'_>, offset: usize) -> Result<u64, Error> {
    let ib = head_byte(input, offset)?;
    if MajorType::from_head_byte(ib) != MajorType::UnsignedInteger {
        return Err(Error::type_mismatch(ErrorCode::ExpectedNumber, offset));
    }
    let mut s = CborStream::new(input, offset + 1);
    s.read_uint_arg(ib & 0x1f, offset)
}

/// Decode a signed integer (major type 0 or 1) at `offset`.
///
/// Negative integers are stored as `-(1 + n)`; the transform is applied here,
/// not by the caller. `i128` covers the full CBOR integer range.
///
/// # Errors
///
/// Returns `ExpectedNumber` if the item is not an integer.
pub fn read_int(input: Input<'_>, offset: usize) -> Result<i128, Error> {
    let ib = head_byte(input, offset)?;
    let mut s = CborStream::new(input, offset + 1);
    match MajorType::from_head_byte(ib) {
        MajorType::UnsignedInteger => Ok(i128::from(s.read_uint_arg(ib & 0x1f, offset)?)),
        MajorType::NegativeInteger => {
            let n = s.read_uint_arg(ib & 0x1f, offset)?;
            Ok(-1 - i128::from(n))
        }
        _ => Err(Error::type_mismatch(ErrorCode::ExpectedNumber, offset)),
    }
}

/// Decode the length argument of the string or container head at `offset`.
///
/// # Errors
///
/// Returns `ExpectedSequence`-class errors only at higher layers; here any
/// major type with a length argument (2..=5) is accepted, others yield
/// `ExpectedString`.
pub fn read_length(input: Input<'_>, offset: usize) -> Result<Length, Error> {
    let ib = head_byte(input, offset)?;
    match ib >> 5 {
        2..=5 => {
            let mut s = CborStream::new(input, offset + 1);
            s.read_len_arg(ib & 0x1f, offset)
        }
        _ => Err(Error::type_mismatch(ErrorCode::ExpectedString, offset)),
    }
}

/// Decode a floating-point value (major type 7, additional info 25..=27).
///
/// Half-precision values are widened through [`half::f16`].
///
/// # Errors
///
/// Returns `ExpectedNumber` if the item is not a float.
pub fn read_float(input: Input<'_>, offset: usize) -> Result<f64, Error> {
    let ib = head_byte(input, offset)?;
    if MajorType::from_head_byte(ib) != MajorType::FloatOrSimple {
        return Err(Error::type_mismatch(ErrorCode::ExpectedNumber, offset));
    }
    let mut s = CborStream::new(input, offset + 1);
    match ib & 0x1f {
        25 => Ok(f64::from(f16::from_bits(s.read_be_u16()?))),
        26 => Ok(f64::from(f32::from_bits(s.read_be_u32()?))),
        27 => Ok(f64::from_bits(s.read_be_u64()?)),
        _ => Err(Error::type_mismatch(ErrorCode::ExpectedNumber, offset)),
    }
}

/// Decode a generic number (integer or float) at `offset`.
///
/// # Errors
///
/// Returns `ExpectedNumber` if the item is neither an integer nor a float.
pub fn read_number(input: Input<'_>, offset: usize) -> Result<Number, Error> {
    match major_type(input, offset)? {
        MajorType::UnsignedInteger | MajorType::NegativeInteger => {
            read_int(input, offset).map(Number::Int)
        }
        MajorType::FloatOrSimple => read_float(input, offset).map(Number::Float),
        _ => Err(Error::type_mismatch(ErrorCode::ExpectedNumber, offset)),
    }
}

/// Decode a text string (major type 3) at `offset`.
///
/// Definite-length strings borrow from the input; indefinite-length strings
/// are the concatenation of their definite chunks and come back owned. Each
/// chunk must itself be valid UTF-8.
///
/// # Errors
///
/// Returns `ExpectedString` on major-type mismatch, `Utf8Invalid` for bad
/// payload bytes, `InvalidChunk` for malformed indefinite chunks.
pub fn read_text(input: Input<'_>, offset: usize) -> Result<Cow<'_, str>, Error> {
    let ib = head_byte(input, offset)?;
    if MajorType::from_head_byte(ib) != MajorType::TextString {
        return Err(Error::type_mismatch(ErrorCode::ExpectedString, offset));
    }
    let mut s = CborStream::new(input, offset + 1);
    match s.read_len_arg(ib & 0x1f, offset)? {
        Length::Definite(n) => {
            let n = len_to_usize(n, offset)?;
            let payload = s.read_exact(n)?;
            let text = utf8::validate(payload)
                .map_err(|()| Error::format(ErrorCode::Utf8Invalid, offset))?;
            Ok(Cow::Borrowed(text))
        }
        Length::Indefinite => {
            let mut out = String::new();
            each_chunk(&mut s, 3, |chunk_off, payload| {
                let text = utf8::validate(payload)
                    .map_err(|()| Error::format(ErrorCode::Utf8Invalid, chunk_off))?;
                out.push_str(text);
                Ok(())
            })?;
            Ok(Cow::Owned(out))
        }
    }
}

/// Decode a byte string (major type 2) at `offset`.
///
/// Definite-length strings borrow from the input; indefinite-length strings
/// are the concatenation of their definite chunks and come back owned.
///
/// # Errors
///
/// Returns `ExpectedBytes` on major-type mismatch, `InvalidChunk` for
/// malformed indefinite chunks.
pub fn read_byte_string(input: Input<'_>, offset: usize) -> Result<Cow<'_, [u8]>, Error> {
    let ib = head_byte(input, offset)?;
    if MajorType::from_head_byte(ib) != MajorType::ByteString {
        return Err(Error::type_mismatch(ErrorCode::ExpectedBytes, offset));
    }
    let mut s = CborStream::new(input, offset + 1);
    match s.read_len_arg(ib & 0x1f, offset)? {
        Length::Definite(n) => {
            let n = len_to_usize(n, offset)?;
            Ok(Cow::Borrowed(s.read_exact(n)?))
        }
        Length::Indefinite => {
            let mut out = Vec::new();
            each_chunk(&mut s, 2, |_, payload| {
                out.extend_from_slice(payload);
                Ok(())
            })?;
            Ok(Cow::Owned(out))
        }
    }
}

/// End offset (exclusive) of the complete item starting at `start`.
///
/// Walks the item iteratively, tracking remaining child counts per open
/// container, so deeply nested input cannot exhaust the call stack. The exact
/// byte span of the item is `start..value_end(input, start)`, covering head,
/// length extension, payload, and any break markers.
///
/// # Errors
///
/// Returns format errors for truncation, reserved encodings, stray break
/// markers, and `DepthLimitExceeded` past [`MAX_NESTING_DEPTH`].
pub fn value_end(input: Input<'_>, start: usize) -> Result<usize, Error> {
    const INDEFINITE: usize = usize::MAX;

    fn push_frame(stack: &mut Vec<usize>, frame: usize, off: usize) -> Result<(), Error> {
        if stack.len() >= MAX_NESTING_DEPTH {
            return Err(Error::format(ErrorCode::DepthLimitExceeded, off));
        }
        stack.push(frame);
        Ok(())
    }

    let mut s = CborStream::new(input, start);
    let mut stack: Vec<usize> = vec![1];

    while let Some(top) = stack.last_mut() {
        if *top == 0 {
            stack.pop();
            continue;
        }
        if *top == INDEFINITE {
            if input.read_byte(s.position())? == BREAK {
                s.skip(1)?;
                stack.pop();
                continue;
            }
        } else {
            *top -= 1;
        }

        let off = s.position();
        let ib = s.read_u8()?;
        let ai = ib & 0x1f;

        match MajorType::from_head_byte(ib) {
            MajorType::UnsignedInteger | MajorType::NegativeInteger => {
                s.read_uint_arg(ai, off)?;
            }
            MajorType::ByteString | MajorType::TextString => match s.read_len_arg(ai, off)? {
                Length::Definite(n) => s.skip(len_to_usize(n, off)?)?,
                Length::Indefinite => each_chunk(&mut s, ib >> 5, |_, _| Ok(()))?,
            },
            MajorType::Sequence => match s.read_len_arg(ai, off)? {
                Length::Definite(n) => push_frame(&mut stack, len_to_usize(n, off)?, off)?,
                Length::Indefinite => push_frame(&mut stack, INDEFINITE, off)?,
            },
            MajorType::Dictionary => match s.read_len_arg(ai, off)? {
                Length::Definite(n) => {
                    let items = len_to_usize(n, off)?
                        .checked_mul(2)
                        .ok_or(Error::format(ErrorCode::LengthOverflow, off))?;
                    push_frame(&mut stack, items, off)?;
                }
                Length::Indefinite => push_frame(&mut stack, INDEFINITE, off)?,
            },
            MajorType::SemanticTag => {
                s.read_uint_arg(ai, off)?;
                push_frame(&mut stack, 1, off)?;
            }
            MajorType::FloatOrSimple => match ai {
                0..=23 => {}
                24 => s.skip(1)?,
                25 => s.skip(2)?,
                26 => s.skip(4)?,
                27 => s.skip(8)?,
                31 => return Err(Error::format(ErrorCode::UnexpectedBreak, off)),
                _ => return Err(Error::format(ErrorCode::ReservedAdditionalInfo, off)),
            },
        }
    }

    Ok(s.position())
}

/// Total byte length of the item starting at `offset`.
///
/// # Errors
///
/// Same failure modes as [`value_end`].
pub fn item_byte_len(input: Input<'_>, offset: usize) -> Result<usize, Error> {
    Ok(value_end(input, offset)? - offset)
}

pub(crate) fn len_to_usize(len: u64, off: usize) -> Result<usize, Error> {
    usize::try_from(len).map_err(|_| Error::format(ErrorCode::LengthOverflow, off))
}

/// Iterate the definite chunks of an indefinite-length string, stopping at the
/// break marker. The cursor must sit just past the indefinite head byte.
fn each_chunk<'a>(
    s: &mut CborStream<'a>,
    major_bits: u8,
    mut f: impl FnMut(usize, &'a [u8]) -> Result<(), Error>,
) -> Result<(), Error> {
    loop {
        let off = s.position();
        let ib = s.read_u8()?;
        if ib == BREAK {
            return Ok(());
        }
        if ib >> 5 != major_bits || ib & 0x1f == 31 {
            return Err(Error::format(ErrorCode::InvalidChunk, off));
        }
        let n = s.read_uint_arg(ib & 0x1f, off)?;
        let payload = s.read_exact(len_to_usize(n, off)?)?;
        f(off, payload)?;
    }
}
