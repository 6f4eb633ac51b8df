use crate::decode::Length;
use crate::input::Input;
use crate::{Error, ErrorCode};

/// Internal advancing reader over an [`Input`].
///
/// Offsets handed to the public decoder API are absolute; this cursor exists
/// so multi-byte head arguments can be consumed sequentially.
#[derive(Clone, Copy)]
pub(crate) struct CborStream<'a> {
    input: Input<'a>,
    pos: usize,
}

impl<'a> CborStream<'a> {
    pub(crate) const fn new(input: Input<'a>, pos: usize) -> Self {
        Self { input, pos }
    }

    pub(crate) const fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        let b = self.input.read_byte(self.pos)?;
        self.pos += 1;
        Ok(b)
    }

    pub(crate) fn read_exact(&mut self, n: usize) -> Result<&'a [u8], Error> {
        let s = self.input.read_bytes(self.pos, n)?;
        self.pos += n;
        Ok(s)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), Error> {
        let end = self
            .pos
            .checked_add(n)
            .ok_or(Error::format(ErrorCode::LengthOverflow, self.pos))?;
        if end > self.input.len() {
            return Err(Error::format(ErrorCode::UnexpectedEof, self.pos));
        }
        self.pos = end;
        Ok(())
    }

    pub(crate) fn read_be_u16(&mut self) -> Result<u16, Error> {
        let s = self.read_exact(2)?;
        Ok(u16::from_be_bytes([s[0], s[1]]))
    }

    pub(crate) fn read_be_u32(&mut self) -> Result<u32, Error> {
        let s = self.read_exact(4)?;
        Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
    }

    pub(crate) fn read_be_u64(&mut self) -> Result<u64, Error> {
        let s = self.read_exact(8)?;
        Ok(u64::from_be_bytes([
            s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7],
        ]))
    }

    /// Read the head argument for additional-info `ai`.
    ///
    /// Indefinite (31) is rejected here; container decoding goes through
    /// [`CborStream::read_len_arg`] instead.
    pub(crate) fn read_uint_arg(&mut self, ai: u8, off: usize) -> Result<u64, Error> {
        match ai {
            0..=23 => Ok(u64::from(ai)),
            24 => Ok(u64::from(self.read_u8()?)),
            25 => Ok(u64::from(self.read_be_u16()?)),
            26 => Ok(u64::from(self.read_be_u32()?)),
            27 => self.read_be_u64(),
            31 => Err(Error::format(ErrorCode::IndefiniteLengthIllegal, off)),
            _ => Err(Error::format(ErrorCode::ReservedAdditionalInfo, off)),
        }
    }

    /// Read the length argument for a string or container head.
    pub(crate) fn read_len_arg(&mut self, ai: u8, off: usize) -> Result<Length, Error> {
        if ai == 31 {
            return Ok(Length::Indefinite);
        }
        self.read_uint_arg(ai, off).map(Length::Definite)
    }
}
