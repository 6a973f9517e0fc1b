use std::fmt;
use std::ops::Deref;

use nom::bytes::complete::take;
use nom::combinator::verify;
use nom::number::complete::be_u8;
use nom::IResult;
use rand::RngCore;

use crate::error::InvalidLength;

/// Session identifier sent in the hellos, at most 32 bytes.
pub type SessionId = OpaqueId<32>;

/// HelloVerifyRequest cookie, at most 255 bytes.
pub type Cookie = OpaqueId<255>;

/// Opaque byte string with a u8 length prefix and at most `MAX` bytes,
/// stored inline so hellos stay `Copy`.
#[derive(Clone, Copy)]
pub struct OpaqueId<const MAX: usize> {
    bytes: [u8; MAX],
    len: usize,
}

impl<const MAX: usize> OpaqueId<MAX> {
    pub fn empty() -> Self {
        OpaqueId {
            bytes: [0; MAX],
            len: 0,
        }
    }

    pub fn try_new(data: &[u8]) -> Result<Self, InvalidLength> {
        if data.len() > MAX {
            return Err(InvalidLength {
                name: "opaque id",
                min: 0,
                max: MAX,
                actual: data.len(),
            });
        }
        let mut id = Self::empty();
        id.bytes[..data.len()].copy_from_slice(data);
        id.len = data.len();
        Ok(id)
    }

    /// `len` random bytes, capped at `MAX`.
    pub fn random(len: usize) -> Self {
        let mut id = Self::empty();
        id.len = len.min(MAX);
        rand::thread_rng().fill_bytes(&mut id.bytes[..id.len]);
        id
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, len) = verify(be_u8, |len: &u8| *len as usize <= MAX)(input)?;
        let (input, data) = take(len)(input)?;
        let mut id = Self::empty();
        id.bytes[..data.len()].copy_from_slice(data);
        id.len = data.len();
        Ok((input, id))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.len as u8);
        output.extend_from_slice(self);
    }
}

impl<const MAX: usize> Default for OpaqueId<MAX> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<const MAX: usize> Deref for OpaqueId<MAX> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl<const MAX: usize> PartialEq for OpaqueId<MAX> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<const MAX: usize> Eq for OpaqueId<MAX> {}

impl<const MAX: usize> fmt::Debug for OpaqueId<MAX> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueId<{}>({:02x?})", MAX, &**self)
    }
}

impl<const MAX: usize> TryFrom<&[u8]> for OpaqueId<MAX> {
    type Error = InvalidLength;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::try_new(value)
    }
}
