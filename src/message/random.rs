use std::time::{SystemTime, UNIX_EPOCH};

use nom::bytes::complete::take;
use nom::number::complete::be_u32;
use nom::IResult;
use rand::RngCore;

pub const RANDOM_LEN: usize = 32;

/// The 32 byte hello random, `gmt_unix_time` followed by 28 random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Random {
    pub gmt_unix_time: u32,
    pub random_bytes: [u8; 28],
}

impl Random {
    pub fn new() -> Self {
        let mut random = Random::default();
        random.populate();
        random
    }

    /// Fill with the current time and fresh random bytes.
    pub fn populate(&mut self) {
        let gmt = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        // Valid until 2106.
        self.gmt_unix_time = gmt.as_secs() as u32;
        rand::thread_rng().fill_bytes(&mut self.random_bytes);
    }

    /// The wire form, as fed into the PRF.
    pub fn to_bytes(&self) -> [u8; RANDOM_LEN] {
        let mut out = [0; RANDOM_LEN];
        out[..4].copy_from_slice(&self.gmt_unix_time.to_be_bytes());
        out[4..].copy_from_slice(&self.random_bytes);
        out
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Random> {
        let (input, gmt_unix_time) = be_u32(input)?;
        let (input, input_rand) = take(28_usize)(input)?;
        let mut random_bytes = [0u8; 28];
        random_bytes.copy_from_slice(input_rand);

        Ok((
            input,
            Random {
                gmt_unix_time,
                random_bytes,
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&self.gmt_unix_time.to_be_bytes());
        output.extend_from_slice(&self.random_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x5F, 0x37, 0xA9, 0x4B, // gmt_unix_time
        0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, //
        0x0F, 0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1A, 0x1B, 0x1C,
    ];

    #[test]
    fn random_parse() {
        let (rest, parsed) = Random::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.gmt_unix_time, 0x5F37A94B);
        assert_eq!(parsed.to_bytes().as_slice(), MESSAGE);
    }

    #[test]
    fn populate_changes_bytes() {
        let a = Random::new();
        let b = Random::new();
        assert_ne!(a.random_bytes, b.random_bytes);
        assert!(a.gmt_unix_time > 0);
    }
}
