use nom::combinator::all_consuming;
use nom::multi::length_data;
use nom::number::complete::be_u8;
use nom::IResult;
use tinyvec::ArrayVec;

use crate::util::many0;

codepoints! {
    /// EC point format, RFC 4492 5.1.2.
    pub enum ECPointFormat: u8 [from_u8, as_u8, be_u8] {
        Uncompressed = 0,
        AnsiX962CompressedPrime = 1,
        AnsiX962CompressedChar2 = 2,
    }
}

/// ECPointFormats extension. We only ever offer uncompressed points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ECPointFormatsExtension {
    pub formats: ArrayVec<[ECPointFormat; 8]>,
}

impl ECPointFormatsExtension {
    pub fn uncompressed() -> Self {
        let mut formats = ArrayVec::new();
        formats.push(ECPointFormat::Uncompressed);
        ECPointFormatsExtension { formats }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ECPointFormatsExtension> {
        let (input, data) = length_data(be_u8)(input)?;
        let (_, formats) = all_consuming(many0(ECPointFormat::parse))(data)?;
        Ok((input, ECPointFormatsExtension { formats }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.formats.len() as u8);
        for format in &self.formats {
            format.serialize(output);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncompressed_only() {
        let mut out = Vec::new();
        ECPointFormatsExtension::uncompressed().serialize(&mut out);
        assert_eq!(out, &[0x01, 0x00]);

        let (_, parsed) = ECPointFormatsExtension::parse(&[0x02, 0x00, 0x01]).unwrap();
        assert_eq!(
            parsed.formats.as_slice(),
            &[ECPointFormat::Uncompressed, ECPointFormat::AnsiX962CompressedPrime]
        );
    }
}
