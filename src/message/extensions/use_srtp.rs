use nom::bytes::complete::take;
use nom::combinator::all_consuming;
use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;
use tinyvec::ArrayVec;

use crate::message::SrtpProtectionProfile;
use crate::util::many0;

/// UseSrtp extension, RFC 5764 4.1.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UseSrtpExtension {
    pub profiles: ArrayVec<[SrtpProtectionProfile; 16]>,
    /// MKI value, usually empty.
    pub mki: Vec<u8>,
}

impl UseSrtpExtension {
    pub fn new(profiles: &[SrtpProtectionProfile]) -> Self {
        UseSrtpExtension {
            profiles: profiles.iter().copied().take(16).collect(),
            mki: Vec::new(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], UseSrtpExtension> {
        let (input, data) = length_data(be_u16)(input)?;
        let (_, profiles) = all_consuming(many0(SrtpProtectionProfile::parse))(data)?;

        let (input, mki_length) = be_u8(input)?;
        let (input, mki) = take(mki_length)(input)?;

        Ok((
            input,
            UseSrtpExtension {
                profiles,
                mki: mki.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&((self.profiles.len() * 2) as u16).to_be_bytes());
        for profile in &self.profiles {
            profile.serialize(output);
        }
        output.push(self.mki.len() as u8);
        output.extend_from_slice(&self.mki);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MESSAGE: &[u8] = &[
        0x00, 0x04, // profiles length
        0x00, 0x07, // SRTP_AEAD_AES_128_GCM
        0x00, 0x01, // SRTP_AES128_CM_HMAC_SHA1_80
        0x00, // MKI length
    ];

    #[test]
    fn parse_use_srtp() {
        let (rest, ext) = UseSrtpExtension::parse(MESSAGE).unwrap();
        assert!(rest.is_empty());
        assert_eq!(
            ext.profiles.as_slice(),
            &[
                SrtpProtectionProfile::AeadAes128Gcm,
                SrtpProtectionProfile::Aes128CmHmacSha1_80
            ]
        );
        assert!(ext.mki.is_empty());

        let mut out = Vec::new();
        ext.serialize(&mut out);
        assert_eq!(out, MESSAGE);
    }
}
