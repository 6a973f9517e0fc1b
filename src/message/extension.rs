use nom::combinator::{all_consuming, complete};
use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;

use super::extensions::*;

/// Hello extension with its body decoded.
///
/// Extensions this crate does not act on are kept opaque so a parsed hello
/// can be serialized back byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    ServerName(ServerNameExtension),
    SupportedEllipticCurves(SupportedGroupsExtension),
    SupportedPointFormats(ECPointFormatsExtension),
    SupportedSignatureAlgorithms(SignatureAlgorithmsExtension),
    UseSrtp(UseSrtpExtension),
    Alpn(AlpnExtension),
    UseExtendedMasterSecret,
    ConnectionId(ConnectionIdExtension),
    RenegotiationInfo(RenegotiationInfoExtension),
    Unknown {
        extension_type: ExtensionType,
        data: Vec<u8>,
    },
}

impl Extension {
    pub fn extension_type(&self) -> ExtensionType {
        match self {
            Extension::ServerName(_) => ExtensionType::ServerName,
            Extension::SupportedEllipticCurves(_) => ExtensionType::SupportedGroups,
            Extension::SupportedPointFormats(_) => ExtensionType::EcPointFormats,
            Extension::SupportedSignatureAlgorithms(_) => ExtensionType::SignatureAlgorithms,
            Extension::UseSrtp(_) => ExtensionType::UseSrtp,
            Extension::Alpn(_) => ExtensionType::ApplicationLayerProtocolNegotiation,
            Extension::UseExtendedMasterSecret => ExtensionType::ExtendedMasterSecret,
            Extension::ConnectionId(_) => ExtensionType::ConnectionId,
            Extension::RenegotiationInfo(_) => ExtensionType::RenegotiationInfo,
            Extension::Unknown { extension_type, .. } => *extension_type,
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], Extension> {
        let (input, extension_type) = ExtensionType::parse(input)?;
        let (input, data) = length_data(be_u16)(input)?;

        let extension = match extension_type {
            ExtensionType::ServerName if data.is_empty() => {
                // A server acknowledges SNI with an empty body.
                Extension::ServerName(ServerNameExtension::new(""))
            }
            ExtensionType::ServerName => {
                Extension::ServerName(all_consuming(ServerNameExtension::parse)(data)?.1)
            }
            ExtensionType::SupportedGroups => Extension::SupportedEllipticCurves(
                all_consuming(SupportedGroupsExtension::parse)(data)?.1,
            ),
            ExtensionType::EcPointFormats => Extension::SupportedPointFormats(
                all_consuming(ECPointFormatsExtension::parse)(data)?.1,
            ),
            ExtensionType::SignatureAlgorithms => Extension::SupportedSignatureAlgorithms(
                all_consuming(SignatureAlgorithmsExtension::parse)(data)?.1,
            ),
            ExtensionType::UseSrtp => {
                Extension::UseSrtp(all_consuming(UseSrtpExtension::parse)(data)?.1)
            }
            ExtensionType::ApplicationLayerProtocolNegotiation => {
                Extension::Alpn(all_consuming(AlpnExtension::parse)(data)?.1)
            }
            ExtensionType::ExtendedMasterSecret => Extension::UseExtendedMasterSecret,
            ExtensionType::ConnectionId => {
                Extension::ConnectionId(all_consuming(ConnectionIdExtension::parse)(data)?.1)
            }
            ExtensionType::RenegotiationInfo => Extension::RenegotiationInfo(
                all_consuming(RenegotiationInfoExtension::parse)(data)?.1,
            ),
            ExtensionType::Unknown(_) => Extension::Unknown {
                extension_type,
                data: data.to_vec(),
            },
        };

        Ok((input, extension))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let mut body = Vec::new();
        match self {
            Extension::ServerName(e) => e.serialize(&mut body),
            Extension::SupportedEllipticCurves(e) => e.serialize(&mut body),
            Extension::SupportedPointFormats(e) => e.serialize(&mut body),
            Extension::SupportedSignatureAlgorithms(e) => e.serialize(&mut body),
            Extension::UseSrtp(e) => e.serialize(&mut body),
            Extension::Alpn(e) => e.serialize(&mut body),
            Extension::UseExtendedMasterSecret => {}
            Extension::ConnectionId(e) => e.serialize(&mut body),
            Extension::RenegotiationInfo(e) => e.serialize(&mut body),
            Extension::Unknown { data, .. } => body.extend_from_slice(data),
        }

        self.extension_type().serialize(output);
        output.extend_from_slice(&(body.len() as u16).to_be_bytes());
        output.extend_from_slice(&body);
    }

    /// Parse the optional extensions block at the end of a hello.
    ///
    /// An absent block (no bytes left) is an empty list.
    pub fn parse_list(input: &[u8]) -> IResult<&[u8], Vec<Extension>> {
        if input.is_empty() {
            return Ok((input, Vec::new()));
        }
        let (input, data) = length_data(be_u16)(input)?;

        let mut extensions = Vec::new();
        let mut rest = data;
        while !rest.is_empty() {
            let (r, extension) = complete(Extension::parse)(rest)?;
            extensions.push(extension);
            rest = r;
        }

        Ok((input, extensions))
    }

    pub fn serialize_list(extensions: &[Extension], output: &mut Vec<u8>) {
        let mut body = Vec::new();
        for extension in extensions {
            extension.serialize(&mut body);
        }
        output.extend_from_slice(&(body.len() as u16).to_be_bytes());
        output.extend_from_slice(&body);
    }
}

codepoints! {
    pub enum ExtensionType: u16 [from_u16, as_u16, be_u16] {
        ServerName = 0x0000,
        SupportedGroups = 0x000A,
        EcPointFormats = 0x000B,
        SignatureAlgorithms = 0x000D,
        UseSrtp = 0x000E,
        ApplicationLayerProtocolNegotiation = 0x0010,
        ExtendedMasterSecret = 0x0017,
        ConnectionId = 0x0036,
        RenegotiationInfo = 0xFF01,
    }
}
