use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

use crate::Error;

/// Application-Layer Protocol Negotiation extension, RFC 7301.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlpnExtension {
    pub protocol_name_list: Vec<String>,
}

impl AlpnExtension {
    pub fn new(protocols: &[String]) -> Self {
        AlpnExtension {
            protocol_name_list: protocols.to_vec(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], AlpnExtension> {
        let (input, list) = length_data(be_u16)(input)?;

        let mut protocol_name_list = Vec::new();
        let mut rest = list;
        while !rest.is_empty() {
            let (r, name) = length_data(be_u8)(rest)?;
            protocol_name_list.push(String::from_utf8_lossy(name).into_owned());
            rest = r;
        }

        if protocol_name_list.is_empty() {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::LengthValue,
            )));
        }

        Ok((input, AlpnExtension { protocol_name_list }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let len: usize = self.protocol_name_list.iter().map(|p| p.len() + 1).sum();
        output.extend_from_slice(&(len as u16).to_be_bytes());
        for protocol in &self.protocol_name_list {
            output.push(protocol.len() as u8);
            output.extend_from_slice(protocol.as_bytes());
        }
    }
}

/// Server side protocol selection.
///
/// Picks the first of our protocols the peer also offered. `Ok(None)` when
/// either side has nothing configured.
pub fn select_protocol(
    supported: &[String],
    peer_supported: &[String],
) -> Result<Option<String>, Error> {
    if supported.is_empty() || peer_supported.is_empty() {
        return Ok(None);
    }
    supported
        .iter()
        .find(|p| peer_supported.contains(p))
        .cloned()
        .map(Some)
        .ok_or(Error::NoApplicationProtocol)
}
