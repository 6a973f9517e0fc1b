use nom::multi::length_data;
use nom::number::complete::be_u8;
use nom::IResult;

/// RenegotiationInfo extension, RFC 5746 3.2.
///
/// Renegotiation is never performed, so the body is always empty on the wire
/// from our side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RenegotiationInfoExtension {
    pub renegotiated_connection: Vec<u8>,
}

impl RenegotiationInfoExtension {
    pub fn parse(input: &[u8]) -> IResult<&[u8], RenegotiationInfoExtension> {
        let (input, data) = length_data(be_u8)(input)?;
        Ok((
            input,
            RenegotiationInfoExtension {
                renegotiated_connection: data.to_vec(),
            },
        ))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.renegotiated_connection.len() as u8);
        output.extend_from_slice(&self.renegotiated_connection);
    }
}
