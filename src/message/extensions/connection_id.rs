use nom::multi::length_data;
use nom::number::complete::be_u8;
use nom::IResult;

/// ConnectionId extension, RFC 9146 3.
///
/// An empty id means "I support connection ids but do not need you to
/// send one".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionIdExtension {
    pub cid: Vec<u8>,
}

impl ConnectionIdExtension {
    pub fn new(cid: &[u8]) -> Self {
        ConnectionIdExtension { cid: cid.to_vec() }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ConnectionIdExtension> {
        let (input, cid) = length_data(be_u8)(input)?;
        Ok((input, ConnectionIdExtension { cid: cid.to_vec() }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.push(self.cid.len() as u8);
        output.extend_from_slice(&self.cid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cid_is_present() {
        let mut out = Vec::new();
        ConnectionIdExtension::new(&[]).serialize(&mut out);
        assert_eq!(out, &[0x00]);

        let (_, parsed) = ConnectionIdExtension::parse(&out).unwrap();
        assert!(parsed.cid.is_empty());
    }
}
