use nom::multi::length_data;
use nom::number::complete::{be_u16, be_u8};
use nom::IResult;

const HOST_NAME: u8 = 0;

/// ServerName (SNI) extension, RFC 6066 3. Only host_name entries are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerNameExtension {
    pub server_name: String,
}

impl ServerNameExtension {
    pub fn new(server_name: &str) -> Self {
        ServerNameExtension {
            server_name: server_name.to_string(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], ServerNameExtension> {
        let (input, list) = length_data(be_u16)(input)?;

        let mut server_name = String::new();
        let mut rest = list;
        while !rest.is_empty() {
            let (r, name_type) = be_u8(rest)?;
            let (r, name) = length_data(be_u16)(r)?;
            if name_type == HOST_NAME && server_name.is_empty() {
                server_name = String::from_utf8_lossy(name).into_owned();
            }
            rest = r;
        }

        Ok((input, ServerNameExtension { server_name }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        let name = self.server_name.as_bytes();
        output.extend_from_slice(&((name.len() + 3) as u16).to_be_bytes());
        output.push(HOST_NAME);
        output.extend_from_slice(&(name.len() as u16).to_be_bytes());
        output.extend_from_slice(name);
    }
}
