use nom::combinator::all_consuming;
use nom::multi::length_data;
use nom::number::complete::be_u16;
use nom::IResult;
use tinyvec::ArrayVec;

use crate::message::NamedCurve;
use crate::util::many0;

/// SupportedGroups (formerly EllipticCurves) extension, RFC 8422 5.1.1.
///
/// Unknown groups are kept so the list order of the peer is preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedGroupsExtension {
    pub groups: ArrayVec<[NamedCurve; 32]>,
}

impl SupportedGroupsExtension {
    pub fn new(curves: &[NamedCurve]) -> Self {
        SupportedGroupsExtension {
            groups: curves.iter().copied().take(32).collect(),
        }
    }

    pub fn parse(input: &[u8]) -> IResult<&[u8], SupportedGroupsExtension> {
        let (input, data) = length_data(be_u16)(input)?;
        let (_, groups) = all_consuming(many0(NamedCurve::parse))(data)?;
        Ok((input, SupportedGroupsExtension { groups }))
    }

    pub fn serialize(&self, output: &mut Vec<u8>) {
        output.extend_from_slice(&((self.groups.len() * 2) as u16).to_be_bytes());
        for group in &self.groups {
            group.serialize(output);
        }
    }
}
