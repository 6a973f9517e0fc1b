use nom::number::complete::{be_u16, be_u8};

codepoints! {
    /// Named groups for ECDHE key exchange (RFC 8422).
    ///
    /// Key exchange is implemented for X25519, P-256 and P-384. Other values
    /// are parsed so a peer's list can be inspected.
    pub enum NamedCurve: u16 [from_u16, as_u16, be_u16] {
        Secp256r1 = 23,
        Secp384r1 = 24,
        Secp521r1 = 25,
        X25519 = 29,
        X448 = 30,
    }
}

impl NamedCurve {
    /// Whether [`crate::crypto::KeyPair`] can generate keys on this curve.
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            NamedCurve::Secp256r1 | NamedCurve::Secp384r1 | NamedCurve::X25519
        )
    }
}

codepoints! {
    pub enum CurveType: u8 [from_u8, as_u8, be_u8] {
        ExplicitPrime = 1,
        ExplicitChar2 = 2,
        NamedCurve = 3,
    }
}
