//! Typed bodies of the hello extensions this crate negotiates.

pub mod alpn;
pub mod connection_id;
pub mod ec_point_formats;
pub mod renegotiation_info;
pub mod server_name;
pub mod signature_algorithms;
pub mod supported_groups;
pub mod use_srtp;

pub use alpn::AlpnExtension;
pub use connection_id::ConnectionIdExtension;
pub use ec_point_formats::{ECPointFormat, ECPointFormatsExtension};
pub use renegotiation_info::RenegotiationInfoExtension;
pub use server_name::ServerNameExtension;
pub use signature_algorithms::SignatureAlgorithmsExtension;
pub use supported_groups::SupportedGroupsExtension;
pub use use_srtp::UseSrtpExtension;
