//! TLS 1.2 PRF and the secrets derived from it (RFC 5246 5, 8.1, 6.3).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

use crate::message::HashAlgorithm;
use crate::Error;

pub const MASTER_SECRET_LEN: usize = 48;
pub const VERIFY_DATA_LEN: usize = 12;

const LABEL_MASTER_SECRET: &str = "master secret";
const LABEL_EXTENDED_MASTER_SECRET: &str = "extended master secret";
const LABEL_KEY_EXPANSION: &str = "key expansion";
const LABEL_CLIENT_FINISHED: &str = "client finished";
const LABEL_SERVER_FINISHED: &str = "server finished";

/// PRF(secret, label, seed) = P_<hash>(secret, label + seed)
pub fn prf(
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let mut full_seed = Vec::with_capacity(label.len() + seed.len());
    full_seed.extend_from_slice(label.as_bytes());
    full_seed.extend_from_slice(seed);

    let mut out = Vec::with_capacity(output_len);

    // A(1) = HMAC_hash(secret, A(0)) where A(0) = seed
    let mut a = hmac(hash, secret, &[&full_seed])?;

    while out.len() < output_len {
        let chunk = hmac(hash, secret, &[&a, &full_seed])?;
        let to_copy = (output_len - out.len()).min(chunk.len());
        out.extend_from_slice(&chunk[..to_copy]);

        if out.len() < output_len {
            a = hmac(hash, secret, &[&a])?;
        }
    }

    Ok(out)
}

fn hmac(hash: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    macro_rules! run {
        ($digest:ty) => {{
            let mut mac = Hmac::<$digest>::new_from_slice(key)
                .map_err(|_| Error::Crypto("invalid HMAC key length".into()))?;
            for part in parts {
                mac.update(part);
            }
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }

    match hash {
        HashAlgorithm::SHA256 => run!(Sha256),
        HashAlgorithm::SHA384 => run!(Sha384),
        HashAlgorithm::SHA512 => run!(Sha512),
        _ => Err(Error::Crypto(format!("unsupported PRF hash: {:?}", hash))),
    }
}

/// Digest `data` with the given hash.
pub fn digest(hash: HashAlgorithm, data: &[u8]) -> Result<Vec<u8>, Error> {
    match hash {
        HashAlgorithm::SHA256 => Ok(Sha256::digest(data).to_vec()),
        HashAlgorithm::SHA384 => Ok(Sha384::digest(data).to_vec()),
        HashAlgorithm::SHA512 => Ok(Sha512::digest(data).to_vec()),
        _ => Err(Error::Crypto(format!("unsupported hash: {:?}", hash))),
    }
}

/// master_secret = PRF(pre_master_secret, "master secret", client_random + server_random)
pub fn master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);

    prf(
        pre_master_secret,
        LABEL_MASTER_SECRET,
        &seed,
        MASTER_SECRET_LEN,
        hash,
    )
    .map(Zeroizing::new)
}

/// RFC 7627: the seed is the hash of the handshake up to and including
/// ClientKeyExchange.
pub fn extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
    hash: HashAlgorithm,
) -> Result<Zeroizing<Vec<u8>>, Error> {
    prf(
        pre_master_secret,
        LABEL_EXTENDED_MASTER_SECRET,
        session_hash,
        MASTER_SECRET_LEN,
        hash,
    )
    .map(Zeroizing::new)
}

pub fn verify_data_client(
    master_secret: &[u8],
    handshake_bodies: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    verify_data(master_secret, handshake_bodies, hash, LABEL_CLIENT_FINISHED)
}

pub fn verify_data_server(
    master_secret: &[u8],
    handshake_bodies: &[u8],
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    verify_data(master_secret, handshake_bodies, hash, LABEL_SERVER_FINISHED)
}

fn verify_data(
    master_secret: &[u8],
    handshake_bodies: &[u8],
    hash: HashAlgorithm,
    label: &str,
) -> Result<Vec<u8>, Error> {
    let transcript_hash = digest(hash, handshake_bodies)?;
    prf(master_secret, label, &transcript_hash, VERIFY_DATA_LEN, hash)
}

/// Traffic keys cut from the key block.
pub struct EncryptionKeys {
    pub client_write_key: Zeroizing<Vec<u8>>,
    pub server_write_key: Zeroizing<Vec<u8>>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// key_block = PRF(master_secret, "key expansion", server_random + client_random)
pub fn key_expansion(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    key_len: usize,
    iv_len: usize,
    hash: HashAlgorithm,
) -> Result<EncryptionKeys, Error> {
    let mut seed = Vec::with_capacity(client_random.len() + server_random.len());
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    // AEAD suites have no MAC keys.
    let block = Zeroizing::new(prf(
        master_secret,
        LABEL_KEY_EXPANSION,
        &seed,
        2 * key_len + 2 * iv_len,
        hash,
    )?);

    let (client_write_key, rest) = block.split_at(key_len);
    let (server_write_key, rest) = rest.split_at(key_len);
    let (client_write_iv, server_write_iv) = rest.split_at(iv_len);

    Ok(EncryptionKeys {
        client_write_key: Zeroizing::new(client_write_key.to_vec()),
        server_write_key: Zeroizing::new(server_write_key.to_vec()),
        client_write_iv: client_write_iv.to_vec(),
        server_write_iv: server_write_iv.to_vec(),
    })
}

/// RFC 4279 2: a run of zeros as long as the PSK, followed by the PSK.
pub fn psk_pre_master_secret(psk: &[u8]) -> Zeroizing<Vec<u8>> {
    let len = (psk.len() as u16).to_be_bytes();
    let mut out = Zeroizing::new(Vec::with_capacity(4 + 2 * psk.len()));
    out.extend_from_slice(&len);
    out.extend(std::iter::repeat(0).take(psk.len()));
    out.extend_from_slice(&len);
    out.extend_from_slice(psk);
    out
}

/// RFC 5705 keying material exporter.
pub fn export_keying_material(
    master_secret: &[u8],
    label: &str,
    context: Option<&[u8]>,
    client_random: &[u8],
    server_random: &[u8],
    length: usize,
    hash: HashAlgorithm,
) -> Result<Vec<u8>, Error> {
    let reserved = [
        LABEL_CLIENT_FINISHED,
        LABEL_SERVER_FINISHED,
        LABEL_MASTER_SECRET,
        LABEL_KEY_EXPANSION,
    ];
    if reserved.contains(&label) {
        return Err(Error::Crypto(format!("reserved exporter label: {}", label)));
    }

    let mut seed = Vec::with_capacity(client_random.len() + server_random.len() + 2);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    if let Some(context) = context {
        let len = u16::try_from(context.len())
            .map_err(|_| Error::Crypto("exporter context too long".into()))?;
        seed.extend_from_slice(&len.to_be_bytes());
        seed.extend_from_slice(context);
    }

    prf(master_secret, label, &seed, length, hash)
}
