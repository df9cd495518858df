//! Digest placement and HMAC-SHA256 helpers shared by both sides of the handshake

use super::errors::HandshakeError;
use hmac::{Hmac, Mac, NewMac};
use sha2::Sha256;

pub const PACKET_SIZE: usize = 1536;
pub const DIGEST_SIZE: usize = 32;

/// Offset of the signature inside a packet 2
pub const SIGNATURE_OFFSET: usize = PACKET_SIZE - DIGEST_SIZE;

const RANDOM_CRUD: [u8; 32] = [
    0xf0, 0xee, 0xc2, 0x4a, 0x80, 0x68, 0xbe, 0xe8, 0x2e, 0x00, 0xd0, 0xd1, 0x02, 0x9e, 0x7e, 0x57,
    0x6e, 0xec, 0x5d, 0x2d, 0x29, 0x80, 0x6f, 0xab, 0x93, 0xb8, 0xe6, 0x36, 0xcf, 0xeb, 0x31, 0xae,
];

const GENUINE_FP_KEY: &[u8] = b"Genuine Adobe Flash Player 001";
const GENUINE_FMS_KEY: &[u8] = b"Genuine Adobe Flash Media Server 001";

type HmacSha256 = Hmac<Sha256>;

/// The two layouts a peer may use to place its digest and public key inside packet 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    One,
    Two,
}

impl Scheme {
    pub fn other(self) -> Scheme {
        match self {
            Scheme::One => Scheme::Two,
            Scheme::Two => Scheme::One,
        }
    }
}

/// Which half of the well known key table to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOwner {
    Client,
    Server,
}

/// The key used to sign packet 1
pub fn partial_key(owner: KeyOwner) -> &'static [u8] {
    match owner {
        KeyOwner::Client => GENUINE_FP_KEY,
        KeyOwner::Server => GENUINE_FMS_KEY,
    }
}

/// The key (with the trailing constant) used to derive the packet 2 signing key
pub fn full_key(owner: KeyOwner) -> Vec<u8> {
    let mut key = partial_key(owner).to_vec();
    key.extend_from_slice(&RANDOM_CRUD);
    key
}

pub fn digest_offset(packet: &[u8], scheme: Scheme) -> usize {
    match scheme {
        Scheme::One => (byte_sum(&packet[8..12]) % 728) + 12,
        Scheme::Two => (byte_sum(&packet[772..776]) % 728) + 776,
    }
}

pub fn public_key_offset(packet: &[u8], scheme: Scheme) -> usize {
    match scheme {
        Scheme::One => (byte_sum(&packet[1532..1536]) % 632) + 772,
        Scheme::Two => (byte_sum(&packet[768..772]) % 632) + 8,
    }
}

pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; DIGEST_SIZE], HandshakeError> {
    let mut mac = HmacSha256::new_varkey(key).map_err(|_| HandshakeError::DigestKeyRejected)?;
    for part in parts {
        mac.update(part);
    }

    let mut digest = [0_u8; DIGEST_SIZE];
    digest.copy_from_slice(&mac.finalize().into_bytes());
    Ok(digest)
}

/// Computes the digest of a packet 1 and writes it into place, returning it
pub fn sign_packet(
    packet: &mut [u8],
    scheme: Scheme,
    owner: KeyOwner,
) -> Result<[u8; DIGEST_SIZE], HandshakeError> {
    let offset = digest_offset(packet, scheme);
    let digest = packet_digest(packet, offset, owner)?;
    packet[offset..offset + DIGEST_SIZE].copy_from_slice(&digest);
    Ok(digest)
}

/// Looks for a valid digest in the peer's packet 1, trying `preferred` first.  Returns the scheme
/// that matched along with the digest.
pub fn find_digest(
    packet: &[u8],
    preferred: Scheme,
    owner: KeyOwner,
) -> Result<Option<(Scheme, [u8; DIGEST_SIZE])>, HandshakeError> {
    for scheme in [preferred, preferred.other()].iter() {
        let offset = digest_offset(packet, *scheme);
        let expected = packet_digest(packet, offset, owner)?;
        if packet[offset..offset + DIGEST_SIZE] == expected[..] {
            return Ok(Some((*scheme, expected)));
        }
    }

    Ok(None)
}

/// Signs a packet 2 in place.  The signature covers everything before it, keyed by a digest
/// of the peer's packet 1 digest.
pub fn sign_response(
    packet: &mut [u8],
    peer_digest: &[u8],
    owner: KeyOwner,
) -> Result<(), HandshakeError> {
    let signature = response_signature(packet, peer_digest, owner)?;
    packet[SIGNATURE_OFFSET..PACKET_SIZE].copy_from_slice(&signature);
    Ok(())
}

pub fn verify_response(
    packet: &[u8],
    own_digest: &[u8],
    owner: KeyOwner,
) -> Result<bool, HandshakeError> {
    let signature = response_signature(packet, own_digest, owner)?;
    Ok(packet[SIGNATURE_OFFSET..PACKET_SIZE] == signature[..])
}

fn response_signature(
    packet: &[u8],
    digest: &[u8],
    owner: KeyOwner,
) -> Result<[u8; DIGEST_SIZE], HandshakeError> {
    let key = hmac_sha256(&full_key(owner), &[digest])?;
    hmac_sha256(&key, &[&packet[..SIGNATURE_OFFSET]])
}

fn packet_digest(
    packet: &[u8],
    offset: usize,
    owner: KeyOwner,
) -> Result<[u8; DIGEST_SIZE], HandshakeError> {
    hmac_sha256(
        partial_key(owner),
        &[&packet[..offset], &packet[offset + DIGEST_SIZE..]],
    )
}

fn byte_sum(bytes: &[u8]) -> usize {
    bytes.iter().map(|byte| *byte as usize).sum()
}
