//! Diffie-Hellman key agreement and the RC4 ciphers used by RTMPE

use super::digest::hmac_sha256;
use super::errors::HandshakeError;
use num_bigint::BigUint;
use rand::RngCore;
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};
use std::fmt;

pub const PUBLIC_KEY_SIZE: usize = 128;

const RC4_KEY_SIZE: usize = 16;
const KEYSTREAM_SKIP: usize = 1536;

/// RFC 2409 Oakley group 2
const PRIME_1024: &[u8] = &[
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2, 0x21, 0x68, 0xc2, 0x34,
    0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1, 0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74,
    0x02, 0x0b, 0xbe, 0xa6, 0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d, 0xf2, 0x5f, 0x14, 0x37,
    0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45, 0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6,
    0xf4, 0x4c, 0x42, 0xe9, 0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11, 0x7c, 0x4b, 0x1f, 0xe6,
    0x49, 0x28, 0x66, 0x51, 0xec, 0xe6, 0x53, 0x81, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

const GENERATOR: u32 = 2;

pub struct DhKeyPair {
    private_key: BigUint,
    public_key: [u8; PUBLIC_KEY_SIZE],
}

impl DhKeyPair {
    pub fn generate<R: RngCore>(rng: &mut R) -> DhKeyPair {
        let prime = BigUint::from_bytes_be(PRIME_1024);
        let mut private_bytes = [0_u8; PUBLIC_KEY_SIZE];
        rng.fill_bytes(&mut private_bytes);

        let private_key = BigUint::from_bytes_be(&private_bytes);
        let public = BigUint::from(GENERATOR).modpow(&private_key, &prime);

        DhKeyPair {
            private_key,
            public_key: to_fixed_width(&public),
        }
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public_key
    }

    pub fn shared_secret(&self, peer_public_key: &[u8]) -> Result<Vec<u8>, HandshakeError> {
        let prime = BigUint::from_bytes_be(PRIME_1024);
        let peer = BigUint::from_bytes_be(peer_public_key);

        // Keys of 0, 1 or p - 1 force the secret into a trivially small subgroup
        let one = BigUint::from(1_u32);
        if peer <= one || peer >= &prime - &one {
            return Err(HandshakeError::InvalidPublicKey);
        }

        let secret = peer.modpow(&self.private_key, &prime);
        Ok(to_fixed_width(&secret).to_vec())
    }
}

/// The pair of RC4 ciphers that protect an RTMPE connection once the handshake completes.
/// Every byte sent after the handshake goes through `encrypt()` and every byte received through
/// `decrypt()`.
pub struct RtmpeCiphers {
    encryptor: Rc4<U16>,
    decryptor: Rc4<U16>,
}

impl RtmpeCiphers {
    /// Derives both ciphers.  The outgoing key is keyed by the peer's public key and the incoming
    /// one by our own, which makes the two sides' pairs mirror each other.
    pub fn derive(
        shared_secret: &[u8],
        own_public_key: &[u8],
        peer_public_key: &[u8],
    ) -> Result<RtmpeCiphers, HandshakeError> {
        let outgoing = hmac_sha256(shared_secret, &[peer_public_key])?;
        let incoming = hmac_sha256(shared_secret, &[own_public_key])?;

        Ok(RtmpeCiphers {
            encryptor: create_cipher(&outgoing[..RC4_KEY_SIZE])?,
            decryptor: create_cipher(&incoming[..RC4_KEY_SIZE])?,
        })
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.encryptor.apply_keystream(data);
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.decryptor.apply_keystream(data);
    }
}

impl fmt::Debug for RtmpeCiphers {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "RtmpeCiphers")
    }
}

fn create_cipher(key: &[u8]) -> Result<Rc4<U16>, HandshakeError> {
    let mut cipher =
        Rc4::<U16>::new_from_slice(key).map_err(|_| HandshakeError::DigestKeyRejected)?;

    let mut discard = [0_u8; KEYSTREAM_SKIP];
    cipher.apply_keystream(&mut discard);
    Ok(cipher)
}

fn to_fixed_width(value: &BigUint) -> [u8; PUBLIC_KEY_SIZE] {
    let bytes = value.to_bytes_be();
    let mut result = [0_u8; PUBLIC_KEY_SIZE];
    let start = PUBLIC_KEY_SIZE.saturating_sub(bytes.len());
    let skip = bytes.len().saturating_sub(PUBLIC_KEY_SIZE);
    result[start..].copy_from_slice(&bytes[skip..]);
    result
}
