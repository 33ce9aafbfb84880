//! Cryptographic adapter for mining
//!
//! Recoverable secp256k1 ECDSA plus domain-prefixed SHA3-256 content hashes.
//! A sealed block payload is `[65] || signature(65) || header`, and its
//! content hash is the hash submitted to the server as the block key.

use crate::pow::hash_power;
use crate::types::{Address, BlockHeader, Hash, ADDRESS_LEN};
use rand::Rng;
use secp256k1::{All, Message, PublicKey, Secp256k1, SecretKey};
use sha3::{Digest, Sha3_256};

/// Length of a serialized signature: recovery header byte + 64-byte compact
pub const SIGN_LEN: usize = 65;

/// Domain prefix mixed into every content hash
const HASH_PREFIX: &[u8] = b"govm";

/// Compute the domain-prefixed SHA3-256 content hash of `data`.
pub fn content_hash(data: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(HASH_PREFIX);
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// A sealed candidate produced by the batched search
#[derive(Debug, Clone)]
pub struct Solution {
    /// Full signed payload, ready for submission
    pub payload: Vec<u8>,
    /// Content hash of the payload (the block key)
    pub hash: Hash,
    /// Nonce the payload carries
    pub nonce: u64,
}

/// Signing and sealing adapter shared by all workers and connections
pub struct Signer {
    secp: Secp256k1<All>,
}

impl Signer {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }

    /// Sign a message: recoverable ECDSA over its content hash.
    ///
    /// The first byte is `27 + 4 + recovery_id`, followed by the compact
    /// signature.
    pub fn sign(&self, key: &SecretKey, message: &[u8]) -> [u8; SIGN_LEN] {
        let digest = content_hash(message);
        let msg = Message::from_digest(digest.0);
        let sig = self.secp.sign_ecdsa_recoverable(&msg, key);
        let (recid, compact) = sig.serialize_compact();

        let mut out = [0u8; SIGN_LEN];
        out[0] = 27 + 4 + i32::from(recid) as u8;
        out[1..].copy_from_slice(&compact);
        out
    }

    /// Seal a serialized header: sign it and wrap it into the submission
    /// payload, returning the payload and its content hash.
    pub fn seal(&self, header_bytes: &[u8], key: &SecretKey) -> (Vec<u8>, Hash) {
        let sig = self.sign(key, header_bytes);

        let mut payload = Vec::with_capacity(1 + SIGN_LEN + header_bytes.len());
        payload.push(SIGN_LEN as u8);
        payload.extend_from_slice(&sig);
        payload.extend_from_slice(header_bytes);

        let hash = content_hash(&payload);
        (payload, hash)
    }

    /// Search `count` consecutive nonces starting from the nonce already in
    /// `header_bytes`, sealing each candidate and keeping the best-scoring
    /// one. Returns early once a candidate reaches `limit`.
    ///
    /// Signing is deterministic, so the returned payload is byte-identical
    /// to sealing the winning nonce through [`Signer::seal`].
    pub fn solve_batch(
        &self,
        header_bytes: &[u8],
        key: &SecretKey,
        count: u64,
        limit: u64,
    ) -> Solution {
        let header_off = 1 + SIGN_LEN;
        let mut payload = vec![0u8; header_off + header_bytes.len()];
        payload[0] = SIGN_LEN as u8;
        payload[header_off..].copy_from_slice(header_bytes);

        let start_nonce = u64::from_be_bytes(
            header_bytes[header_bytes.len() - 8..]
                .try_into()
                .expect("header carries a trailing 8-byte nonce"),
        );

        let mut best: Option<Solution> = None;
        let mut best_power = 0u64;

        for i in 0..count.max(1) {
            let nonce = start_nonce.wrapping_add(i);
            BlockHeader::patch_nonce(&mut payload[header_off..], nonce);

            let inner = content_hash(&payload[header_off..]);
            let msg = Message::from_digest(inner.0);
            let sig = self.secp.sign_ecdsa_recoverable(&msg, key);
            let (recid, compact) = sig.serialize_compact();
            payload[1] = 27 + 4 + i32::from(recid) as u8;
            payload[2..2 + 64].copy_from_slice(&compact);

            let hash = content_hash(&payload);
            let power = hash_power(hash.as_bytes());
            if best.is_none() || power > best_power {
                best_power = power;
                best = Some(Solution {
                    payload: payload.clone(),
                    hash,
                    nonce,
                });
            }
            if power >= limit {
                break;
            }
        }

        best.expect("batch examines at least one nonce")
    }

    /// Generate a fresh random keypair.
    pub fn generate_keypair(&self) -> (SecretKey, PublicKey) {
        loop {
            let mut bytes = [0u8; 32];
            rand::rng().fill(&mut bytes[..]);
            // Rejection-sample the rare out-of-range scalar.
            if let Ok(key) = SecretKey::from_byte_array(&bytes) {
                let public = PublicKey::from_secret_key(&self.secp, &key);
                return (key, public);
            }
        }
    }

    /// Derive the wallet address of a private key: the truncated content
    /// hash of the compressed public key.
    pub fn address_of(&self, key: &SecretKey) -> Address {
        let public = PublicKey::from_secret_key(&self.secp, key);
        let digest = content_hash(&public.serialize());
        let mut addr = [0u8; ADDRESS_LEN];
        addr.copy_from_slice(&digest.as_bytes()[..ADDRESS_LEN]);
        Address(addr)
    }
}

impl Default for Signer {
    fn default() -> Self {
        Self::new()
    }
}
