//! Core types for govm mining
//!
//! Fundamental types used throughout the mining client: hashes, addresses,
//! the fixed-layout block header, and the template records received from
//! chain servers.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use byteorder::{BigEndian, WriteBytesExt};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte length of a content hash
pub const HASH_LEN: usize = 32;

/// Byte length of a wallet address
pub const ADDRESS_LEN: usize = 24;

/// Content hash (SHA3-256 with the govm domain prefix)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Create a hash from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HASH_LEN {
            return Err(Error::template(format!(
                "Invalid hash length: expected {} bytes, got {}",
                HASH_LEN,
                bytes.len()
            )));
        }
        let mut array = [0u8; HASH_LEN];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }

    /// Get the hash bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check whether the hash is all zero
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// The wire format marshals hashes the way Go marshals byte slices:
// a standard-base64 JSON string.
impl Serialize for Hash {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
        Hash::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Wallet address (24 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Create an address from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ADDRESS_LEN {
            return Err(Error::wallet(format!(
                "Invalid address length: expected {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            )));
        }
        let mut array = [0u8; ADDRESS_LEN];
        array.copy_from_slice(bytes);
        Ok(Self(array))
    }

    /// Parse an address from its hexadecimal form
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| Error::wallet(format!("Invalid address hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    /// Get the address bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&BASE64.encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = BASE64.decode(&s).map_err(serde::de::Error::custom)?;
        Address::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

/// Block header to be mined, in the chain's fixed wire layout
///
/// Serializes to exactly [`BlockHeader::SIZE`] bytes, big-endian, with the
/// nonce as the trailing 8 bytes so the search loop can patch it in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockHeader {
    pub time: u64,
    pub previous: Hash,
    pub parent: Hash,
    pub left_child: Hash,
    pub right_child: Hash,
    pub trans_list_hash: Hash,
    pub producer: Address,
    pub chain: u64,
    pub index: u64,
    pub nonce: u64,
}

impl BlockHeader {
    /// Serialized header size in bytes
    pub const SIZE: usize = 8 + 5 * HASH_LEN + ADDRESS_LEN + 3 * 8;

    /// Offset of the nonce within the serialized header
    pub const NONCE_OFFSET: usize = Self::SIZE - 8;

    /// Serialize the header into its fixed big-endian layout
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.write_u64::<BigEndian>(self.time).unwrap();
        buf.extend_from_slice(self.previous.as_bytes());
        buf.extend_from_slice(self.parent.as_bytes());
        buf.extend_from_slice(self.left_child.as_bytes());
        buf.extend_from_slice(self.right_child.as_bytes());
        buf.extend_from_slice(self.trans_list_hash.as_bytes());
        buf.extend_from_slice(self.producer.as_bytes());
        buf.write_u64::<BigEndian>(self.chain).unwrap();
        buf.write_u64::<BigEndian>(self.index).unwrap();
        buf.write_u64::<BigEndian>(self.nonce).unwrap();
        debug_assert_eq!(buf.len(), Self::SIZE);
        buf
    }

    /// Patch a nonce into an already-serialized header image
    pub fn patch_nonce(buf: &mut [u8], nonce: u64) {
        buf[Self::NONCE_OFFSET..Self::NONCE_OFFSET + 8].copy_from_slice(&nonce.to_be_bytes());
    }
}

/// Template message received over a chain's streaming connection
///
/// Field names and base64 byte encoding follow the server's JSON wire
/// format. `from` is assigned client-side from the issuing server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BlockTemplate {
    #[serde(flatten)]
    pub header: BlockHeader,
    pub hashpower_limit: u64,
    #[serde(default)]
    pub from: String,
}

/// Per-chain mining context: a template snapshot plus the signing identity
/// chosen for this attempt and the server that issued the work.
///
/// Owned by the template store slot for its chain until replaced; workers
/// copy it before searching, so replacement never touches bytes a worker is
/// hashing.
#[derive(Debug, Clone)]
pub struct MiningContext {
    pub header: BlockHeader,
    /// Minimum required HashPower score
    pub limit: u64,
    /// Server that issued this template; solutions go back to it
    pub origin: String,
    /// Private key of the account mining this attempt
    pub key: SecretKey,
    /// True when the alternate signing identity was selected
    pub secondary: bool,
}

impl MiningContext {
    /// Chain this context belongs to
    pub fn chain(&self) -> u64 {
        self.header.chain
    }

    /// Position of the template in its chain
    pub fn index(&self) -> u64 {
        self.header.index
    }
}
