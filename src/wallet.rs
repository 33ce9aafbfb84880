//! Wallet file handling
//!
//! Thin JSON wallet files holding hex-encoded key material. A missing
//! wallet file is created with a fresh keypair, so a first run mines to a
//! newly generated identity.

use crate::crypto::Signer;
use crate::types::Address;
use crate::{Error, Result};
use secp256k1::SecretKey;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct WalletFile {
    address: String,
    private_key: String,
}

/// A signing identity: address plus private key
#[derive(Debug, Clone, Copy)]
pub struct Wallet {
    pub address: Address,
    pub key: SecretKey,
}

impl Wallet {
    /// Load a wallet file, creating it with a fresh keypair if absent.
    pub fn load_or_create(path: &Path, signer: &Signer) -> Result<Self> {
        if path.exists() {
            Self::load(path, signer)
        } else {
            let wallet = Self::generate(signer);
            wallet.save(path)?;
            info!(path = %path.display(), address = %wallet.address, "created new wallet");
            Ok(wallet)
        }
    }

    /// Generate a fresh identity without touching disk.
    pub fn generate(signer: &Signer) -> Self {
        let (key, _) = signer.generate_keypair();
        Self {
            address: signer.address_of(&key),
            key,
        }
    }

    fn load(path: &Path, signer: &Signer) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: WalletFile = serde_json::from_str(&content)
            .map_err(|e| Error::wallet(format!("Unreadable wallet {}: {e}", path.display())))?;

        let key_bytes =
            hex::decode(&file.private_key).map_err(|e| Error::wallet(format!("Invalid key hex: {e}")))?;
        let key_array: [u8; 32] = key_bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::wallet("Private key must be 32 bytes"))?;
        let key = SecretKey::from_byte_array(&key_array)
            .map_err(|e| Error::wallet(format!("Invalid private key: {e}")))?;

        let address = Address::from_hex(&file.address)?;
        if address != signer.address_of(&key) {
            return Err(Error::wallet(format!(
                "Wallet {} address does not match its key",
                path.display()
            )));
        }

        Ok(Self { address, key })
    }

    fn save(&self, path: &Path) -> Result<()> {
        let file = WalletFile {
            address: self.address.to_hex(),
            private_key: hex::encode(self.key.secret_bytes()),
        };
        std::fs::write(path, serde_json::to_string_pretty(&file)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_then_load_round_trip() {
        let signer = Signer::new();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.key");

        let created = Wallet::load_or_create(&path, &signer).unwrap();
        assert!(path.exists());

        let loaded = Wallet::load_or_create(&path, &signer).unwrap();
        assert_eq!(created.address, loaded.address);
        assert_eq!(created.key.secret_bytes(), loaded.key.secret_bytes());
    }

    #[test]
    fn test_corrupt_wallet_rejected() {
        let signer = Signer::new();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.key");
        std::fs::write(&path, "not json").unwrap();

        assert!(Wallet::load_or_create(&path, &signer).is_err());
    }

    #[test]
    fn test_mismatched_address_rejected() {
        let signer = Signer::new();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("wallet.key");

        let wallet = Wallet::generate(&signer);
        let file = WalletFile {
            address: Address([9u8; crate::types::ADDRESS_LEN]).to_hex(),
            private_key: hex::encode(wallet.key.secret_bytes()),
        };
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        assert!(Wallet::load_or_create(&path, &signer).is_err());
    }
}
