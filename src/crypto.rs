//! Cryptographic primitives for ledger addresses and transaction signing

use crate::error::TimelockError;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use secp256k1::{
    constants::{COMPACT_SIGNATURE_SIZE, SECRET_KEY_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE},
    ecdsa::Signature,
    All, Message, PublicKey, Secp256k1, SecretKey,
};

pub use alloy_primitives::{keccak256, Address};

/// A thread-safe, lazily initialized Secp256k1 context.
static SECP256K1_CONTEXT: Lazy<Secp256k1<All>> = Lazy::new(Secp256k1::new);

/// Parses a `0x`-prefixed (or bare) hex address. Mixed-case input is
/// accepted without checksum validation.
pub fn parse_address(hex_str: &str) -> Result<Address, TimelockError> {
    hex_str
        .trim()
        .parse::<Address>()
        .map_err(|e| TimelockError::Crypto(format!("Invalid address '{}': {}", hex_str.trim(), e)))
}

/// Derives the address of a secp256k1 public key: the last 20 bytes of the
/// keccak-256 hash of the uncompressed key without its prefix byte.
pub fn address_from_public_key(public_key: &PublicKey) -> Address {
    let uncompressed: [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE] = public_key.serialize_uncompressed();
    Address::from_raw_public_key(&uncompressed[1..])
}

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generates a new random KeyPair using the OS random number generator.
    pub fn generate() -> Result<Self, TimelockError> {
        let secret_key = SecretKey::new(&mut OsRng);
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(&SECP256K1_CONTEXT, &secret_key);
        KeyPair {
            secret_key,
            public_key,
        }
    }

    /// Creates a KeyPair from raw secret key bytes.
    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, TimelockError> {
        let secret_key = SecretKey::from_slice(bytes).map_err(|e| {
            if bytes.len() != SECRET_KEY_SIZE {
                TimelockError::Crypto(format!(
                    "Secret key must be {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ))
            } else {
                TimelockError::Crypto(format!("Invalid secret key bytes: {}", e))
            }
        })?;

        Ok(Self::from_secret_key(secret_key))
    }

    /// Creates a KeyPair from a hex secret key, with or without `0x`.
    pub fn from_secret_hex(hex_str: &str) -> Result<Self, TimelockError> {
        let digits = hex_str.trim().trim_start_matches("0x");
        let bytes = hex::decode(digits)
            .map_err(|e| TimelockError::Crypto(format!("Invalid hex secret key: {}", e)))?;
        Self::from_secret_bytes(&bytes)
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }

    /// Uncompressed public key bytes, as carried on signed transactions.
    pub fn public_key_bytes(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE] {
        self.public_key.serialize_uncompressed()
    }

    /// Signs the keccak-256 digest of `message` and returns the compact signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<[u8; COMPACT_SIGNATURE_SIZE], TimelockError> {
        let digest = keccak256(message);
        let message = Message::from_digest_slice(digest.as_slice())
            .map_err(|e| TimelockError::Crypto(format!("Failed to create message: {}", e)))?;
        let signature = SECP256K1_CONTEXT.sign_ecdsa(&message, &self.secret_key);
        Ok(signature.serialize_compact())
    }
}

/// Verifies a compact ECDSA signature over the keccak-256 digest of
/// `message` and returns the signer's address.
pub fn verify_signature(
    public_key_bytes: &[u8],
    message: &[u8],
    signature_bytes: &[u8],
) -> Result<Address, TimelockError> {
    if signature_bytes.len() != COMPACT_SIGNATURE_SIZE {
        return Err(TimelockError::Crypto(format!(
            "Signature must be exactly {} bytes (compact), got {}",
            COMPACT_SIGNATURE_SIZE,
            signature_bytes.len()
        )));
    }

    let public_key = PublicKey::from_slice(public_key_bytes)
        .map_err(|e| TimelockError::Crypto(format!("Invalid public key: {}", e)))?;

    let digest = keccak256(message);
    let message = Message::from_digest_slice(digest.as_slice())
        .map_err(|e| TimelockError::Crypto(format!("Failed to create message: {}", e)))?;

    let signature = Signature::from_compact(signature_bytes)
        .map_err(|e| TimelockError::Crypto(format!("Invalid signature: {}", e)))?;

    SECP256K1_CONTEXT
        .verify_ecdsa(&message, &signature, &public_key)
        .map_err(|_| TimelockError::Crypto("Signature verification failed".to_string()))?;

    Ok(address_from_public_key(&public_key))
}
