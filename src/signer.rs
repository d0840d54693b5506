//! Signing identities bound to an administrative role

use crate::crypto::{Address, KeyPair};
use crate::error::TimelockError;
use crate::ledger::{SignedTransaction, UnsignedTransaction};
use std::fmt;

/// A signing identity. The ledger decides whether its address is authorized;
/// the role is the local label the workflow was configured to expect.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;
    fn role(&self) -> &str;
    fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, TimelockError>;
}

/// Signs with a secp256k1 key held in process memory.
pub struct LocalSigner {
    keypair: KeyPair,
    role: String,
}

impl LocalSigner {
    pub fn new(keypair: KeyPair, role: impl Into<String>) -> Self {
        LocalSigner {
            keypair,
            role: role.into(),
        }
    }

    pub fn from_secret_hex(secret: &str, role: impl Into<String>) -> Result<Self, TimelockError> {
        Ok(Self::new(KeyPair::from_secret_hex(secret)?, role))
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> Address {
        self.keypair.address()
    }

    fn role(&self) -> &str {
        &self.role
    }

    fn sign_transaction(&self, tx: UnsignedTransaction) -> Result<SignedTransaction, TimelockError> {
        if tx.from != self.address() {
            return Err(TimelockError::Crypto(format!(
                "Cannot sign for {} with the key of {}",
                tx.from,
                self.address()
            )));
        }
        let signature = self.keypair.sign(&tx.signable_message())?;
        Ok(SignedTransaction {
            tx,
            signature: signature.to_vec(),
            public_key: self.keypair.public_key_bytes().to_vec(),
        })
    }
}

impl fmt::Debug for LocalSigner {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("LocalSigner")
            .field("address", &self.address())
            .field("role", &self.role)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;
    use alloy_primitives::U256;

    #[test]
    fn test_signature_recovers_sender() {
        let signer = LocalSigner::from_secret_hex(
            "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
            "admin",
        )
        .unwrap();
        let tx = UnsignedTransaction {
            chain_id: 250,
            nonce: 7,
            from: signer.address(),
            to: Address::repeat_byte(0x22),
            value: U256::ZERO,
            data: vec![1, 2, 3],
        };

        let signed = signer.sign_transaction(tx).unwrap();
        let recovered = verify_signature(&signed.public_key, &signed.tx.signable_message(), &signed.signature).unwrap();
        assert_eq!(recovered, signer.address());
        assert_eq!(signer.role(), "admin");
    }

    #[test]
    fn test_refuses_foreign_sender() {
        let signer = LocalSigner::new(KeyPair::generate().unwrap(), "admin");
        let tx = UnsignedTransaction {
            chain_id: 250,
            nonce: 0,
            from: Address::repeat_byte(0x01),
            to: Address::repeat_byte(0x22),
            value: U256::ZERO,
            data: vec![],
        };
        assert!(matches!(signer.sign_transaction(tx), Err(TimelockError::Crypto(_))));
    }
}
