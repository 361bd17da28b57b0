use solana_sdk::{
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
};
use std::sync::Arc;
use tracing::info;

use crate::error::SniperError;

/// Holds the trading keypair. The secret never leaves this type; signing is
/// done by handing the keypair reference to the transaction constructor.
#[derive(Clone)]
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    pub fn new(private_key_bs58: &str) -> Result<Self, SniperError> {
        let bytes = bs58::decode(private_key_bs58)
            .into_vec()
            .map_err(|e| SniperError::Config(format!("Invalid private key format: {}", e)))?;

        if bytes.len() != 64 {
            return Err(SniperError::Config(format!(
                "Private key must be 64 bytes, got {}",
                bytes.len()
            )));
        }

        let keypair = Keypair::from_bytes(&bytes)
            .map_err(|e| SniperError::Config(format!("Invalid private key data: {}", e)))?;

        info!("Wallet initialized. Pubkey: {}", keypair.pubkey());

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_from_generated_key() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();

        let wallet = WalletManager::new(&encoded).unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_rejects_wrong_length() {
        let short = bs58::encode([1u8; 32]).into_string();
        assert!(WalletManager::new(&short).is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(WalletManager::new("not-base58-0OIl").is_err());
    }
}
