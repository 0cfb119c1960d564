// Cryptographic signing module
// This file handles key material decoding for both chain families and
// ed25519 signing of Solana transaction messages
//
// Numan Thabit 2025 Nov

use crate::errors::KeyError;
use alloy::primitives::B256;
use alloy::signers::local::PrivateKeySigner;
use ed25519_dalek::{Signer, SigningKey};
use std::fmt;

const SOLANA_KEYPAIR_LEN: usize = 64;
const EVM_SECRET_LEN: usize = 32;

/// Solana signing identity: ed25519 secret || public key, 64 bytes.
pub struct SolanaKeypair {
    signing_key: SigningKey,
}

impl SolanaKeypair {
    /// Decode a keypair given as hex (with or without `0x`) or base58, the
    /// format the Solana CLI writes.
    pub fn parse(encoded: &str) -> Result<Self, KeyError> {
        let encoded = encoded.trim();
        let bytes = match hex::decode(encoded.trim_start_matches("0x")) {
            Ok(bytes) if bytes.len() == SOLANA_KEYPAIR_LEN => bytes,
            _ => bs58::decode(encoded)
                .into_vec()
                .map_err(|e| KeyError::Encoding(format!("neither hex nor base58: {e}")))?,
        };
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        let keypair: &[u8; SOLANA_KEYPAIR_LEN] = bytes
            .try_into()
            .map_err(|_| KeyError::Length(bytes.len(), SOLANA_KEYPAIR_LEN))?;
        let signing_key = SigningKey::from_keypair_bytes(keypair).map_err(|_| KeyError::Mismatch)?;
        Ok(Self { signing_key })
    }

    pub fn pubkey(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn pubkey_base58(&self) -> String {
        bs58::encode(self.pubkey()).into_string()
    }

    /// Sign raw serialized message bytes.
    pub fn sign_message(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl fmt::Debug for SolanaKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolanaKeypair")
            .field("pubkey", &self.pubkey_base58())
            .finish_non_exhaustive()
    }
}

/// Decode a 32-byte hex EVM private key, `0x` prefix optional.
pub fn parse_evm_signer(encoded: &str) -> Result<PrivateKeySigner, KeyError> {
    let bytes = hex::decode(encoded.trim().trim_start_matches("0x"))
        .map_err(|e| KeyError::Encoding(format!("bad hex key: {e}")))?;
    let secret: [u8; EVM_SECRET_LEN] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyError::Length(bytes.len(), EVM_SECRET_LEN))?;
    PrivateKeySigner::from_bytes(&B256::from(secret))
        .map_err(|e| KeyError::Encoding(format!("invalid secp256k1 key: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier};

    fn keypair_bytes() -> [u8; 64] {
        SigningKey::from_bytes(&[7u8; 32]).to_keypair_bytes()
    }

    #[test]
    fn parses_hex_and_base58_keypairs() {
        let bytes = keypair_bytes();
        let from_hex = SolanaKeypair::parse(&hex::encode(bytes)).unwrap();
        let from_prefixed = SolanaKeypair::parse(&format!("0x{}", hex::encode(bytes))).unwrap();
        let from_b58 = SolanaKeypair::parse(&bs58::encode(bytes).into_string()).unwrap();
        assert_eq!(from_hex.pubkey(), from_b58.pubkey());
        assert_eq!(from_prefixed.pubkey(), from_b58.pubkey());
        assert_eq!(&from_hex.pubkey()[..], &bytes[32..]);
    }

    #[test]
    fn rejects_wrong_length_and_mismatched_keypairs() {
        let short = bs58::encode([1u8; 32]).into_string();
        assert!(matches!(
            SolanaKeypair::parse(&short),
            Err(KeyError::Length(32, 64))
        ));

        let mut bytes = keypair_bytes();
        bytes[40] ^= 0xff;
        assert!(matches!(
            SolanaKeypair::from_bytes(&bytes),
            Err(KeyError::Mismatch)
        ));

        assert!(matches!(
            SolanaKeypair::parse("not a key!"),
            Err(KeyError::Encoding(_))
        ));
    }

    #[test]
    fn signatures_verify_against_pubkey() {
        let kp = SolanaKeypair::from_bytes(&keypair_bytes()).unwrap();
        let sig = kp.sign_message(b"message");
        let vk = ed25519_dalek::VerifyingKey::from_bytes(&kp.pubkey()).unwrap();
        assert!(vk.verify(b"message", &Signature::from_bytes(&sig)).is_ok());
    }

    #[test]
    fn debug_output_hides_secret() {
        let kp = SolanaKeypair::from_bytes(&keypair_bytes()).unwrap();
        let rendered = format!("{kp:?}");
        assert!(rendered.contains(&kp.pubkey_base58()));
        assert!(!rendered.contains(&hex::encode(&keypair_bytes()[..32])));
    }

    #[test]
    fn parses_evm_private_key() {
        // well-known first anvil/hardhat development key
        let signer = parse_evm_signer(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            signer.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        assert!(matches!(
            parse_evm_signer("0x1234"),
            Err(KeyError::Length(2, 32))
        ));
    }
}
