//! Fee payer identity: secp256k1 key, compressed public key, account address

use crate::error::{BuildError, RelayerError, RelayerResult};

use bech32::{ToBase32, Variant};
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::fmt;

/// Key material of the account that pays for every relayed envelope
pub struct PayerIdentity {
    signing_key: SigningKey,
    /// 33-byte compressed SEC1 public key
    public_key: Vec<u8>,
    /// RIPEMD-160(SHA-256(public_key))
    address: [u8; 20],
    /// Bech32 rendering of `address`
    bech32_address: String,
}

impl PayerIdentity {
    /// Load from a hex-encoded private key
    pub fn from_hex(private_key: &str, bech32_prefix: &str) -> RelayerResult<Self> {
        let private_key = private_key.trim();
        if private_key.is_empty() {
            return Err(RelayerError::Config(
                "empty fee payer private key".to_string(),
            ));
        }

        let bytes = hex::decode(private_key.strip_prefix("0x").unwrap_or(private_key))
            .map_err(|e| RelayerError::Config(format!("invalid fee payer private key: {}", e)))?;
        let signing_key = SigningKey::from_slice(&bytes)
            .map_err(|e| RelayerError::Config(format!("invalid fee payer private key: {}", e)))?;

        Self::new(signing_key, bech32_prefix)
    }

    /// Load from the environment variable named `env_var`
    pub fn from_env(env_var: &str, bech32_prefix: &str) -> RelayerResult<Self> {
        let key = std::env::var(env_var).map_err(|_| {
            RelayerError::Config(format!("fee payer private key not set; set {}", env_var))
        })?;
        Self::from_hex(&key, bech32_prefix)
    }

    pub fn new(signing_key: SigningKey, bech32_prefix: &str) -> RelayerResult<Self> {
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        let address: [u8; 20] = Ripemd160::digest(Sha256::digest(&public_key)).into();
        let bech32_address = bech32::encode(bech32_prefix, address.to_base32(), Variant::Bech32)
            .map_err(|e| RelayerError::Config(format!("invalid bech32 prefix: {}", e)))?;

        Ok(Self {
            signing_key,
            public_key,
            address,
            bech32_address,
        })
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    pub fn address(&self) -> &[u8; 20] {
        &self.address
    }

    pub fn bech32_address(&self) -> &str {
        &self.bech32_address
    }

    /// ECDSA over SHA-256 of `payload`, 64-byte `r || s` with low S
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, BuildError> {
        let signature: Signature = self
            .signing_key
            .try_sign(payload)
            .map_err(|e| BuildError::Signing(e.to_string()))?;
        Ok(signature.to_bytes().to_vec())
    }
}

impl fmt::Debug for PayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayerIdentity")
            .field("address", &self.bech32_address)
            .finish_non_exhaustive()
    }
}
