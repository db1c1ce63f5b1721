//! # ECDSA Signatures (secp256k1)
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Constant-time operations
//!
//! ## Use Cases
//!
//! - Transaction signing and sender recovery (Ethereum-compatible)

use crate::CryptoError;
use k256::ecdsa::{
    signature::{Signer, Verifier},
    RecoveryId, Signature, SigningKey, VerifyingKey,
};
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1PublicKey([u8; 33]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; 33]) -> Result<Self, CryptoError> {
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    /// Verify a signature.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;
        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// This key's 20-byte address: `keccak256(uncompressed_point)[12..32]`.
    pub fn to_address(&self) -> Result<[u8; 20], CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(address_from_verifying_key(&verifying_key))
    }
}

fn address_from_verifying_key(key: &VerifyingKey) -> [u8; 20] {
    let encoded = key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// secp256k1 ECDSA keypair.
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        let verifying_key = self.signing_key.verifying_key();
        let sec1_bytes = verifying_key.to_sec1_bytes();
        let mut bytes = [0u8; 33];
        bytes.copy_from_slice(&sec1_bytes[..33]);
        Secp256k1PublicKey(bytes)
    }

    /// This keypair's 20-byte address.
    pub fn address(&self) -> [u8; 20] {
        address_from_verifying_key(self.signing_key.verifying_key())
    }

    /// Sign a message (deterministic RFC 6979), returning the signature
    /// plus the recovery id (0 or 1) needed to recover the signer.
    pub fn sign_recoverable(&self, message_hash: &[u8; 32]) -> (Secp256k1Signature, u8) {
        let (sig, recid): (Signature, RecoveryId) = self
            .signing_key
            .sign_prehash_recoverable(message_hash)
            .expect("signing over a 32-byte prehash cannot fail");
        let bytes: [u8; 64] = sig.to_bytes().into();
        (Secp256k1Signature(bytes), recid.to_byte())
    }

    /// Sign a message (deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Secp256k1Signature(bytes)
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }
}

impl Drop for Secp256k1KeyPair {
    fn drop(&mut self) {
        let mut bytes: [u8; 32] = self.signing_key.to_bytes().into();
        bytes.zeroize();
    }
}

/// Recover the signer's 20-byte address from a transaction-style
/// signature: a 32-byte message hash, Ethereum-style recovery id `v`
/// (27 or 28), and the `r`/`s` signature components.
pub fn ecdsa_recover(
    message_hash: &[u8; 32],
    v: u8,
    r: &[u8; 32],
    s: &[u8; 32],
) -> Result<[u8; 20], CryptoError> {
    let recovery_byte = v.checked_sub(27).ok_or(CryptoError::InvalidSignature)?;
    let recovery_id = RecoveryId::from_byte(recovery_byte).ok_or(CryptoError::InvalidSignature)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(r);
    sig_bytes[32..].copy_from_slice(s);
    let signature = Signature::from_slice(&sig_bytes).map_err(|_| CryptoError::InvalidSignature)?;

    let verifying_key = VerifyingKey::recover_from_prehash(message_hash, &signature, recovery_id)
        .map_err(|_| CryptoError::SignatureVerificationFailed)?;
    Ok(address_from_verifying_key(&verifying_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let keypair = Secp256k1KeyPair::generate();
        let message = b"Hello, secp256k1!";
        let signature = keypair.sign(message);
        assert!(keypair.public_key().verify(message, &signature).is_ok());
    }

    #[test]
    fn test_wrong_message_fails() {
        let keypair = Secp256k1KeyPair::generate();
        let signature = keypair.sign(b"message1");
        assert!(keypair
            .public_key()
            .verify(b"message2", &signature)
            .is_err());
    }

    #[test]
    fn test_deterministic_signatures() {
        let keypair = Secp256k1KeyPair::from_bytes([0xABu8; 32]).unwrap();
        let message = b"deterministic test";
        let sig1 = keypair.sign(message);
        let sig2 = keypair.sign(message);
        assert_eq!(sig1.as_bytes(), sig2.as_bytes());
    }

    #[test]
    fn test_roundtrip_bytes() {
        let original = Secp256k1KeyPair::generate();
        let bytes = original.to_bytes();
        let restored = Secp256k1KeyPair::from_bytes(bytes).unwrap();
        assert_eq!(original.public_key(), restored.public_key());
    }

    #[test]
    fn recover_yields_signer_address() {
        let keypair = Secp256k1KeyPair::generate();
        let message_hash = keccak256(b"a transaction preimage");
        let (sig, recid) = keypair.sign_recoverable(&message_hash);
        let v = recid + 27;
        let r: [u8; 32] = sig.as_bytes()[..32].try_into().unwrap();
        let s: [u8; 32] = sig.as_bytes()[32..].try_into().unwrap();

        let recovered = ecdsa_recover(&message_hash, v, &r, &s).unwrap();
        assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn recover_rejects_bad_v() {
        let keypair = Secp256k1KeyPair::generate();
        let message_hash = keccak256(b"a transaction preimage");
        let (sig, _) = keypair.sign_recoverable(&message_hash);
        let r: [u8; 32] = sig.as_bytes()[..32].try_into().unwrap();
        let s: [u8; 32] = sig.as_bytes()[32..].try_into().unwrap();

        assert!(ecdsa_recover(&message_hash, 5, &r, &s).is_err());
    }
}
