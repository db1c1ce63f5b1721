//! Crypto error types.

use thiserror::Error;

/// Cryptographic operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Invalid signature format or recovery id.
    #[error("invalid signature")]
    InvalidSignature,

    /// Signature failed to verify, or recovery found no valid point.
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Invalid public key encoding.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Invalid private key bytes.
    #[error("invalid private key")]
    InvalidPrivateKey,
}
