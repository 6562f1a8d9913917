//! AES-256-GCM authenticated encryption.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CacheError;

pub const NONCE_SIZE: usize = 12;
pub const SALT_SIZE: usize = 16;

/// Generates a fresh random 12-byte nonce. Spec invariant: an iv is never
/// reused for the same derived key.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Generates a fresh random 16-byte salt.
pub fn generate_salt() -> [u8; SALT_SIZE] {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Encrypts `plaintext` under `key` with `nonce`, returning ciphertext with
/// the auth tag appended (the format `Aes256Gcm` produces natively).
pub fn encrypt(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], plaintext: &[u8]) -> Result<Vec<u8>, CacheError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CacheError::EncryptionError)?;
    let nonce = Nonce::from_slice(nonce);
    cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &[],
            },
        )
        .map_err(|_| CacheError::EncryptionError)
}

/// Decrypts `ciphertext` (with appended auth tag) under `key`/`nonce`.
///
/// On integrity failure or wrong key, returns `DecryptionError` with no
/// detail — the message must never reveal plaintext or key material.
pub fn decrypt(key: &[u8; 32], nonce: &[u8; NONCE_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, CacheError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CacheError::DecryptionError)?;
    let nonce = Nonce::from_slice(nonce);
    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad: &[],
            },
        )
        .map_err(|_| CacheError::DecryptionError)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> [u8; 32] {
        [byte; 32]
    }

    #[test]
    fn round_trips() {
        let k = key(1);
        let nonce = generate_nonce();
        let ct = encrypt(&k, &nonce, b"hello").unwrap();
        let pt = decrypt(&k, &nonce, &ct).unwrap();
        assert_eq!(pt, b"hello");
    }

    #[test]
    fn wrong_key_fails_without_leaking_detail() {
        let nonce = generate_nonce();
        let ct = encrypt(&key(1), &nonce, b"secret").unwrap();
        let err = decrypt(&key(2), &nonce, &ct).unwrap_err();
        assert!(matches!(err, CacheError::DecryptionError));
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let k = key(1);
        let nonce = generate_nonce();
        let mut ct = encrypt(&k, &nonce, b"hello").unwrap();
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert!(decrypt(&k, &nonce, &ct).is_err());
    }

    #[test]
    fn nonces_are_distinct_with_overwhelming_probability() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
    }
}
