use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Generate a cryptographically random salt for key derivation.
pub fn generate_salt() -> [u8; config::SALT_SIZE] {
    let mut salt = [0u8; config::SALT_SIZE];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

/// Derive a 32-byte key from a password and salt using Argon2id.
pub fn derive_key(
    password: &[u8],
    salt: &[u8; config::SALT_SIZE],
) -> Result<[u8; config::ARGON2_OUTPUT_LEN], CryptoError> {
    let params = argon2::Params::new(
        config::ARGON2_MEM_COST,
        config::ARGON2_TIME_COST,
        config::ARGON2_PARALLELISM,
        Some(config::ARGON2_OUTPUT_LEN),
    )
    .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key = [0u8; config::ARGON2_OUTPUT_LEN];
    argon2
        .hash_password_into(password, salt, &mut key)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    Ok(key)
}

/// Encrypt a payload under a password with XChaCha20-Poly1305.
/// Returns: [salt(16)] || [nonce(24)] || [ciphertext + tag]
pub fn seal(password: &str, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let salt = generate_salt();
    let mut nonce_bytes = [0u8; config::NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);

    let mut key_bytes = derive_key(password.as_bytes(), &salt)?;
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key_bytes));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()));
    secure_zero(&mut key_bytes);
    let ciphertext = ciphertext?;

    let mut sealed = Vec::with_capacity(config::SEAL_OVERHEAD + plaintext.len());
    sealed.extend_from_slice(&salt);
    sealed.extend_from_slice(&nonce_bytes);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
}

/// Decrypt the output of [`seal`]. A wrong password or tampered data fails
/// authentication.
pub fn open(password: &str, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < config::SEAL_OVERHEAD {
        return Err(CryptoError::Decryption("data too short".into()));
    }

    let (salt, rest) = sealed.split_at(config::SALT_SIZE);
    let (nonce_bytes, ciphertext) = rest.split_at(config::NONCE_SIZE);
    let salt: [u8; config::SALT_SIZE] = salt
        .try_into()
        .map_err(|_| CryptoError::Decryption("invalid salt".into()))?;

    let mut key_bytes = derive_key(password.as_bytes(), &salt)?;
    let cipher = XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&key_bytes));
    let plaintext = cipher
        .decrypt(XNonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()));
    secure_zero(&mut key_bytes);
    plaintext
}

/// Securely zero a key buffer.
pub fn secure_zero(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        unsafe {
            std::ptr::write_volatile(byte, 0);
        }
    }
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_salt_is_random() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn test_key_derivation() {
        let salt = generate_salt();
        let key1 = derive_key(b"password123", &salt).unwrap();
        let key2 = derive_key(b"password123", &salt).unwrap();
        assert_eq!(key1, key2);

        let key3 = derive_key(b"different", &salt).unwrap();
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let plaintext = b"meet at the usual place";
        let sealed = seal("test_password", plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + config::SEAL_OVERHEAD);
        assert_ne!(&sealed[config::SALT_SIZE + config::NONCE_SIZE..][..plaintext.len()], plaintext);

        assert_eq!(open("test_password", &sealed).unwrap(), plaintext);
    }

    #[test]
    fn test_wrong_password_fails() {
        let sealed = seal("correct", b"secret data").unwrap();
        assert!(matches!(open("wrong", &sealed), Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn test_truncated_input_fails() {
        assert!(open("pw", &[0u8; 10]).is_err());
    }

    #[test]
    fn test_secure_zero() {
        let mut buf = [0xFFu8; 32];
        secure_zero(&mut buf);
        assert_eq!(buf, [0u8; 32]);
    }
}
