//! Authenticated encryption of vote plaintext.
//!
//! AES-256-GCM with a 128-bit IV used directly as the GCM nonce. Every call
//! to [`encrypt`] draws a fresh IV, and [`decrypt`] uses the IV carried in
//! the envelope, so no two encryptions under one key share a nonce.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use vox_types::envelope::{IV_LEN, TAG_LEN};
use vox_types::EncryptedEnvelope;

use crate::{CryptoError, VoteKey};

/// AES-256-GCM with a 16-byte nonce.
type VoteCipher = AesGcm<Aes256, U16>;

fn cipher_for(key: &VoteKey) -> Result<VoteCipher, CryptoError> {
    VoteCipher::new_from_slice(key.as_bytes()).map_err(|e| CryptoError::InvalidKey(e.to_string()))
}

/// Encrypt `plaintext` under `key` with a freshly generated IV.
pub fn encrypt(plaintext: &str, key: &VoteKey) -> Result<EncryptedEnvelope, CryptoError> {
    let cipher = cipher_for(key)?;

    let mut iv = [0u8; IV_LEN];
    getrandom::getrandom(&mut iv)?;

    let mut buffer = plaintext.as_bytes().to_vec();
    let tag = cipher
        .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| CryptoError::Encryption)?;

    let mut tag_bytes = [0u8; TAG_LEN];
    tag_bytes.copy_from_slice(&tag);

    Ok(EncryptedEnvelope {
        iv,
        ciphertext: buffer,
        tag: tag_bytes,
    })
}

/// Decrypt an envelope, verifying its tag before any plaintext is released.
pub fn decrypt(envelope: &EncryptedEnvelope, key: &VoteKey) -> Result<String, CryptoError> {
    let cipher = cipher_for(key)?;

    let mut buffer = envelope.ciphertext.clone();
    cipher
        .decrypt_in_place_detached(
            GenericArray::from_slice(&envelope.iv),
            b"",
            &mut buffer,
            GenericArray::from_slice(&envelope.tag),
        )
        .map_err(|_| CryptoError::Integrity("authentication tag mismatch".to_string()))?;

    String::from_utf8(buffer)
        .map_err(|_| CryptoError::Integrity("plaintext is not valid UTF-8".to_string()))
}

/// Parse the `iv:ciphertext:tag` text form, then [`decrypt`].
pub fn decrypt_str(envelope: &str, key: &VoteKey) -> Result<String, CryptoError> {
    let envelope: EncryptedEnvelope = envelope
        .parse()
        .map_err(|e: vox_types::TypesError| CryptoError::Integrity(e.to_string()))?;
    decrypt(&envelope, key)
}
