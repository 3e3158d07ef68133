//! AES-256-GCM sealing of state blobs.
//!
//! A sealed blob is `base64(nonce || ciphertext)` in a single string, with
//! a fresh random nonce per write. Authenticated encryption means a
//! truncated or tampered blob fails to unseal rather than decrypting to
//! garbage.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Master key size in bytes (256 bits)
const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96 bits)
const NONCE_SIZE: usize = 12;

/// Decode and validate the base64-encoded master key.
pub fn load_key(key_base64: &str) -> Result<Vec<u8>> {
    let key = BASE64
        .decode(key_base64)
        .context("master key is not valid base64")?;
    if key.len() != KEY_SIZE {
        return Err(anyhow!(
            "master key must be {} bytes, got {}",
            KEY_SIZE,
            key.len()
        ));
    }
    Ok(key)
}

/// Seal a plaintext blob for storage.
pub fn seal(plaintext: &str, key: &[u8]) -> Result<String> {
    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("bad encryption key: {}", e))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| anyhow!("encryption failed: {}", e))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Unseal a stored blob. Fails on a wrong key, truncation, or tampering.
pub fn unseal(sealed: &str, key: &[u8]) -> Result<String> {
    let bytes = BASE64.decode(sealed).context("sealed blob is not valid base64")?;
    if bytes.len() < NONCE_SIZE {
        return Err(anyhow!("sealed blob too short"));
    }
    let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);

    let cipher =
        Aes256Gcm::new_from_slice(key).map_err(|e| anyhow!("bad encryption key: {}", e))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| anyhow!("decryption failed (wrong key or corrupted blob)"))?;

    String::from_utf8(plaintext).context("unsealed blob is not valid UTF-8")
}
