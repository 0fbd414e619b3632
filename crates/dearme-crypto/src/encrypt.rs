use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit, OsRng, rand_core::RngCore},
};
use anyhow::{Result, anyhow, bail};

const NONCE_LEN: usize = 12;

/// Seal a plaintext field with AES-256-GCM.
/// Returns (ciphertext, nonce).
pub fn encrypt_field(key: &[u8; 32], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| anyhow!("Encryption failed: {}", e))?;

    Ok((ciphertext, nonce_bytes.to_vec()))
}

/// Open a field sealed by [`encrypt_field`].
pub fn decrypt_field(key: &[u8; 32], ciphertext: &[u8], nonce: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != NONCE_LEN {
        bail!("Invalid nonce length: {}", nonce.len());
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let nonce = Nonce::from_slice(nonce);

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow!("Decryption failed: {}", e))?;

    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_key;

    #[test]
    fn sealed_text_opens_with_the_same_key() {
        let key = generate_key();
        let entry = "Grateful for the sea today.".as_bytes();

        let (ciphertext, nonce) = encrypt_field(&key, entry).unwrap();
        assert_ne!(ciphertext.as_slice(), entry);

        let opened = decrypt_field(&key, &ciphertext, &nonce).unwrap();
        assert_eq!(opened, entry);
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = generate_key();
        let key2 = generate_key();

        let (ciphertext, nonce) = encrypt_field(&key1, b"private").unwrap();
        assert!(decrypt_field(&key2, &ciphertext, &nonce).is_err());
    }

    #[test]
    fn short_nonce_is_rejected() {
        let key = generate_key();
        let (ciphertext, _) = encrypt_field(&key, b"private").unwrap();
        assert!(decrypt_field(&key, &ciphertext, &[0u8; 4]).is_err());
    }
}
