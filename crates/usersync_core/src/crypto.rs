//! Envelope encryption using AES-256-CBC.
//!
//! The configured passphrase is never used as a key directly: it is hashed
//! with SHA-256 to obtain the 32-byte AES key. Every encryption draws a fresh
//! random IV.
//!
//! ## Wire format
//!
//! `base64(iv (16 bytes) || ciphertext)`, PKCS#7 padded.
//!
//! CBC is not authenticated. Decryption reports failure when the padding or
//! UTF-8 check fails, which catches wrong keys and truncation, but a
//! deliberately crafted ciphertext can still decrypt to altered bytes.

use aes::Aes256;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Size of the derived AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the CBC initialisation vector in bytes.
pub const IV_SIZE: usize = 16;

/// Reasons an envelope cannot be sealed or opened.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The payload is not valid base64.
    #[error("invalid base64: {0}")]
    InvalidBase64(String),

    /// The decoded payload is too short to hold an IV and one block.
    #[error("ciphertext too short: {0} bytes")]
    TooShort(usize),

    /// Decryption failed (wrong key or corrupted data).
    #[error("decryption failed")]
    DecryptFailed,

    /// Decrypted bytes are not UTF-8 text.
    #[error("decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// The cipher could not be initialised.
    #[error("cipher unavailable: {0}")]
    Unavailable(String),
}

/// Symmetric cipher for sync payloads.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PayloadCipher {
    key: [u8; KEY_SIZE],
}

impl PayloadCipher {
    /// Derives the cipher key from a passphrase.
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    /// Encrypts `plaintext` and returns the base64 envelope payload.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let encryptor = Aes256CbcEnc::new_from_slices(&self.key, &iv)
            .map_err(|e| CipherError::Unavailable(e.to_string()))?;
        let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypts a base64 envelope payload back to text.
    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        let data = BASE64
            .decode(encoded.trim())
            .map_err(|e| CipherError::InvalidBase64(e.to_string()))?;

        if data.len() < IV_SIZE + 16 {
            return Err(CipherError::TooShort(data.len()));
        }
        let (iv, ciphertext) = data.split_at(IV_SIZE);

        let decryptor = Aes256CbcDec::new_from_slices(&self.key, iv)
            .map_err(|e| CipherError::Unavailable(e.to_string()))?;
        let plaintext = decryptor
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CipherError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| CipherError::InvalidUtf8)
    }
}

impl std::fmt::Debug for PayloadCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PayloadCipher")
            .field("key", &"[REDACTED]")
            .finish()
    }
}
