//! Password-based encryption primitives for MEF 3.0.
//!
//! MEF protects data with up to two tiers of AES-128: a level-1 password
//! guards raw samples and a level-2 password additionally guards subject
//! metadata. Passwords are UTF-8 strings of at most
//! [`MAX_PASSWORD_CHARACTERS`] bytes, zero-padded to a 16-byte key.
//!
//! Encryption operates on 16-byte ECB blocks only; MEF never chains blocks.
//! Password correctness is checked against a validation field stored in every
//! universal header: the first 16 bytes of `SHA-256(password || salt)` where
//! the salt is the file's level UUID.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// AES block and key size in bytes.
pub const ENCRYPTION_BLOCK_BYTES: usize = 16;

/// Maximum password length; one byte is reserved for the NUL terminator the
/// original C implementation required.
pub const MAX_PASSWORD_CHARACTERS: usize = ENCRYPTION_BLOCK_BYTES - 1;

/// Size of the password validation field in the universal header.
pub const PASSWORD_VALIDATION_FIELD_BYTES: usize = 16;

/// No encryption applied.
pub const NO_ENCRYPTION: i8 = 0;
/// Level 1: raw sample data is encrypted.
pub const LEVEL_1_ENCRYPTION: i8 = 1;
/// Level 2: subject metadata is additionally encrypted.
pub const LEVEL_2_ENCRYPTION: i8 = 2;

/// An expanded AES-128 key ready for block operations.
///
/// Wraps the cipher with its round keys pre-computed; one RED block can span
/// thousands of 16-byte chunks.
#[derive(Clone)]
pub struct EncryptionKey {
    cipher: Aes128,
}

impl EncryptionKey {
    /// Build a key from a raw 16-byte value.
    pub fn from_key(key: [u8; ENCRYPTION_BLOCK_BYTES]) -> Self {
        Self {
            cipher: Aes128::new(GenericArray::from_slice(&key)),
        }
    }

    /// Build a key from a password string.
    ///
    /// The password's UTF-8 bytes are zero-padded to 16 bytes; bytes beyond
    /// [`MAX_PASSWORD_CHARACTERS`] are ignored.
    pub fn from_password(password: &str) -> Self {
        Self::from_key(password_key(password))
    }

    /// Encrypt one 16-byte block in place.
    pub fn encrypt_block(&self, block: &mut [u8; ENCRYPTION_BLOCK_BYTES]) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(block));
    }

    /// Decrypt one 16-byte block in place.
    pub fn decrypt_block(&self, block: &mut [u8; ENCRYPTION_BLOCK_BYTES]) {
        self.cipher
            .decrypt_block(GenericArray::from_mut_slice(block));
    }

    /// ECB-encrypt every whole 16-byte chunk of `data` in place.
    ///
    /// A trailing chunk shorter than 16 bytes is left in the clear, matching
    /// the RED block encryption rule.
    pub fn encrypt_region(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(ENCRYPTION_BLOCK_BYTES) {
            self.cipher
                .encrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }

    /// ECB-decrypt every whole 16-byte chunk of `data` in place.
    pub fn decrypt_region(&self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(ENCRYPTION_BLOCK_BYTES) {
            self.cipher
                .decrypt_block(GenericArray::from_mut_slice(chunk));
        }
    }
}

impl core::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // Never expose key material.
        f.write_str("EncryptionKey { .. }")
    }
}

/// Zero-pad a password into a 16-byte AES key.
pub fn password_key(password: &str) -> [u8; ENCRYPTION_BLOCK_BYTES] {
    let mut key = [0u8; ENCRYPTION_BLOCK_BYTES];
    let bytes = password.as_bytes();
    let len = bytes.len().min(MAX_PASSWORD_CHARACTERS);
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

/// Expanded keys for both protection tiers plus the resulting access level.
#[derive(Debug, Clone, Default)]
pub struct PasswordData {
    /// Key derived from the level-1 password, if one was given.
    pub level_1: Option<EncryptionKey>,
    /// Key derived from the level-2 password, if one was given.
    pub level_2: Option<EncryptionKey>,
    /// Highest tier the caller may access (0, 1 or 2).
    pub access_level: i8,
}

impl PasswordData {
    /// Derive keys from optional password strings.
    pub fn from_passwords(password_1: Option<&str>, password_2: Option<&str>) -> Self {
        let level_1 = password_1
            .filter(|p| !p.is_empty())
            .map(EncryptionKey::from_password);
        let level_2 = password_2
            .filter(|p| !p.is_empty())
            .map(EncryptionKey::from_password);
        let access_level = if level_2.is_some() {
            LEVEL_2_ENCRYPTION
        } else if level_1.is_some() {
            LEVEL_1_ENCRYPTION
        } else {
            NO_ENCRYPTION
        };
        Self {
            level_1,
            level_2,
            access_level,
        }
    }

    /// Key for a RED block flagged at `level`, or an error if the caller did
    /// not supply the matching password.
    pub fn key_for_level(&self, level: i8) -> Result<&EncryptionKey> {
        let key = match level {
            LEVEL_1_ENCRYPTION => self.level_1.as_ref(),
            LEVEL_2_ENCRYPTION => self.level_2.as_ref(),
            _ => None,
        };
        key.ok_or(Error::WrongPassword)
    }
}

/// One-shot SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the password validation field for a universal header.
///
/// The field is the first 16 bytes of `SHA-256(password || salt)`; MEF uses
/// the file's level UUID as the salt so the field varies per session while
/// staying recomputable from header contents alone.
pub fn password_validation_field(
    password: &str,
    salt: &[u8],
) -> [u8; PASSWORD_VALIDATION_FIELD_BYTES] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    let digest = hasher.finalize();
    let mut field = [0u8; PASSWORD_VALIDATION_FIELD_BYTES];
    field.copy_from_slice(&digest[..PASSWORD_VALIDATION_FIELD_BYTES]);
    field
}

/// Check a password against a stored validation field.
///
/// An all-zero field means the file is unprotected and any password passes.
pub fn check_password(password: &str, salt: &[u8], field: &[u8]) -> bool {
    if field.iter().all(|&b| b == 0) {
        return true;
    }
    password_validation_field(password, salt) == field
}
