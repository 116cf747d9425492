//! Secure key-value storage
//!
//! Saved networks carry Wi-Fi passwords, so at-rest persistence goes through
//! [`SecureStorage`]. The file-backed implementation encrypts every value with
//! ChaCha20-Poly1305 under a key supplied by the embedding application; the
//! in-memory implementation backs tests.

use crate::errors::{LanlinkResult, StorageError};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Size of the ChaCha20-Poly1305 nonce prefixed to every stored value
const NONCE_LEN: usize = 12;

// ----------------------------------------------------------------------------
// Storage Trait
// ----------------------------------------------------------------------------

/// Key-value storage abstraction for sensitive engine state
pub trait SecureStorage: Send + Sync {
    /// Store data under a key, replacing any previous value
    fn store(&mut self, key: &str, data: Vec<u8>) -> LanlinkResult<()>;

    /// Retrieve data by key
    fn retrieve(&self, key: &str) -> LanlinkResult<Option<Vec<u8>>>;

    /// Delete data by key
    fn delete(&mut self, key: &str) -> LanlinkResult<()>;

    /// Check if storage is available and accessible
    fn is_available(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Memory Storage Implementation
// ----------------------------------------------------------------------------

/// In-memory storage for tests and degraded operation
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: BTreeMap<String, Vec<u8>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecureStorage for MemoryStorage {
    fn store(&mut self, key: &str, data: Vec<u8>) -> LanlinkResult<()> {
        self.data.insert(key.to_string(), data);
        Ok(())
    }

    fn retrieve(&self, key: &str) -> LanlinkResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).cloned())
    }

    fn delete(&mut self, key: &str) -> LanlinkResult<()> {
        self.data.remove(key);
        Ok(())
    }

    fn is_available(&self) -> bool {
        true
    }
}

// ----------------------------------------------------------------------------
// Encrypted File Storage Implementation
// ----------------------------------------------------------------------------

/// File-backed storage encrypting each value with ChaCha20-Poly1305.
///
/// One file per key under the storage directory; each file is a fresh random
/// nonce followed by the ciphertext. Writes go through a temp file + rename so
/// a crash never leaves a torn value.
pub struct EncryptedFileStorage {
    dir: PathBuf,
    cipher: ChaCha20Poly1305,
}

impl EncryptedFileStorage {
    /// Open (creating if needed) storage at `dir` with a 32-byte key
    pub fn open(dir: impl AsRef<Path>, key: &[u8; 32]) -> LanlinkResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            reason: e.to_string(),
        })?;
        Ok(Self {
            dir,
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        })
    }

    fn path_for(&self, key: &str) -> LanlinkResult<PathBuf> {
        // Keys are engine-internal names; anything else is a programming error
        // surfaced as corruption rather than silently escaping the directory.
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StorageError::Corrupted {
                reason: format!("invalid storage key: {key:?}"),
            }
            .into());
        }
        Ok(self.dir.join(format!("{key}.enc")))
    }
}

impl SecureStorage for EncryptedFileStorage {
    fn store(&mut self, key: &str, data: Vec<u8>) -> LanlinkResult<()> {
        let path = self.path_for(key)?;

        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, data.as_ref())
            .map_err(|_| StorageError::EncryptionFailed)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);

        let tmp = path.with_extension("enc.tmp");
        std::fs::write(&tmp, &blob).map_err(|e| StorageError::Io {
            reason: e.to_string(),
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| StorageError::Io {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn retrieve(&self, key: &str) -> LanlinkResult<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        let blob = match std::fs::read(&path) {
            Ok(blob) => blob,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StorageError::Io {
                    reason: e.to_string(),
                }
                .into())
            }
        };

        if blob.len() < NONCE_LEN {
            return Err(StorageError::Corrupted {
                reason: format!("stored value for {key} is truncated"),
            }
            .into());
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| StorageError::EncryptionFailed)?;
        Ok(Some(plaintext))
    }

    fn delete(&mut self, key: &str) -> LanlinkResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io {
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
