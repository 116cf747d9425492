//! Shared file entries served by the sharing server

use crate::types::{ShareId, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

// ----------------------------------------------------------------------------
// Shared File Entry
// ----------------------------------------------------------------------------

/// One file registered with the sharing server.
///
/// Lives only while the server runs; stopping the server clears the registry
/// without touching the underlying files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFileEntry {
    pub id: ShareId,
    /// Source path on disk
    pub path: PathBuf,
    /// Name presented to downloaders (defaults to the file name)
    pub display_name: String,
    pub size: u64,
    /// SHA-256 of the access password, hex encoded. The plaintext is never kept.
    pub password_hash: Option<String>,
    /// Explicit expiry; entries without one fall back to the session timeout
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    /// Shareable link of the form `http://<ip>:<port>/share/<id>`
    pub url: String,
    /// PNG image encoding `url`, present when QR generation was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_png: Option<Vec<u8>>,
}

impl SharedFileEntry {
    /// Hash an access password for storage
    pub fn hash_password(password: &str) -> String {
        hex::encode(Sha256::digest(password.as_bytes()))
    }

    /// Check a presented password against the stored hash.
    ///
    /// Entries without a hash accept any request.
    pub fn password_matches(&self, presented: Option<&str>) -> bool {
        match &self.password_hash {
            None => true,
            Some(stored) => presented
                .map(|p| Self::hash_password(p) == *stored)
                .unwrap_or(false),
        }
    }

    /// Effective expiry instant, applying the session-timeout fallback
    pub fn effective_expiry(&self, session_timeout: core::time::Duration) -> Timestamp {
        self.expires_at
            .unwrap_or_else(|| self.created_at.add(session_timeout))
    }

    /// Whether the entry is past its effective expiry
    pub fn is_expired(&self, now: Timestamp, session_timeout: core::time::Duration) -> bool {
        now > self.effective_expiry(session_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn entry(password: Option<&str>, expires_at: Option<Timestamp>) -> SharedFileEntry {
        SharedFileEntry {
            id: ShareId::generate(),
            path: PathBuf::from("/tmp/report.pdf"),
            display_name: "report.pdf".to_string(),
            size: 1024,
            password_hash: password.map(SharedFileEntry::hash_password),
            expires_at,
            created_at: Timestamp::new(0),
            url: "http://192.168.1.5:8080/share/abc".to_string(),
            qr_png: None,
        }
    }

    #[test]
    fn test_password_verification() {
        let open = entry(None, None);
        assert!(open.password_matches(None));
        assert!(open.password_matches(Some("anything")));

        let locked = entry(Some("secret"), None);
        assert!(locked.password_matches(Some("secret")));
        assert!(!locked.password_matches(Some("wrong")));
        assert!(!locked.password_matches(None));
    }

    #[test]
    fn test_plaintext_is_not_stored() {
        let locked = entry(Some("secret"), None);
        assert_ne!(locked.password_hash.as_deref(), Some("secret"));
    }

    #[test]
    fn test_expiry_with_explicit_deadline() {
        let e = entry(None, Some(Timestamp::new(5_000)));
        let timeout = Duration::from_secs(3600);
        assert!(!e.is_expired(Timestamp::new(5_000), timeout));
        assert!(e.is_expired(Timestamp::new(5_001), timeout));
    }

    #[test]
    fn test_expiry_falls_back_to_session_timeout() {
        let e = entry(None, None);
        let timeout = Duration::from_secs(60);
        assert!(!e.is_expired(Timestamp::new(60_000), timeout));
        assert!(e.is_expired(Timestamp::new(60_001), timeout));
    }
}
