//! # Cache Entry Records
//!
//! The persisted form of a cached value: the payload plus its creation and
//! expiration timestamps. Both stores serialize entries as JSON with the fields
//! `data`, `createdAt` and `expiresAt` (RFC 3339 timestamps, payload bytes in
//! base64).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// Cache entry with expiration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached value
    pub data: T,

    /// When the entry was created
    pub created_at: DateTime<Utc>,

    /// When the entry expires
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Create an entry created at `now` that expires at `expires_at`.
    ///
    /// Returns `None` when the entry would already be expired at creation.
    pub fn new(data: T, now: DateTime<Utc>, expires_at: DateTime<Utc>) -> Option<Self> {
        if expires_at <= now {
            return None;
        }

        Some(Self {
            data,
            created_at: now,
            expires_at,
        })
    }

    /// Check whether the entry is expired at the given instant
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Expiration-only view of a stored entry, used by the sweep so that the
/// payload does not need to be decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryHeader {
    pub expires_at: DateTime<Utc>,
}

/// Opaque payload bytes, serialized as a base64 string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload(pub Vec<u8>);

impl Payload {
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Payload)
            .map_err(serde::de::Error::custom)
    }
}

/// Expiration options for a single write.
///
/// An absolute expiration takes precedence over a relative one; when neither is
/// given the store's default TTL applies. The sliding window is only honored by
/// stores that advertise sliding expiration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub absolute_expiration_relative_to_now: Option<Duration>,
    pub sliding_expiration: Option<Duration>,
}

impl EntryOptions {
    /// Options expiring `ttl` after the write
    pub fn expires_in(ttl: Duration) -> Self {
        Self {
            absolute_expiration_relative_to_now: Some(ttl),
            ..Default::default()
        }
    }

    /// Options expiring at a fixed instant
    pub fn expires_at(at: DateTime<Utc>) -> Self {
        Self {
            absolute_expiration: Some(at),
            ..Default::default()
        }
    }

    pub fn with_sliding(mut self, window: Duration) -> Self {
        self.sliding_expiration = Some(window);
        self
    }

    /// Resolve the absolute expiration instant for a write happening at `now`
    pub fn resolve_expiry(&self, now: DateTime<Utc>, default_ttl: Duration) -> DateTime<Utc> {
        if let Some(at) = self.absolute_expiration {
            return at;
        }

        let ttl = self.absolute_expiration_relative_to_now.unwrap_or(default_ttl);
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Serialize an entry to its stored byte form
pub fn encode_entry(entry: &CacheEntry<Payload>) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(entry)
}

/// Deserialize an entry from its stored byte form
pub fn decode_entry(bytes: &[u8]) -> serde_json::Result<CacheEntry<Payload>> {
    serde_json::from_slice(bytes)
}

/// Read only the expiration of a stored entry
pub fn decode_expiry(bytes: &[u8]) -> serde_json::Result<ExpiryHeader> {
    serde_json::from_slice(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry(now: DateTime<Utc>) -> CacheEntry<Payload> {
        CacheEntry::new(
            Payload(b"[{\"id\":1}]".to_vec()),
            now,
            now + chrono::Duration::minutes(5),
        )
        .unwrap()
    }

    #[test]
    fn test_entry_rejects_non_positive_lifetime() {
        let now = Utc::now();
        assert!(CacheEntry::new((), now, now).is_none());
        assert!(CacheEntry::new((), now, now - chrono::Duration::seconds(1)).is_none());
    }

    #[test]
    fn test_expiry_is_strictly_after() {
        let now = Utc::now();
        let entry = sample_entry(now);
        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(entry.expires_at));
        assert!(entry.is_expired_at(entry.expires_at + chrono::Duration::milliseconds(1)));
    }

    #[test]
    fn test_stored_field_names() {
        let entry = sample_entry(Utc::now());
        let json: serde_json::Value = serde_json::from_slice(&encode_entry(&entry).unwrap()).unwrap();

        assert!(json.get("data").unwrap().is_string());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("expiresAt").is_some());
    }

    #[test]
    fn test_decode_stored_entry() {
        let entry = sample_entry(Utc::now());
        let decoded = decode_entry(&encode_entry(&entry).unwrap()).unwrap();
        assert_eq!(decoded, entry);

        let header = decode_expiry(&encode_entry(&entry).unwrap()).unwrap();
        assert_eq!(header.expires_at, entry.expires_at);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_entry(b"not json").is_err());
        assert!(decode_entry(br#"{"data":"!!!","createdAt":"x","expiresAt":"y"}"#).is_err());
        assert!(decode_expiry(b"{}").is_err());
    }

    #[test]
    fn test_absolute_expiration_wins() {
        let now = Utc::now();
        let at = now + chrono::Duration::hours(2);
        let options = EntryOptions {
            absolute_expiration: Some(at),
            absolute_expiration_relative_to_now: Some(Duration::from_secs(60)),
            sliding_expiration: None,
        };
        assert_eq!(options.resolve_expiry(now, Duration::from_secs(10)), at);
    }

    #[test]
    fn test_relative_and_default_expiration() {
        let now = Utc::now();
        let relative = EntryOptions::expires_in(Duration::from_secs(60));
        assert_eq!(
            relative.resolve_expiry(now, Duration::from_secs(10)),
            now + chrono::Duration::seconds(60)
        );

        let default = EntryOptions::default();
        assert_eq!(
            default.resolve_expiry(now, Duration::from_secs(10)),
            now + chrono::Duration::seconds(10)
        );
    }
}
