//! The persisted session record and its partial-update merge semantics.
//!
//! One JSON record under one fixed key: `{ text, image, audio, timestamp }`,
//! where `image`/`audio` are data URIs or null. Saves merge a patch into the
//! previous record and restamp `timestamp`; loads apply the expiry window.
//! Everything here is pure; the app wires it to the Storage capability.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::MediaPayload;
use crate::{EXPIRATION_MINUTES, MAX_PERSISTED_MEDIA_BYTES};

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to serialize session record: {0}")]
    Serialize(String),
    #[error("failed to deserialize session record: {0}")]
    Deserialize(String),
}

/// The single stored record. Field shapes match the external interface
/// contract exactly, so shells and older revisions can read it.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
    pub timestamp: u64,
}

impl SessionRecord {
    /// Merge a patch into an existing record (or a fresh one), stamping the
    /// write time. Unspecified patch fields keep their previous value.
    #[must_use]
    pub fn merge(existing: Option<SessionRecord>, patch: SessionPatch, now_ms: u64) -> Self {
        let mut record = existing.unwrap_or_default();
        if let Some(text) = patch.text {
            record.text = text;
        }
        if let Some(image) = patch.image {
            record.image = image;
        }
        if let Some(audio) = patch.audio {
            record.audio = audio;
        }
        record.timestamp = now_ms;
        record
    }

    /// A record untouched for the full expiry window is treated as gone.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp) >= EXPIRATION_MINUTES * 60_000
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PersistenceError> {
        serde_json::to_vec(self).map_err(|e| PersistenceError::Serialize(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PersistenceError> {
        serde_json::from_slice(bytes).map_err(|e| PersistenceError::Deserialize(e.to_string()))
    }
}

/// Partial update: `None` means "leave as stored", `Some(None)` means
/// "clear the field".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub text: Option<String>,
    pub image: Option<Option<String>>,
    pub audio: Option<Option<String>>,
}

impl SessionPatch {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn image(payload: Option<&MediaPayload>) -> Self {
        Self {
            image: persistable_media(payload, "image"),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn audio(payload: Option<&MediaPayload>) -> Self {
        Self {
            audio: persistable_media(payload, "audio"),
            ..Default::default()
        }
    }
}

/// Encode a media payload for persistence, or drop it if it would blow the
/// per-record budget. Oversized payloads are omitted from the write (the
/// in-memory session keeps them) instead of failing the save.
fn persistable_media(payload: Option<&MediaPayload>, field: &str) -> Option<Option<String>> {
    match payload {
        None => Some(None),
        Some(payload) => {
            let uri = payload.to_data_uri();
            if uri.len() > MAX_PERSISTED_MEDIA_BYTES {
                warn!(
                    field,
                    bytes = uri.len(),
                    max = MAX_PERSISTED_MEDIA_BYTES,
                    "media payload exceeds persistence budget; omitting from record"
                );
                None
            } else {
                Some(Some(uri))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE_MS: u64 = 60_000;

    #[test]
    fn merge_applies_partial_updates() {
        let record = SessionRecord::merge(None, SessionPatch::text("a"), 1_000);
        let record = SessionRecord::merge(
            Some(record),
            SessionPatch {
                image: Some(Some("b".into())),
                ..Default::default()
            },
            2_000,
        );

        assert_eq!(record.text, "a");
        assert_eq!(record.image.as_deref(), Some("b"));
        assert_eq!(record.audio, None);
        assert_eq!(record.timestamp, 2_000);
    }

    #[test]
    fn merge_explicit_clear_wins_over_stored_value() {
        let record = SessionRecord {
            text: "a".into(),
            image: Some("b".into()),
            audio: Some("c".into()),
            timestamp: 1_000,
        };
        let record = SessionRecord::merge(
            Some(record),
            SessionPatch {
                image: Some(None),
                ..Default::default()
            },
            2_000,
        );

        assert_eq!(record.image, None);
        assert_eq!(record.audio.as_deref(), Some("c"));
        assert_eq!(record.text, "a");
    }

    #[test]
    fn merge_always_restamps_timestamp() {
        let record = SessionRecord::merge(None, SessionPatch::default(), 5_000);
        assert_eq!(record.timestamp, 5_000);

        let record = SessionRecord::merge(Some(record), SessionPatch::default(), 9_000);
        assert_eq!(record.timestamp, 9_000);
    }

    #[test]
    fn record_expires_after_window() {
        let now = 100 * MINUTE_MS;
        let record = SessionRecord {
            timestamp: now - 31 * MINUTE_MS,
            ..Default::default()
        };
        assert!(record.is_expired(now));
    }

    #[test]
    fn record_survives_within_window() {
        let now = 100 * MINUTE_MS;
        let record = SessionRecord {
            timestamp: now - 29 * MINUTE_MS,
            ..Default::default()
        };
        assert!(!record.is_expired(now));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let now = 100 * MINUTE_MS;
        let record = SessionRecord {
            timestamp: now - EXPIRATION_MINUTES * MINUTE_MS,
            ..Default::default()
        };
        assert!(record.is_expired(now));
    }

    #[test]
    fn expiry_tolerates_clock_going_backwards() {
        let record = SessionRecord {
            timestamp: 10 * MINUTE_MS,
            ..Default::default()
        };
        assert!(!record.is_expired(5 * MINUTE_MS));
    }

    #[test]
    fn bytes_round_trip() {
        let record = SessionRecord {
            text: "angry".into(),
            image: Some("data:image/png;base64,AAAA".into()),
            audio: None,
            timestamp: 42,
        };
        let bytes = record.to_bytes().unwrap();
        assert_eq!(SessionRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(matches!(
            SessionRecord::from_bytes(b"not json"),
            Err(PersistenceError::Deserialize(_))
        ));
    }

    #[test]
    fn missing_fields_default_on_read() {
        let record = SessionRecord::from_bytes(br#"{"timestamp": 7}"#).unwrap();
        assert_eq!(record.text, "");
        assert_eq!(record.image, None);
        assert_eq!(record.audio, None);
    }

    #[test]
    fn oversized_media_is_omitted_not_fatal() {
        let payload = MediaPayload::new("image/png", vec![0u8; MAX_PERSISTED_MEDIA_BYTES]);
        let patch = SessionPatch::image(Some(&payload));
        // Omitted: the previous stored value (if any) is preserved.
        assert_eq!(patch.image, None);

        let small = MediaPayload::new("image/png", vec![0u8; 16]);
        let patch = SessionPatch::image(Some(&small));
        assert!(matches!(patch.image, Some(Some(_))));
    }

    #[test]
    fn clearing_media_is_always_persistable() {
        assert_eq!(SessionPatch::image(None).image, Some(None));
        assert_eq!(SessionPatch::audio(None).audio, Some(None));
    }
}
