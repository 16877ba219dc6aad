//! Keyset pagination cursor (C5) — §4.6.
//!
//! A cursor is `{created_at, id, source, v}`, JSON-encoded then
//! base64-url-encoded without padding. It is opaque to clients: the only
//! operations are `encode` and `decode`, and decoding is total (never
//! panics) — a malformed cursor becomes `GenonautError::BadCursor`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::GenonautError;
use crate::types::Source;

const CURSOR_VERSION: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub v: u8,
    pub created_at: DateTime<Utc>,
    pub id: i64,
    pub source: String,
}

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: i64, source: Source) -> Self {
        Self {
            v: CURSOR_VERSION,
            created_at,
            id,
            source: source.as_str().to_string(),
        }
    }

    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).expect("Cursor serializes infallibly");
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(raw: &str) -> Result<Self, GenonautError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|e| GenonautError::BadCursor(format!("invalid base64: {e}")))?;
        let cursor: Cursor = serde_json::from_slice(&bytes)
            .map_err(|e| GenonautError::BadCursor(format!("invalid payload: {e}")))?;
        if cursor.v != CURSOR_VERSION {
            return Err(GenonautError::BadCursor(format!(
                "unsupported cursor version {}",
                cursor.v
            )));
        }
        Ok(cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Cursor {
        Cursor::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
            123456,
            Source::Items,
        )
    }

    #[test]
    fn decode_encode_is_a_bijection() {
        let c = sample();
        let decoded = Cursor::decode(&c.encode()).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn encoding_is_url_safe_and_unpadded() {
        let c = sample();
        let encoded = c.encode();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Cursor::decode("not-valid-base64!!!").is_err());
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        let bad = URL_SAFE_NO_PAD.encode(b"{\"v\":1");
        assert!(Cursor::decode(&bad).is_err());
    }

    #[test]
    fn decode_rejects_wrong_version() {
        let mut c = sample();
        c.v = 2;
        let json = serde_json::to_vec(&c).unwrap();
        let encoded = URL_SAFE_NO_PAD.encode(json);
        let err = Cursor::decode(&encoded).unwrap_err();
        assert_eq!(err.kind(), "bad_cursor");
    }
}
