//! Opaque keyset cursor over `(created_at, id)`.
//!
//! Both the post feed and the notification list are ordered `created_at DESC, id DESC`.
//! A cursor names the last row a client has seen; the next page holds rows strictly
//! less than it under lexicographic comparison, so rows sharing a timestamp are
//! neither skipped nor repeated at page boundaries.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, TimeZone, Utc};

use crate::models::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: DateTime<Utc>,
    pub id: Id,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("malformed cursor")]
pub struct CursorError;

impl Cursor {
    pub fn new(created_at: DateTime<Utc>, id: Id) -> Self {
        Self { created_at, id }
    }

    pub fn encode(&self) -> String {
        let raw = format!("{}:{}", self.created_at.timestamp_micros(), self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(s: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(s).map_err(|_| CursorError)?;
        let raw = String::from_utf8(bytes).map_err(|_| CursorError)?;
        let (micros, id) = raw.split_once(':').ok_or(CursorError)?;
        let micros: i64 = micros.parse().map_err(|_| CursorError)?;
        let id: Id = id.parse().map_err(|_| CursorError)?;
        let created_at = Utc.timestamp_micros(micros).single().ok_or(CursorError)?;
        Ok(Self { created_at, id })
    }

    /// True when a row at `(created_at, id)` comes after this cursor in
    /// `created_at DESC, id DESC` order.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: Id) -> bool {
        (created_at, id) < (self.created_at, self.id)
    }
}

/// Decode an optional query-string cursor; empty strings count as absent.
pub fn parse_opt(s: Option<&str>) -> Result<Option<Cursor>, CursorError> {
    match s {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => Cursor::decode(s.trim()).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_preserves_micros() {
        let ts = Utc.timestamp_micros(1_700_000_000_123_456).unwrap();
        let c = Cursor::new(ts, 77);
        assert_eq!(Cursor::decode(&c.encode()).unwrap(), c);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(Cursor::decode("not-a-cursor"), Err(CursorError));
        assert_eq!(Cursor::decode(&URL_SAFE_NO_PAD.encode("12:x")), Err(CursorError));
        assert_eq!(parse_opt(Some("  ")), Ok(None));
    }

    #[test]
    fn same_timestamp_breaks_ties_on_id() {
        let ts = Utc::now();
        let c = Cursor::new(ts, 10);
        assert!(c.precedes(ts, 9));
        assert!(!c.precedes(ts, 10));
        assert!(!c.precedes(ts, 11));
        assert!(c.precedes(ts - chrono::Duration::seconds(1), 500));
    }
}
