//! Keyset (cursor) pagination shared by every list operation.
//!
//! Ordering is `(created_at DESC, id DESC)`. Cursors are Base64URL of the
//! UTF-8 JSON `{"id": <uuid>, "created_at": <ISO-8601 ms UTC>}`, so page
//! transitions are O(1) regardless of dataset size.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::errors::{Error, Result};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 100;
pub const AUDIT_DEFAULT_LIMIT: usize = 100;
pub const AUDIT_MAX_LIMIT: usize = 1000;

/// Paging direction relative to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Next,
    Prev,
}

/// Decoded cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Cursor {
    pub fn encode(&self) -> String {
        let payload = json!({
            "id": self.id.to_string(),
            "created_at": self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        });
        URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes())
    }

    pub fn decode(encoded: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            Error::validation(
                format!("invalid cursor: {reason}"),
                json!({ "cursor": encoded }),
            )
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(encoded.as_bytes())
            .map_err(|_| invalid("not base64url"))?;
        let payload: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|_| invalid("not JSON"))?;

        let id = payload["id"]
            .as_str()
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| invalid("missing id"))?;
        let created_at = payload["created_at"]
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| invalid("missing created_at"))?;

        Ok(Cursor { id, created_at })
    }
}

/// A list request: optional cursor, direction, and a bounded limit.
#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub direction: Direction,
    pub limit: Option<usize>,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        PageRequest {
            cursor: None,
            direction: Direction::Next,
            limit: Some(limit),
        }
    }

    pub fn after(cursor: String, limit: usize) -> Self {
        PageRequest {
            cursor: Some(cursor),
            direction: Direction::Next,
            limit: Some(limit),
        }
    }

    pub fn before(cursor: String, limit: usize) -> Self {
        PageRequest {
            cursor: Some(cursor),
            direction: Direction::Prev,
            limit: Some(limit),
        }
    }

    /// Clamp the limit to the endpoint's cap, rejecting zero.
    pub fn effective_limit(&self, default: usize, max: usize) -> Result<usize> {
        let limit = self.limit.unwrap_or(default);
        if limit == 0 {
            return Err(Error::validation(
                "limit must be >= 1",
                json!({ "limit": limit }),
            ));
        }
        if limit > max {
            return Err(Error::validation(
                "limit exceeds maximum",
                json!({ "limit": limit, "max": max }),
            ));
        }
        Ok(limit)
    }

    pub fn decoded_cursor(&self) -> Result<Option<Cursor>> {
        self.cursor.as_deref().map(Cursor::decode).transpose()
    }
}

/// Response envelope for list operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub prev_cursor: Option<String>,
    pub has_next: bool,
    pub has_prev: bool,
    pub limit: usize,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            prev_cursor: self.prev_cursor,
            has_next: self.has_next,
            has_prev: self.has_prev,
            limit: self.limit,
        }
    }
}

/// Build a page from rows fetched with `limit + 1`.
///
/// `key_of` extracts `(id, created_at)` for cursor construction. Rows must
/// already be in `(created_at DESC, id DESC)` order for `Next` requests;
/// `Prev` requests pass rows in ascending order and this reverses them.
pub fn build_page<T>(
    mut rows: Vec<T>,
    limit: usize,
    direction: Direction,
    is_first_page: bool,
    key_of: impl Fn(&T) -> (Uuid, DateTime<Utc>),
) -> Page<T> {
    let overflow = rows.len() > limit;
    if overflow {
        rows.truncate(limit);
    }

    if direction == Direction::Prev {
        rows.reverse();
    }

    let (has_next, has_prev) = match direction {
        Direction::Next => (overflow, !is_first_page),
        Direction::Prev => (true, overflow),
    };

    let cursor_for = |row: &T| {
        let (id, created_at) = key_of(row);
        Cursor { id, created_at }.encode()
    };

    let next_cursor = if has_next {
        rows.last().map(&cursor_for)
    } else {
        None
    };
    let prev_cursor = if has_prev {
        rows.first().map(&cursor_for)
    } else {
        None
    };

    Page {
        items: rows,
        next_cursor,
        prev_cursor,
        has_next,
        has_prev,
        limit,
    }
}

/// True if `row` comes strictly after the cursor in scan order.
///
/// Used by the in-memory store; the Postgres store expresses the same
/// predicate in SQL.
pub fn row_matches_cursor(
    row_id: Uuid,
    row_created_at: DateTime<Utc>,
    cursor: &Cursor,
    direction: Direction,
) -> bool {
    match direction {
        Direction::Next => {
            row_created_at < cursor.created_at
                || (row_created_at == cursor.created_at && row_id < cursor.id)
        }
        Direction::Prev => {
            row_created_at > cursor.created_at
                || (row_created_at == cursor.created_at && row_id > cursor.id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::id::ordered_uuid;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor {
            id: ordered_uuid(),
            created_at: "2026-03-01T12:00:00.123Z".parse().unwrap(),
        };
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn test_cursor_decode_rejects_garbage() {
        assert!(Cursor::decode("not-a-cursor!!!").is_err());
        let bogus = URL_SAFE_NO_PAD.encode(b"{\"id\": 42}");
        assert!(Cursor::decode(&bogus).is_err());
    }

    #[test]
    fn test_effective_limit_bounds() {
        let req = PageRequest::default();
        assert_eq!(req.effective_limit(50, 100).unwrap(), 50);

        let req = PageRequest::first(100);
        assert_eq!(req.effective_limit(50, 100).unwrap(), 100);

        let req = PageRequest::first(101);
        assert!(req.effective_limit(50, 100).is_err());

        let req = PageRequest::first(0);
        assert!(req.effective_limit(50, 100).is_err());
    }

    #[test]
    fn test_build_page_first_page_with_more_rows() {
        let rows: Vec<(Uuid, DateTime<Utc>)> = (0..4)
            .map(|_| (ordered_uuid(), Utc::now()))
            .rev()
            .collect();

        let page = build_page(rows, 3, Direction::Next, true, |r| (r.0, r.1));
        assert_eq!(page.items.len(), 3);
        assert!(page.has_next);
        assert!(!page.has_prev);
        assert!(page.next_cursor.is_some());
        assert!(page.prev_cursor.is_none());
    }

    #[test]
    fn test_build_page_last_page() {
        let rows: Vec<(Uuid, DateTime<Utc>)> =
            (0..2).map(|_| (ordered_uuid(), Utc::now())).rev().collect();

        let page = build_page(rows, 3, Direction::Next, false, |r| (r.0, r.1));
        assert_eq!(page.items.len(), 2);
        assert!(!page.has_next);
        assert!(page.has_prev);
    }

    #[test]
    fn test_prev_direction_reverses_rows() {
        // Rows arrive in ascending scan order for Prev requests.
        let older = (ordered_uuid(), Utc::now());
        let newer = (ordered_uuid(), Utc::now());
        let rows = vec![older, newer];

        let page = build_page(rows, 3, Direction::Prev, false, |r| (r.0, r.1));
        assert_eq!(page.items[0].0, newer.0);
        assert_eq!(page.items[1].0, older.0);
        assert!(page.has_next);
    }
}
