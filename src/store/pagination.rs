use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationOptions {
    /// Maximum number of items to return. `None` returns everything.
    pub first: Option<u32>,
    /// Opaque cursor from a previous page's `end_cursor`.
    pub after: Option<String>,
}

impl PaginationOptions {
    #[must_use]
    pub fn first(n: u32) -> Self {
        Self {
            first: Some(n),
            after: None,
        }
    }

    #[must_use]
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
    /// Matches for the filter, ignoring the cursor.
    pub total_count: i64,
}

/// Sort key captured in a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum CursorKey {
    Int(i64),
    Text(String),
}

impl CursorKey {
    pub(crate) fn to_sql(&self) -> rusqlite::types::Value {
        match self {
            CursorKey::Int(v) => rusqlite::types::Value::Integer(*v),
            CursorKey::Text(v) => rusqlite::types::Value::Text(v.clone()),
        }
    }
}

/// Keyset position: the sort key of the last row plus its ID as tiebreaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Cursor {
    pub key: CursorKey,
    pub id: String,
}

impl Cursor {
    pub(crate) fn encode(&self) -> Result<String> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("failed to encode cursor: {e}")))?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    pub(crate) fn decode(raw: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(raw)
            .map_err(|_| Error::invalid("malformed pagination cursor"))?;
        serde_json::from_slice(&bytes).map_err(|_| Error::invalid("malformed pagination cursor"))
    }
}

/// Trims a `limit + 1` fetch down to `limit` and reports whether more rows
/// exist, with the cursor of the last kept item.
pub(crate) fn paginate<T, F>(
    items: Vec<T>,
    limit: Option<usize>,
    get_cursor: F,
) -> Result<(Vec<T>, Option<String>, bool)>
where
    F: Fn(&T) -> Cursor,
{
    let Some(limit) = limit else {
        return Ok((items, None, false));
    };
    let has_more = items.len() > limit;
    let items: Vec<T> = items.into_iter().take(limit).collect();
    let next_cursor = match items.last() {
        Some(last) if has_more => Some(get_cursor(last).encode()?),
        _ => None,
    };
    Ok((items, next_cursor, has_more))
}
