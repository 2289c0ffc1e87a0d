use base64::Engine;
use chrono::{DateTime, Utc};
use courier_shared::error::CourierError;
use courier_shared::ids::MessageId;

use crate::store::HistoryCursor;

/// Offset pagination with a clamped limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 20;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: i64::from(
                limit
                    .unwrap_or(Self::DEFAULT_LIMIT)
                    .clamp(1, Self::MAX_LIMIT),
            ),
            offset: i64::from(offset.unwrap_or(0)),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

pub const HISTORY_DEFAULT_LIMIT: u32 = 50;

pub fn history_limit(limit: Option<u32>) -> i64 {
    i64::from(limit.unwrap_or(HISTORY_DEFAULT_LIMIT).clamp(1, Page::MAX_LIMIT))
}

pub fn encode_cursor(created_at: DateTime<Utc>, id: MessageId) -> String {
    let raw = format!("{}|{}", created_at.timestamp_micros(), id);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

pub fn decode_cursor(cursor: &str) -> Result<HistoryCursor, CourierError> {
    let invalid = |what: &str| CourierError::Validation(format!("invalid cursor {what}"));
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(cursor)
        .map_err(|_| invalid("encoding"))?;
    let raw = String::from_utf8(bytes).map_err(|_| invalid("encoding"))?;
    let (ts_str, id_str) = raw.split_once('|').ok_or_else(|| invalid("format"))?;
    let micros: i64 = ts_str.parse().map_err(|_| invalid("timestamp"))?;
    let created_at =
        DateTime::from_timestamp_micros(micros).ok_or_else(|| invalid("timestamp"))?;
    let id: MessageId = id_str.parse().map_err(|_| invalid("id"))?;
    Ok(HistoryCursor { created_at, id })
}
