use base64::Engine;
use courier_shared::constants::{
    MAX_EMOJI_BYTES, MAX_KEY_MATERIAL_BYTES, MAX_RATCHET_STATE_BYTES, MAX_SEARCH_QUERY_LENGTH,
};
use courier_shared::error::CourierError;

/// Validate base64 key material and return the decoded bytes.
///
/// Rejects empty input, anything that is not standard padded base64, and
/// keys longer than [`MAX_KEY_MATERIAL_BYTES`] once decoded.
pub fn validate_key_material(field: &str, value: &str) -> Result<Vec<u8>, CourierError> {
    let bytes = decode_base64(field, value)?;
    if bytes.len() > MAX_KEY_MATERIAL_BYTES {
        return Err(CourierError::Validation(format!(
            "{field} must be {MAX_KEY_MATERIAL_BYTES} bytes or fewer"
        )));
    }
    Ok(bytes)
}

/// Ratchet state is opaque to the server; only encoding and size are checked.
pub fn validate_ratchet_state(value: &str) -> Result<(), CourierError> {
    let bytes = decode_base64("ratchet_state", value)?;
    if bytes.len() > MAX_RATCHET_STATE_BYTES {
        return Err(CourierError::Validation(format!(
            "ratchet_state must be {MAX_RATCHET_STATE_BYTES} bytes or fewer"
        )));
    }
    Ok(())
}

fn decode_base64(field: &str, value: &str) -> Result<Vec<u8>, CourierError> {
    if value.trim().is_empty() {
        return Err(CourierError::Validation(format!("{field} is required")));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(value)
        .map_err(|_| CourierError::Validation(format!("{field} must be valid base64")))?;
    if bytes.is_empty() {
        return Err(CourierError::Validation(format!("{field} is required")));
    }
    Ok(bytes)
}

/// Trim and bound a reaction emoji.
pub fn validate_emoji(emoji: &str) -> Result<String, CourierError> {
    let trimmed = emoji.trim();
    if trimmed.is_empty() {
        return Err(CourierError::Validation("emoji is required".into()));
    }
    if trimmed.len() > MAX_EMOJI_BYTES {
        return Err(CourierError::Validation(format!(
            "emoji must be {MAX_EMOJI_BYTES} bytes or fewer"
        )));
    }
    if trimmed.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(CourierError::Validation(
            "emoji must not contain whitespace or control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Trim a search query and bound its length in characters.
pub fn validate_search_query(query: &str) -> Result<String, CourierError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CourierError::Validation("search query is required".into()));
    }
    if trimmed.chars().count() > MAX_SEARCH_QUERY_LENGTH {
        return Err(CourierError::Validation(format!(
            "search query must be {MAX_SEARCH_QUERY_LENGTH} characters or fewer"
        )));
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(CourierError::Validation(
            "search query must not contain control characters".into(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Escape ILIKE metacharacters (`%` and `_`) in a search pattern.
pub fn escape_ilike(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
