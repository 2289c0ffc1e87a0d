/// Window during which a typing signal is considered live.
pub const TYPING_TTL_SECS: i64 = 3;
/// Maximum number of one-time pre-keys accepted in a single upload.
pub const MAX_PRE_KEY_BATCH: usize = 100;
/// Below this many unused pre-keys the client should upload more.
pub const PRE_KEY_REPLENISH_THRESHOLD: i64 = 20;
/// Maximum decoded size of any uploaded public key or signature.
pub const MAX_KEY_MATERIAL_BYTES: usize = 1024;
/// Maximum size of an opaque ratchet state blob (base64 text).
pub const MAX_RATCHET_STATE_BYTES: usize = 64 * 1024;
/// Maximum size for a single message body in bytes.
pub const MAX_MESSAGE_SIZE_BYTES: usize = 8 * 1024;
/// Maximum length of a reaction emoji in bytes.
pub const MAX_EMOJI_BYTES: usize = 32;
/// Maximum length of a search query in characters.
pub const MAX_SEARCH_QUERY_LENGTH: usize = 200;
