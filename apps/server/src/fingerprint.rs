//! Human-comparable safety numbers for identity keys.

use courier_shared::ids::UserId;
use sha2::{Digest, Sha512};

const FINGERPRINT_VERSION: u16 = 0;
const ITERATIONS: u32 = 5200;
const GROUPS: usize = 12;
const GROUP_BYTES: usize = 5;

/// Derive a 60-digit fingerprint (12 groups of 5 digits) from a user's
/// decoded identity key. The same key and user always yield the same
/// string, so two parties can compare them out of band.
pub fn display_fingerprint(user_id: UserId, identity_key: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(FINGERPRINT_VERSION.to_be_bytes());
    hasher.update(identity_key);
    hasher.update(user_id.0.as_bytes());
    let mut digest = hasher.finalize();

    for _ in 1..ITERATIONS {
        let mut hasher = Sha512::new();
        hasher.update(digest);
        hasher.update(identity_key);
        digest = hasher.finalize();
    }

    digest
        .chunks_exact(GROUP_BYTES)
        .take(GROUPS)
        .map(|chunk| {
            let value = chunk
                .iter()
                .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
            format!("{:05}", value % 100_000)
        })
        .collect::<Vec<_>>()
        .join(" ")
}
