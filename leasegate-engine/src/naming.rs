//! Token display names.
//!
//! Names are `<role>-<suffix>` where the suffix is a time-seeded random
//! integer. They are audit labels, not secrets. When a name would exceed the
//! effective maximum length the role portion is cut from the right; the
//! separator and suffix survive unless the limit cannot even hold them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Default limit on token display names.
pub const DEFAULT_MAX_TOKEN_NAME_LENGTH: usize = 64;

const SEPARATOR: char = '-';

/// Resolves the effective maximum name length.
///
/// Order: stored config value, then override, then `default`. Zero is
/// treated as unset at every level.
pub fn resolve_max_token_length(
    configured: Option<usize>,
    override_length: Option<usize>,
    default: usize,
) -> usize {
    configured
        .filter(|n| *n > 0)
        .or(override_length.filter(|n| *n > 0))
        .unwrap_or(default)
}

/// Generates a fresh, length-bounded name for a token minted under `role_name`.
pub fn generate_name(role_name: &str, max_length: usize) -> String {
    compose_name(role_name, random_suffix(), max_length)
}

/// Builds a name from an explicit suffix.
///
/// The result is never longer than `max_length`, and is exactly
/// `max_length` whenever the untruncated name would be longer.
pub fn compose_name(role_name: &str, suffix: u64, max_length: usize) -> String {
    let suffix = suffix.to_string();
    let fixed = suffix.len() + SEPARATOR.len_utf8();
    let role_length = role_name.chars().count();

    if role_length + fixed <= max_length {
        return format!("{role_name}{SEPARATOR}{suffix}");
    }

    if max_length >= fixed {
        let role_part: String = role_name.chars().take(max_length - fixed).collect();
        return format!("{role_part}{SEPARATOR}{suffix}");
    }

    // No room for any role characters or the separator. Uniqueness degrades
    // with every digit dropped here.
    suffix.chars().take(max_length).collect()
}

/// Non-negative integer from a generator seeded with the current time.
fn random_suffix() -> u64 {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    StdRng::seed_from_u64(seed).random::<u64>() >> 1
}
