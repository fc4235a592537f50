//! Opaque id generation for rooms, players and runs.
//!
//! Codes are drawn from a confusable-free alphabet (uppercase letters and digits,
//! minus `0`, `1`, `O`, `I`) so that a human reading one aloud, or copying it by
//! hand, can't confuse a letter for a digit.

use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_token(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Generate a `<prefix>_<token>` id, e.g. `room_A7K2N9PQ`.
pub fn make_code(prefix: &str, length: usize) -> String {
    format!("{prefix}_{}", random_token(length))
}

pub fn room_code() -> String {
    make_code("room", 8)
}

pub fn player_id() -> String {
    make_code("player", 10)
}

pub fn run_id() -> String {
    make_code("run", 10)
}

/// Normalize a room id from user input: trims whitespace, accepts either the
/// bare code or the full `room_<code>` form, and upper-cases the code portion.
/// Idempotent: normalizing an already-normalized id returns it unchanged.
pub fn normalize_room_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return String::new();
    }

    if let Some((prefix, rest)) = raw.split_once('_') {
        if prefix.eq_ignore_ascii_case("room") {
            return format!("room_{}", rest.to_uppercase());
        }
    }

    format!("room_{}", raw.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_code() {
        assert_eq!(normalize_room_id("abc123"), "room_ABC123");
    }

    #[test]
    fn normalizes_prefixed_code_idempotently() {
        let once = normalize_room_id("room_abc123");
        assert_eq!(once, "room_ABC123");
        assert_eq!(normalize_room_id(&once), once);
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(normalize_room_id("  abc123  "), "room_ABC123");
    }

    #[test]
    fn codes_avoid_confusable_characters() {
        for _ in 0..200 {
            let code = room_code();
            assert!(!code.contains(['0', '1', 'O', 'I']));
        }
    }

    #[test]
    fn ids_have_distinct_prefixes() {
        assert!(player_id().starts_with("player_"));
        assert!(run_id().starts_with("run_"));
    }
}
