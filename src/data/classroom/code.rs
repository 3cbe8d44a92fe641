//! Join codes students use to enroll in a classroom.

use rand::rngs::OsRng;
use rand::Rng;

pub const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const CODE_LENGTH: usize = 6;

/// Upper bound on draws before code generation gives up. With 36^6 possible codes,
/// hitting it means the collection is (nearly) saturated or the store misbehaves.
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// Draws a code from the operating system's CSPRNG.
pub fn generate_code() -> String {
    let mut rng = OsRng;
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_well_formed(code: &str) -> bool {
    code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

/// Codes are case-insensitive for users typing them in.
pub fn normalize(code: &str) -> String {
    code.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_codes_use_alphabet() {
        for _ in 0..500 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(is_well_formed(&code), "bad code: {}", code);
        }
    }

    #[test]
    fn generated_codes_vary() {
        let codes: HashSet<String> = (0..100).map(|_| generate_code()).collect();
        assert!(codes.len() > 90);
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  AbC12x "), "abc12x");
        assert!(!is_well_formed("ABC12X"));
        assert!(!is_well_formed("abc12"));
        assert!(!is_well_formed("abc-12"));
    }
}
