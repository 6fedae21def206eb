//! Session code generation.
//!
//! Codes only need to be short enough to read out loud and unpredictable
//! enough to resist casual guessing; they are not a security boundary.

use rand::Rng;

/// Lowest 4-digit code.
const MIN_CODE: u32 = 1_000;
/// One past the highest 4-digit code.
const MAX_CODE: u32 = 10_000;

/// Draw a fresh 4-digit session code.
pub fn generate() -> u32 {
    rand::rng().random_range(MIN_CODE..MAX_CODE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_four_digits() {
        for _ in 0..1_000 {
            let code = generate();
            assert!((MIN_CODE..MAX_CODE).contains(&code));
        }
    }
}
