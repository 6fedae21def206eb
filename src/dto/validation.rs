//! Validation helpers for DTOs.

use validator::ValidationError;

/// Longest display name a player may pick.
const MAX_NAME_LENGTH: usize = 32;

/// Validates that a player name is non-blank, within length, and free of
/// control characters.
pub fn validate_player_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        let mut err = ValidationError::new("player_name_blank");
        err.message = Some("Player name must not be blank".into());
        return Err(err);
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        let mut err = ValidationError::new("player_name_length");
        err.message = Some(
            format!("Player name must be at most {MAX_NAME_LENGTH} characters").into(),
        );
        return Err(err);
    }

    if name.chars().any(char::is_control) {
        let mut err = ValidationError::new("player_name_format");
        err.message = Some("Player name must not contain control characters".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ordinary_names() {
        assert!(validate_player_name("Perry").is_ok());
        assert!(validate_player_name("player two").is_ok());
        assert!(validate_player_name("Zoë").is_ok());
    }

    #[test]
    fn rejects_blank_names() {
        assert!(validate_player_name("").is_err());
        assert!(validate_player_name("   ").is_err());
    }

    #[test]
    fn rejects_oversized_names() {
        let long = "x".repeat(MAX_NAME_LENGTH + 1);
        assert!(validate_player_name(&long).is_err());
    }

    #[test]
    fn rejects_control_characters() {
        assert!(validate_player_name("Per\nry").is_err());
        assert!(validate_player_name("Per\u{7}ry").is_err());
    }
}
