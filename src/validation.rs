//! Identifier validation for lease and task inputs.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::AssignmentError;

const MAX_SHIP_ID_LEN: usize = 64;
const MAX_TASK_ID_LEN: usize = 128;

static SHIP_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("ship id pattern is a valid regex")
});

fn invalid(field: &str, reason: impl Into<String>) -> AssignmentError {
    AssignmentError::Validation {
        field: field.to_string(),
        reason: reason.into(),
    }
}

/// Ship symbols are short ASCII identifiers such as `AGENT-1` or `SHIP_7`.
pub fn validate_ship_id(ship_id: &str) -> Result<(), AssignmentError> {
    if ship_id.is_empty() {
        return Err(invalid("ship_id", "must not be empty"));
    }
    if ship_id.len() > MAX_SHIP_ID_LEN {
        return Err(invalid(
            "ship_id",
            format!("longer than {MAX_SHIP_ID_LEN} characters"),
        ));
    }
    if !SHIP_ID_PATTERN.is_match(ship_id) {
        return Err(invalid(
            "ship_id",
            format!("{ship_id:?} contains characters outside [A-Za-z0-9_-]"),
        ));
    }
    Ok(())
}

/// Task ids are opaque, but must be non-empty and free of whitespace.
pub fn validate_task_id(task_id: &str) -> Result<(), AssignmentError> {
    if task_id.is_empty() {
        return Err(invalid("task_id", "must not be empty"));
    }
    if task_id.len() > MAX_TASK_ID_LEN {
        return Err(invalid(
            "task_id",
            format!("longer than {MAX_TASK_ID_LEN} characters"),
        ));
    }
    if task_id.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("task_id", format!("{task_id:?} contains whitespace")));
    }
    Ok(())
}

pub fn validate_player_id(player_id: i64) -> Result<(), AssignmentError> {
    if player_id <= 0 {
        return Err(invalid(
            "player_id",
            format!("must be positive, got {player_id}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_typical_ship_symbols() {
        for id in ["SHIP-1", "AGENT_7-2A", "s1"] {
            assert!(validate_ship_id(id).is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_ship_ids() {
        for id in ["", "-SHIP", "SHIP 1", "SHIP/1", &"X".repeat(65)] {
            let err = validate_ship_id(id).unwrap_err();
            assert!(matches!(err, AssignmentError::Validation { ref field, .. } if field == "ship_id"));
        }
    }

    #[test]
    fn task_id_rules() {
        assert!(validate_task_id("container-42").is_ok());
        assert!(validate_task_id("").is_err());
        assert!(validate_task_id("two words").is_err());
        assert!(validate_task_id(&"c".repeat(129)).is_err());
    }

    #[test]
    fn player_id_must_be_positive() {
        assert!(validate_player_id(1).is_ok());
        assert!(validate_player_id(0).is_err());
        assert!(validate_player_id(-3).is_err());
    }
}
