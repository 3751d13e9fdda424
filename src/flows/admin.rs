use std::fmt;

use serde::Serialize;

use crate::error::{AdminError, RemoteError};

/// Admin password collected for a single toggle request. Never stored, and
/// its `Debug` output is redacted so it cannot leak into logs.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Turns prompt input into a password. Only the line terminator is
    /// removed; surrounding spaces are part of the password. Cancelled
    /// (`None`) or empty input stops the toggle before any request is made.
    pub fn from_prompt(input: Option<String>) -> Result<Self, AdminError> {
        match input.as_deref().map(|raw| raw.trim_end_matches(['\r', '\n'])) {
            Some(raw) if !raw.is_empty() => Ok(Self(raw.to_string())),
            _ => Err(AdminError::PasswordRequired),
        }
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Maps a failed toggle call onto what the admin is told.
pub fn toggle_failure(err: RemoteError) -> AdminError {
    match err {
        RemoteError::Rejected(message) => AdminError::Rejected(message),
        other => AdminError::Network(other),
    }
}

/// Result of a toggle attempt as the admin control should show it.
#[derive(Debug, Clone, PartialEq)]
pub struct ToggleOutcome {
    /// Value the control shows afterwards: the server's on success, the
    /// previous one on failure.
    pub shown: bool,
    pub error: Option<AdminError>,
}

impl ToggleOutcome {
    pub fn resolve(previous: bool, result: Result<bool, AdminError>) -> Self {
        match result {
            Ok(confirmed) => Self {
                shown: confirmed,
                error: None,
            },
            Err(error) => Self {
                shown: previous,
                error: Some(error),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_or_cancelled_prompt_is_rejected() {
        assert_eq!(Password::from_prompt(None), Err(AdminError::PasswordRequired));
        assert_eq!(Password::from_prompt(Some(String::new())), Err(AdminError::PasswordRequired));
        assert_eq!(Password::from_prompt(Some("\r\n".into())), Err(AdminError::PasswordRequired));
    }

    #[test]
    fn test_prompt_keeps_surrounding_spaces() {
        assert_eq!(Password::from_prompt(Some(" pw \n".into())), Ok(Password::new(" pw ")));
        assert_eq!(Password::from_prompt(Some("pw\r\n".into())), Ok(Password::new("pw")));
        assert_eq!(Password::from_prompt(Some("  ".into())), Ok(Password::new("  ")));
    }

    #[test]
    fn test_password_debug_is_redacted() {
        assert_eq!(format!("{:?}", Password::new("hunter2")), "Password(***)");
    }

    #[test]
    fn test_failure_mapping() {
        assert_eq!(
            toggle_failure(RemoteError::Rejected("Invalid password".into())),
            AdminError::Rejected("Invalid password".into())
        );
        assert!(matches!(toggle_failure(RemoteError::Status(500)), AdminError::Network(_)));
        assert_eq!(
            toggle_failure(RemoteError::Network("refused".into())).to_string(),
            "Network error updating order status"
        );
    }

    #[test]
    fn test_outcome_reverts_on_failure() {
        let ok = ToggleOutcome::resolve(true, Ok(false));
        assert!(!ok.shown);
        assert!(ok.error.is_none());

        let failed = ToggleOutcome::resolve(true, Err(AdminError::PasswordRequired));
        assert!(failed.shown);
        assert_eq!(failed.error, Some(AdminError::PasswordRequired));
    }
}
