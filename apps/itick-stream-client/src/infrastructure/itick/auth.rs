//! iTick WebSocket Authentication
//!
//! The stream authenticates with a single access token sent as the `params`
//! of an `auth` action right after the session opens.
//!
//! # Authentication Flow
//!
//! 1. Connect to the WebSocket endpoint
//! 2. Send `{"ac":"auth","params":"<token>"}`
//! 3. Receive `{"resAc":"auth","code":1}` on success, any other code on failure

use std::fmt;

use thiserror::Error;

use super::messages::{ControlResponse, WireMessage};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during authentication.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// No token was supplied.
    #[error("access token cannot be empty")]
    EmptyToken,

    /// The server answered `auth` with a failure code.
    #[error("authentication rejected ({code}): {message}")]
    Rejected {
        /// Response code from the server.
        code: i64,
        /// Error text from the server.
        message: String,
    },
}

impl From<&ControlResponse> for AuthError {
    fn from(resp: &ControlResponse) -> Self {
        Self::Rejected {
            code: resp.code,
            message: resp.message().to_string(),
        }
    }
}

// =============================================================================
// Access Token
// =============================================================================

/// iTick access token.
///
/// `Debug` and `Display` redact the value so it never reaches the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a token, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmptyToken`] if the token is blank.
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(AuthError::EmptyToken);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Raw token value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Build the `auth` action for this token.
    #[must_use]
    pub fn to_auth_message(&self) -> WireMessage {
        WireMessage::auth(self.0.clone())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&"[REDACTED]").finish()
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::itick::messages::{Action, ControlAction};

    #[test]
    fn token_rejects_blank_values() {
        assert_eq!(AccessToken::new(""), Err(AuthError::EmptyToken));
        assert_eq!(AccessToken::new("   "), Err(AuthError::EmptyToken));
    }

    #[test]
    fn token_is_trimmed() {
        let token = AccessToken::new("  abc123 \n").unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn token_is_redacted_in_debug_and_display() {
        let token = AccessToken::new("super-secret").unwrap();
        assert!(!format!("{token:?}").contains("super-secret"));
        assert!(!token.to_string().contains("super-secret"));
    }

    #[test]
    fn auth_message_carries_token() {
        let msg = AccessToken::new("abc123").unwrap().to_auth_message();
        assert_eq!(msg.ac, Action::Auth);
        assert_eq!(msg.params, "abc123");
        assert!(msg.types.is_none());
    }

    #[test]
    fn rejection_from_control_response() {
        let mut resp = ControlResponse::new(ControlAction::Auth, 0);
        resp.msg = Some("invalid token".to_string());

        assert_eq!(
            AuthError::from(&resp),
            AuthError::Rejected {
                code: 0,
                message: "invalid token".to_string(),
            }
        );
    }
}
