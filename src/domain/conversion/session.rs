//! Bearer token state machine

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How long an issued bearer token is trusted before re-authenticating
pub const TOKEN_LIFETIME: Duration = Duration::from_secs(23 * 60);

/// Authentication state of the conversion client
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticating,
    Authenticated {
        /// Full `Authorization` header value (`Bearer <jwt>`)
        token: String,
        issued_at: Instant,
    },
}

impl AuthState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::Authenticating => "authenticating",
            Self::Authenticated { .. } => "authenticated",
        }
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid auth transition: cannot {action} while {current_state}")]
pub struct InvalidAuthTransition {
    pub current_state: &'static str,
    pub action: &'static str,
}

/// Process-wide bearer token lifecycle.
///
/// State machine:
///   UNAUTHENTICATED -> AUTHENTICATING (begin_authentication)
///   AUTHENTICATED   -> AUTHENTICATING (begin_authentication, token expired)
///   AUTHENTICATING  -> AUTHENTICATED (complete_authentication)
///   AUTHENTICATING  -> UNAUTHENTICATED (abort_authentication)
///   AUTHENTICATED   -> UNAUTHENTICATED (invalidate, on 401)
#[derive(Debug, Default)]
pub struct ConversionSession {
    state: AuthState,
}

impl ConversionSession {
    /// Create a session with no token
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticating(&self) -> bool {
        self.state == AuthState::Authenticating
    }

    /// The held token, if one was issued no more than [`TOKEN_LIFETIME`] before `now`
    pub fn valid_token(&self, now: Instant) -> Option<&str> {
        match &self.state {
            AuthState::Authenticated { token, issued_at }
                if now.saturating_duration_since(*issued_at) <= TOKEN_LIFETIME =>
            {
                Some(token)
            }
            _ => None,
        }
    }

    /// Start an authentication round trip, dropping any held token
    pub fn begin_authentication(&mut self) -> Result<(), InvalidAuthTransition> {
        if self.is_authenticating() {
            return Err(InvalidAuthTransition {
                current_state: self.state.as_str(),
                action: "begin authentication",
            });
        }
        self.state = AuthState::Authenticating;
        Ok(())
    }

    /// Store the token issued at `issued_at`
    pub fn complete_authentication(
        &mut self,
        token: String,
        issued_at: Instant,
    ) -> Result<(), InvalidAuthTransition> {
        if !self.is_authenticating() {
            return Err(InvalidAuthTransition {
                current_state: self.state.as_str(),
                action: "complete authentication",
            });
        }
        self.state = AuthState::Authenticated { token, issued_at };
        Ok(())
    }

    /// Give up an authentication round trip. No-op unless authenticating.
    pub fn abort_authentication(&mut self) {
        if self.is_authenticating() {
            self.state = AuthState::Unauthenticated;
        }
    }

    /// Forget `token` after the service rejected it.
    ///
    /// Only clears the session when `token` is still the held token, so a
    /// rejection of a stale token cannot discard a newer one. Returns whether
    /// the session was cleared.
    pub fn invalidate(&mut self, token: &str) -> bool {
        match &self.state {
            AuthState::Authenticated { token: held, .. } if held == token => {
                self.state = AuthState::Unauthenticated;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn authenticated(token: &str, issued_at: Instant) -> ConversionSession {
        let mut session = ConversionSession::new();
        session.begin_authentication().unwrap();
        session
            .complete_authentication(token.to_string(), issued_at)
            .unwrap();
        session
    }

    #[test]
    fn new_session_has_no_token() {
        let session = ConversionSession::new();
        assert_eq!(session.state(), &AuthState::Unauthenticated);
        assert!(session.valid_token(Instant::now()).is_none());
    }

    #[test]
    fn token_valid_within_lifetime() {
        let issued = Instant::now();
        let session = authenticated("Bearer abc", issued);

        assert_eq!(session.valid_token(issued), Some("Bearer abc"));
        assert_eq!(session.valid_token(issued + TOKEN_LIFETIME), Some("Bearer abc"));
    }

    #[test]
    fn token_expires_after_lifetime() {
        let issued = Instant::now();
        let session = authenticated("Bearer abc", issued);

        let later = issued + TOKEN_LIFETIME + Duration::from_secs(1);
        assert!(session.valid_token(later).is_none());
    }

    #[test]
    fn cannot_begin_twice() {
        let mut session = ConversionSession::new();
        session.begin_authentication().unwrap();

        let err = session.begin_authentication().unwrap_err();
        assert_eq!(err.current_state, "authenticating");
    }

    #[test]
    fn cannot_complete_without_begin() {
        let mut session = ConversionSession::new();
        assert!(session
            .complete_authentication("Bearer x".to_string(), Instant::now())
            .is_err());
    }

    #[test]
    fn abort_returns_to_unauthenticated() {
        let mut session = ConversionSession::new();
        session.begin_authentication().unwrap();
        session.abort_authentication();
        assert_eq!(session.state(), &AuthState::Unauthenticated);
    }

    #[test]
    fn reauthentication_replaces_token() {
        let issued = Instant::now();
        let mut session = authenticated("Bearer old", issued);

        session.begin_authentication().unwrap();
        assert!(session.valid_token(issued).is_none());
        session
            .complete_authentication("Bearer new".to_string(), issued)
            .unwrap();
        assert_eq!(session.valid_token(issued), Some("Bearer new"));
    }

    #[test]
    fn invalidate_only_clears_matching_token() {
        let issued = Instant::now();
        let mut session = authenticated("Bearer fresh", issued);

        assert!(!session.invalidate("Bearer stale"));
        assert_eq!(session.valid_token(issued), Some("Bearer fresh"));

        assert!(session.invalidate("Bearer fresh"));
        assert_eq!(session.state(), &AuthState::Unauthenticated);
    }
}
