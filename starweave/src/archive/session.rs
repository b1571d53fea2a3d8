//! Explicit archive session values.
//!
//! Authentication state is carried as a plain value handed to the client at
//! construction time instead of process-wide login/logout mutation, so
//! characterization runs stay reentrant and tests can construct sessions
//! freely.

/// Credentials for one archive connection.
///
/// Most public data needs no authentication; exclusive-access products
/// require a bearer token issued by the archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveSession {
    token: Option<String>,
}

impl ArchiveSession {
    /// Anonymous session for public data.
    pub fn anonymous() -> Self {
        Self { token: None }
    }

    /// Session authenticated with an archive bearer token.
    pub fn with_token(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
        }
    }

    /// The bearer token, if this session is authenticated.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Diagnostic summary of the session state.
    ///
    /// Never exposes the token itself.
    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            authenticated: self.token.is_some(),
        }
    }
}

/// Diagnostic view of an [`ArchiveSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionInfo {
    /// Whether the session carries a token
    pub authenticated: bool,
}

impl std::fmt::Display for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.authenticated {
            write!(f, "authenticated session")
        } else {
            write!(f, "anonymous session")
        }
    }
}
