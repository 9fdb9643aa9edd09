//! Access-token seams.
//!
//! Transports extract the raw access token from their request type with a
//! [`TokenExtractor`]; a [`TokenParser`] turns it into a [`User`]. The
//! [`AuthManager`] composes the two and installs the resolved user for the
//! request scope.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context;
use crate::principal::User;
use crate::{AuthzError, AuthzResult};

/// Request metadata as carried by header-style transports.
pub type Metadata = HashMap<String, String>;

/// Extracts the raw access token from a transport request.
pub trait TokenExtractor<R>: Send + Sync {
    fn extract_access_token(&self, request: &R) -> Option<String>;
}

/// Resolves an access token into the caller's identity.
#[async_trait]
pub trait TokenParser: Send + Sync {
    /// # Errors
    ///
    /// Returns `AuthzError::Authentication` if the token is invalid.
    async fn user_details_from_access_token(&self, access_token: &str) -> AuthzResult<User>;
}

// =============================================================================
// Bearer Token Extractor
// =============================================================================

/// Reads `authorization: Bearer <token>` from request metadata.
///
/// The key is matched case-insensitively.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerTokenExtractor;

impl TokenExtractor<Metadata> for BearerTokenExtractor {
    fn extract_access_token(&self, request: &Metadata) -> Option<String> {
        let header = request
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("authorization"))
            .map(|(_, value)| value.trim())?;

        header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
    }
}

// =============================================================================
// Static Token Parser
// =============================================================================

/// Parser backed by a fixed token table. Intended for development setups.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenParser {
    users: HashMap<String, User>,
}

impl StaticTokenParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user: User) -> Self {
        self.users.insert(token.into(), user);
        self
    }
}

#[async_trait]
impl TokenParser for StaticTokenParser {
    async fn user_details_from_access_token(&self, access_token: &str) -> AuthzResult<User> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| AuthzError::authentication("Unknown access token"))
    }
}

// =============================================================================
// Auth Manager
// =============================================================================

/// Resolves the caller of a transport request of type `R`.
pub struct AuthManager<R> {
    inner: Option<(Arc<dyn TokenExtractor<R>>, Arc<dyn TokenParser>)>,
}

impl<R> AuthManager<R> {
    #[must_use]
    pub fn new(extractor: Arc<dyn TokenExtractor<R>>, parser: Arc<dyn TokenParser>) -> Self {
        Self {
            inner: Some((extractor, parser)),
        }
    }

    /// Manager used when authentication is disabled: every request is anonymous.
    #[must_use]
    pub fn allow_all() -> Self {
        Self { inner: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Resolve the caller of `request`.
    ///
    /// # Errors
    ///
    /// Returns `AuthzError::Authentication` if authentication is enabled and
    /// the token is missing or rejected by the parser.
    pub async fn authenticate(&self, request: &R) -> AuthzResult<Option<User>> {
        let Some((extractor, parser)) = self.inner.as_ref() else {
            return Ok(None);
        };

        let token = extractor
            .extract_access_token(request)
            .ok_or_else(|| AuthzError::authentication("Missing access token"))?;

        let user = parser
            .user_details_from_access_token(&token)
            .await
            .map_err(|e| {
                tracing::debug!(error = %e, "Failed to parse access token");
                match e {
                    AuthzError::Authentication { .. } => e,
                    other => AuthzError::authentication(other.to_string()),
                }
            })?;

        tracing::debug!(user = %user.username, "Request authenticated");
        Ok(Some(user))
    }

    /// Authenticate `request` and run `future` with the resolved caller as
    /// the current user.
    ///
    /// # Errors
    ///
    /// Returns the authentication error without running `future`.
    pub async fn run_authenticated<F>(&self, request: &R, future: F) -> AuthzResult<F::Output>
    where
        F: Future,
    {
        let user = self.authenticate(request).await?;
        Ok(context::with_current_user(user, future).await)
    }
}
