use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use cookie::time::Duration as CookieDuration;
use serde::Deserialize;
use tracing::{info, warn};

pub const TOKEN_COOKIE: &str = "notion_token";
pub const TOKEN_TTL_DAYS: i64 = 365;

/// Durable client-side storage for the bearer token.
pub trait TokenStorage {
    fn load(&self) -> Option<String>;
    fn store(&mut self, token: &str);
    fn remove(&mut self);
}

/// Keeps the token in a long-lived, http-only cookie.
pub struct CookieTokenStorage {
    jar: CookieJar,
}

impl CookieTokenStorage {
    pub fn new(jar: CookieJar) -> Self {
        Self { jar }
    }

    pub fn into_jar(self) -> CookieJar {
        self.jar
    }
}

impl TokenStorage for CookieTokenStorage {
    fn load(&self) -> Option<String> {
        self.jar
            .get(TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }

    fn store(&mut self, token: &str) {
        let mut cookie = Cookie::new(TOKEN_COOKIE, token.to_string());
        cookie.set_path("/");
        cookie.set_http_only(true);
        cookie.set_same_site(SameSite::Lax);
        cookie.set_max_age(CookieDuration::days(TOKEN_TTL_DAYS));
        self.jar = self.jar.clone().add(cookie);
    }

    fn remove(&mut self) {
        let mut removal = Cookie::new(TOKEN_COOKIE, "");
        removal.set_path("/");
        removal.set_http_only(true);
        removal.set_same_site(SameSite::Lax);
        removal.set_max_age(CookieDuration::seconds(0));
        self.jar = self.jar.clone().remove(removal);
    }
}

/// In-memory storage backing the session tests.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryTokenStorage {
    value: Option<String>,
}

#[cfg(test)]
impl MemoryTokenStorage {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            value: Some(token.into()),
        }
    }
}

#[cfg(test)]
impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Option<String> {
        self.value.clone()
    }

    fn store(&mut self, token: &str) {
        self.value = Some(token.to_string());
    }

    fn remove(&mut self) {
        self.value = None;
    }
}

/// Query parameters appended by the OAuth callback when it redirects back.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct RedirectQuery {
    pub auth: Option<String>,
    pub token: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

/// Outcome carried by an OAuth redirect, if the navigation was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectResult {
    Success { token: Option<String> },
    Failure {
        message: Option<String>,
        details: Option<String>,
    },
}

impl RedirectResult {
    /// Returns `None` when the query carries no auth marker.
    pub fn from_query(query: &RedirectQuery) -> Option<Self> {
        match query.auth.as_deref()? {
            "success" => Some(RedirectResult::Success {
                token: query.token.clone().filter(|token| !token.trim().is_empty()),
            }),
            "error" => Some(RedirectResult::Failure {
                message: query.message.clone(),
                details: query.details.clone(),
            }),
            other => {
                warn!(marker = other, "ignoring unknown auth redirect marker");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    MissingToken,
    Failed {
        message: String,
        details: Option<String>,
    },
    Restored,
    Anonymous,
}

impl AuthOutcome {
    /// Whether the address bar still holds redirect parameters that must be scrubbed.
    pub fn came_from_redirect(&self) -> bool {
        matches!(
            self,
            AuthOutcome::Authenticated | AuthOutcome::MissingToken | AuthOutcome::Failed { .. }
        )
    }
}

/// Tracks whether the user has completed the Notion OAuth flow.
pub struct SessionStore<S: TokenStorage> {
    storage: S,
    authenticated: bool,
}

impl<S: TokenStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            authenticated: false,
        }
    }

    pub fn capture_from_redirect(&mut self, redirect: Option<RedirectResult>) -> AuthOutcome {
        match redirect {
            Some(RedirectResult::Success { token: Some(token) }) => {
                self.storage.store(&token);
                self.authenticated = true;
                info!("notion authentication completed");
                AuthOutcome::Authenticated
            }
            Some(RedirectResult::Success { token: None }) => {
                warn!("auth redirect reported success without a token");
                self.authenticated = self.storage.load().is_some();
                AuthOutcome::MissingToken
            }
            Some(RedirectResult::Failure { message, details }) => {
                warn!(?message, ?details, "notion authentication failed");
                self.authenticated = self.storage.load().is_some();
                AuthOutcome::Failed {
                    message: message.unwrap_or_else(|| "Unknown error".to_string()),
                    details,
                }
            }
            None => {
                self.authenticated = self.storage.load().is_some();
                if self.authenticated {
                    AuthOutcome::Restored
                } else {
                    AuthOutcome::Anonymous
                }
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        if !self.authenticated {
            return None;
        }
        self.storage.load()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn clear(&mut self) {
        self.storage.remove();
        self.authenticated = false;
    }

    /// Credentials for a submission: the token only travels when an upload was
    /// requested and the session is authenticated.
    pub fn credentials(&self, want_notion_upload: bool) -> UploadCredentials {
        UploadCredentials {
            authenticated: self.authenticated,
            bearer: if want_notion_upload { self.token() } else { None },
        }
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadCredentials {
    pub authenticated: bool,
    pub bearer: Option<String>,
}
