use axum_extra::extract::cookie::Key;
use url::Url;

use crate::flow::AuthError;
use crate::provider::{ProviderClient, ProviderConfig};

/// Shared auth settings used by both config and runtime state.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) session_cookie_name: String,
    pub(crate) session_ttl_days: i64,
    pub(crate) secure_cookies: bool,
    pub(crate) auth_path: String,
    pub(crate) login_redirect: String,
    pub(crate) logout_redirect: String,
    pub(crate) error_redirect: String,
    pub(crate) auth_request_ttl: time::Duration,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            session_cookie_name: "__oidc_session".into(),
            session_ttl_days: 30,
            secure_cookies: true,
            auth_path: String::new(),
            login_redirect: "/".into(),
            logout_redirect: "/".into(),
            error_redirect: "/".into(),
            auth_request_ttl: time::Duration::minutes(10),
        }
    }
}

/// Relying-party route configuration.
///
/// The required provider client is a constructor parameter — no runtime
/// "missing field" errors. Use [`from_env()`](OidcAuthConfig::from_env)
/// for convention-based setup, or [`new()`](OidcAuthConfig::new) with
/// `with_*` methods for full control.
pub struct OidcAuthConfig {
    pub(super) client: ProviderClient,
    pub(super) settings: AuthSettings,
}

fn required_var(name: &'static str) -> Result<String, AuthError> {
    std::env::var(name).map_err(|_| AuthError::Config(format!("{name} is required")))
}

fn required_url(name: &'static str) -> Result<Url, AuthError> {
    required_var(name)?
        .parse()
        .map_err(|e| AuthError::Config(format!("{name}: {e}")))
}

fn optional_url(name: &'static str) -> Result<Option<Url>, AuthError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| AuthError::Config(format!("{name}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl OidcAuthConfig {
    /// Create config with the required provider client.
    ///
    /// All optional fields use sensible defaults. Override with `with_*`
    /// methods.
    #[must_use]
    pub fn new(client: ProviderClient) -> Self {
        Self {
            client,
            settings: AuthSettings::defaults(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `OIDC_ISSUER_URL`: identity provider base URL
    /// - `OIDC_CLIENT_ID`: OAuth2 client ID
    /// - `OIDC_CLIENT_SECRET`: OAuth2 client secret
    /// - `OIDC_REDIRECT_URI`: OAuth2 callback URI (must be a valid URL)
    ///
    /// # Optional env vars
    /// - `OIDC_AUTH_URL`, `OIDC_TOKEN_URL`, `OIDC_USERINFO_URL`,
    ///   `OIDC_END_SESSION_URL`: per-endpoint overrides
    /// - `OIDC_POST_LOGOUT_REDIRECT_URI`: where the provider sends the
    ///   browser after logout
    /// - `OIDC_SCOPES`: comma-separated OAuth2 scopes
    /// - `OIDC_DEV_MODE`: set to `"1"` or `"true"` to disable secure cookies
    /// - `COOKIE_KEY`: cookie encryption key bytes
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Config`] if required env vars are missing or
    /// URLs are invalid. Treat this as fatal: do not serve traffic on a
    /// partially configured relying party.
    pub fn from_env() -> Result<Self, AuthError> {
        let issuer = required_url("OIDC_ISSUER_URL")?;
        let client_id = required_var("OIDC_CLIENT_ID")?;
        let client_secret = required_var("OIDC_CLIENT_SECRET")?;
        let redirect_uri = required_url("OIDC_REDIRECT_URI")?;

        let mut config = ProviderConfig::new(client_id, client_secret, issuer, redirect_uri);

        if let Some(url) = optional_url("OIDC_AUTH_URL")? {
            config = config.with_auth_url(url);
        }
        if let Some(url) = optional_url("OIDC_TOKEN_URL")? {
            config = config.with_token_url(url);
        }
        if let Some(url) = optional_url("OIDC_USERINFO_URL")? {
            config = config.with_userinfo_url(url);
        }
        if let Some(url) = optional_url("OIDC_END_SESSION_URL")? {
            config = config.with_end_session_url(url);
        }
        if let Some(url) = optional_url("OIDC_POST_LOGOUT_REDIRECT_URI")? {
            config = config.with_post_logout_redirect_uri(url);
        }
        if let Ok(scopes) = std::env::var("OIDC_SCOPES") {
            config = config.with_scopes(scopes.split(',').map(|s| s.trim().to_string()).collect());
        }

        let dev_mode = matches!(
            std::env::var("OIDC_DEV_MODE").as_deref(),
            Ok("1") | Ok("true"),
        );

        let cookie_key = match std::env::var("COOKIE_KEY") {
            Ok(k) => Key::try_from(k.as_bytes()).map_err(|_| {
                AuthError::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?,
            Err(_) => Key::generate(),
        };

        Ok(Self::new(ProviderClient::new(config))
            .with_cookie_key(cookie_key)
            .with_secure_cookies(!dev_mode))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_session_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.session_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_session_ttl_days(mut self, days: i64) -> Self {
        self.settings.session_ttl_days = days;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Mount the routes under a path prefix (e.g. `"/auth"`). Must be empty
    /// or start with `/`.
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }

    #[must_use]
    pub fn with_login_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.login_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_logout_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.logout_redirect = path.into();
        self
    }

    #[must_use]
    pub fn with_error_redirect(mut self, path: impl Into<String>) -> Self {
        self.settings.error_redirect = path.into();
        self
    }

    /// Override how long an authorization request stays valid.
    #[must_use]
    pub fn with_auth_request_ttl(mut self, ttl: time::Duration) -> Self {
        self.settings.auth_request_ttl = ttl;
        self
    }
}
