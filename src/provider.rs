use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::Error;
use crate::random;

/// Identity-provider configuration for the relying party.
///
/// Required fields are constructor parameters — no runtime "missing field"
/// errors. Endpoint URLs default to well-known paths under the issuer and
/// can be overridden individually.
///
/// ```rust,ignore
/// use oidc_rp::ProviderConfig;
///
/// let config = ProviderConfig::new(
///     "my-client-id",
///     "my-client-secret",
///     "https://idp.example.com".parse()?,
///     "https://my-app.com/callback".parse()?,
/// );
/// // Optional overrides via chaining:
/// let config = config
///     .with_token_url("https://custom.example.com/oauth/token".parse()?);
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ProviderConfig {
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) issuer: Url,
    pub(crate) auth_url: Url,
    pub(crate) token_url: Url,
    pub(crate) userinfo_url: Option<Url>,
    pub(crate) end_session_url: Url,
    pub(crate) redirect_uri: Url,
    pub(crate) post_logout_redirect_uri: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) http_timeout: std::time::Duration,
}

/// Joins a relative path onto the issuer, preserving any issuer path prefix.
fn issuer_endpoint(issuer: &Url, path: &str) -> Url {
    let mut base = issuer.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path).expect("relative endpoint path is valid")
}

impl ProviderConfig {
    /// Create a new provider configuration.
    ///
    /// Endpoints default to `{issuer}/authorize`, `{issuer}/token`,
    /// `{issuer}/userinfo`, and `{issuer}/logout`. The post-logout return
    /// URL defaults to `/provider-logout-return` on the redirect URI's
    /// origin.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        issuer: Url,
        redirect_uri: Url,
    ) -> Self {
        let mut post_logout_redirect_uri = redirect_uri.clone();
        post_logout_redirect_uri.set_path("/provider-logout-return");
        post_logout_redirect_uri.set_query(None);

        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            auth_url: issuer_endpoint(&issuer, "authorize"),
            token_url: issuer_endpoint(&issuer, "token"),
            userinfo_url: Some(issuer_endpoint(&issuer, "userinfo")),
            end_session_url: issuer_endpoint(&issuer, "logout"),
            issuer,
            redirect_uri,
            post_logout_redirect_uri,
            scopes: vec!["openid".into(), "email".into(), "profile".into()],
            http_timeout: std::time::Duration::from_secs(10),
        }
    }

    /// Override the authorization endpoint.
    #[must_use]
    pub fn with_auth_url(mut self, url: Url) -> Self {
        self.auth_url = url;
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: Url) -> Self {
        self.token_url = url;
        self
    }

    /// Override the userinfo endpoint.
    #[must_use]
    pub fn with_userinfo_url(mut self, url: Url) -> Self {
        self.userinfo_url = Some(url);
        self
    }

    /// Skip the userinfo fetch; identity claims come from the ID token only.
    #[must_use]
    pub fn without_userinfo(mut self) -> Self {
        self.userinfo_url = None;
        self
    }

    /// Override the end-session (RP-initiated logout) endpoint.
    #[must_use]
    pub fn with_end_session_url(mut self, url: Url) -> Self {
        self.end_session_url = url;
        self
    }

    /// Override where the provider returns the browser after logout.
    #[must_use]
    pub fn with_post_logout_redirect_uri(mut self, url: Url) -> Self {
        self.post_logout_redirect_uri = url;
        self
    }

    /// Override the OAuth2 scopes (default: `["openid", "email", "profile"]`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Override the per-request timeout for provider calls (default 10 s).
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// OAuth2 client ID.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Identity provider base URL.
    #[must_use]
    pub fn issuer(&self) -> &Url {
        &self.issuer
    }

    /// Authorization endpoint URL.
    #[must_use]
    pub fn auth_url(&self) -> &Url {
        &self.auth_url
    }

    /// Token exchange endpoint URL.
    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// Userinfo endpoint URL, if enabled.
    #[must_use]
    pub fn userinfo_url(&self) -> Option<&Url> {
        self.userinfo_url.as_ref()
    }

    /// End-session endpoint URL.
    #[must_use]
    pub fn end_session_url(&self) -> &Url {
        &self.end_session_url
    }

    /// OAuth2 redirect URI.
    #[must_use]
    pub fn redirect_uri(&self) -> &Url {
        &self.redirect_uri
    }

    /// Requested OAuth2 scopes.
    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }
}

/// HTTP client for the identity provider's endpoints.
pub struct ProviderClient {
    config: ProviderConfig,
    http: reqwest::Client,
}

/// Authorization URL plus the secrets to store for the callback.
#[non_exhaustive]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
}

/// Token response from the provider's token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[non_exhaustive]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

impl ProviderClient {
    /// Create a new provider client.
    #[must_use]
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// The provider configuration.
    #[must_use]
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Generate an authorization URL with fresh state, nonce, and PKCE
    /// parameters.
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let state = random::generate_state();
        let nonce = random::generate_nonce();
        let code_verifier = random::generate_code_verifier();
        let code_challenge = random::code_challenge_s256(&code_verifier);
        let scope = self.config.scopes.join(" ");

        let mut url = self.config.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", self.config.redirect_uri.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", &state)
            .append_pair("nonce", &nonce)
            .append_pair("code_challenge", &code_challenge)
            .append_pair("code_challenge_method", "S256");

        AuthorizationRequest {
            url,
            state,
            nonce,
            code_verifier,
        }
    }

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] on network failure or timeout, or
    /// [`Error::Provider`] if the token endpoint returns an error.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenResponse, Error> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code_verifier", code_verifier),
        ];

        let response = self
            .http
            .post(self.config.token_url.clone())
            .timeout(self.config.http_timeout)
            .form(&params)
            .send()
            .await?;

        let response = Self::ensure_success(response, "token exchange").await?;
        response.json::<TokenResponse>().await.map_err(Into::into)
    }

    /// Fetch userinfo claims with an access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Token`] if no userinfo endpoint is configured,
    /// [`Error::Http`] on network failure or timeout, or [`Error::Provider`]
    /// if the endpoint returns an error.
    pub async fn get_user_info(&self, access_token: &str) -> Result<Map<String, Value>, Error> {
        let url = self
            .config
            .userinfo_url
            .as_ref()
            .ok_or_else(|| Error::Token("no userinfo endpoint configured".into()))?;

        let response = self
            .http
            .get(url.clone())
            .timeout(self.config.http_timeout)
            .bearer_auth(access_token)
            .send()
            .await?;

        let response = Self::ensure_success(response, "userinfo request").await?;
        response
            .json::<Map<String, Value>>()
            .await
            .map_err(Into::into)
    }

    /// The end-session URL that clears the provider-side session.
    #[must_use]
    pub fn end_session_url(&self) -> Url {
        let mut url = self.config.end_session_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair(
                "post_logout_redirect_uri",
                self.config.post_logout_redirect_uri.as_str(),
            );
        url
    }

    /// Checks HTTP response status; returns the response on success or an
    /// error with the captured body.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(Error::Provider {
            operation,
            status: Some(status),
            detail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ProviderConfig {
        ProviderConfig::new(
            "test-client",
            "test-secret",
            "https://idp.example.com".parse().unwrap(),
            "https://app.example.com/callback".parse().unwrap(),
        )
    }

    fn query_param(url: &Url, name: &str) -> Option<String> {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.to_string())
    }

    #[test]
    fn endpoints_derive_from_issuer() {
        let config = test_config();
        assert_eq!(config.auth_url().as_str(), "https://idp.example.com/authorize");
        assert_eq!(config.token_url().as_str(), "https://idp.example.com/token");
        assert_eq!(
            config.userinfo_url().unwrap().as_str(),
            "https://idp.example.com/userinfo"
        );
        assert_eq!(config.end_session_url().as_str(), "https://idp.example.com/logout");
    }

    #[test]
    fn endpoints_preserve_issuer_path_prefix() {
        let config = ProviderConfig::new(
            "c",
            "s",
            "https://idp.example.com/realms/acme".parse().unwrap(),
            "https://app.example.com/callback".parse().unwrap(),
        );
        assert_eq!(
            config.auth_url().as_str(),
            "https://idp.example.com/realms/acme/authorize"
        );
        assert_eq!(
            config.token_url().as_str(),
            "https://idp.example.com/realms/acme/token"
        );
    }

    #[test]
    fn post_logout_defaults_to_redirect_origin() {
        let config = test_config();
        assert_eq!(
            config.post_logout_redirect_uri.as_str(),
            "https://app.example.com/provider-logout-return"
        );
    }

    #[test]
    fn config_with_overrides() {
        let config = test_config()
            .with_auth_url("https://custom.example.com/authorize".parse().unwrap())
            .with_scopes(vec!["openid".into()])
            .without_userinfo();

        assert_eq!(config.auth_url().as_str(), "https://custom.example.com/authorize");
        assert_eq!(config.scopes(), &["openid"]);
        assert!(config.userinfo_url().is_none());
    }

    #[test]
    fn authorization_url_carries_flow_parameters() {
        let client = ProviderClient::new(test_config());
        let req = client.authorization_url();

        assert_eq!(query_param(&req.url, "response_type").as_deref(), Some("code"));
        assert_eq!(query_param(&req.url, "client_id").as_deref(), Some("test-client"));
        assert_eq!(
            query_param(&req.url, "redirect_uri").as_deref(),
            Some("https://app.example.com/callback")
        );
        assert_eq!(
            query_param(&req.url, "scope").as_deref(),
            Some("openid email profile")
        );
        assert_eq!(query_param(&req.url, "state").as_deref(), Some(req.state.as_str()));
        assert_eq!(query_param(&req.url, "nonce").as_deref(), Some(req.nonce.as_str()));
        assert_eq!(
            query_param(&req.url, "code_challenge").as_deref(),
            Some(crate::random::code_challenge_s256(&req.code_verifier).as_str())
        );
        assert_eq!(
            query_param(&req.url, "code_challenge_method").as_deref(),
            Some("S256")
        );
    }

    #[test]
    fn authorization_url_unique_per_call() {
        let client = ProviderClient::new(test_config());
        let req1 = client.authorization_url();
        let req2 = client.authorization_url();

        assert_ne!(req1.state, req2.state);
        assert_ne!(req1.nonce, req2.nonce);
        assert_ne!(req1.code_verifier, req2.code_verifier);
    }

    #[test]
    fn end_session_url_names_client_and_return() {
        let client = ProviderClient::new(test_config());
        let url = client.end_session_url();

        assert!(url.as_str().starts_with("https://idp.example.com/logout?"));
        assert_eq!(query_param(&url, "client_id").as_deref(), Some("test-client"));
        assert_eq!(
            query_param(&url, "post_logout_redirect_uri").as_deref(),
            Some("https://app.example.com/provider-logout-return")
        );
    }
}
