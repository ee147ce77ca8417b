use crate::domain::models::OAuthToken;
use crate::infrastructure::config::GoogleOAuthSettings;
use crate::infrastructure::credential_store::CredentialStore;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::oauth_client::{
    OAuthCodeExchangeRequest, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

const DEFAULT_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    pub token_endpoint: String,
    pub authorization_endpoint: String,
}

impl OAuthConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            scopes,
            token_endpoint: DEFAULT_TOKEN_ENDPOINT.to_string(),
            authorization_endpoint: DEFAULT_AUTHORIZATION_ENDPOINT.to_string(),
        }
    }

    pub fn from_settings(settings: &GoogleOAuthSettings) -> Self {
        Self::new(
            settings.client_id.clone(),
            settings.client_secret.clone(),
            settings.redirect_uri.clone(),
            settings.scopes.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

/// What a caller needs to know about the stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

/// The single-user OAuth session the tool layer talks to.
#[async_trait]
pub trait AuthSession: Send + Sync {
    async fn status(&self) -> Result<AuthStatus, InfraError>;

    /// A fresh consent URL; every call carries a new `state` value.
    fn authorization_url(&self) -> Result<String, InfraError>;

    async fn complete(&self, authorization_code: &str) -> Result<OAuthToken, InfraError>;

    /// A usable access token, refreshing when needed. Fails with
    /// `AuthenticationRequired` when the user has to consent again.
    async fn access_token(&self) -> Result<String, InfraError>;

    /// Forgets the stored credential. Signing out twice is not an error.
    async fn sign_out(&self) -> Result<(), InfraError>;
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
    state_sequence: AtomicU64,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
            state_sequence: AtomicU64::new(1),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    fn next_state(&self) -> String {
        let sequence = self.state_sequence.fetch_add(1, Ordering::Relaxed);
        format!(
            "oauth-state-{}-{sequence}",
            (self.now_provider)().timestamp_micros()
        )
    }

    pub fn is_token_valid(&self, token: &OAuthToken) -> bool {
        token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS)
    }

    pub fn build_authorization_url(&self, state: &str) -> Result<String, InfraError> {
        if state.trim().is_empty() {
            return Err(InfraError::OAuth("state must not be empty".to_string()));
        }
        if self.config.scopes.is_empty() {
            return Err(InfraError::OAuth("at least one scope is required".to_string()));
        }

        let mut url = Url::parse(&self.config.authorization_endpoint)
            .map_err(|error| InfraError::OAuth(format!("invalid authorization endpoint: {error}")))?;
        let scope = self.config.scopes.join(" ");

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &scope)
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state);

        Ok(url.to_string())
    }

    pub async fn authenticate_with_code(&self, authorization_code: &str) -> Result<OAuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::OAuth("authorization code must not be empty".to_string()));
        }

        let response = self
            .oauth_client
            .exchange_authorization_code(OAuthCodeExchangeRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                redirect_uri: self.config.redirect_uri.clone(),
                authorization_code: authorization_code.trim().to_string(),
            })
            .await?;

        let token = self.token_from_response(response, None);
        self.credential_store.save_token(&token)?;
        info!(expires_at = %token.expires_at, "stored oauth token from authorization code");
        Ok(token)
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let Some(stored_token) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        if self.is_token_valid(&stored_token) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.client_id.clone(),
                client_secret: self.config.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token.clone());
                self.credential_store.save_token(&token)?;
                info!(expires_at = %token.expires_at, "refreshed oauth token");
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(message)) => {
                warn!(%message, "token refresh rejected; reauthentication required");
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => {
                warn!(%error, "token refresh did not complete");
                Err(error)
            }
        }
    }

    pub fn clear_stored_token(&self) -> Result<(), InfraError> {
        self.credential_store.delete_token()?;
        info!("cleared stored oauth token");
        Ok(())
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}

#[async_trait]
impl<S, C> AuthSession for OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn status(&self) -> Result<AuthStatus, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => Ok(AuthStatus {
                authenticated: true,
                expires_at: Some(token.expires_at),
                authorization_url: None,
            }),
            EnsureTokenResult::ReauthenticationRequired => Ok(AuthStatus {
                authenticated: false,
                expires_at: None,
                authorization_url: Some(self.authorization_url()?),
            }),
        }
    }

    fn authorization_url(&self) -> Result<String, InfraError> {
        self.build_authorization_url(&self.next_state())
    }

    async fn complete(&self, authorization_code: &str) -> Result<OAuthToken, InfraError> {
        if authorization_code.trim().is_empty() {
            return Err(InfraError::Validation("code must not be empty".to_string()));
        }
        self.authenticate_with_code(authorization_code).await
    }

    async fn access_token(&self) -> Result<String, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(token.access_token)
            }
            EnsureTokenResult::ReauthenticationRequired => Err(InfraError::AuthenticationRequired(
                "no usable google credential is stored".to_string(),
            )),
        }
    }

    async fn sign_out(&self) -> Result<(), InfraError> {
        self.clear_stored_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::credential_store::InMemoryCredentialStore;
    use crate::infrastructure::oauth_client::ReqwestOAuthClient;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeResponse {
        Success(OAuthTokenResponse),
        OAuthError(String),
        Network(String),
    }

    impl Default for FakeResponse {
        fn default() -> Self {
            Self::Success(OAuthTokenResponse {
                access_token: "fake_access".to_string(),
                refresh_token: Some("fake_refresh".to_string()),
                expires_in: 3600,
                token_type: Some("Bearer".to_string()),
                scope: Some("https://www.googleapis.com/auth/calendar.readonly".to_string()),
            })
        }
    }

    impl FakeResponse {
        fn into_result(self) -> Result<OAuthTokenResponse, InfraError> {
            match self {
                Self::Success(value) => Ok(value),
                Self::OAuthError(message) => Err(InfraError::OAuth(message)),
                Self::Network(message) => Err(InfraError::OAuthTransport(message)),
            }
        }
    }

    #[derive(Debug, Default)]
    struct FakeOAuthHttpClient {
        exchange_response: Mutex<FakeResponse>,
        refresh_response: Mutex<FakeResponse>,
        exchange_calls: AtomicUsize,
        refresh_calls: AtomicUsize,
        last_code: Mutex<Option<String>>,
    }

    impl FakeOAuthHttpClient {
        fn set_exchange_response(&self, response: FakeResponse) {
            *self.exchange_response.lock().expect("exchange mutex poisoned") = response;
        }

        fn set_refresh_response(&self, response: FakeResponse) {
            *self.refresh_response.lock().expect("refresh mutex poisoned") = response;
        }
    }

    #[async_trait]
    impl OAuthHttpClient for FakeOAuthHttpClient {
        async fn exchange_authorization_code(
            &self,
            request: OAuthCodeExchangeRequest,
        ) -> Result<OAuthTokenResponse, InfraError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_code.lock().expect("code mutex poisoned") = Some(request.authorization_code);
            self.exchange_response
                .lock()
                .expect("exchange mutex poisoned")
                .clone()
                .into_result()
        }

        async fn refresh_access_token(
            &self,
            _request: OAuthRefreshRequest,
        ) -> Result<OAuthTokenResponse, InfraError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            self.refresh_response
                .lock()
                .expect("refresh mutex poisoned")
                .clone()
                .into_result()
        }
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig::new(
            "client-id",
            "client-secret",
            "http://localhost:8080/oauth2/callback",
            vec!["https://www.googleapis.com/auth/calendar.readonly".to_string()],
        )
    }

    type TestManager = OAuthManager<InMemoryCredentialStore, FakeOAuthHttpClient>;

    fn manager_with(
        token: Option<OAuthToken>,
    ) -> (TestManager, Arc<InMemoryCredentialStore>, Arc<FakeOAuthHttpClient>) {
        let store = Arc::new(InMemoryCredentialStore::default());
        if let Some(token) = token {
            store.save_token(&token).expect("save token");
        }
        let client = Arc::new(FakeOAuthHttpClient::default());
        let manager = OAuthManager::new(test_config(), Arc::clone(&store), Arc::clone(&client));
        (manager, store, client)
    }

    fn expired_token(refresh_token: Option<&str>) -> OAuthToken {
        OAuthToken {
            access_token: "expired-token".to_string(),
            refresh_token: refresh_token.map(ToOwned::to_owned),
            expires_at: Utc::now() - Duration::seconds(120),
            token_type: "Bearer".to_string(),
            scope: None,
        }
    }

    fn token_pattern() -> impl Strategy<Value = String> {
        "[A-Za-z0-9._\\-]{1,64}".prop_map(|value| value.to_string())
    }

    fn arb_oauth_token() -> impl Strategy<Value = OAuthToken> {
        (
            token_pattern(),
            prop::option::of(token_pattern()),
            120i64..604800i64,
            prop::option::of(token_pattern()),
            token_pattern(),
        )
            .prop_map(
                |(access_token, refresh_token, expires_in_seconds, scope, token_type)| OAuthToken {
                    access_token,
                    refresh_token,
                    expires_at: Utc::now() + Duration::seconds(expires_in_seconds),
                    token_type,
                    scope,
                },
            )
    }

    // Property: a still-valid token is reused without touching the token endpoint
    proptest! {
        #[test]
        fn valid_token_needs_no_reauthentication(token in arb_oauth_token()) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let (manager, _store, client) = manager_with(Some(token.clone()));
                let result = manager.ensure_access_token().await.expect("ensure token");

                assert_eq!(result, EnsureTokenResult::Existing(token));
                assert_eq!(client.exchange_calls.load(Ordering::SeqCst), 0);
                assert_eq!(client.refresh_calls.load(Ordering::SeqCst), 0);
            });
        }
    }

    // Property: an expired token whose refresh is rejected asks for consent again
    proptest! {
        #[test]
        fn rejected_refresh_requires_reauthentication(
            refresh_token in prop::option::of(token_pattern()),
            expired_seconds_ago in 1i64..86400i64
        ) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let mut expired = expired_token(refresh_token.as_deref());
                expired.expires_at = Utc::now() - Duration::seconds(expired_seconds_ago);
                let (manager, _store, client) = manager_with(Some(expired));
                client.set_refresh_response(FakeResponse::OAuthError("invalid_grant".to_string()));

                let result = manager.ensure_access_token().await.expect("ensure token");

                assert_eq!(result, EnsureTokenResult::ReauthenticationRequired);
                let expected_calls = usize::from(refresh_token.is_some());
                assert_eq!(client.refresh_calls.load(Ordering::SeqCst), expected_calls);
            });
        }
    }

    #[test]
    fn authorization_url_requests_offline_consent() {
        let (manager, _, _) = manager_with(None);
        let url = Url::parse(&manager.build_authorization_url("state-1").expect("url")).expect("parse");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.clone())
        };
        assert_eq!(get("access_type").as_deref(), Some("offline"));
        assert_eq!(get("prompt").as_deref(), Some("consent"));
        assert_eq!(get("response_type").as_deref(), Some("code"));
        assert_eq!(get("state").as_deref(), Some("state-1"));
        assert_eq!(
            get("scope").as_deref(),
            Some("https://www.googleapis.com/auth/calendar.readonly")
        );
    }

    #[test]
    fn each_authorization_url_has_a_fresh_state() {
        let (manager, _, _) = manager_with(None);
        let first = manager.authorization_url().expect("first url");
        let second = manager.authorization_url().expect("second url");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn expired_token_with_refresh_token_is_refreshed() {
        let (manager, store, client) = manager_with(Some(expired_token(Some("refresh-token"))));
        client.set_refresh_response(FakeResponse::Success(OAuthTokenResponse {
            access_token: "new-access-token".to_string(),
            refresh_token: None,
            expires_in: 3600,
            token_type: Some("Bearer".to_string()),
            scope: None,
        }));

        match manager.ensure_access_token().await.expect("ensure access token") {
            EnsureTokenResult::Refreshed(token) => {
                assert_eq!(token.access_token, "new-access-token");
                assert_eq!(token.refresh_token.as_deref(), Some("refresh-token"));
            }
            other => panic!("expected refreshed result, got {other:?}"),
        }
        let stored = store.load_token().expect("load").expect("stored");
        assert_eq!(stored.access_token, "new-access-token");
    }

    #[tokio::test]
    async fn refresh_transport_failure_is_an_error() {
        let (manager, store, client) = manager_with(Some(expired_token(Some("refresh-token"))));
        client.set_refresh_response(FakeResponse::Network("connection reset".to_string()));
        assert!(matches!(
            manager.ensure_access_token().await,
            Err(InfraError::OAuthTransport(_))
        ));
        assert!(matches!(
            manager.access_token().await,
            Err(InfraError::OAuthTransport(_))
        ));
        assert!(store.load_token().expect("load").is_some());
    }

    #[tokio::test]
    async fn unreachable_token_endpoint_does_not_ask_for_consent() {
        let store = Arc::new(InMemoryCredentialStore::default());
        store
            .save_token(&expired_token(Some("refresh-token")))
            .expect("save token");
        let mut config = test_config();
        config.token_endpoint = "http://127.0.0.1:9/token".to_string();
        let manager = OAuthManager::new(
            config,
            store,
            Arc::new(ReqwestOAuthClient::new().expect("client")),
        );

        let result = manager.access_token().await;
        assert!(matches!(result, Err(InfraError::OAuthTransport(_))), "{result:?}");
    }

    #[tokio::test]
    async fn complete_stores_token_and_trims_code() {
        let fixed_now = Utc::now();
        let (manager, store, client) = manager_with(None);
        let manager = manager.with_now_provider(Arc::new(move || fixed_now));
        client.set_exchange_response(FakeResponse::Success(OAuthTokenResponse {
            access_token: "code-access-token".to_string(),
            refresh_token: Some("code-refresh-token".to_string()),
            expires_in: 1800,
            token_type: None,
            scope: None,
        }));

        let token = manager.complete("  sample-code ").await.expect("complete");
        assert_eq!(token.expires_at, fixed_now + Duration::seconds(1800));
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(
            client.last_code.lock().expect("code mutex").as_deref(),
            Some("sample-code")
        );
        assert_eq!(store.load_token().expect("load"), Some(token));
    }

    #[tokio::test]
    async fn complete_rejects_blank_code_without_network() {
        let (manager, _, client) = manager_with(None);
        assert!(matches!(manager.complete("   ").await, Err(InfraError::Validation(_))));
        assert_eq!(client.exchange_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn access_token_without_credential_requires_authentication() {
        let (manager, _, _) = manager_with(None);
        assert!(matches!(
            manager.access_token().await,
            Err(InfraError::AuthenticationRequired(_))
        ));

        let status = manager.status().await.expect("status");
        assert!(!status.authenticated);
        assert!(status.authorization_url.is_some());
    }

    #[tokio::test]
    async fn status_reports_expiry_when_authenticated() {
        let token = OAuthToken {
            access_token: "live".to_string(),
            refresh_token: None,
            expires_at: Utc::now() + Duration::seconds(3600),
            token_type: "Bearer".to_string(),
            scope: None,
        };
        let (manager, _, _) = manager_with(Some(token.clone()));
        let status = manager.status().await.expect("status");
        assert!(status.authenticated);
        assert_eq!(status.expires_at, Some(token.expires_at));
        assert_eq!(manager.access_token().await.expect("token"), "live");

        manager.sign_out().await.expect("sign out");
        assert!(!manager.status().await.expect("status").authenticated);
        manager.sign_out().await.expect("second sign out");
    }
}
