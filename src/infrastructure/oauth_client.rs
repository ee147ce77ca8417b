use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct OAuthCodeExchangeRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorization_code: String,
}

#[derive(Debug, Clone)]
pub struct OAuthRefreshRequest {
    pub token_endpoint: String,
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct OAuthTokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Google's token endpoint.
///
/// `InfraError::OAuth` means Google answered and refused the grant (for
/// example `invalid_grant`). Anything that stops us from getting a readable
/// answer is `InfraError::OAuthTransport`.
#[async_trait]
pub trait OAuthHttpClient: Send + Sync {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestOAuthClient {
    client: Client,
}

#[derive(Debug, serde::Deserialize)]
struct TokenEndpointBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    token_type: Option<String>,
    scope: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl ReqwestOAuthClient {
    pub fn new() -> Result<Self, InfraError> {
        let client = Client::builder()
            .timeout(TOKEN_REQUEST_TIMEOUT)
            .build()
            .map_err(|error| InfraError::OAuthTransport(format!("failed to build http client: {error}")))?;
        Ok(Self { client })
    }

    async fn request_token(
        &self,
        grant_type: &str,
        endpoint: &str,
        form: &[(&str, String)],
    ) -> Result<OAuthTokenResponse, InfraError> {
        debug!(grant_type, endpoint, "requesting oauth token");
        let response = self
            .client
            .post(endpoint)
            .form(form)
            .send()
            .await
            .map_err(|error| InfraError::OAuthTransport(format!("{grant_type} request failed: {error}")))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            InfraError::OAuthTransport(format!("{grant_type} response could not be read: {error}"))
        })?;

        let decoded = decode_token_body(status, &body);
        if let Err(error) = &decoded {
            warn!(grant_type, status = status.as_u16(), %error, "token request failed");
        }
        decoded
    }
}

/// Sorts a token endpoint reply into a token, a refusal, or an
/// unusable answer.
fn decode_token_body(status: StatusCode, body: &str) -> Result<OAuthTokenResponse, InfraError> {
    let parsed = serde_json::from_str::<TokenEndpointBody>(body).ok();

    if let Some(code) = parsed.as_ref().and_then(|body| body.error.clone()) {
        let detail = parsed
            .as_ref()
            .and_then(|body| body.error_description.as_deref())
            .unwrap_or_default();
        return Err(InfraError::OAuth(format!("{code} {detail}").trim_end().to_string()));
    }

    if !status.is_success() {
        return Err(InfraError::OAuthTransport(format!(
            "token endpoint answered HTTP {}",
            status.as_u16()
        )));
    }

    let Some(parsed) = parsed else {
        return Err(InfraError::OAuthTransport(
            "token endpoint answered with an unreadable body".to_string(),
        ));
    };

    let access_token = parsed
        .access_token
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            InfraError::OAuthTransport("token endpoint answer has no access_token".to_string())
        })?;

    Ok(OAuthTokenResponse {
        access_token,
        refresh_token: parsed.refresh_token,
        expires_in: parsed.expires_in.unwrap_or(0).max(0),
        token_type: parsed.token_type,
        scope: parsed.scope,
    })
}

#[async_trait]
impl OAuthHttpClient for ReqwestOAuthClient {
    async fn exchange_authorization_code(
        &self,
        request: OAuthCodeExchangeRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        let form = [
            ("grant_type", "authorization_code".to_string()),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
            ("redirect_uri", request.redirect_uri),
            ("code", request.authorization_code),
        ];
        self.request_token("authorization_code", &request.token_endpoint, &form)
            .await
    }

    async fn refresh_access_token(
        &self,
        request: OAuthRefreshRequest,
    ) -> Result<OAuthTokenResponse, InfraError> {
        let form = [
            ("grant_type", "refresh_token".to_string()),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
            ("refresh_token", request.refresh_token),
        ];
        self.request_token("refresh_token", &request.token_endpoint, &form)
            .await
    }
}
