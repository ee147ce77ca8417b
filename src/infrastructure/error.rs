use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("Invalid parameter: {0}")]
    Validation(String),
    #[error("OAuth error: {0}")]
    OAuth(String),
    #[error("Token endpoint unavailable: {0}")]
    OAuthTransport(String),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Google authentication required: {0}")]
    AuthenticationRequired(String),
    #[error("Google Calendar API error: {0}")]
    CalendarApi(String),
    #[error("MCP transport error: {0}")]
    Mcp(String),
}
