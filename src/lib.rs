pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod mcp;

use application::commands::AppState;
use application::event_source::GoogleCalendarEventSource;
use application::oauth::{AuthSession, OAuthConfig, OAuthManager};
use domain::color_palette::ColorPalette;
use infrastructure::config::AppConfig;
use infrastructure::credential_store::FileCredentialStore;
use infrastructure::error::InfraError;
use infrastructure::google_calendar_client::ReqwestGoogleCalendarClient;
use infrastructure::oauth_client::ReqwestOAuthClient;
use mcp::server::CalendarColorServer;
use mcp::transport::serve_stdio;
use std::sync::Arc;
use tracing::info;

/// Wires the Google-backed collaborators described by `config`.
pub fn build_state(config: &AppConfig) -> Result<AppState, InfraError> {
    let credential_store = Arc::new(FileCredentialStore::new(config.token_path.clone()));
    let oauth_client = Arc::new(ReqwestOAuthClient::new()?);
    let auth_session: Arc<dyn AuthSession> = Arc::new(OAuthManager::new(
        OAuthConfig::from_settings(&config.oauth),
        credential_store,
        oauth_client,
    ));

    let calendar_client = Arc::new(ReqwestGoogleCalendarClient::new()?);
    let event_source = Arc::new(GoogleCalendarEventSource::new(
        calendar_client,
        Arc::clone(&auth_session),
        config.calendar_id.clone(),
        config.timezone,
    ));

    Ok(AppState::new(
        event_source,
        auth_session,
        ColorPalette::new(config.locale),
    ))
}

pub async fn run(config: AppConfig) -> Result<(), InfraError> {
    info!(
        calendar_id = %config.calendar_id,
        locale = config.locale.as_str(),
        timezone = %config.timezone,
        token_path = %config.token_path.display(),
        "starting calendar color MCP server on stdio"
    );
    let server = CalendarColorServer::new(build_state(&config)?);
    serve_stdio(server).await
}
