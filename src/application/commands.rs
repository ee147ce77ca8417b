use crate::application::color_analysis::{ColorAnalysisReport, ColorAnalysisService};
use crate::application::event_source::CalendarEventSource;
use crate::application::oauth::{AuthSession, AuthStatus};
use crate::domain::color_filter::ColorFilter;
use crate::domain::color_palette::{ColorInput, ColorPalette, PaletteEntry};
use crate::domain::models::AnalysisPeriod;
use crate::infrastructure::error::InfraError;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const GENERIC_FAILURE: &str = "Failed to fetch calendar data from Google. Please try again later.";
const AUTH_REQUIRED_MESSAGE: &str =
    "Google Calendar authentication is required. Open the URL below, approve access, then call complete_auth with the code.";

/// Collaborators shared by every tool call. Holds no per-request state.
pub struct AppState {
    auth_session: Arc<dyn AuthSession>,
    analysis: ColorAnalysisService,
    palette: ColorPalette,
}

impl AppState {
    pub fn new(
        event_source: Arc<dyn CalendarEventSource>,
        auth_session: Arc<dyn AuthSession>,
        palette: ColorPalette,
    ) -> Self {
        Self {
            auth_session,
            analysis: ColorAnalysisService::new(event_source, palette),
            palette,
        }
    }

    pub fn palette(&self) -> ColorPalette {
        self.palette
    }

    /// Turns a command failure into what the caller is shown. Validation
    /// messages pass through, authentication failures carry a consent URL,
    /// everything else is logged and replaced by a generic message.
    pub fn command_error(&self, command: &str, failure: &InfraError) -> CommandFailure {
        match failure {
            InfraError::Validation(message) => {
                info!(command, %message, "rejected tool arguments");
                CommandFailure {
                    message: message.clone(),
                    authorization_url: None,
                }
            }
            InfraError::AuthenticationRequired(reason) => {
                warn!(command, %reason, "google authentication required");
                let authorization_url = match self.auth_session.authorization_url() {
                    Ok(url) => Some(url),
                    Err(url_error) => {
                        error!(command, error = %url_error, "could not build authorization url");
                        None
                    }
                };
                CommandFailure {
                    message: AUTH_REQUIRED_MESSAGE.to_string(),
                    authorization_url,
                }
            }
            InfraError::OAuth(message) => {
                warn!(command, %message, "oauth request failed");
                CommandFailure {
                    message: format!("Google rejected the authorization request: {message}"),
                    authorization_url: None,
                }
            }
            other => {
                error!(command, error = %other, "command failed");
                CommandFailure {
                    message: GENERIC_FAILURE.to_string(),
                    authorization_url: None,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CommandFailure {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AnalyzeColorTimeArgs {
    #[schemars(description = "First day of the range, YYYY-MM-DD")]
    pub start_date: String,
    #[schemars(description = "Last day of the range (inclusive), YYYY-MM-DD")]
    pub end_date: String,
    #[serde(default)]
    #[schemars(description = "Only count these colors: ids 1-11 or names, e.g. [\"Grape\", 11]")]
    pub include_colors: Option<Value>,
    #[serde(default)]
    #[schemars(description = "Skip these colors: ids 1-11 or names. Ignored when include_colors is set")]
    pub exclude_colors: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CompleteAuthArgs {
    #[schemars(description = "Authorization code shown after consent")]
    pub code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StartAuthResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CompleteAuthResponse {
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SignOutResponse {
    pub status: String,
}

pub async fn analyze_color_time_impl(
    state: &AppState,
    args: AnalyzeColorTimeArgs,
) -> Result<ColorAnalysisReport, InfraError> {
    let period =
        AnalysisPeriod::parse(&args.start_date, &args.end_date).map_err(InfraError::Validation)?;

    let include = color_list(args.include_colors.as_ref(), "include_colors")?;
    let exclude = color_list(args.exclude_colors.as_ref(), "exclude_colors")?;
    let filter = ColorFilter::new(state.palette, include.as_deref(), exclude.as_deref())
        .map_err(InfraError::Validation)?;

    info!(
        command = "analyze_color_time",
        start = %period.start,
        end = %period.end,
        has_filters = filter.has_filters(),
        "analyzing color time"
    );
    state.analysis.analyze(period, &filter).await
}

pub async fn start_auth_impl(state: &AppState) -> Result<StartAuthResponse, InfraError> {
    let status = state.auth_session.status().await?;
    if status.authenticated {
        return Ok(StartAuthResponse {
            status: "already_authenticated".to_string(),
            authorization_url: None,
            expires_at: status.expires_at,
        });
    }

    let authorization_url = match status.authorization_url {
        Some(url) => url,
        None => state.auth_session.authorization_url()?,
    };
    Ok(StartAuthResponse {
        status: "authorization_required".to_string(),
        authorization_url: Some(authorization_url),
        expires_at: None,
    })
}

pub async fn complete_auth_impl(
    state: &AppState,
    args: CompleteAuthArgs,
) -> Result<CompleteAuthResponse, InfraError> {
    let code = args.code.trim();
    if code.is_empty() {
        return Err(InfraError::Validation("code is required".to_string()));
    }

    let token = state.auth_session.complete(code).await?;
    info!(command = "complete_auth", expires_at = %token.expires_at, "authentication completed");
    Ok(CompleteAuthResponse {
        status: "authenticated".to_string(),
        expires_at: token.expires_at,
    })
}

pub async fn check_auth_status_impl(state: &AppState) -> Result<AuthStatus, InfraError> {
    state.auth_session.status().await
}

pub async fn sign_out_impl(state: &AppState) -> Result<SignOutResponse, InfraError> {
    state.auth_session.sign_out().await?;
    info!(command = "sign_out", "stored credential removed");
    Ok(SignOutResponse {
        status: "signed_out".to_string(),
    })
}

pub fn list_colors_impl(state: &AppState) -> Vec<PaletteEntry> {
    state.palette.entries()
}

/// Reads one include/exclude argument. Absent, `null` and `[]` all mean the
/// filter was not given; a bare scalar counts as a one-element list.
fn color_list(value: Option<&Value>, field_name: &str) -> Result<Option<Vec<ColorInput>>, InfraError> {
    let entries: Vec<&Value> = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(_)) => {
            return Err(InfraError::Validation(format!(
                "{field_name} must be a list of color ids or names"
            )));
        }
        Some(scalar) => vec![scalar],
    };
    if entries.is_empty() {
        return Ok(None);
    }
    Ok(Some(entries.into_iter().map(color_input).collect()))
}

fn color_input(value: &Value) -> ColorInput {
    match value {
        Value::Number(number) => match number.as_i64() {
            Some(id) => ColorInput::Integer(id),
            None => number
                .as_f64()
                .map(ColorInput::Number)
                .unwrap_or_else(|| ColorInput::Other(number.to_string())),
        },
        Value::String(text) => ColorInput::Text(text.clone()),
        other => ColorInput::Other(other.to_string()),
    }
}
