use crate::application::commands::{
    analyze_color_time_impl, check_auth_status_impl, complete_auth_impl, list_colors_impl,
    sign_out_impl, start_auth_impl, AnalyzeColorTimeArgs, AppState, CommandFailure, CompleteAuthArgs,
};
use crate::application::oauth::AuthStatus;
use crate::infrastructure::error::InfraError;
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde_json::{json, Value};
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

pub const SERVER_NAME: &str = "calendar-color-mcp";

const ANALYZE_COLOR_TIME: &str = "analyze_color_time";
const START_AUTH: &str = "start_auth";
const COMPLETE_AUTH: &str = "complete_auth";
const CHECK_AUTH_STATUS: &str = "check_auth_status";
const SIGN_OUT: &str = "sign_out";
const LIST_COLORS: &str = "list_colors";

struct ToolOutput {
    text: String,
    structured: Value,
}

/// MCP tool surface over the application commands. Command failures come
/// back as `isError` tool results, never as protocol errors.
#[derive(Clone)]
pub struct CalendarColorServer {
    state: Arc<AppState>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl CalendarColorServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Totals the time spent per Google Calendar event color for a date range, counting only events the user attends."
    )]
    async fn analyze_color_time(
        &self,
        Parameters(args): Parameters<AnalyzeColorTimeArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.finish(ANALYZE_COLOR_TIME, analyze(&self.state, args).await))
    }

    #[tool(description = "Returns the Google consent URL to authorize read access to the calendar.")]
    async fn start_auth(&self) -> Result<CallToolResult, McpError> {
        Ok(self.finish(START_AUTH, start(&self.state).await))
    }

    #[tool(
        description = "Exchanges the authorization code from the consent page and stores the credential."
    )]
    async fn complete_auth(
        &self,
        Parameters(args): Parameters<CompleteAuthArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.finish(COMPLETE_AUTH, complete(&self.state, args).await))
    }

    #[tool(description = "Reports whether a usable Google credential is stored.")]
    async fn check_auth_status(&self) -> Result<CallToolResult, McpError> {
        Ok(self.finish(CHECK_AUTH_STATUS, status(&self.state).await))
    }

    #[tool(description = "Deletes the stored Google credential.")]
    async fn sign_out(&self) -> Result<CallToolResult, McpError> {
        Ok(self.finish(SIGN_OUT, sign_out(&self.state).await))
    }

    #[tool(description = "Lists the 11 event colors with their ids.")]
    async fn list_colors(&self) -> Result<CallToolResult, McpError> {
        Ok(self.finish(LIST_COLORS, colors(&self.state)))
    }

    fn finish(&self, tool: &str, outcome: Result<ToolOutput, InfraError>) -> CallToolResult {
        match outcome {
            Ok(output) => {
                let mut result = CallToolResult::success(vec![Content::text(output.text)]);
                result.structured_content = Some(output.structured);
                result
            }
            Err(error) => failure_result(&self.state.command_error(tool, &error)),
        }
    }
}

#[tool_handler]
impl ServerHandler for CalendarColorServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Implementation::from_build_env()
            },
            instructions: Some(format!(
                "Analyzes Google Calendar time per event color. Colors are shown in locale '{}'.",
                self.state.palette().locale().as_str()
            )),
            ..Default::default()
        }
    }
}

fn failure_result(failure: &CommandFailure) -> CallToolResult {
    let mut text = failure.message.clone();
    if let Some(url) = failure.authorization_url.as_deref() {
        let _ = write!(text, "\n\n{url}");
    }
    let mut result = CallToolResult::error(vec![Content::text(text)]);
    result.structured_content = serde_json::to_value(failure).ok();
    result
}

async fn analyze(state: &AppState, args: AnalyzeColorTimeArgs) -> Result<ToolOutput, InfraError> {
    let report = analyze_color_time_impl(state, args).await?;
    let structured = serde_json::to_value(&report)?;
    Ok(ToolOutput {
        text: report.formatted_text,
        structured,
    })
}

async fn start(state: &AppState) -> Result<ToolOutput, InfraError> {
    let response = start_auth_impl(state).await?;
    let text = match response.authorization_url.as_deref() {
        Some(url) => format!(
            "Open this URL, approve access, then call complete_auth with the code:\n\n{url}"
        ),
        None => "Already authenticated with Google Calendar.".to_string(),
    };
    Ok(ToolOutput {
        text,
        structured: serde_json::to_value(&response)?,
    })
}

async fn complete(state: &AppState, args: CompleteAuthArgs) -> Result<ToolOutput, InfraError> {
    let response = complete_auth_impl(state, args).await?;
    Ok(ToolOutput {
        text: format!(
            "Authentication complete. Token valid until {}.",
            response.expires_at.to_rfc3339()
        ),
        structured: serde_json::to_value(&response)?,
    })
}

async fn status(state: &AppState) -> Result<ToolOutput, InfraError> {
    let status = check_auth_status_impl(state).await?;
    Ok(ToolOutput {
        text: auth_status_text(&status),
        structured: serde_json::to_value(&status)?,
    })
}

async fn sign_out(state: &AppState) -> Result<ToolOutput, InfraError> {
    let response = sign_out_impl(state).await?;
    info!("signed out of google calendar");
    Ok(ToolOutput {
        text: "Signed out. Call start_auth to connect again.".to_string(),
        structured: serde_json::to_value(&response)?,
    })
}

fn colors(state: &AppState) -> Result<ToolOutput, InfraError> {
    let colors = list_colors_impl(state);
    let text = colors
        .iter()
        .map(|color| format!("{}: {}", color.id, color.name))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(ToolOutput {
        text,
        structured: json!({ "colors": colors }),
    })
}

fn auth_status_text(status: &AuthStatus) -> String {
    match (status.authenticated, status.expires_at, status.authorization_url.as_deref()) {
        (true, Some(expires_at), _) => format!(
            "Authenticated. Access token valid until {}.",
            expires_at.to_rfc3339()
        ),
        (true, None, _) => "Authenticated.".to_string(),
        (false, _, Some(url)) => format!("Not authenticated. Authorize here:\n\n{url}"),
        (false, _, None) => "Not authenticated. Call start_auth to begin.".to_string(),
    }
}
