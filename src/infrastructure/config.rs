use crate::domain::color_palette::Locale;
use crate::infrastructure::error::InfraError;
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "CALENDAR_COLOR_MCP_";
const APP_DIR_NAME: &str = "calendar-color-mcp";
const TOKEN_FILE_NAME: &str = "token.json";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/oauth2/callback";
const DEFAULT_SCOPE: &str = "https://www.googleapis.com/auth/calendar.readonly";
const DEFAULT_CALENDAR_ID: &str = "primary";
const CONFIG_SCHEMA: u64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoogleOAuthSettings {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub oauth: GoogleOAuthSettings,
    pub calendar_id: String,
    pub token_path: PathBuf,
    pub locale: Locale,
    pub timezone: Tz,
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
    pub calendar_id: Option<String>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
}

impl AppConfig {
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, InfraError> {
        let _ = dotenvy::dotenv();
        let file = match overrides.config_file.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        Self::from_sources(|key| std::env::var(key).ok(), file.as_ref(), overrides)
    }

    pub fn from_sources<F>(
        lookup: F,
        file: Option<&serde_json::Value>,
        overrides: &ConfigOverrides,
    ) -> Result<Self, InfraError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file_value = |key: &str| -> Option<String> {
            file?
                .get(key)
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(ToOwned::to_owned)
        };

        let client_id = required_lookup_value(
            &lookup,
            &[prefixed("GOOGLE_CLIENT_ID").as_str(), "GOOGLE_CLIENT_ID"],
            "google client id",
        )?;
        let client_secret = required_lookup_value(
            &lookup,
            &[prefixed("GOOGLE_CLIENT_SECRET").as_str(), "GOOGLE_CLIENT_SECRET"],
            "google client secret",
        )?;
        let redirect_uri = optional_lookup_value(
            &lookup,
            &[prefixed("GOOGLE_REDIRECT_URI").as_str(), "GOOGLE_REDIRECT_URI"],
        )
        .or_else(|| file_value("redirectUri"))
        .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
        let scopes = optional_lookup_value(&lookup, &[prefixed("GOOGLE_SCOPES").as_str(), "GOOGLE_SCOPES"])
            .map(|raw| parse_scope_list(&raw))
            .filter(|scopes| !scopes.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]);

        let calendar_id = non_empty(overrides.calendar_id.as_deref())
            .or_else(|| optional_lookup_value(&lookup, &[prefixed("CALENDAR_ID").as_str()]))
            .or_else(|| file_value("calendarId"))
            .unwrap_or_else(|| DEFAULT_CALENDAR_ID.to_string());

        let token_path = match overrides.token_path.clone() {
            Some(path) => path,
            None => match optional_lookup_value(&lookup, &[prefixed("TOKEN_FILE").as_str()])
                .or_else(|| file_value("tokenFile"))
            {
                Some(path) => PathBuf::from(path),
                None => default_token_path()?,
            },
        };

        let locale = match non_empty(overrides.locale.as_deref())
            .or_else(|| optional_lookup_value(&lookup, &[prefixed("LOCALE").as_str()]))
            .or_else(|| file_value("locale"))
        {
            Some(raw) => Locale::parse(&raw).ok_or_else(|| {
                InfraError::InvalidConfig(format!("unsupported locale '{raw}' (use en or ja)"))
            })?,
            None => Locale::default(),
        };

        let timezone = match non_empty(overrides.timezone.as_deref())
            .or_else(|| optional_lookup_value(&lookup, &[prefixed("TIMEZONE").as_str()]))
            .or_else(|| file_value("timezone"))
        {
            Some(raw) => raw.parse::<Tz>().map_err(|_| {
                InfraError::InvalidConfig(format!("unknown timezone '{raw}'"))
            })?,
            None => Tz::UTC,
        };

        Ok(Self {
            oauth: GoogleOAuthSettings {
                client_id,
                client_secret,
                redirect_uri,
                scopes,
            },
            calendar_id,
            token_path,
            locale,
            timezone,
        })
    }
}

pub fn default_token_path() -> Result<PathBuf, InfraError> {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .map(|dir| dir.join(APP_DIR_NAME).join(TOKEN_FILE_NAME))
        .ok_or_else(|| {
            InfraError::InvalidConfig(format!(
                "cannot determine a config directory; set {}",
                prefixed("TOKEN_FILE")
            ))
        })
}

pub fn read_config_file(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != CONFIG_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn prefixed(key: &str) -> String {
    format!("{ENV_PREFIX}{key}")
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

fn required_lookup_value<F>(
    lookup: &F,
    keys: &[&str],
    field_name: &str,
) -> Result<String, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    optional_lookup_value(lookup, keys).ok_or_else(|| {
        InfraError::InvalidConfig(format!(
            "missing {} (set one of: {})",
            field_name,
            keys.join(", ")
        ))
    })
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .find_map(|&key| non_empty(lookup(key).as_deref()))
}

fn parse_scope_list(raw: &str) -> Vec<String> {
    raw.split([',', ' ', '\n', '\t'])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}
