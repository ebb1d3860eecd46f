//! Environment-backed configuration for `room-details-smoke`.

use std::{
    env,
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

use room_details_core::RoomDetailsViewAction;
use room_details_screen::DEFAULT_LOADING_TITLE;
use url::Url;

const DEFAULT_DATA_DIR_ROOT: &str = "./.pikachat-room-details-store";
const DEFAULT_SETTLE_MS: u64 = 1_500;

/// Runtime configuration for one smoke run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeConfig {
    /// Normalized `https://` homeserver URL.
    pub homeserver: String,
    pub user_id: String,
    pub password: String,
    /// Fixed store directory; derived per account when unset.
    pub data_dir_override: Option<PathBuf>,
    /// Room whose details screen is opened.
    pub room_id: String,
    /// View actions replayed against the screen, in order.
    pub actions: Vec<RoomDetailsViewAction>,
    /// How long to wait for backend completions after the last action.
    pub settle_ms: u64,
    /// Title of the leave indicator.
    pub loading_title: String,
}

impl SmokeConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let homeserver_raw = required_env("PIKACHAT_HOMESERVER", &mut lookup)?;
        let homeserver = normalize_homeserver(&homeserver_raw).map_err(|reason| {
            ConfigError::InvalidValue {
                key: "PIKACHAT_HOMESERVER",
                value: homeserver_raw.clone(),
                reason,
            }
        })?;
        let user_id = required_env("PIKACHAT_USER", &mut lookup)?;
        let password = required_env("PIKACHAT_PASSWORD", &mut lookup)?;
        let room_id = required_env("PIKACHAT_ROOM_ID", &mut lookup)?;
        let data_dir_override =
            optional_trimmed_env("PIKACHAT_DATA_DIR", &mut lookup).map(PathBuf::from);

        let actions = match optional_trimmed_env("PIKACHAT_ROOM_DETAILS_ACTIONS", &mut lookup) {
            Some(value) => parse_actions(&value)?,
            None => Vec::new(),
        };
        let settle_ms = parse_optional_u64_with_default(
            "PIKACHAT_ROOM_DETAILS_SETTLE_MS",
            DEFAULT_SETTLE_MS,
            &mut lookup,
        )?;
        let loading_title = optional_trimmed_env("PIKACHAT_LOADING_TITLE", &mut lookup)
            .unwrap_or_else(|| DEFAULT_LOADING_TITLE.to_owned());

        Ok(Self {
            homeserver,
            user_id,
            password,
            data_dir_override,
            room_id,
            actions,
            settle_ms,
            loading_title,
        })
    }

    /// Resolve the Matrix SDK store directory for this account.
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir_override.clone().unwrap_or_else(|| {
            default_data_dir_under(
                Path::new(DEFAULT_DATA_DIR_ROOT),
                &self.homeserver,
                &self.user_id,
            )
        })
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is unset or blank.
    Missing { key: &'static str },
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key } => write!(f, "missing required {key}"),
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

/// Parse a comma-separated action script such as `leave,confirm-leave`.
fn parse_actions(value: &str) -> Result<Vec<RoomDetailsViewAction>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| {
            action_from_token(token).ok_or_else(|| ConfigError::InvalidValue {
                key: "PIKACHAT_ROOM_DETAILS_ACTIONS",
                value: token.to_owned(),
                reason: "unknown action".to_owned(),
            })
        })
        .collect()
}

fn action_from_token(token: &str) -> Option<RoomDetailsViewAction> {
    let action = match token.to_ascii_lowercase().as_str() {
        "people" => RoomDetailsViewAction::TapPeople,
        "leave" => RoomDetailsViewAction::TapLeave,
        "confirm-leave" => RoomDetailsViewAction::ConfirmLeave,
        "ignore" => RoomDetailsViewAction::TapIgnore,
        "confirm-ignore" => RoomDetailsViewAction::IgnoreConfirmed,
        "unignore" => RoomDetailsViewAction::TapUnignore,
        "confirm-unignore" => RoomDetailsViewAction::UnignoreConfirmed,
        "dismiss-leave" => RoomDetailsViewAction::DismissLeaveRoomAlert,
        "dismiss-ignore" => RoomDetailsViewAction::DismissIgnoreUserAlert,
        "dismiss-alert" => RoomDetailsViewAction::DismissAlert,
        _ => return None,
    };
    Some(action)
}

fn normalize_homeserver(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("homeserver is required".to_owned());
    }

    let candidate = if let Some(rest) = raw.strip_prefix("https://") {
        format!("https://{}", rest.trim())
    } else if let Some(rest) = raw.strip_prefix("http://") {
        format!("https://{}", rest.trim())
    } else if raw.contains("://") {
        return Err("only https homeservers are supported".to_owned());
    } else {
        format!("https://{raw}")
    };

    let parsed = Url::parse(&candidate).map_err(|err| format!("invalid homeserver URL: {err}"))?;
    if parsed.host_str().is_none() {
        return Err("homeserver must include a host".to_owned());
    }

    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}

fn required_env<F>(key: &'static str, lookup: &mut F) -> Result<String, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    optional_trimmed_env(key, lookup).ok_or(ConfigError::Missing { key })
}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u64_with_default<F>(
    key: &'static str,
    default: u64,
    lookup: &mut F,
) -> Result<u64, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = optional_trimmed_env(key, lookup) else {
        return Ok(default);
    };
    value
        .parse::<u64>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}

fn default_data_dir_under(data_dir_root: &Path, homeserver: &str, user_id: &str) -> PathBuf {
    data_dir_root
        .join(format!("hs-{}", slugify_component(homeserver, 64)))
        .join(format!("user-{}", slugify_component(user_id, 64)))
}

fn slugify_component(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len().min(max_len));
    for ch in input.chars() {
        let next = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if next == '_' && out.ends_with('_') {
            continue;
        }
        out.push(next);
        if out.len() >= max_len {
            break;
        }
    }

    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "default".to_owned()
    } else {
        trimmed.to_owned()
    }
}
