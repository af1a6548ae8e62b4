use chrono_tz::Tz;
use directories::ProjectDirs;
use log::warn;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_STEM: &str = "oncall-buddy-finder";
const DEFAULT_TOKEN_ENV: &str = "GOOGLE_CALENDAR_TOKEN";
const WEBHOOK_ENV: &str = "SLACK_WEBHOOK_URL";
const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 3600);
/// Heartbeats further apart than a year are almost certainly a typo.
const MAX_NOTIFICATION_HOURS: u64 = 366 * 24;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file {0} does not exist")]
    NotFound(PathBuf),
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("Invalid interval '{0}', expected something like 60s, 5m or 1h30m")]
    InvalidInterval(String),
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
    #[error("calendar.calendar_id must be set for the google calendar source")]
    MissingCalendarId,
    #[error("Environment variable {0} holding the calendar token is not set")]
    MissingToken(String),
    #[error("Invalid listen address '{0}'")]
    InvalidListen(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timezone: String,
    pub check_at_startup: bool,
    /// Watch cadence and window length, e.g. "60s".
    pub check_interval: String,
    /// Heartbeat notification cadence, in hours.
    pub notification_interval: u64,
    pub call_timeout_secs: u64,
    pub calendar: CalendarConfig,
    pub slack: SlackConfig,
    pub http: HttpConfig,
    pub artifact: Option<ArtifactConfig>,
    /// Lowercase buddy name to contact.
    pub buddies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CalendarConfig {
    Google {
        #[serde(default)]
        calendar_id: String,
        /// Name of the environment variable holding the bearer token.
        #[serde(default = "default_token_env")]
        token_env: String,
    },
    Ics {
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
    pub channel: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub enabled: bool,
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Validated values the scheduler and dispatcher run on.
#[derive(Debug, Clone)]
pub struct Settings {
    pub timezone: Tz,
    pub watch_interval: Duration,
    pub notify_interval: Duration,
    pub call_timeout: Duration,
    pub check_at_startup: bool,
    pub listen: Option<SocketAddr>,
    pub channel: String,
}

fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            check_at_startup: true,
            check_interval: "60s".to_string(),
            notification_interval: 12,
            call_timeout_secs: 10,
            calendar: CalendarConfig::default(),
            slack: SlackConfig::default(),
            http: HttpConfig::default(),
            artifact: None,
            buddies: BTreeMap::new(),
        }
    }
}

impl Default for CalendarConfig {
    fn default() -> Self {
        CalendarConfig::Google { calendar_id: String::new(), token_env: default_token_env() }
    }
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self { webhook_url: None, channel: "#general".to_string() }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { enabled: true, listen: "0.0.0.0:8000".to_string() }
    }
}

impl Config {
    /// Loads the config file picked by [`locate`], or the defaults when no
    /// file exists. Returns the path that was used, if any.
    pub fn load(cli_path: Option<PathBuf>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let path = locate(
            cli_path,
            env::var("CONFIG").ok(),
            env::var("ENV").ok(),
            &cwd,
            default_config_path(),
        )?;
        match path {
            Some(path) => Ok((Self::load_from(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let timezone = self
            .timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))?;
        let watch_interval = parse_interval(&self.check_interval)?;
        if self.notification_interval == 0 {
            return Err(ConfigError::ZeroValue("notification_interval"));
        }
        if self.notification_interval > MAX_NOTIFICATION_HOURS {
            return Err(ConfigError::InvalidInterval(format!("{}h", self.notification_interval)));
        }
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("call_timeout_secs"));
        }
        if let CalendarConfig::Google { calendar_id, .. } = &self.calendar {
            if calendar_id.trim().is_empty() {
                return Err(ConfigError::MissingCalendarId);
            }
        }
        let listen = if self.http.enabled {
            let addr = self
                .http
                .listen
                .parse::<SocketAddr>()
                .map_err(|_| ConfigError::InvalidListen(self.http.listen.clone()))?;
            Some(addr)
        } else {
            None
        };

        Ok(Settings {
            timezone,
            watch_interval,
            notify_interval: Duration::from_secs(self.notification_interval * 3600),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
            check_at_startup: self.check_at_startup,
            listen,
            channel: self.slack.channel.clone(),
        })
    }

    /// Bearer token for the Google source, read from the configured variable.
    pub fn calendar_token(&self) -> Result<Option<SecretString>, ConfigError> {
        match &self.calendar {
            CalendarConfig::Google { token_env, .. } => match env::var(token_env) {
                Ok(token) if !token.trim().is_empty() => Ok(Some(SecretString::from(token))),
                _ => Err(ConfigError::MissingToken(token_env.clone())),
            },
            CalendarConfig::Ics { .. } => Ok(None),
        }
    }

    /// Webhook from the file, or from `SLACK_WEBHOOK_URL`.
    pub fn slack_webhook(&self) -> Option<SecretString> {
        self.slack
            .webhook_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .or_else(|| env::var(WEBHOOK_ENV).ok().filter(|url| !url.trim().is_empty()))
            .map(SecretString::from)
    }

    /// A copy that is safe to log.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.slack.webhook_url.is_some() {
            copy.slack.webhook_url = Some("<redacted>".to_string());
        }
        copy
    }
}

/// Picks the config file. In order: the `--config` flag, `$CONFIG`,
/// `oncall-buddy-finder.<$ENV>.toml` in `cwd`, `oncall-buddy-finder.toml` in
/// `cwd`, then the platform config file. Explicitly requested paths must
/// exist; `Ok(None)` means no file was found at all.
pub fn locate(
    cli_path: Option<PathBuf>,
    config_env: Option<String>,
    env_name: Option<String>,
    cwd: &Path,
    default_path: Option<PathBuf>,
) -> Result<Option<PathBuf>, ConfigError> {
    let forced = cli_path.or_else(|| config_env.filter(|p| !p.is_empty()).map(PathBuf::from));
    if let Some(path) = forced {
        return if path.exists() { Ok(Some(path)) } else { Err(ConfigError::NotFound(path)) };
    }

    if let Some(name) = env_name.filter(|n| !n.is_empty()) {
        let path = cwd.join(format!("{}.{}.toml", CONFIG_FILE_STEM, name));
        if path.exists() {
            return Ok(Some(path));
        }
        warn!("Can't find {} config file, skipping", path.display());
    }

    let local = cwd.join(format!("{}.toml", CONFIG_FILE_STEM));
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(default_path.filter(|p| p.exists()))
}

fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "webofmars", CONFIG_FILE_STEM).map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parses intervals such as `90`, `60s`, `5m` or `1h30m`.
pub fn parse_interval(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidInterval(input.to_string());
    let text = input.trim();
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total: u64 = 0;
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let factor = match c {
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(invalid()),
        };
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(factor)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        digits.clear();
    }
    if !digits.is_empty() {
        // A bare trailing number counts as seconds.
        let value: u64 = digits.parse().map_err(|_| invalid())?;
        total = total.checked_add(value).ok_or_else(invalid)?;
    }

    let interval = Duration::from_secs(total);
    if interval.is_zero() || interval > MAX_INTERVAL {
        return Err(invalid());
    }
    Ok(interval)
}
