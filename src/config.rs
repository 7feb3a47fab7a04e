//! Configuration types, read from the environment.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::channels::telegram::DEFAULT_POLL_TIMEOUT_SECS;
use crate::error::ConfigError;

fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) if !val.trim().is_empty() => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        _ => None,
    }
}

/// Which transport the bot talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Cli,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "BOT_CHANNEL".into(),
                message: format!("expected 'telegram' or 'cli', got '{other}'"),
            }),
        }
    }
}

/// Telegram transport settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids; `*` allows everyone.
    pub allowed_users: Vec<String>,
    pub poll_timeout_secs: u64,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub channel: ChannelKind,
    /// Present when `channel` is `Telegram`.
    pub telegram: Option<TelegramConfig>,
    pub db_path: PathBuf,
    /// Optional JSON file replacing the built-in catalog.
    pub catalog_path: Option<PathBuf>,
    /// Port for the `/health` endpoint; disabled when unset.
    pub health_port: Option<u16>,
    /// Idle time after which sessions and user workers are dropped.
    pub session_idle: Duration,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let channel = match env::var("BOT_CHANNEL") {
            Ok(val) if !val.trim().is_empty() => val.parse()?,
            _ => ChannelKind::Telegram,
        };

        let telegram = match channel {
            ChannelKind::Telegram => {
                let token = env::var("TELEGRAM_BOT_TOKEN")
                    .ok()
                    .filter(|t| !t.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".into()))?;
                Some(TelegramConfig {
                    bot_token: SecretString::from(token),
                    allowed_users: parse_allowed_users(
                        &env::var("TELEGRAM_ALLOWED_USERS").unwrap_or_else(|_| "*".to_string()),
                    ),
                    poll_timeout_secs: parse_env_or(
                        "TELEGRAM_POLL_TIMEOUT_SECS",
                        DEFAULT_POLL_TIMEOUT_SECS,
                    ),
                })
            }
            ChannelKind::Cli => None,
        };

        Ok(Self {
            channel,
            telegram,
            db_path: env::var("CINEMA_COLLAB_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/cinema_collab.db")),
            catalog_path: parse_env_opt("CINEMA_COLLAB_CATALOG_PATH"),
            health_port: parse_env_opt("CINEMA_COLLAB_HEALTH_PORT"),
            session_idle: Duration::from_secs(parse_env_or("CINEMA_COLLAB_SESSION_IDLE_SECS", 1800)),
        })
    }
}

/// `CINEMA_COLLAB_LOG_DIR`: directory for a daily-rolling log file next to
/// stderr. Read on its own so logging can start before the rest of the config.
pub fn log_dir_from_env() -> Option<PathBuf> {
    env::var_os("CINEMA_COLLAB_LOG_DIR")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Split a comma-separated allowlist. An empty value means everyone.
fn parse_allowed_users(raw: &str) -> Vec<String> {
    let users: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if users.is_empty() {
        vec!["*".to_string()]
    } else {
        users
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_kind_parses_case_insensitively() {
        assert_eq!("telegram".parse::<ChannelKind>().unwrap(), ChannelKind::Telegram);
        assert_eq!(" CLI ".parse::<ChannelKind>().unwrap(), ChannelKind::Cli);
        assert!(matches!(
            "discord".parse::<ChannelKind>(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn allowed_users_split_and_trim() {
        assert_eq!(
            parse_allowed_users("alice, @bob ,123"),
            vec!["alice", "bob", "123"]
        );
        assert_eq!(parse_allowed_users(""), vec!["*"]);
        assert_eq!(parse_allowed_users(" , "), vec!["*"]);
    }

    #[test]
    fn parse_env_falls_back_on_garbage() {
        // Unique names so parallel tests can't interfere.
        let key = "CINEMA_COLLAB_TEST_PARSE_GARBAGE";
        unsafe { env::set_var(key, "not-a-number") };
        assert_eq!(parse_env_or(key, 42u64), 42);
        assert_eq!(parse_env_opt::<u16>(key), None);
        unsafe { env::remove_var(key) };
        assert_eq!(parse_env_or(key, 7u64), 7);
    }

    #[test]
    fn parse_env_reads_valid_values() {
        let key = "CINEMA_COLLAB_TEST_PARSE_VALID";
        unsafe { env::set_var(key, "8081") };
        assert_eq!(parse_env_opt::<u16>(key), Some(8081));
        assert_eq!(parse_env_or(key, 1u16), 8081);
        unsafe { env::remove_var(key) };
    }
}
