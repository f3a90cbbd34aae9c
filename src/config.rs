//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$ATTACHMENT_RELAY_CONFIG` (environment variable)
//! 2. `~/.config/attachment-relay/config.toml` (Linux/macOS)
//!    `%APPDATA%\attachment-relay\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags and their environment variables take precedence over
//! the file. [`Settings::resolve`] merges both into the single value the
//! relay runs with.

use std::path::PathBuf;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};
use crate::mailbox::imap::ImapSettings;
use crate::mailbox::{DateCriterion, DateField, IMAP_DATE_FORMAT};

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Mailbox connection.
    pub imap: ImapConfig,
    /// Upload target.
    pub storage: StorageConfig,
    /// Selection and transfer behavior.
    pub transfer: TransferConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Mailbox connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    pub host: String,
    pub port: u16,
    /// Mailbox to scan.
    pub mailbox: String,
    /// Match messages on their `Date:` header ("sent") or arrival date ("received").
    pub date_field: DateField,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Upload target settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    /// AWS region; the SDK's default chain applies when unset.
    pub region: Option<String>,
}

/// Selection and transfer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Filename marker that selects attachments and ends the encoded path.
    pub keyword: Option<String>,
    /// Where attachment bytes are staged before upload.
    pub scratch_dir: Option<PathBuf>,
    /// Abort the whole run on the first malformed filename instead of
    /// skipping that attachment.
    pub strict_filenames: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            mailbox: "INBOX".to_string(),
            date_field: DateField::Sent,
            user: None,
            password: None,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("ATTACHMENT_RELAY_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("attachment-relay").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("attachment-relay")
}

// ── Resolved settings ───────────────────────────────────────────

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub keyword: Option<String>,
    pub bucket: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Search date; `"0"` or empty means "not given".
    pub date: Option<String>,
    pub mailbox: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub dry_run: bool,
}

/// Everything the core pipeline needs for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub keyword: String,
    pub bucket: String,
    /// Day the job runs for; becomes the filename suffix.
    pub run_date: NaiveDate,
    /// Mailbox search window.
    pub criterion: DateCriterion,
    pub scratch_dir: PathBuf,
    pub strict_filenames: bool,
    /// Decode and log destinations without writing or uploading anything.
    pub dry_run: bool,
}

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub run: RunSettings,
    pub imap: ImapSettings,
    pub region: Option<String>,
}

impl Settings {
    /// Merge `config` with `overrides` and validate the result.
    ///
    /// `today` is the run date. The search date is the override date when
    /// given, otherwise the day before `today`.
    pub fn resolve(config: &Config, overrides: Overrides, today: NaiveDate) -> Result<Self> {
        let keyword = required(
            overrides.keyword.or_else(|| config.transfer.keyword.clone()),
            "keyword (--keyword / KEYWORD)",
        )?;
        let bucket = required(
            overrides.bucket.or_else(|| config.storage.bucket.clone()),
            "bucket (--bucket / S3_BUCKET)",
        )?;
        let user = required(
            overrides.user.or_else(|| config.imap.user.clone()),
            "mail user (--user / IMAP_USER)",
        )?;
        let password = required(
            overrides.password.or_else(|| config.imap.password.clone()),
            "mail password (IMAP_PASSWORD)",
        )?;

        let search_date = match parse_search_date(overrides.date.as_deref().unwrap_or(""))? {
            Some(date) => date,
            None => today
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| RelayError::Config(format!("no day before {today}")))?,
        };

        let scratch_dir = overrides
            .scratch_dir
            .or_else(|| config.transfer.scratch_dir.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("attachment-relay"));

        Ok(Self {
            run: RunSettings {
                keyword,
                bucket,
                run_date: today,
                criterion: DateCriterion::new(search_date, config.imap.date_field),
                scratch_dir,
                strict_filenames: config.transfer.strict_filenames,
                dry_run: overrides.dry_run,
            },
            imap: ImapSettings {
                host: config.imap.host.clone(),
                port: config.imap.port,
                mailbox: overrides
                    .mailbox
                    .unwrap_or_else(|| config.imap.mailbox.clone()),
                user,
                password,
            },
            region: config.storage.region.clone(),
        })
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(RelayError::Config(format!("missing {what}"))),
    }
}

/// Parse a search date given as `01-Sep-2018` or `2018-09-01`.
///
/// Empty input and the placeholder `0` mean no date was given.
pub fn parse_search_date(value: &str) -> Result<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, IMAP_DATE_FORMAT)
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y-%m-%d"))
        .map(Some)
        .map_err(|_| {
            RelayError::Config(format!(
                "invalid date '{value}', expected DD-Mon-YYYY or YYYY-MM-DD"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 9, 2).unwrap()
    }

    fn full_overrides() -> Overrides {
        Overrides {
            keyword: Some("S3upload".into()),
            bucket: Some("reports-bucket".into()),
            user: Some("ops@example.com".into()),
            password: Some("secret".into()),
            ..Overrides::default()
        }
    }

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.imap.host, "imap.gmail.com");
        assert_eq!(cfg.imap.port, 993);
        assert_eq!(cfg.imap.mailbox, "INBOX");
        assert_eq!(cfg.imap.date_field, DateField::Sent);
        assert!(!cfg.transfer.strict_filenames);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[imap]
host = "mail.example.com"

[transfer]
keyword = "S3upload"
strict_filenames = true
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.imap.host, "mail.example.com");
        assert_eq!(cfg.imap.port, 993);
        assert_eq!(cfg.transfer.keyword.as_deref(), Some("S3upload"));
        assert!(cfg.transfer.strict_filenames);
        assert_eq!(cfg.general.log_level, "info");
    }

    #[test]
    fn test_resolve_defaults_search_to_yesterday() {
        let settings = Settings::resolve(&Config::default(), full_overrides(), today()).unwrap();
        assert_eq!(settings.run.run_date, today());
        assert_eq!(
            settings.run.criterion.date,
            NaiveDate::from_ymd_opt(2018, 9, 1).unwrap()
        );
        assert_eq!(settings.imap.mailbox, "INBOX");
    }

    #[test]
    fn test_resolve_honours_date_override() {
        let overrides = Overrides {
            date: Some("15-Aug-2018".into()),
            ..full_overrides()
        };
        let settings = Settings::resolve(&Config::default(), overrides, today()).unwrap();
        assert_eq!(
            settings.run.criterion.date,
            NaiveDate::from_ymd_opt(2018, 8, 15).unwrap()
        );
        assert_eq!(settings.run.run_date, today());
    }

    #[test]
    fn test_resolve_cli_beats_file() {
        let mut cfg = Config::default();
        cfg.transfer.keyword = Some("FROMFILE".into());
        cfg.storage.bucket = Some("file-bucket".into());
        let settings = Settings::resolve(&cfg, full_overrides(), today()).unwrap();
        assert_eq!(settings.run.keyword, "S3upload");
        assert_eq!(settings.run.bucket, "reports-bucket");
    }

    #[test]
    fn test_resolve_missing_keyword_fails() {
        let overrides = Overrides {
            keyword: Some("  ".into()),
            ..full_overrides()
        };
        let err = Settings::resolve(&Config::default(), overrides, today()).unwrap_err();
        assert!(matches!(err, RelayError::Config(ref msg) if msg.contains("keyword")));
    }

    #[test]
    fn test_parse_search_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2018, 1, 1).unwrap();
        assert_eq!(parse_search_date("01-Jan-2018").unwrap(), Some(expected));
        assert_eq!(parse_search_date("2018-01-01").unwrap(), Some(expected));
        assert_eq!(parse_search_date("0").unwrap(), None);
        assert_eq!(parse_search_date("").unwrap(), None);
        assert!(parse_search_date("yesterday").is_err());
    }
}
