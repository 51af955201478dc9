//! Configuration handling for sql-fanout.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::error::{RunError, RunResult};
use crate::models::{Credentials, DatabaseType};
use crate::site::SiteSource;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub use crate::db::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_QUERY_TIMEOUT_SECS};
pub use crate::export::DEFAULT_EXPORT_BASENAME;

/// Sites processed at once unless told otherwise.
pub const DEFAULT_CONCURRENCY: usize = 1;

/// Run a batch of SQL statements against many sites and export the results.
#[derive(Debug, Clone, Parser)]
#[command(name = "sql-fanout")]
#[command(version, about)]
pub struct Config {
    /// Username for every site
    #[arg(short, long, env = "FANOUT_USER")]
    pub user: Option<String>,

    /// Password for every site
    #[arg(short, long, env = "FANOUT_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database name on every site
    #[arg(short, long, env = "FANOUT_DATABASE")]
    pub database: Option<String>,

    /// A single site ID, e.g. 13100
    #[arg(short, long, env = "FANOUT_SITE", conflicts_with = "sites_file")]
    pub site: Option<String>,

    /// File with site IDs (.xlsx/.csv with a `siteid` column, or plain text)
    #[arg(long, value_name = "PATH", env = "FANOUT_SITES_FILE")]
    pub sites_file: Option<PathBuf>,

    /// Connect to this host for every site instead of the derived address
    #[arg(long, value_name = "HOST", env = "FANOUT_HOST")]
    pub host: Option<String>,

    /// Optional report date (YYYY-MM-DD) echoed after each site
    #[arg(long, value_name = "DATE", env = "FANOUT_DATE")]
    pub date: Option<NaiveDate>,

    /// SQL text; statements separated by ';'
    #[arg(short, long, env = "FANOUT_QUERY", conflicts_with = "query_file")]
    pub query: Option<String>,

    /// File holding the SQL text
    #[arg(long, value_name = "PATH", env = "FANOUT_QUERY_FILE")]
    pub query_file: Option<PathBuf>,

    /// Directory for the exported workbook (default: Downloads)
    #[arg(short, long, value_name = "DIR", env = "FANOUT_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Database backend of the sites
    #[arg(long, value_enum, default_value = "mysql", env = "FANOUT_BACKEND")]
    pub backend: DatabaseType,

    /// Port override (default: backend's standard port)
    #[arg(long, env = "FANOUT_PORT")]
    pub port: Option<u16>,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "FANOUT_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Per-statement timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "FANOUT_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Number of sites processed at once
    #[arg(
        short = 'j',
        long,
        default_value_t = DEFAULT_CONCURRENCY,
        env = "FANOUT_CONCURRENCY"
    )]
    pub concurrency: usize,

    /// With --concurrency > 1, order exported rows by site input order
    #[arg(long, env = "FANOUT_KEEP_SITE_ORDER")]
    pub keep_site_order: bool,

    /// Skip writing the workbook
    #[arg(long, env = "FANOUT_NO_EXPORT")]
    pub no_export: bool,

    /// Only test the connection to the site and exit
    #[arg(long)]
    pub probe: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "FANOUT_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "FANOUT_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            user: None,
            password: None,
            database: None,
            site: None,
            sites_file: None,
            host: None,
            date: None,
            query: None,
            query_file: None,
            output_dir: None,
            backend: DatabaseType::default(),
            port: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            concurrency: DEFAULT_CONCURRENCY,
            keep_site_order: false,
            no_export: false,
            probe: false,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }

    /// Check everything that can be checked before a site is contacted.
    pub fn validate(&self) -> RunResult<()> {
        if !self.credentials().is_complete() {
            return Err(RunError::invalid_input(
                "Please fill in Username, Password, and Database.",
            ));
        }

        if self.site.is_some() && self.sites_file.is_some() {
            return Err(RunError::invalid_input(
                "Use either --site or --sites-file, not both",
            ));
        }

        if self.probe {
            if self.sites_file.is_some() {
                return Err(RunError::invalid_input(
                    "--probe tests a single site; use --site",
                ));
            }
            return Ok(());
        }

        if self.query.is_some() && self.query_file.is_some() {
            return Err(RunError::invalid_input(
                "Use either --query or --query-file, not both",
            ));
        }
        if self.query.is_none() && self.query_file.is_none() {
            return Err(RunError::invalid_input("Please enter a SQL query."));
        }

        if self.concurrency == 0 {
            return Err(RunError::invalid_input("--concurrency must be at least 1"));
        }
        if self.connect_timeout == 0 || self.query_timeout == 0 {
            return Err(RunError::invalid_input("timeouts must be at least 1 second"));
        }

        Ok(())
    }

    /// Credentials shared by every site.
    pub fn credentials(&self) -> Credentials {
        let field = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();
        Credentials::new(
            field(&self.user),
            field(&self.password),
            field(&self.database),
        )
    }

    /// Where site IDs come from. The file wins when both are somehow present.
    pub fn site_source(&self) -> SiteSource {
        match &self.sites_file {
            Some(path) => SiteSource::File(path.clone()),
            None => SiteSource::Single(self.site.clone().unwrap_or_default()),
        }
    }

    /// Host override, if a non-empty one was given.
    pub fn host_override(&self) -> Option<String> {
        self.host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    }

    /// Raw SQL text from `--query` or `--query-file`.
    pub fn query_text(&self) -> RunResult<String> {
        if let Some(query) = &self.query {
            return Ok(query.clone());
        }
        match &self.query_file {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                RunError::invalid_input(format!(
                    "cannot read query file {}: {}",
                    path.display(),
                    e
                ))
            }),
            None => Err(RunError::invalid_input("Please enter a SQL query.")),
        }
    }

    /// Export directory: `--output-dir`, else Downloads, else the current directory.
    pub fn output_dir_or_default(&self) -> PathBuf {
        self.output_dir
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the query timeout as a Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get the connection timeout as a Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> Config {
        Config {
            user: Some("sa".into()),
            password: Some("pw".into()),
            database: Some("Store".into()),
            site: Some("13100".into()),
            query: Some("SELECT 1".into()),
            ..Config::default_config()
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT_SECS);
        assert_eq!(config.query_timeout, DEFAULT_QUERY_TIMEOUT_SECS);
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.backend, DatabaseType::MySQL);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(filled().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_credentials() {
        let config = Config {
            password: Some("  ".into()),
            ..filled()
        };
        assert!(matches!(
            config.validate(),
            Err(RunError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_validate_requires_query_unless_probe() {
        let config = Config {
            query: None,
            ..filled()
        };
        assert!(config.validate().is_err());

        let probe = Config {
            probe: true,
            ..config
        };
        assert!(probe.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_two_site_sources() {
        let config = Config {
            sites_file: Some(PathBuf::from("sites.csv")),
            ..filled()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_host_override_blank_is_none() {
        let config = Config {
            host: Some("   ".into()),
            ..filled()
        };
        assert_eq!(config.host_override(), None);

        let config = Config {
            host: Some(" 192.0.2.9 ".into()),
            ..filled()
        };
        assert_eq!(config.host_override().as_deref(), Some("192.0.2.9"));
    }

    #[test]
    fn test_query_text_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "SELECT 1; SELECT 2").unwrap();
        let config = Config {
            query: None,
            query_file: Some(file.path().to_path_buf()),
            ..filled()
        };
        assert_eq!(config.query_text().unwrap(), "SELECT 1; SELECT 2");
    }

    #[test]
    fn test_cli_parsing() {
        let config = Config::try_parse_from([
            "sql-fanout",
            "--user",
            "sa",
            "--password",
            "pw",
            "--database",
            "Store",
            "--sites-file",
            "sites.xlsx",
            "--query",
            "SELECT 1",
            "--backend",
            "postgresql",
            "--date",
            "2024-03-07",
            "-j",
            "4",
        ])
        .unwrap();
        assert_eq!(config.backend, DatabaseType::PostgreSQL);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.date, NaiveDate::from_ymd_opt(2024, 3, 7));
        assert!(matches!(config.site_source(), SiteSource::File(_)));
    }
}
