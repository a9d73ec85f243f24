// Configuration management for the metadata route rule
// Supports CLI arguments, config file (TOML), and environment variables

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::Level;

use crate::routes::evaluator::WatchedCidrSet;
use crate::rule::RuleSettings;

/// AWS Config rule flagging route tables that redirect metadata server traffic
#[derive(Parser, Debug, Clone)]
#[command(name = "metadata-route-rule")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Logging level (error, warn, info, debug, trace)
    #[arg(short, long, global = true, env = "MDR_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "MDR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Assume the event's execution role before calling AWS Config
    #[arg(long, global = true, env = "MDR_ASSUME_ROLE")]
    pub assume_role: bool,

    /// Return verdicts without sending them to AWS Config
    #[arg(long, global = true, env = "MDR_NO_SUBMIT")]
    pub no_submit: bool,

    /// Include internal error details in error responses
    #[arg(long, global = true, env = "MDR_EXPOSE_INTERNAL_ERRORS")]
    pub expose_internal_errors: bool,

    /// Watched CIDR blocks used when an event carries no rule parameters
    #[arg(long = "watch", global = true, value_delimiter = ',', env = "MDR_WATCHED_CIDRS")]
    pub watched_cidrs: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve rule invocations over HTTP
    Serve {
        /// Web server port
        #[arg(short, long, env = "MDR_PORT")]
        port: Option<u16>,

        /// Bind address
        #[arg(long, env = "MDR_BIND_ADDRESS")]
        bind_address: Option<String>,
    },
    /// Evaluate a single rule event read from a file (`-` for stdin)
    Evaluate {
        #[arg(default_value = "-")]
        event: PathBuf,
    },
}

/// Configuration file structure (TOML format)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigFile {
    /// Server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Rule settings
    #[serde(default)]
    pub rule: RuleConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Web server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default: 127.0.0.1)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Assume the execution role named in each event
    #[serde(default)]
    pub assume_role_mode: bool,

    /// Watched CIDR blocks when the rule parameters name none
    #[serde(default)]
    pub watched_cidrs: Vec<String>,

    /// Send verdicts to AWS Config
    #[serde(default = "default_true")]
    pub submit_evaluations: bool,

    /// Include internal error details in error responses
    #[serde(default)]
    pub expose_internal_errors: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

impl Default for RuleConfig {
    fn default() -> Self {
        RuleConfig {
            assume_role_mode: false,
            watched_cidrs: Vec::new(),
            submit_evaluations: default_true(),
            expose_internal_errors: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Serve,
    Evaluate { event: PathBuf },
}

/// Merged configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub port: u16,
    pub bind_address: String,
    pub log_level: Level,
    pub rule: RuleSettings,
}

impl Config {
    /// Load configuration from all sources (CLI args, config file, defaults)
    /// Priority: CLI args > Environment variables > Config file > Defaults
    pub fn load() -> anyhow::Result<Self> {
        let cli_args = CliArgs::parse();

        // Load config file if specified
        let config_file = if let Some(config_path) = &cli_args.config {
            read_config_file(config_path)?
        } else {
            // Try loading from default locations
            let default_paths = vec![
                PathBuf::from("config.toml"),
                PathBuf::from("metadata-route-rule.toml"),
            ];

            let mut loaded_config = None;
            for path in default_paths {
                if path.exists() {
                    loaded_config = Some(read_config_file(&path)?);
                    break;
                }
            }

            loaded_config.unwrap_or_default()
        };

        Self::merge(cli_args, config_file)
    }

    /// Merge configuration (CLI args override config file)
    pub fn merge(cli_args: CliArgs, config_file: ConfigFile) -> anyhow::Result<Self> {
        let (mode, port, bind_address) = match cli_args.command {
            Command::Serve { port, bind_address } => (
                Mode::Serve,
                port.unwrap_or(config_file.server.port),
                bind_address.unwrap_or(config_file.server.bind_address),
            ),
            Command::Evaluate { event } => (
                Mode::Evaluate { event },
                config_file.server.port,
                config_file.server.bind_address,
            ),
        };

        let log_level = parse_log_level(
            cli_args
                .log_level
                .as_deref()
                .unwrap_or(&config_file.logging.level),
        )?;

        let watched_source = if cli_args.watched_cidrs.is_empty() {
            &config_file.rule.watched_cidrs
        } else {
            &cli_args.watched_cidrs
        };
        let default_watched = WatchedCidrSet::parse(watched_source)
            .context("Invalid watched CIDR block in configuration")?;

        let rule = RuleSettings {
            assume_role_mode: cli_args.assume_role || config_file.rule.assume_role_mode,
            default_watched,
            submit_evaluations: !cli_args.no_submit && config_file.rule.submit_evaluations,
            expose_internal_errors: cli_args.expose_internal_errors
                || config_file.rule.expose_internal_errors,
        };

        Ok(Config {
            mode,
            port,
            bind_address,
            log_level,
            rule,
        })
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ConfigFile> {
    tracing::info!("Loading configuration from: {}", path.display());
    let config_content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<ConfigFile>(&config_content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

fn parse_log_level(level_str: &str) -> anyhow::Result<Level> {
    match level_str.to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(anyhow::anyhow!("Invalid log level: {}", level_str)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> CliArgs {
        let mut argv = vec!["metadata-route-rule"];
        argv.extend_from_slice(args);
        CliArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.server.port, 8080);
        assert!(!config.rule.assume_role_mode);
        assert!(config.rule.submit_evaluations);
    }

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("info"), Ok(Level::INFO)));
        assert!(matches!(parse_log_level("debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [server]
            port = 9000

            [rule]
            assume_role_mode = true
            watched_cidrs = ["169.254.169.254/32", "fd00:ec2::254/128"]

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(file.server.port, 9000);
        assert_eq!(file.server.bind_address, "127.0.0.1");
        assert!(file.rule.assume_role_mode);
        assert!(file.rule.submit_evaluations);
        assert_eq!(file.rule.watched_cidrs.len(), 2);
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = ConfigFile {
            rule: RuleConfig {
                watched_cidrs: vec!["10.0.0.0/8".to_string()],
                ..Default::default()
            },
            ..Default::default()
        };
        let config = Config::merge(
            cli(&["--no-submit", "--watch", "169.254.169.254/32,fd00:ec2::254", "serve", "--port", "9100"]),
            file,
        )
        .unwrap();

        assert_eq!(config.mode, Mode::Serve);
        assert_eq!(config.port, 9100);
        assert!(!config.rule.submit_evaluations);
        assert_eq!(config.rule.default_watched.blocks().len(), 2);
    }

    #[test]
    fn test_evaluate_defaults_to_stdin() {
        let config = Config::merge(cli(&["evaluate"]), ConfigFile::default()).unwrap();
        assert_eq!(
            config.mode,
            Mode::Evaluate {
                event: PathBuf::from("-")
            }
        );
        assert_eq!(config.rule.default_watched, WatchedCidrSet::default());
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_invalid_watched_block_is_rejected() {
        assert!(Config::merge(cli(&["--watch", "bogus", "evaluate"]), ConfigFile::default()).is_err());
    }
}
