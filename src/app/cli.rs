//! Command line arguments
//!
//! Global options override the matching configuration file values; the
//! subcommand decides what the binary does with the resulting runtime.

use crate::core::config::Config;
use crate::core::logging::{level_from_verbosity, LogFormat};
use crate::core::mode::RuntimeMode;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "featurehub")]
#[command(about = "Feature lifecycle runtime and real-time update client")]
#[command(version = crate::core::version::version_banner())]
pub struct Args {
    /// Configuration file path
    #[arg(long = "config", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Runtime mode (development, production, test)
    #[arg(long = "mode", value_name = "MODE", global = true)]
    pub mode: Option<RuntimeMode>,

    /// Log level
    #[arg(long = "log-level", value_name = "LEVEL", global = true,
          value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Log file path
    #[arg(long = "log-file", value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable coloured output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// More output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Less output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect to a real-time endpoint and log every event until interrupted
    Watch(WatchArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq, Default)]
pub struct WatchArgs {
    /// Endpoint URL (ws:// or wss://), defaults to the configured URL
    #[arg(long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// Channel to subscribe to (repeatable)
    #[arg(short = 'c', long = "channel", value_name = "CHANNEL")]
    pub channels: Vec<String>,

    /// Authentication token sent after connecting
    #[arg(long = "token", value_name = "TOKEN")]
    pub token: Option<String>,

    /// Do not reconnect after the connection drops
    #[arg(long = "no-reconnect")]
    pub no_reconnect: bool,
}

impl Args {
    pub fn verbosity(&self) -> i8 {
        (self.verbose.min(i8::MAX as u8) as i8).saturating_sub(self.quiet.min(i8::MAX as u8) as i8)
    }

    /// Fold command line overrides into a loaded configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(mode) = self.mode {
            config.mode = Some(mode);
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
        let verbosity = self.verbosity();
        if verbosity != 0 {
            config.logging.level = level_from_verbosity(&config.logging.level, verbosity).to_string();
        }
        if let Some(format) = self.log_format {
            config.logging.format = format;
        }
        if let Some(file) = &self.log_file {
            config.logging.file = Some(file.to_string_lossy().into_owned());
        }
        if self.no_color {
            config.logging.color = false;
        }

        if let Command::Watch(watch) = &self.command {
            if let Some(url) = &watch.url {
                config.realtime.url = url.clone();
            }
            if let Some(token) = &watch.token {
                config.realtime.auth_token = Some(token.clone());
            }
            if watch.no_reconnect {
                config.realtime.auto_reconnect = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_watch_collects_repeated_channels() {
        let args = parse(&[
            "featurehub", "watch", "--url", "ws://live.local", "-c", "sections", "--channel", "areas",
        ]);
        match args.command {
            Command::Watch(watch) => {
                assert_eq!(watch.url.as_deref(), Some("ws://live.local"));
                assert_eq!(watch.channels, vec!["sections", "areas"]);
                assert!(!watch.no_reconnect);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = parse(&["featurehub", "config", "--log-format", "json", "-vv", "--no-color"]);
        assert_eq!(args.command, Command::Config);
        assert_eq!(args.log_format, Some(LogFormat::Json));
        assert_eq!(args.verbosity(), 2);
        assert!(args.no_color);
    }

    #[test]
    fn test_rejects_unknown_level_and_missing_subcommand() {
        assert!(Args::try_parse_from(["featurehub", "--log-level", "loud", "config"]).is_err());
        assert!(Args::try_parse_from(["featurehub"]).is_err());
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let args = parse(&[
            "featurehub", "--mode", "development", "-q", "watch", "--url", "wss://x.example",
            "--token", "abc", "--no-reconnect",
        ]);
        let mut config = Config::default();
        args.apply_to(&mut config);

        assert_eq!(config.mode, Some(RuntimeMode::Development));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.realtime.url, "wss://x.example");
        assert_eq!(config.realtime.auth_token.as_deref(), Some("abc"));
        assert!(!config.realtime.auto_reconnect);
    }

    #[test]
    fn test_explicit_level_then_verbosity() {
        let args = parse(&["featurehub", "--log-level", "error", "-v", "config"]);
        let mut config = Config::default();
        args.apply_to(&mut config);
        assert_eq!(config.logging.level, "warn");
    }
}
