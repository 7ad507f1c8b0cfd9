use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::{
    config::{Config, DEFAULT_AGGREGATE_TIMEOUT, StoreLocation, default_store_path},
    search::{
        DEFAULT_MERGED_WINDOW_DAYS, DEFAULT_REVIEW_WINDOW_DAYS, MAX_WINDOW_DAYS, SearchWindows,
    },
};

const BUILD_INFO_HUMAN: &str = env!("BUILD_INFO_HUMAN");

/// Rows shown per section unless `--limit` says otherwise.
pub const DEFAULT_ROW_LIMIT: usize = 10;

#[derive(Args, Debug, Clone, Default)]
struct DisplayArgs {
    /// Print PR URLs only
    #[arg(short = 'q', long, conflicts_with = "json")]
    pub quiet: bool,

    /// Print the enriched records as JSON
    #[arg(long)]
    pub json: bool,

    /// Rows shown per section (0 shows everything)
    #[arg(short = 'L', long, default_value_t = DEFAULT_ROW_LIMIT, value_name = "NUM")]
    pub limit: usize,

    /// Truncate titles to fit the terminal width
    #[arg(long = "no-wrap")]
    pub no_wrap: bool,
}

#[derive(Subcommand, Debug, Clone)]
enum CliCommand {
    /// Verify a classic personal access token and store it
    Login {
        /// Token starting with ghp_ (read from stdin when omitted)
        token: Option<String>,
    },

    /// Forget the stored token
    Logout,

    /// Show who the stored token belongs to
    Whoami,

    /// Open PRs you authored, with approvals, comments and CI status
    Mine(DisplayArgs),

    /// Open PRs awaiting or carrying your review
    Reviews(DisplayArgs),

    /// Your recently merged PRs
    Merged(DisplayArgs),

    /// Every section in one load
    All(DisplayArgs),
}

#[derive(Parser, Debug)]
#[command(about = "A personal dashboard of the GitHub pull requests that need your attention")]
#[command(long_version = BUILD_INFO_HUMAN)]
struct CliArgs {
    /// GitHub REST API root (for GitHub Enterprise)
    #[arg(long = "api-url", env = "PRHUB_API_URL", value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Keep the token in this file instead of the OS keychain
    #[arg(long, env = "PRHUB_STORE", value_name = "PATH", global = true)]
    pub store: Option<PathBuf>,

    /// Keep the token in a file under the user config directory
    #[arg(long = "file-store", conflicts_with = "store", global = true)]
    pub file_store: bool,

    /// Days of review activity to include
    #[arg(long = "review-window", default_value_t = DEFAULT_REVIEW_WINDOW_DAYS, value_name = "DAYS", global = true)]
    pub review_window: u32,

    /// Days of merged PRs to include
    #[arg(long = "merged-window", default_value_t = DEFAULT_MERGED_WINDOW_DAYS, value_name = "DAYS", global = true)]
    pub merged_window: u32,

    /// Seconds before a dashboard load is abandoned
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Log debug output to stderr
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

impl CliArgs {
    pub fn validate(&self) -> Result<()> {
        for (flag, days) in [
            ("--review-window", self.review_window),
            ("--merged-window", self.merged_window),
        ] {
            if !(1..=MAX_WINDOW_DAYS).contains(&days) {
                anyhow::bail!("{flag} must be between 1 and {MAX_WINDOW_DAYS} days");
            }
        }
        if self.timeout == Some(0) {
            anyhow::bail!("--timeout must be at least 1 second");
        }
        if let Some(api_url) = &self.api_url {
            url::Url::parse(api_url)
                .with_context(|| format!("Invalid API URL '{api_url}'"))?;
        }
        Ok(())
    }
}

/// Which dashboard section(s) to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Mine,
    Reviews,
    Merged,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Normal,
    Quiet,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayOptions {
    pub mode: DisplayMode,
    /// `None` shows every row.
    pub limit: Option<usize>,
    pub truncate_titles: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Normal,
            limit: Some(DEFAULT_ROW_LIMIT),
            truncate_titles: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login { token: Option<String> },
    Logout,
    Whoami,
    Show { tab: Tab, display: DisplayOptions },
}

/// A fully parsed command line.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config: Config,
    pub command: Command,
    pub verbose: bool,
}

fn display_options(args: &DisplayArgs) -> DisplayOptions {
    let mode = match (args.quiet, args.json) {
        (true, _) => DisplayMode::Quiet,
        (_, true) => DisplayMode::Json,
        _ => DisplayMode::Normal,
    };

    DisplayOptions {
        mode,
        limit: (args.limit > 0).then_some(args.limit),
        truncate_titles: args.no_wrap,
    }
}

fn build_config(cli: &CliArgs) -> Config {
    let defaults = Config::default();
    Config {
        api_base: cli.api_url.clone().unwrap_or(defaults.api_base),
        windows: SearchWindows {
            review_days: cli.review_window,
            merged_days: cli.merged_window,
        },
        aggregate_timeout: cli
            .timeout
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_AGGREGATE_TIMEOUT),
        store: match (&cli.store, cli.file_store) {
            (Some(path), _) => StoreLocation::File(path.clone()),
            (None, true) => StoreLocation::File(default_store_path()),
            (None, false) => StoreLocation::Keyring,
        },
        ..defaults
    }
}

fn build_invocation(cli: CliArgs) -> Result<Invocation> {
    cli.validate()?;

    let config = build_config(&cli);
    let command = match &cli.command {
        CliCommand::Login { token } => Command::Login {
            token: token.clone(),
        },
        CliCommand::Logout => Command::Logout,
        CliCommand::Whoami => Command::Whoami,
        CliCommand::Mine(args) => Command::Show {
            tab: Tab::Mine,
            display: display_options(args),
        },
        CliCommand::Reviews(args) => Command::Show {
            tab: Tab::Reviews,
            display: display_options(args),
        },
        CliCommand::Merged(args) => Command::Show {
            tab: Tab::Merged,
            display: display_options(args),
        },
        CliCommand::All(args) => Command::Show {
            tab: Tab::All,
            display: display_options(args),
        },
    };

    Ok(Invocation {
        config,
        command,
        verbose: cli.verbose,
    })
}

/// Parses command-line arguments into configuration and the command to run.
///
/// Help and version requests come back as `clap::Error` inside the
/// `anyhow::Error` so the caller decides how to print them.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    build_invocation(cli)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Invocation> {
        parse_args(std::iter::once("prhub").chain(args.iter().copied()))
    }

    #[test]
    fn test_mine_defaults() {
        let invocation = parse(&["mine"]).unwrap();
        assert_eq!(
            invocation.command,
            Command::Show {
                tab: Tab::Mine,
                display: DisplayOptions::default(),
            }
        );
        assert_eq!(invocation.config.windows, SearchWindows::default());
        assert!(!invocation.verbose);
    }

    #[test]
    fn test_display_flags() {
        let invocation = parse(&["reviews", "--quiet", "--limit", "0", "--no-wrap"]).unwrap();
        let Command::Show { tab, display } = invocation.command else {
            panic!("expected show command");
        };
        assert_eq!(tab, Tab::Reviews);
        assert_eq!(display.mode, DisplayMode::Quiet);
        assert_eq!(display.limit, None);
        assert!(display.truncate_titles);
    }

    #[test]
    fn test_json_mode() {
        let invocation = parse(&["all", "--json"]).unwrap();
        assert!(matches!(
            invocation.command,
            Command::Show {
                tab: Tab::All,
                display: DisplayOptions {
                    mode: DisplayMode::Json,
                    ..
                },
            }
        ));
    }

    #[test]
    fn test_quiet_conflicts_with_json() {
        assert!(parse(&["all", "--json", "--quiet"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let invocation = parse(&[
            "merged",
            "--merged-window",
            "14",
            "--review-window",
            "7",
            "--timeout",
            "5",
            "--api-url",
            "https://ghe.example.com/api/v3",
            "-v",
        ])
        .unwrap();

        assert_eq!(invocation.config.windows.merged_days, 14);
        assert_eq!(invocation.config.windows.review_days, 7);
        assert_eq!(invocation.config.aggregate_timeout, Duration::from_secs(5));
        assert_eq!(invocation.config.api_base, "https://ghe.example.com/api/v3");
        assert!(invocation.verbose);
    }

    #[test]
    fn test_store_selection() {
        let invocation = parse(&["whoami", "--store", "/tmp/prhub.json"]).unwrap();
        assert_eq!(
            invocation.config.store,
            StoreLocation::File(PathBuf::from("/tmp/prhub.json"))
        );

        let invocation = parse(&["logout", "--file-store"]).unwrap();
        assert_eq!(
            invocation.config.store,
            StoreLocation::File(default_store_path())
        );

        assert!(parse(&["logout", "--file-store", "--store", "x.json"]).is_err());
    }

    #[test]
    fn test_login_token_is_optional() {
        assert_eq!(
            parse(&["login"]).unwrap().command,
            Command::Login { token: None }
        );
        assert_eq!(
            parse(&["login", "ghp_abc"]).unwrap().command,
            Command::Login {
                token: Some("ghp_abc".to_string())
            }
        );
    }

    #[test]
    fn test_rejects_zero_windows() {
        assert!(parse(&["mine", "--review-window", "0"]).is_err());
        assert!(parse(&["mine", "--merged-window", "0"]).is_err());
        assert!(parse(&["mine", "--timeout", "0"]).is_err());
    }

    #[test]
    fn test_rejects_oversized_windows() {
        let err = parse(&["mine", "--review-window", "4294967295"]).unwrap_err();
        assert!(err.to_string().contains("--review-window must be between 1 and 3650"));
        assert!(parse(&["all", "--merged-window", "3651"]).is_err());

        let invocation = parse(&["all", "--merged-window", "3650"]).unwrap();
        assert_eq!(invocation.config.windows.merged_days, MAX_WINDOW_DAYS);
    }

    #[test]
    fn test_rejects_invalid_api_url() {
        let err = parse(&["mine", "--api-url", "not a url"]).unwrap_err();
        assert!(err.to_string().contains("Invalid API URL"));
    }

    #[test]
    fn test_subcommand_required() {
        let err = parse(&[]).unwrap_err();
        assert!(err.downcast_ref::<clap::Error>().is_some());
    }
}
