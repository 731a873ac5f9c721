use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use halma_core::{Player, SearchOptions};
use serde::{Deserialize, Serialize};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Supervised two-player halma sessions")]
pub struct Cli {
    /// Engine plays the first mover (white)
    #[arg(short = 'w', long)]
    pub white: bool,

    /// Engine plays the second mover (black)
    #[arg(short = 'b', long)]
    pub black: bool,

    /// Randomize move choice among near-equal candidates
    #[arg(short = 'r', long)]
    pub random: bool,

    /// Log per-depth search statistics
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Do not spawn the display process
    #[arg(short = 'd', long = "no-display")]
    pub no_display: bool,

    /// Tournament mode: no display sourcing, machine-readable move feed
    #[arg(short = 't', long)]
    pub tournament: bool,

    /// Soft time budget per engine move, in seconds
    #[arg(short = 'a', long, value_name = "SECS")]
    pub avg_time: Option<u64>,

    /// Replay a stored game before play begins
    #[arg(short = 'i', long, value_name = "FILE")]
    pub history: Option<PathBuf>,

    /// Append one transcript line per applied move
    #[arg(short = 'o', long, value_name = "FILE")]
    pub transcript: Option<PathBuf>,

    /// Path to config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the engine-side protocol handler over stdin/stdout.
    ///
    /// Spawned by the controller; hidden because it is not meant to be
    /// called by hand.
    #[command(hide = true)]
    Engine(EngineArgs),
}

/// Knobs forwarded to the engine child
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Maximum search depth
    #[arg(long, default_value_t = default_search_depth())]
    pub depth: u8,

    /// Randomize move choice
    #[arg(long)]
    pub random: bool,

    /// Log per-depth search statistics
    #[arg(long)]
    pub verbose: bool,

    /// Soft time budget per move, in seconds
    #[arg(long, value_name = "SECS")]
    pub avg_time: Option<u64>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl EngineArgs {
    pub fn to_search_options(&self) -> SearchOptions {
        SearchOptions {
            depth: self.depth,
            randomize: self.random,
            verbose: self.verbose,
            time_budget: self.avg_time.map(std::time::Duration::from_secs),
        }
    }
}

/// Immutable snapshot of the session's intent, built once before any
/// process is spawned.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub engine_white: bool,
    pub engine_black: bool,
    pub random: bool,
    pub verbose: bool,
    pub no_display: bool,
    pub tournament: bool,
    pub history: Option<PathBuf>,
    pub transcript: Option<PathBuf>,
}

impl SessionConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            engine_white: cli.white,
            engine_black: cli.black,
            random: cli.random,
            verbose: cli.verbose,
            no_display: cli.no_display,
            tournament: cli.tournament,
            history: cli.history.clone(),
            transcript: cli.transcript.clone(),
        }
    }

    /// Whether the engine is bound to `player` for this session.
    pub fn engine_plays(&self, player: Player) -> bool {
        match player {
            Player::White => self.engine_white,
            Player::Black => self.engine_black,
        }
    }

    /// Whether an engine child is needed at all.
    pub fn wants_engine(&self) -> bool {
        self.engine_white || self.engine_black
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Display program started for rendering and human input
    #[serde(default = "default_display_command")]
    pub display_command: String,

    /// Override for the engine child command (mainly for testing); the
    /// default re-executes the current binary's hidden subcommand
    #[serde(default)]
    pub engine_command: Option<String>,

    /// Maximum engine search depth
    #[serde(default = "default_search_depth")]
    pub search_depth: u8,

    /// Grace interval between SIGTERM and SIGKILL at shutdown (milliseconds)
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// Default soft time budget per engine move (seconds)
    #[serde(default)]
    pub avg_time_secs: Option<u64>,
}

fn default_display_command() -> String {
    "halma-disp".to_string()
}

pub(crate) fn default_search_depth() -> u8 {
    3
}

fn default_grace_ms() -> u64 {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_command: default_display_command(),
            engine_command: None,
            search_depth: default_search_depth(),
            grace_ms: default_grace_ms(),
            avg_time_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("halma/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/halma/config.toml")),
            dirs::home_dir().map(|p| p.join(".halma.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(avg_time) = cli.avg_time {
            self.avg_time_secs = Some(avg_time);
        }
    }

    /// Validate and normalize settings values
    pub fn validate(&mut self) {
        const MIN_DEPTH: u8 = 1;
        const MIN_GRACE_MS: u64 = 10;

        if self.search_depth < MIN_DEPTH {
            self.search_depth = MIN_DEPTH;
        }
        if self.grace_ms < MIN_GRACE_MS {
            self.grace_ms = MIN_GRACE_MS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("halma").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.display_command, "halma-disp");
        assert_eq!(settings.search_depth, 3);
        assert_eq!(settings.grace_ms, 100);
        assert_eq!(settings.avg_time_secs, None);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            display_command = "xhalma --mono"
            search_depth = 5
            grace_ms = 250
        "#;

        let settings: Settings = toml::from_str(toml).expect("Should parse TOML");
        assert_eq!(settings.display_command, "xhalma --mono");
        assert_eq!(settings.search_depth, 5);
        assert_eq!(settings.grace_ms, 250);
    }

    #[test]
    fn test_merge_cli_avg_time() {
        let mut settings = Settings::default();
        settings.merge_cli(&cli(&["-a", "20"]));
        assert_eq!(settings.avg_time_secs, Some(20));
    }

    #[test]
    fn test_validate_clamps_minimums() {
        let mut settings = Settings {
            search_depth: 0,
            grace_ms: 0,
            ..Settings::default()
        };
        settings.validate();
        assert_eq!(settings.search_depth, 1);
        assert_eq!(settings.grace_ms, 10);
    }

    #[test]
    fn test_role_binding() {
        let config = SessionConfig::from_cli(&cli(&["-b"]));
        assert!(!config.engine_plays(Player::White));
        assert!(config.engine_plays(Player::Black));
        assert!(config.wants_engine());

        let config = SessionConfig::from_cli(&cli(&[]));
        assert!(!config.wants_engine());
    }

    #[test]
    fn test_engine_subcommand_args() {
        let parsed = cli(&["engine", "--depth", "4", "--random"]);
        let Some(Command::Engine(args)) = parsed.command else {
            panic!("expected engine subcommand");
        };
        let opts = args.to_search_options();
        assert_eq!(opts.depth, 4);
        assert!(opts.randomize);
        assert!(!opts.verbose);
        assert_eq!(opts.time_budget, None);
    }

    #[test]
    fn test_original_short_flags() {
        let parsed = cli(&["-w", "-t", "-a", "30", "-i", "game.hist", "-o", "game.txt"]);
        assert!(parsed.white);
        assert!(parsed.tournament);
        assert_eq!(parsed.avg_time, Some(30));
        assert_eq!(parsed.history, Some(PathBuf::from("game.hist")));
        assert_eq!(parsed.transcript, Some(PathBuf::from("game.txt")));
    }
}
