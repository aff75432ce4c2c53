//! Command-line bootstrap shared by every bot binary.
//!
//! Every bot understands `-u/--url` (print the register URL and exit),
//! `-g/--generate` (write a starter config and exit) and `-c/--config`.
//! Bot-specific flags are flattened in through the `T: clap::Args` parameter.
//!
//! ```rust,ignore
//! #[derive(clap::Args, Debug)]
//! struct EchoArgs {
//!     /// Prefix for echoed messages
//!     #[arg(short, long, default_value = "echo:")]
//!     prefix: String,
//! }
//!
//! let cli = Cli::<EchoArgs>::parse_with("Echo bot", env!("CARGO_PKG_VERSION"));
//! match bootstrap(cli)? {
//!     Startup::Run { config, args } => { /* connect */ }
//!     Startup::Exit => return Ok(()),
//! }
//! ```

use std::path::PathBuf;

use clap::{Args, CommandFactory, FromArgMatches, Parser};
use tracing::debug;

use crate::config::{BotConfig, ConfigLoader, DEFAULT_CONFIG_FILE, write_template};
use crate::error::RuntimeResult;

/// OAuth authorization URL template; `{CLIENT_ID}` is substituted.
pub const REGISTER_URL: &str =
    "https://discordapp.com/oauth2/authorize?&client_id={CLIENT_ID}&scope=bot&permissions=0";

/// The URL that adds the bot with `client_id` to a guild.
pub fn register_url(client_id: &str) -> String {
    REGISTER_URL.replace("{CLIENT_ID}", client_id)
}

/// Flags common to every bot, plus the bot's own flags `T`.
#[derive(Parser, Debug)]
pub struct Cli<T: Args> {
    /// Get the url for registering the bot
    #[arg(short = 'u', long = "url")]
    pub url: bool,

    /// Generate a config file to populate
    #[arg(short = 'g', long = "generate")]
    pub generate: bool,

    /// Configuration file (searched for when omitted)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub args: T,
}

/// For bots without flags of their own.
#[derive(Args, Debug, Clone, Default)]
pub struct NoArgs {}

impl<T: Args> Cli<T> {
    /// Parses the process arguments, with the bot's description and version
    /// in `--help` and `--version`. Exits on invalid arguments.
    pub fn parse_with(about: &'static str, version: &'static str) -> Self {
        let matches = Self::command().about(about).version(version).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

/// What the binary should do after [`bootstrap`].
#[derive(Debug)]
pub enum Startup<T> {
    /// Configuration is loaded; run the bot.
    Run { config: BotConfig, args: T },
    /// A one-shot flag was handled; exit successfully.
    Exit,
}

/// Handles the one-shot flags and loads the configuration.
///
/// `--generate` writes the template (to `--config` or `config.json`) before
/// anything is loaded, so it works without a configuration.
pub fn bootstrap<T: Args>(cli: Cli<T>) -> RuntimeResult<Startup<T>> {
    if cli.generate {
        let path = cli
            .config
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        write_template(&path)?;
        println!("Config file generated!");
        println!("{} is ready to be filled in", path.display());
        return Ok(Startup::Exit);
    }

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new().file(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;

    if cli.url {
        println!("{}", register_url(&config.client_id));
        return Ok(Startup::Exit);
    }

    debug!(version = %config.version, "Bootstrap complete");
    Ok(Startup::Run {
        config,
        args: cli.args,
    })
}
