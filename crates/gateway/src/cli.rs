//! Command-line interface for the `coursechat` binary.

use clap::{Parser, Subcommand};

use cc_domain::config::Config;

/// CourseChat — a retrieval-augmented chat session engine.
#[derive(Debug, Parser)]
#[command(name = "coursechat", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from `$CC_CONFIG` (default `coursechat.toml`).
///
/// A missing file yields the built-in defaults, which `config validate`
/// will reject for having no providers.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CC_CONFIG").unwrap_or_else(|_| "coursechat.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Parse and validate the config, printing any issue.
///
/// Returns `false` when the config is unusable.
pub fn validate(config: &Config, config_path: &str) -> bool {
    match config.validate() {
        Ok(()) => {
            println!("Config OK ({config_path})");
            true
        }
        Err(e) => {
            println!("{e}");
            println!("\n1 error(s) in {config_path}");
            false
        }
    }
}

/// Dump the resolved config (with all defaults filled in) as TOML.
pub fn show(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("Failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}
