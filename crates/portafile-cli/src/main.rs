//! # pfile
//!
//! Command-line front end for portafile handles.
//!
//! Every `INPUT` goes through the same resolver the library uses: plain
//! paths, `~/...`, `file://` URIs, or capability URIs served by the roots
//! granted in `.portafile/config.toml`.

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use portafile::{Context, FileHandle};
use portafile_config::Config;

mod inspect;
mod mutate;
mod stream;

/// Inspect and mutate files through path or capability handles
#[derive(Parser)]
#[command(name = "pfile")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show metadata, permissions and volume statistics
    Stat(inspect::StatArgs),

    /// List the entries of a directory
    Ls(inspect::LsArgs),

    /// Show which kind of handle an input resolves to
    Resolve {
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Convert between the octal and `rwxrwxrwx` permission forms
    Mode {
        /// Octal mode (`754`, `0o754`) or 9-character string (`rwxr-xr--`)
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Copy a file to stdout
    Cat {
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Copy stdin into a file
    Write {
        #[arg(value_name = "INPUT")]
        input: String,

        /// Append instead of truncating
        #[arg(short, long)]
        append: bool,
    },

    /// Create an empty file, or bump the timestamp of an existing one
    Touch {
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Create a directory
    Mkdir {
        #[arg(value_name = "INPUT")]
        input: String,

        /// Create missing parents as well
        #[arg(short, long)]
        parents: bool,
    },

    /// Delete a file or an empty directory
    Rm {
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Rename or move within the same addressing model
    Mv {
        #[arg(value_name = "FROM")]
        from: String,

        #[arg(value_name = "TO")]
        to: String,
    },

    /// Replace all nine permission bits
    Chmod {
        /// Octal mode or 9-character string
        #[arg(value_name = "MODE")]
        mode: String,

        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Toggle one permission class
    Perm(mutate::PermArgs),

    /// Clear every write bit
    ReadOnly {
        #[arg(value_name = "INPUT")]
        input: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Print the built-in defaults as TOML
    Default,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Fills the process-wide config, surfacing parse errors the lazy load would swallow
    portafile_config::reload().context("Failed to load portafile config")?;
    let config = portafile_config::config();
    portafile_config::init_logging(config.log_level());

    let ctx = Context::from_config(&config);
    portafile_config::log_cli_debug!(
        "Context ready",
        schemes = tracing::field::debug(ctx.schemes().collect::<Vec<_>>())
    );

    match cli.command {
        Commands::Stat(args) => inspect::stat(&resolve(&ctx, &args.input)?, &args),
        Commands::Ls(args) => inspect::ls(&resolve(&ctx, &args.input)?, &args),
        Commands::Resolve { input } => inspect::describe(&resolve(&ctx, &input)?),
        Commands::Mode { value } => inspect::mode(&value),
        Commands::Cat { input } => stream::cat(&resolve(&ctx, &input)?),
        Commands::Write { input, append } => stream::write(&resolve(&ctx, &input)?, append),
        Commands::Touch { input } => mutate::touch(&resolve(&ctx, &input)?),
        Commands::Mkdir { input, parents } => mutate::mkdir(&resolve(&ctx, &input)?, parents),
        Commands::Rm { input } => mutate::rm(&resolve(&ctx, &input)?),
        Commands::Mv { from, to } => mutate::mv(&resolve(&ctx, &from)?, &resolve(&ctx, &to)?),
        Commands::Chmod { mode, input } => {
            let perms = inspect::parse_mode(&mode)?;
            mutate::chmod(&resolve(&ctx, &input)?, perms)
        }
        Commands::Perm(args) => mutate::perm(&resolve(&ctx, &args.input)?, &args),
        Commands::ReadOnly { input } => mutate::read_only(&resolve(&ctx, &input)?),
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                print!("{}", config.to_toml()?);
                Ok(())
            }
            ConfigCommands::Default => {
                print!("{}", Config::default_toml()?);
                Ok(())
            }
        },
    }
}

/// Granted roots are trees, so inputs resolve with navigation enabled.
fn resolve(ctx: &Context, input: &str) -> Result<FileHandle> {
    ctx.resolver()
        .try_resolve(input, true)
        .with_context(|| format!("Cannot resolve {input:?}"))
}
