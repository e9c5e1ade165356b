//! Quire CLI
//!
//! Assembles static HTML pages from Handlebars templates, front matter and
//! data files.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Quire.
#[derive(Parser)]
#[command(
    name = "quire",
    version,
    about = "Assemble static pages from Handlebars templates and data"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "quire.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Clean the output directory, copy assets and render every page
    Build {
        /// Output directory, overriding the configured one
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },
    /// Load configuration, data and templates and render pages without writing
    Check {
        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    quire::init_tracing(cli.verbose);

    match cli.command.unwrap_or(Commands::Build { output: None }) {
        Commands::Build { output } => {
            quire::cmd::build::run(&cli.config, output.as_deref())?;
        }
        Commands::Check { strict } => {
            quire::cmd::check::run(&cli.config, strict)?;
        }
    }

    Ok(())
}
