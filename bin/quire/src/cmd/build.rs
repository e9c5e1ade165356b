//! Build command - assemble the site

use std::path::Path;

use color_eyre::eyre::{Result, WrapErr};
use quire_core::Config;
use quire_generator::{BuildError, Builder};

use crate::project_root;

/// Run the build command.
///
/// Relative paths in the configuration resolve against the directory holding
/// the configuration file. `output` overrides the configured output directory.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<()> {
    tracing::info!(?config_path, ?output, "Building site");

    let config = Config::load(config_path)
        .wrap_err_with(|| format!("Failed to load config from {}", config_path.display()))?;
    let root = project_root(config_path);

    let mut builder = Builder::new(config, &root);
    if let Some(output) = output {
        builder = builder.with_output_dir(output);
    }

    let stats = match builder.build() {
        Ok(stats) => stats,
        Err(BuildError::Pages { failures, stats }) => {
            for failure in &failures {
                eprintln!("✗ {}", failure.path.display());
                eprintln!("    {}", failure.error);
            }
            println!(
                "Wrote {} page(s) to {}, {} failed",
                stats.pages,
                builder.output_dir().display(),
                stats.failed
            );
            color_eyre::eyre::bail!("Build failed: {} page(s) did not render", failures.len());
        }
        Err(e) => return Err(e).wrap_err("Build failed"),
    };

    println!("Build complete!");
    println!("  Pages:    {}", stats.pages);
    println!("  Assets:   {}", stats.assets);
    if stats.collisions > 0 {
        println!("  Overwritten outputs: {}", stats.collisions);
    }
    println!("  Output:   {}", builder.output_dir().display());
    println!("  Duration: {}ms", stats.duration_ms);

    Ok(())
}
