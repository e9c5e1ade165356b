//! Check command - validate configuration, data and pages without writing

use std::{collections::HashMap, path::Path};

use color_eyre::eyre::{Result, bail};
use quire_core::Config;
use quire_generator::Site;

use crate::project_root;

/// Validation result.
#[derive(Debug, Default)]
struct ValidationResult {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationResult {
    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run the check command.
///
/// Loads everything a build would and renders every page in memory. Nothing
/// is written and the output directory is left untouched.
pub fn run(config_path: &Path, strict: bool) -> Result<()> {
    tracing::info!(?config_path, strict, "Checking project");

    let result = validate(config_path);

    println!();
    println!("Summary:");
    println!("  Errors:   {}", result.errors.len());
    println!("  Warnings: {}", result.warnings.len());

    if result.has_errors() {
        println!();
        println!("Errors:");
        for err in &result.errors {
            println!("  ✗ {err}");
        }
    }

    if result.has_warnings() {
        println!();
        println!("Warnings:");
        for warn in &result.warnings {
            println!("  ⚠ {warn}");
        }
    }

    if result.has_errors() {
        bail!("Validation failed with {} error(s)", result.errors.len());
    }

    if strict && result.has_warnings() {
        bail!(
            "Validation failed with {} warning(s) (strict mode)",
            result.warnings.len()
        );
    }

    println!();
    println!("✓ All checks passed");

    Ok(())
}

fn validate(config_path: &Path) -> ValidationResult {
    let mut result = ValidationResult::default();
    let root = project_root(config_path);

    println!("Checking configuration...");
    let config = match Config::load(config_path) {
        Ok(c) => {
            println!("  ✓ Configuration valid");
            c
        }
        Err(e) => {
            println!("  ✗ Configuration invalid: {e}");
            result.add_error(format!("Configuration error: {e}"));
            return result;
        }
    };

    println!("\nChecking assets...");
    for mount in &config.assets {
        if !root.join(&mount.source).is_dir() {
            result.add_warning(format!(
                "Asset source `{}` does not exist and will copy nothing",
                mount.source
            ));
        }
    }

    println!("\nLoading data and templates...");
    let site = match Site::load(&config, &root) {
        Ok(site) => {
            println!(
                "  ✓ {} page(s), {} layout(s)",
                site.pages().len(),
                site.resolver().layout_names().count()
            );
            site
        }
        Err(e) => {
            println!("  ✗ {e}");
            result.add_error(e.to_string());
            return result;
        }
    };

    println!("\nRendering pages...");
    let mut outputs: HashMap<_, Vec<_>> = HashMap::new();
    for page in site.pages() {
        outputs
            .entry(site.output_path(page))
            .or_default()
            .push(page.clone());

        match site.render_page(page) {
            Ok(_) => println!("  ✓ {}", page.display()),
            Err(e) => {
                println!("  ✗ {}", page.display());
                result.add_error(format!("{}: {e}", page.display()));
            }
        }
    }

    let mut collisions: Vec<_> = outputs.into_iter().filter(|(_, p)| p.len() > 1).collect();
    collisions.sort();
    for (dest, pages) in collisions {
        let pages: Vec<_> = pages.iter().map(|p| p.display().to_string()).collect();
        result.add_warning(format!(
            "{} is produced by several pages, the last one wins: {}",
            dest.display(),
            pages.join(", ")
        ));
    }

    result
}
