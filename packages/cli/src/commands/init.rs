use anyhow::{bail, Result};
use colored::Colorize;
use meetvoice_connector::Config;
use std::path::Path;

/// Write the default configuration to `path`.
///
/// Does not read the existing file, so `--force` also repairs a broken one.
pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    Config::default().save(path)?;

    println!(
        "{} Wrote default configuration to {}",
        "✓".green().bold(),
        path.display().to_string().dimmed()
    );

    Ok(())
}
