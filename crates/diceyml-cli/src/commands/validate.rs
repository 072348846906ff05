use anyhow::{Result, bail};
use diceyml::ValidateErrors;
use std::path::Path;

/// Collect all findings without failing on them
pub fn check(path: &Path, env: Option<&str>) -> Result<ValidateErrors> {
    let dice = super::load(path, env, false)?;
    Ok(dice.validate())
}

pub fn run(path: &Path, env: Option<&str>, json: bool) -> Result<()> {
    if !json {
        println!("Validating {}...", path.display());
    }

    let errors = check(path, env)?;

    if json {
        println!("{}", errors.to_json()?);
    } else if errors.is_empty() {
        println!("✓ Descriptor valid");
    } else {
        for error in errors.errors() {
            println!("  ✗ {}", error);
        }
    }

    if !errors.is_empty() {
        bail!("{} validation error(s)", errors.len());
    }
    Ok(())
}
