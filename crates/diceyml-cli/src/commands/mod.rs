pub mod deps;
pub mod render;
pub mod validate;

use anyhow::{Context, Result};
use diceyml::DiceYaml;
use std::path::Path;

/// Read and resolve a descriptor, for `env` when one is given
pub fn load(path: &Path, env: Option<&str>, validate: bool) -> Result<DiceYaml> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let dice = match env {
        Some(env) => DiceYaml::new_deployable(&text, env, validate),
        None => DiceYaml::new(&text, validate),
    };
    dice.context("Failed to parse descriptor")
}

#[cfg(test)]
pub(crate) mod testing {
    use std::io::Write;
    use tempfile::NamedTempFile;

    pub fn descriptor(text: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }
}
