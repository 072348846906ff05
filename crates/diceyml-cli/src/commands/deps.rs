use anyhow::{Result, bail};
use std::path::Path;

/// Startup waves of the descriptor's services, one line per wave
pub fn startup_plan(path: &Path) -> Result<Vec<String>> {
    let dice = super::load(path, None, false)?;
    let graph = dice.dependency_graph();

    if let Some(cycle) = graph.find_cycle() {
        bail!("Dependency cycle: {}", cycle.join(" -> "));
    }

    let waves = graph.startup_waves().unwrap_or_default();
    Ok(waves.into_iter().map(|wave| wave.join(", ")).collect())
}

pub fn run(path: &Path) -> Result<()> {
    println!("Startup order for {}:", path.display());
    for (i, wave) in startup_plan(path)?.iter().enumerate() {
        println!("  {}. {}", i + 1, wave);
    }
    Ok(())
}
