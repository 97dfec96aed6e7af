use anyhow::{Context, Result};
use log::debug;

use dumpwatch::WatchConfig;

/// Validate the dump-type config: every fallback reference exists and no
/// chain loops.
pub fn exec(cfg: &WatchConfig) -> Result<()> {
    let registry = cfg.load_registry()?;
    registry.check().context("dump config check")?;
    let names: Vec<&str> = registry.type_names().collect();
    debug!("dump types: {}", names.join(", "));
    println!(
        "dump config OK: {} type(s) ({})",
        registry.len(),
        cfg.dump_config
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "bundled".to_string())
    );
    Ok(())
}
